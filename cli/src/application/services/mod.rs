//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod database;
pub mod dependencies;
pub mod environment;
pub mod proxy;
pub mod session;
pub mod setup;
pub mod status;
pub mod workflow;
pub mod worktree;
