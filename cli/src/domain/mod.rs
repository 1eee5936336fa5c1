//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod envfile;
pub mod error;
pub mod naming;
pub mod outcome;
pub mod proxy;
pub mod registry;
pub mod runtime;

pub use config::{ProjectConfig, Settings};
pub use error::{ConfigError, ProvisionError, Subsystem, TaskFailure};
pub use naming::EnvNames;
pub use outcome::StepOutcome;
pub use runtime::{RuntimeKind, RuntimeManager};
