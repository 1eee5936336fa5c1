//! Integration tests for branchfarm CLI
//!
//! These tests spawn the actual binary against a throwaway home directory.
//! Nothing here needs git, postgres, caddy or tmux on the host.
