//! # Secretspin
//!
//! Secretspin rotates Docker Swarm secrets whenever their source files
//! change on disk. Swarm secret objects are immutable, so a file edit can
//! never update a secret in place; instead the daemon creates a new
//! versioned object, repoints every running service that mounts the old
//! one, and then retires the superseded object.
//!
//! ## Architecture
//!
//! ```text
//! filesystem change → Change Detector → Update Queue → Rotation Orchestrator
//!                                                         │
//!                               create secrets ── converge ── patch services
//!                                                         │
//!                                            converge ── retire old secrets
//! ```
//!
//! ## Core Components
//!
//! - **Change Detector** ([`detector`]): per-namespace watch loop, checksum
//!   polling with an optional OS file-event overlay
//! - **Update Queue** ([`queue`]): coalescing map of pending rotations,
//!   the only mutable structure shared between detector and orchestrator
//! - **Rotation Orchestrator** ([`rotation`]): timer-driven create /
//!   converge / patch / converge / retire pipeline
//! - **Cluster Control API** ([`cluster`]): trait seam over the Swarm
//!   manager's Engine API

pub mod cluster;
pub mod config;
pub mod detector;
pub mod errors;
pub mod naming;
pub mod observability;
pub mod queue;
pub mod rotation;

// Re-export commonly used types
pub use config::Config;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "secretspin");
    }
}
