//! retain-core library.
//!
//! Decides which releases a deployment pipeline must keep: for every
//! (project, environment) pair, the N most recently deployed distinct
//! releases. Everything else is a purge candidate; purging itself is left
//! to the caller.

pub mod config;
pub mod error;
pub mod model;
pub mod retention;
pub mod timing;

// Conventions:
// - Errors: `RetentionError` for engine failures, `anyhow::Result` for I/O and config.
// - Logging: `tracing` macros (`info!`, `debug!`, `trace!`); no direct printing.
pub use error::{ErrorCode, RetentionError};
pub use model::{Deployment, DeploymentHistory, Environment, Project, Release};
pub use retention::{
    GroupKey, KeepReason, NoopSink, ReplayStats, RetentionCoordinator, RetentionOutcome,
    RetentionSink, RetentionTracker, SkipReason, TrackOutcome, TrackedEntry, TracingSink,
    compute_releases_to_keep,
};
