//! Release retention: which releases must be kept.
//!
//! The policy is "keep the N most recently deployed distinct releases for
//! every (project, environment) pair". A release kept by any pair is kept.
//!
//! - [`tracker`] holds the bounded recency structure for one pair.
//! - [`coordinator`] validates and replays a deployment history through one
//!   tracker per pair and unions the results.
//! - [`sink`] receives the reason each release was kept.

pub mod coordinator;
pub mod sink;
pub mod tracker;

use std::fmt;

use serde::Serialize;

pub use coordinator::{
    ReplayStats, RetentionCoordinator, RetentionOutcome, SkipReason, compute_releases_to_keep,
};
pub use sink::{KeepReason, NoopSink, RetentionSink, TracingSink};
pub use tracker::{RetentionTracker, TrackOutcome, TrackedEntry, validate_capacity};

/// The (project, environment) pair a tracker is responsible for.
///
/// The project is always the *release's* project, never the project a
/// deployment record declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupKey<'a> {
    pub project_id: &'a str,
    pub environment_id: &'a str,
}

impl<'a> GroupKey<'a> {
    #[must_use]
    pub const fn new(project_id: &'a str, environment_id: &'a str) -> Self {
        Self {
            project_id,
            environment_id,
        }
    }
}

impl fmt::Display for GroupKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_id, self.environment_id)
    }
}
