//! Keep-reason notifications.
//!
//! When a computation finishes, the coordinator reports every retained
//! release of every group to a [`RetentionSink`] along with the deployment
//! that justified keeping it. Sinks observe only; nothing flows back into
//! the computation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::GroupKey;
use super::tracker::TrackedEntry;

/// Receives one notification per retained release per group.
pub trait RetentionSink {
    fn kept(&mut self, group: GroupKey<'_>, entry: &TrackedEntry);
}

impl<S: RetentionSink + ?Sized> RetentionSink for &mut S {
    fn kept(&mut self, group: GroupKey<'_>, entry: &TrackedEntry) {
        (**self).kept(group, entry);
    }
}

/// Logs each keep reason through `tracing` at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl RetentionSink for TracingSink {
    fn kept(&mut self, group: GroupKey<'_>, entry: &TrackedEntry) {
        tracing::info!(
            project_id = group.project_id,
            release_id = %entry.release_id,
            environment_id = %entry.environment_id,
            deployed_on = %entry.deployed_on,
            "{} kept because it was deployed to {} on {}",
            entry.release_id,
            entry.environment_id,
            entry.deployed_on.to_rfc3339(),
        );
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl RetentionSink for NoopSink {
    fn kept(&mut self, _group: GroupKey<'_>, _entry: &TrackedEntry) {}
}

/// An owned record of why a release was kept in one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeepReason {
    pub project_id: String,
    pub environment_id: String,
    pub release_id: String,
    pub deployed_on: DateTime<Utc>,
}

impl RetentionSink for Vec<KeepReason> {
    fn kept(&mut self, group: GroupKey<'_>, entry: &TrackedEntry) {
        self.push(KeepReason {
            project_id: group.project_id.to_owned(),
            environment_id: entry.environment_id.clone(),
            release_id: entry.release_id.clone(),
            deployed_on: entry.deployed_on,
        });
    }
}
