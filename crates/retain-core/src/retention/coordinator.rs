//! Deployment replay across (project, environment) groups.
//!
//! # Algorithm
//!
//! 1. Index releases by id and collect the known project and environment ids.
//! 2. Stable-sort deployments by `deployed_on` ascending. Trackers only
//!    accept strictly newer timestamps, so replay must be chronological.
//! 3. For each deployment, skip it if its release, the release's project or
//!    its environment is unknown. Otherwise route it to the tracker for
//!    `(release.project_id, deployment.environment_id)`, creating the
//!    tracker on first use.
//! 4. Walk every tracker, notify the sink once per retained entry, and union
//!    the retained ids. Resolve the union back to release records.
//!
//! Skipped deployments are never errors: partial or inconsistent exports
//! must still produce a keep set.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::RetentionError;
use crate::model::{Deployment, DeploymentHistory, Environment, Project, Release};
use crate::timing;

use super::GroupKey;
use super::sink::{RetentionSink, TracingSink};
use super::tracker::{RetentionTracker, TrackOutcome};

/// Why a deployment was left out of replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The deployment's release id is not among the supplied releases.
    UnknownRelease,
    /// The release's project is not among the supplied projects.
    UnknownProject,
    /// The deployment's environment is not among the supplied environments.
    UnknownEnvironment,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownRelease => "unknown_release",
            Self::UnknownProject => "unknown_project",
            Self::UnknownEnvironment => "unknown_environment",
        }
    }
}

/// Counters describing one replay, for diagnostics and CLI output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    /// Deployments supplied.
    pub deployments: usize,
    /// Deployments that passed validation and reached a tracker.
    pub replayed: usize,
    pub inserted: usize,
    pub refreshed: usize,
    pub stale: usize,
    pub evicted: usize,
    pub skipped_unknown_release: usize,
    pub skipped_unknown_project: usize,
    pub skipped_unknown_environment: usize,
    /// Distinct (project, environment) groups observed.
    pub groups: usize,
}

impl ReplayStats {
    /// Total deployments skipped for any reason.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped_unknown_release
            + self.skipped_unknown_project
            + self.skipped_unknown_environment
    }

    fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::UnknownRelease => self.skipped_unknown_release += 1,
            SkipReason::UnknownProject => self.skipped_unknown_project += 1,
            SkipReason::UnknownEnvironment => self.skipped_unknown_environment += 1,
        }
    }

    fn record_outcome(&mut self, outcome: &TrackOutcome) {
        self.replayed += 1;
        match outcome {
            TrackOutcome::Inserted { evicted } => {
                self.inserted += 1;
                if evicted.is_some() {
                    self.evicted += 1;
                }
            }
            TrackOutcome::Refreshed { .. } => self.refreshed += 1,
            TrackOutcome::Stale => self.stale += 1,
        }
    }
}

/// The releases to keep, borrowed from the input, plus replay counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionOutcome<'r> {
    /// Retained releases, ordered by release id.
    pub releases: Vec<&'r Release>,
    pub stats: ReplayStats,
}

impl RetentionOutcome<'_> {
    pub fn release_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.releases.iter().map(|release| release.id.as_str())
    }
}

/// Lookup tables built once per computation.
struct Catalog<'r> {
    releases_by_id: HashMap<&'r str, &'r Release>,
    project_ids: HashSet<&'r str>,
    environment_ids: HashSet<&'r str>,
}

impl<'r> Catalog<'r> {
    fn build(
        projects: &'r [Project],
        environments: &'r [Environment],
        releases: &'r [Release],
    ) -> Self {
        Self {
            releases_by_id: releases
                .iter()
                .map(|release| (release.id.as_str(), release))
                .collect(),
            project_ids: projects.iter().map(|project| project.id.as_str()).collect(),
            environment_ids: environments.iter().map(|env| env.id.as_str()).collect(),
        }
    }

    /// Resolve the release a deployment refers to, or say why it can't be used.
    fn admit(&self, deployment: &Deployment) -> Result<&'r Release, SkipReason> {
        let release = self
            .releases_by_id
            .get(deployment.release_id.as_str())
            .copied()
            .ok_or(SkipReason::UnknownRelease)?;
        if !self.project_ids.contains(release.project_id.as_str()) {
            return Err(SkipReason::UnknownProject);
        }
        if !self
            .environment_ids
            .contains(deployment.environment_id.as_str())
        {
            return Err(SkipReason::UnknownEnvironment);
        }
        Ok(release)
    }
}

/// Applies one releases-to-keep value uniformly to every group.
///
/// The coordinator holds no state between runs; each call builds and drops
/// its own trackers, so one coordinator can serve many computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionCoordinator {
    releases_to_keep: usize,
}

impl RetentionCoordinator {
    /// # Errors
    ///
    /// Returns [`RetentionError::InvalidCapacity`] if `releases_to_keep` is zero.
    pub fn new(releases_to_keep: usize) -> Result<Self, RetentionError> {
        if releases_to_keep == 0 {
            return Err(RetentionError::InvalidCapacity { requested: 0 });
        }
        Ok(Self { releases_to_keep })
    }

    #[must_use]
    pub const fn releases_to_keep(&self) -> usize {
        self.releases_to_keep
    }

    /// Compute the keep set for a whole [`DeploymentHistory`].
    ///
    /// # Errors
    ///
    /// See [`Self::compute_releases_to_keep`].
    pub fn compute<'r>(
        &self,
        history: &'r DeploymentHistory,
        sink: &mut dyn RetentionSink,
    ) -> Result<RetentionOutcome<'r>, RetentionError> {
        self.compute_releases_to_keep(
            &history.projects,
            &history.environments,
            &history.releases,
            &history.deployments,
            sink,
        )
    }

    /// Replay `deployments` and return the releases that must be kept.
    ///
    /// `sink` is notified once per retained release per group, in group
    /// order and most-recent-first within a group.
    ///
    /// # Errors
    ///
    /// Returns [`RetentionError::UnresolvedRelease`] if a retained id does
    /// not map back to a release. Validation makes this unreachable for
    /// well-formed code; it indicates a bug, not bad input.
    pub fn compute_releases_to_keep<'r>(
        &self,
        projects: &'r [Project],
        environments: &'r [Environment],
        releases: &'r [Release],
        deployments: &'r [Deployment],
        sink: &mut dyn RetentionSink,
    ) -> Result<RetentionOutcome<'r>, RetentionError> {
        let catalog = Catalog::build(projects, environments, releases);
        let mut stats = ReplayStats {
            deployments: deployments.len(),
            ..ReplayStats::default()
        };

        let ordered = timing::timed("retention.sort", || {
            let mut ordered: Vec<&Deployment> = deployments.iter().collect();
            ordered.sort_by_key(|deployment| deployment.deployed_on);
            ordered
        });

        let trackers = timing::timed("retention.replay", || {
            self.replay(&catalog, &ordered, &mut stats)
        })?;
        stats.groups = trackers.len();

        let releases = timing::timed("retention.collect", || {
            collect_retained(&catalog, &trackers, sink)
        })?;

        debug!(
            releases_to_keep = self.releases_to_keep,
            deployments = stats.deployments,
            replayed = stats.replayed,
            skipped = stats.skipped(),
            groups = stats.groups,
            kept = releases.len(),
            "retention computed"
        );

        Ok(RetentionOutcome { releases, stats })
    }

    fn replay<'r>(
        &self,
        catalog: &Catalog<'r>,
        ordered: &[&'r Deployment],
        stats: &mut ReplayStats,
    ) -> Result<HashMap<GroupKey<'r>, RetentionTracker>, RetentionError> {
        let mut trackers: HashMap<GroupKey<'r>, RetentionTracker> = HashMap::new();

        for &deployment in ordered {
            let release = match catalog.admit(deployment) {
                Ok(release) => release,
                Err(reason) => {
                    debug!(
                        deployment_id = %deployment.id,
                        release_id = %deployment.release_id,
                        environment_id = %deployment.environment_id,
                        reason = reason.as_str(),
                        "skipping deployment"
                    );
                    stats.record_skip(reason);
                    continue;
                }
            };

            let key = GroupKey::new(&release.project_id, &deployment.environment_id);
            let tracker = match trackers.entry(key) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => slot.insert(RetentionTracker::new(self.releases_to_keep)?),
            };

            let outcome = tracker.track(
                &deployment.release_id,
                &deployment.environment_id,
                deployment.deployed_on,
            );
            if let TrackOutcome::Inserted {
                evicted: Some(evicted),
            } = &outcome
            {
                trace!(
                    group = %key,
                    evicted = %evicted.release_id,
                    by = %deployment.release_id,
                    "evicted least recently deployed release"
                );
            }
            stats.record_outcome(&outcome);
        }

        Ok(trackers)
    }
}

fn collect_retained<'r>(
    catalog: &Catalog<'r>,
    trackers: &HashMap<GroupKey<'r>, RetentionTracker>,
    sink: &mut dyn RetentionSink,
) -> Result<Vec<&'r Release>, RetentionError> {
    let mut groups: Vec<(&GroupKey<'r>, &RetentionTracker)> = trackers.iter().collect();
    groups.sort_unstable_by_key(|(key, _)| **key);

    let mut retained: BTreeSet<&str> = BTreeSet::new();
    for (key, tracker) in groups {
        for entry in tracker {
            sink.kept(*key, entry);
            retained.insert(entry.release_id.as_str());
        }
    }

    retained
        .into_iter()
        .map(|release_id| {
            catalog
                .releases_by_id
                .get(release_id)
                .copied()
                .ok_or_else(|| RetentionError::UnresolvedRelease {
                    release_id: release_id.to_owned(),
                })
        })
        .collect()
}

/// One-shot convenience: keep the `releases_to_keep` most recently deployed
/// releases per (project, environment), logging keep reasons via `tracing`.
///
/// # Errors
///
/// Returns [`RetentionError::InvalidCapacity`] if `releases_to_keep` is zero,
/// or [`RetentionError::UnresolvedRelease`] on an internal inconsistency.
pub fn compute_releases_to_keep<'r>(
    projects: &'r [Project],
    environments: &'r [Environment],
    releases: &'r [Release],
    deployments: &'r [Deployment],
    releases_to_keep: usize,
) -> Result<Vec<&'r Release>, RetentionError> {
    let coordinator = RetentionCoordinator::new(releases_to_keep)?;
    let outcome = coordinator.compute_releases_to_keep(
        projects,
        environments,
        releases,
        deployments,
        &mut TracingSink,
    )?;
    Ok(outcome.releases)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
