//! `retain keep`: compute the releases a deployment history must keep.

use crate::output::{
    CliError, OutputMode, pretty_kv, pretty_rule, pretty_section, render_error, render_mode,
};
use anyhow::Result;
use clap::Args;
use retain_core::config::{ConfigSource, resolve_config};
use retain_core::{
    DeploymentHistory, ErrorCode, GroupKey, KeepReason, Release, ReplayStats,
    RetentionCoordinator, RetentionError, RetentionSink, TrackedEntry, TracingSink,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct KeepArgs {
    /// Deployment history snapshot (JSON).
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Releases to keep per (project, environment). Overrides RETAIN_KEEP and config files.
    #[arg(short = 'n', long, value_name = "N", allow_negative_numbers = true)]
    pub keep: Option<i64>,

    /// Include the deployment that justified keeping each release.
    #[arg(long)]
    pub explain: bool,
}

/// Result of `retain keep`, as emitted in JSON mode.
#[derive(Debug, Serialize)]
pub struct KeepReport<'r> {
    pub releases_to_keep: usize,
    pub source: ConfigSource,
    pub kept: Vec<&'r Release>,
    pub stats: ReplayStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasons: Option<Vec<KeepReason>>,
}

/// Logs every keep reason and remembers it for `--explain`.
#[derive(Debug, Default)]
struct ExplainSink {
    log: TracingSink,
    reasons: Vec<KeepReason>,
}

impl RetentionSink for ExplainSink {
    fn kept(&mut self, group: GroupKey<'_>, entry: &TrackedEntry) {
        self.log.kept(group, entry);
        self.reasons.kept(group, entry);
    }
}

pub fn run_keep(args: &KeepArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let config = match resolve_config(project_root, args.keep) {
        Ok(config) => config,
        Err(err) => {
            let cli_error = err.downcast_ref::<RetentionError>().map_or_else(
                || CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
                CliError::from,
            );
            render_error(output, &cli_error)?;
            return Err(err);
        }
    };

    let history = match DeploymentHistory::load(&args.input) {
        Ok(history) => history,
        Err(err) => {
            render_error(
                output,
                &CliError::from_code(ErrorCode::HistoryParseError, format!("{err:#}")),
            )?;
            return Err(err);
        }
    };
    tracing::debug!(
        path = %args.input.display(),
        records = history.record_count(),
        "loaded deployment history"
    );

    let coordinator = RetentionCoordinator::new(config.releases_to_keep)?;
    let mut sink = ExplainSink::default();
    let outcome = match coordinator.compute(&history, &mut sink) {
        Ok(outcome) => outcome,
        Err(err) => {
            render_error(output, &CliError::from(&err))?;
            return Err(err.into());
        }
    };

    let report = KeepReport {
        releases_to_keep: config.releases_to_keep,
        source: config.source,
        kept: outcome.releases,
        stats: outcome.stats,
        reasons: args.explain.then_some(sink.reasons),
    };

    render_mode(output, &report, render_text, render_pretty)
}

fn version_label(release: &Release) -> &str {
    release.version.as_deref().unwrap_or("-")
}

fn write_reason(w: &mut dyn Write, reason: &KeepReason) -> io::Result<()> {
    writeln!(
        w,
        "{} kept because it was deployed to {} on {}",
        reason.release_id,
        reason.environment_id,
        reason.deployed_on.to_rfc3339()
    )
}

fn render_text(report: &KeepReport<'_>, w: &mut dyn Write) -> io::Result<()> {
    for release in &report.kept {
        writeln!(
            w,
            "{}\t{}\t{}",
            release.id,
            release.project_id,
            version_label(release)
        )?;
    }
    if let Some(reasons) = &report.reasons {
        writeln!(w)?;
        for reason in reasons {
            write_reason(w, reason)?;
        }
    }
    Ok(())
}

fn render_pretty(report: &KeepReport<'_>, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(
        w,
        &format!(
            "Releases to keep ({} per project/environment, from {})",
            report.releases_to_keep, report.source
        ),
    )?;
    if report.kept.is_empty() {
        writeln!(w, "(none)")?;
    }
    for release in &report.kept {
        writeln!(
            w,
            "{:<24} {:<20} {}",
            release.id,
            release.project_id,
            version_label(release)
        )?;
    }

    writeln!(w)?;
    pretty_section(w, "Replay")?;
    let stats = &report.stats;
    pretty_kv(w, "deployments", stats.deployments.to_string())?;
    pretty_kv(w, "replayed", stats.replayed.to_string())?;
    pretty_kv(w, "groups", stats.groups.to_string())?;
    pretty_kv(w, "evicted", stats.evicted.to_string())?;
    pretty_kv(
        w,
        "skipped",
        format!(
            "{} (release {}, project {}, environment {})",
            stats.skipped(),
            stats.skipped_unknown_release,
            stats.skipped_unknown_project,
            stats.skipped_unknown_environment
        ),
    )?;

    if let Some(reasons) = &report.reasons {
        writeln!(w)?;
        pretty_section(w, "Why")?;
        let mut current: Option<(&str, &str)> = None;
        for reason in reasons {
            let group = (reason.project_id.as_str(), reason.environment_id.as_str());
            if current != Some(group) {
                writeln!(w, "{}/{}", group.0, group.1)?;
                current = Some(group);
            }
            write!(w, "  ")?;
            write_reason(w, reason)?;
        }
        pretty_rule(w)?;
    }
    Ok(())
}
