use anyhow::Result;
use clap::{Args, Subcommand};
use retain_core::config::{EffectiveConfig, resolve_config};
use retain_core::{ErrorCode, RetentionError};
use std::io::{self, Write};
use std::path::Path;

use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Show the effective retention configuration and where it came from
    Show(ShowArgs),
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Evaluate as if `--keep N` had been passed
    #[arg(short = 'n', long, value_name = "N", allow_negative_numbers = true)]
    keep: Option<i64>,
}

pub fn run_config(args: &ConfigArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    match &args.command {
        ConfigCommand::Show(show) => run_show(show, project_root, output),
    }
}

fn run_show(args: &ShowArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    let effective = match resolve_config(project_root, args.keep) {
        Ok(effective) => effective,
        Err(err) => {
            let cli_error = err.downcast_ref::<RetentionError>().map_or_else(
                || CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
                CliError::from,
            );
            render_error(output, &cli_error)?;
            return Err(err);
        }
    };

    render_mode(output, &effective, render_text, render_pretty)
}

fn render_text(config: &EffectiveConfig, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "releases_to_keep={}", config.releases_to_keep)?;
    writeln!(w, "source={}", config.source)?;
    for path in &config.loaded_files {
        writeln!(w, "loaded={}", path.display())?;
    }
    Ok(())
}

fn render_pretty(config: &EffectiveConfig, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Retention config")?;
    pretty_kv(w, "releases to keep", config.releases_to_keep.to_string())?;
    pretty_kv(w, "source", config.source.to_string())?;
    if config.loaded_files.is_empty() {
        pretty_kv(w, "files", "(none)")?;
    }
    for path in &config.loaded_files {
        pretty_kv(w, "file", path.display().to_string())?;
    }
    Ok(())
}
