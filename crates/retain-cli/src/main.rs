#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use retain_core::timing;
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "retain: decide which releases a deployment pipeline must keep",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit command timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Output format: pretty, text, or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Compute the releases to keep",
        long_about = "Replay a deployment history and print, for every (project, environment) pair, \
                      the most recently deployed releases that must be kept.",
        after_help = "EXAMPLES:\n    # Keep the default number of releases\n    retain keep --input history.json\n\n    # Keep two releases per project/environment and show why\n    retain keep --input history.json --keep 2 --explain\n\n    # Emit machine-readable output\n    retain keep --input history.json --json"
    )]
    Keep(cmd::keep::KeepArgs),

    #[command(
        about = "Inspect retention configuration",
        long_about = "Show the effective releases-to-keep value and which source it came from.",
        after_help = "EXAMPLES:\n    # Show the effective config\n    retain config show\n\n    # Emit machine-readable output\n    retain config show --json"
    )]
    Config(cmd::config::ConfigArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("RETAIN_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "retain=debug,info"
        } else {
            "retain=info,warn"
        })
    });

    let format = env::var("RETAIN_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);
    timing::clear_timings();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();

    let command_result = match &cli.command {
        Commands::Keep(args) => timing::timed("cmd.keep", || {
            cmd::keep::run_keep(args, output, &project_root)
        }),
        Commands::Config(args) => timing::timed("cmd.config", || {
            cmd::config::run_config(args, &project_root, output)
        }),
    };

    if timing_enabled {
        let report = timing::collect_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else if output.is_json() {
            eprintln!("{}", serde_json::to_string_pretty(&report.to_json())?);
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
        }
    }

    command_result
}
