mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::debt::AmortizeArgs;
use commands::deal::{DefaultsArgs, ProjectArgs, UnderwriteArgs};
use commands::stress::{GridArgs, SensitivityArgs};
use output::OutputFormat;

/// Real-estate deal underwriting
#[derive(Parser)]
#[command(
    name = "uw",
    version,
    about = "Real-estate deal underwriting",
    long_about = "Underwrite multifamily acquisitions with decimal precision: debt \
                  schedules, hold-period cash flows, levered and unlevered IRR, \
                  equity multiple, DSCR and tornado sensitivity."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log engine diagnostics to stderr (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Full underwriting: results, projections and sensitivity
    Underwrite(UnderwriteArgs),
    /// Build a level-payment debt schedule
    Amortize(AmortizeArgs),
    /// Project hold-period cash flows and return metrics
    Project(ProjectArgs),
    /// Tornado analysis with combined Upside / Downside
    Sensitivity(SensitivityArgs),
    /// Two-way sensitivity grid over two assumptions
    Grid(GridArgs),
    /// Print the documented default assumptions
    Defaults(DefaultsArgs),
    /// Print version information
    Version,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "underwrite_core=debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Underwrite(args) => commands::deal::run_underwrite(args),
        Commands::Amortize(args) => commands::debt::run_amortize(args),
        Commands::Project(args) => commands::deal::run_project(args),
        Commands::Sensitivity(args) => commands::stress::run_sensitivity(args),
        Commands::Grid(args) => commands::stress::run_grid(args),
        Commands::Defaults(args) => commands::deal::run_defaults(args),
        Commands::Version => {
            println!("uw {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
