//! Costscope CLI - unit economics and cost allocation from the command line.
//!
//! Loads usage rows from a JSON file, runs the engine, and prints the result as
//! JSON or a text summary.

mod commands;
mod settings;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{analyze, windows};

/// Costscope - unit economics and cost allocation engine
#[derive(Parser, Debug)]
#[command(
    name = "costscope",
    author,
    version,
    about = "Costscope - unit economics and cost allocation",
    long_about = "Costscope allocates cloud cost to teams, products and environments, explains unit-cost changes, and projects near-term spend."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Engine configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze usage rows for a period
    ///
    /// Resolves the current and comparison windows, allocates cost, decomposes
    /// the unit-cost change, and runs the integrity checks.
    Analyze(analyze::AnalyzeArgs),

    /// Show the windows a period code resolves to
    Windows(windows::WindowsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = settings::load_engine_config(args.config.as_deref())?;

    match args.command {
        Command::Analyze(cmd) => analyze::execute(cmd, config).await,
        Command::Windows(cmd) => windows::execute(&cmd, &config),
    }
}
