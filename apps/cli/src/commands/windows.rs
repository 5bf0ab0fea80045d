//! `costscope windows` implementation.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;
use costscope_core::{CompareMode, EngineConfig, PeriodCode, resolve_windows};

use super::{parse_arg, parse_date_or_today};

#[derive(Args, Debug)]
pub struct WindowsArgs {
    /// Period code (defaults to the configured default period)
    #[arg(long)]
    pub period: Option<String>,

    /// Comparison mode (previous_period, same_period_last_month, none)
    #[arg(long, default_value = "previous_period")]
    pub compare: String,

    /// Reference date (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub now: Option<String>,

    /// Latest charge date for relative periods (YYYY-MM-DD)
    #[arg(long)]
    pub latest: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute windows command.
pub fn execute(args: &WindowsArgs, config: &EngineConfig) -> Result<()> {
    let code = args.period.as_deref().unwrap_or(&config.default_period);
    let period = PeriodCode::parse(code).with_context(|| format!("Unresolvable period code '{}'", code))?;
    let compare: CompareMode = parse_arg(&args.compare)?;
    let now = parse_date_or_today(args.now.as_deref(), "now")?;
    let latest = args
        .latest
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .with_context(|| format!("Invalid --latest date '{}', expected YYYY-MM-DD", raw))
        })
        .transpose()?;

    let windows = resolve_windows(&period, compare, now, latest)
        .with_context(|| format!("Period '{}' does not resolve to a valid window", code))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&windows).context("Failed to serialize windows")?);
        return Ok(());
    }

    println!("{}", "costscope windows".bold().cyan());
    println!();
    println!("  Period:   {}", code);
    println!("  Compare:  {}", compare);
    println!("  Current:  {} ({} days)", windows.current.to_string().green(), windows.current.days());
    match windows.previous {
        Some(previous) => println!("  Previous: {} ({} days)", previous.to_string().green(), previous.days()),
        None => println!("  Previous: {}", "none".dimmed()),
    }
    println!("  Fetch:    {}", windows.fetch_window());

    Ok(())
}
