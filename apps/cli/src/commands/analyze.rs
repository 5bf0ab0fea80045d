//! `costscope analyze` implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use costscope_core::{
    CompareMode, CompletenessScores, CostBasis, EngineConfig, EngineRequest, SummaryFormatter, UnitEconomicsEngine,
};
use costscope_source::{InMemoryRowSource, RowScope, UsageFilters};

use super::{parse_arg, parse_date_or_today};

/// Output format for analysis results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// JSON file with usage rows (array, or object mapping scope id to array)
    #[arg(long)]
    pub rows: PathBuf,

    /// Row scope to analyze
    #[arg(long, default_value = "default")]
    pub scope: String,

    /// Period code (last_30_days, month_to_date, previous_month, YYYY-MM-DD..YYYY-MM-DD, ...)
    #[arg(long)]
    pub period: Option<String>,

    /// Comparison mode (previous_period, same_period_last_month, none)
    #[arg(long, default_value = "previous_period")]
    pub compare: String,

    /// Cost basis (actual, amortized, net)
    #[arg(long, default_value = "actual")]
    pub basis: String,

    /// Reference date for window resolution (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub now: Option<String>,

    /// Target unit cost for break-even
    #[arg(long)]
    pub target_unit_cost: Option<f64>,

    /// Forecast horizon in days (clamped to the configured range)
    #[arg(long)]
    pub horizon: Option<u32>,

    /// Billing data completeness score (0-100)
    #[arg(long, default_value_t = 100.0)]
    pub billing_completeness: f64,

    /// Volume data completeness score (0-100)
    #[arg(long, default_value_t = 100.0)]
    pub volume_completeness: f64,

    /// Only include rows from this provider
    #[arg(long)]
    pub provider: Option<String>,

    /// Only include rows for this service
    #[arg(long)]
    pub service: Option<String>,

    /// Only include rows in this region
    #[arg(long)]
    pub region: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

impl AnalyzeArgs {
    fn request(&self) -> Result<EngineRequest> {
        let compare: CompareMode = parse_arg(&self.compare)?;
        let basis: CostBasis = parse_arg(&self.basis)?;
        let now = parse_date_or_today(self.now.as_deref(), "now")?;

        let mut request = EngineRequest::new(now)
            .with_scope(self.scope.clone())
            .with_filters(UsageFilters {
                provider: self.provider.clone(),
                service: self.service.clone(),
                region: self.region.clone(),
            })
            .with_compare(compare)
            .with_basis(basis)
            .with_completeness(CompletenessScores {
                billing: self.billing_completeness,
                volume: self.volume_completeness,
            });
        if let Some(period) = &self.period {
            request = request.with_period(period.clone());
        }
        if let Some(target) = self.target_unit_cost {
            request = request.with_target_unit_cost(target);
        }
        if let Some(horizon) = self.horizon {
            request = request.with_horizon_days(horizon);
        }
        Ok(request)
    }
}

/// Execute analyze command.
pub async fn execute(args: AnalyzeArgs, config: EngineConfig) -> Result<()> {
    let request = args.request()?;

    let content = std::fs::read_to_string(&args.rows)
        .with_context(|| format!("Failed to read rows file {}", args.rows.display()))?;
    let source = InMemoryRowSource::from_json_str(&content, &RowScope::default())
        .with_context(|| format!("Failed to parse rows file {}", args.rows.display()))?;
    tracing::info!(scope = %request.scope, rows = source.len(&request.scope), "Loaded usage rows");

    let engine = UnitEconomicsEngine::new(Arc::new(source), config);
    let result = engine.analyze(&request).await.context("Analysis failed")?;

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("{}", "costscope analyze".bold().cyan());
            println!();
            print!("{}", SummaryFormatter.format(&result));
            if !result.integrity.all_ok() {
                println!();
                println!(
                    "  {} integrity checks failed: {}",
                    "!".yellow(),
                    result.integrity.failures().join(", ")
                );
            }
        }
    }

    Ok(())
}
