//! Request orchestration.
//!
//! [`UnitEconomicsEngine::analyze`] is the only async entry point: it resolves
//! windows, fetches the superset window from the row source once, and hands the
//! rows to [`compute_analysis`], which is pure and synchronous.

use std::sync::Arc;

use chrono::NaiveDate;
use costscope_source::{RowScope, UsageFilters, UsageRow, UsageRowSource};
use tracing::{debug, info, warn};

use crate::analytics::aggregate::aggregate;
use crate::analytics::allocation::{AllocationEngine, CompletenessScores};
use crate::analytics::benchmark::build_benchmarks;
use crate::analytics::decomposition::{DecompositionInputs, decompose};
use crate::analytics::dimensions::{ClassifiedRow, CostBasis, classify};
use crate::analytics::forecast::{BreakEvenInputs, break_even, cost_volatility, detect_drift, forecast};
use crate::analytics::integrity::{
    IntegrityReport, check_aggregation_guard, check_decomposition_balance, check_period_alignment,
};
use crate::analytics::margin::{margin_overlay, window_revenue};
use crate::analytics::result::{AnalysisResult, Comparison, ComparisonDeltas, Kpis, UnitEconomics, WindowRange, WindowSummary};
use crate::analytics::window::{CompareMode, PeriodCode, WindowPair, resolve_windows};
use crate::cache::{CacheKey, ResultCache};
use crate::config::EngineConfig;
use crate::error::Result;

/// Parameters of one analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    pub scope: RowScope,
    pub filters: UsageFilters,
    /// Period code; the configured default applies when absent.
    pub period: Option<String>,
    pub compare_to: CompareMode,
    pub cost_basis: CostBasis,
    /// Caller-supplied "today" used for window resolution.
    pub now: NaiveDate,
    pub target_unit_cost: Option<f64>,
    pub horizon_days: Option<u32>,
    pub completeness: CompletenessScores,
}

impl EngineRequest {
    pub fn new(now: NaiveDate) -> Self {
        Self {
            scope: RowScope::default(),
            filters: UsageFilters::default(),
            period: None,
            compare_to: CompareMode::default(),
            cost_basis: CostBasis::default(),
            now,
            target_unit_cost: None,
            horizon_days: None,
            completeness: CompletenessScores::default(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<RowScope>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_filters(mut self, filters: UsageFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }

    pub fn with_compare(mut self, compare_to: CompareMode) -> Self {
        self.compare_to = compare_to;
        self
    }

    pub fn with_basis(mut self, cost_basis: CostBasis) -> Self {
        self.cost_basis = cost_basis;
        self
    }

    pub fn with_target_unit_cost(mut self, target: f64) -> Self {
        self.target_unit_cost = Some(target);
        self
    }

    pub fn with_horizon_days(mut self, days: u32) -> Self {
        self.horizon_days = Some(days);
        self
    }

    pub fn with_completeness(mut self, completeness: CompletenessScores) -> Self {
        self.completeness = completeness;
        self
    }

    fn period_code<'a>(&'a self, config: &'a EngineConfig) -> &'a str {
        self.period.as_deref().unwrap_or(&config.default_period)
    }

    fn cache_key(&self, config: &EngineConfig) -> CacheKey {
        CacheKey {
            scope: self.scope.to_string(),
            filters: self.filters.key(),
            period: self.period_code(config).to_string(),
            compare_to: self.compare_to,
            cost_basis: self.cost_basis,
            now: self.now,
            extras: format!(
                "target={:?}|horizon={:?}|billing={}|volume={}",
                self.target_unit_cost, self.horizon_days, self.completeness.billing, self.completeness.volume
            ),
        }
    }
}

/// Unit economics and cost allocation engine.
pub struct UnitEconomicsEngine {
    source: Arc<dyn UsageRowSource>,
    config: EngineConfig,
    cache: Option<Arc<ResultCache>>,
}

impl UnitEconomicsEngine {
    /// Creates an engine. A cache is attached when `config.cache.enabled` is set.
    pub fn new(source: Arc<dyn UsageRowSource>, config: EngineConfig) -> Self {
        let cache = config.cache.enabled.then(|| Arc::new(ResultCache::with_ttl(config.cache.ttl_seconds)));
        Self { source, config, cache }
    }

    /// Creates an engine sharing an existing result cache.
    pub fn with_cache(source: Arc<dyn UsageRowSource>, config: EngineConfig, cache: Arc<ResultCache>) -> Self {
        Self { source, config, cache: Some(cache) }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolves the request's windows, consulting the row source for the latest
    /// charge date only when the period code is relative to it.
    ///
    /// # Errors
    /// Returns error if the row source lookup fails.
    pub async fn resolve(&self, request: &EngineRequest) -> Result<Option<WindowPair>> {
        let code = request.period_code(&self.config);
        let Some(period) = PeriodCode::parse(code) else {
            warn!(period = %code, "Unresolvable period code");
            return Ok(None);
        };

        let latest = if period.needs_latest_charge_date() {
            self.source.latest_charge_date(&request.filters, &request.scope).await?
        } else {
            None
        };

        let windows = resolve_windows(&period, request.compare_to, request.now, latest);
        match &windows {
            Some(pair) => debug!(
                period = %code,
                current = %pair.current,
                previous = ?pair.previous.map(|w| w.to_string()),
                "Resolved windows"
            ),
            None => warn!(period = %code, "Period resolved to an invalid window"),
        }
        Ok(windows)
    }

    /// Runs the full analysis for one request.
    ///
    /// # Errors
    /// Returns error only if the row source fails.
    pub async fn analyze(&self, request: &EngineRequest) -> Result<AnalysisResult> {
        let key = request.cache_key(&self.config);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key) {
                debug!(key = %key, "Result cache hit");
                return Ok(hit);
            }
            debug!(key = %key, "Result cache miss");
        }

        let Some(windows) = self.resolve(request).await? else {
            return Ok(AnalysisResult::empty(None, request.compare_to, request.cost_basis));
        };

        let fetch = windows.fetch_window();
        let rows = self
            .source
            .rows(&request.filters, fetch.start_date(), fetch.end_date(), &request.scope)
            .await?;
        info!(scope = %request.scope, window = %fetch, rows = rows.len(), "Fetched usage rows");

        let result = compute_analysis(&windows, &rows, request, &self.config);
        if let Some(cache) = &self.cache {
            cache.insert(key, result.clone());
        }
        Ok(result)
    }
}

/// Computes the full result from already-fetched rows. Rows outside both windows
/// are ignored.
pub fn compute_analysis(
    windows: &WindowPair,
    rows: &[UsageRow],
    request: &EngineRequest,
    config: &EngineConfig,
) -> AnalysisResult {
    let classified = classify(rows, request.cost_basis, &config.tags);
    let (current_rows, previous_rows) = split_windows(classified, windows);

    if current_rows.is_empty() && previous_rows.is_empty() {
        info!(current = %windows.current, "No usage rows in range; returning empty result");
        return AnalysisResult::empty(Some(windows), request.compare_to, request.cost_basis);
    }

    let current = aggregate(&current_rows, Some(windows.current));
    let previous = aggregate(&previous_rows, windows.previous);

    // Rounded before the guard so the check covers the published buckets.
    let allocation = AllocationEngine::new(config).allocate(&current_rows, request.completeness).rounded();
    let decomposition = decompose(&DecompositionInputs::from_aggregates(&previous, &current));
    let benchmarks = build_benchmarks(&current_rows, &previous_rows);

    let volatility = cost_volatility(&current.trend);
    let projection = forecast(&current.trend, volatility, request.horizon_days, &config.forecast);
    let drift = detect_drift(&current.trend, &config.drift);
    let break_even = break_even(&BreakEvenInputs {
        current_cost: current.total_cost,
        current_volume: current.total_quantity,
        current_unit_cost: current.avg_unit_price,
        previous_unit_cost: previous.avg_unit_price,
        explicit_target: request.target_unit_cost,
    });
    let margin = margin_overlay(
        window_revenue(&current_rows, &config.tags.revenue),
        window_revenue(&previous_rows, &config.tags.revenue),
        &current,
        &previous,
    );

    // Cost and volume are folded from one fetch into one aggregate, so alignment
    // always holds here; the check matters for callers pairing separately scoped
    // cost and volume windows through `check_period_alignment`.
    let cost_window = Some(windows.current);
    let volume_window = current.window;
    let integrity = IntegrityReport {
        decomposition_balance: check_decomposition_balance(&decomposition, &config.tolerances),
        aggregation_guard: check_aggregation_guard(&allocation, current.total_cost, &config.tolerances),
        period_alignment: check_period_alignment(cost_window.as_ref(), volume_window.as_ref()),
    };
    if !integrity.all_ok() {
        warn!(
            failed = ?integrity.failures(),
            balance_difference = integrity.decomposition_balance.difference,
            guard_difference = integrity.aggregation_guard.difference,
            alignment_difference = integrity.period_alignment.difference,
            "Integrity checks failed"
        );
    }

    AnalysisResult {
        kpis: Kpis::from_aggregates(&current, &previous),
        trend: current.trend.iter().map(|point| point.rounded()).collect(),
        comparison: Comparison {
            compare_to: request.compare_to,
            cost_basis: request.cost_basis,
            current: WindowSummary::from_aggregate(&current),
            previous: WindowSummary::from_aggregate(&previous),
            deltas: ComparisonDeltas::between(&previous, &current),
        },
        allocation,
        unit_economics: UnitEconomics {
            cost_window: WindowRange::from(cost_window.as_ref()),
            volume_window: WindowRange::from(volume_window.as_ref()),
            decomposition,
            benchmarks: benchmarks.rounded(),
            margin: margin.rounded(),
            forecast: projection.rounded(),
            break_even: break_even.rounded(),
            drift: drift.rounded(),
        },
        integrity: integrity.rounded(),
    }
}

fn split_windows<'a>(
    classified: Vec<ClassifiedRow<'a>>,
    windows: &WindowPair,
) -> (Vec<ClassifiedRow<'a>>, Vec<ClassifiedRow<'a>>) {
    let mut current = Vec::new();
    let mut previous = Vec::new();
    for row in classified {
        let date = row.row.charge_date();
        if windows.current.contains(date) {
            current.push(row);
        } else if windows.previous.is_some_and(|w| w.contains(date)) {
            previous.push(row);
        }
    }
    (current, previous)
}
