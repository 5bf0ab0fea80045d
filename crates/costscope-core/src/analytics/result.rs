//! The result object returned for every request.
//!
//! Every field is always present. When there is nothing to analyze the engine
//! returns [`AnalysisResult::empty`]: numbers zero, arrays empty, dates null
//! unless the window resolved.

use chrono::NaiveDate;
use serde::Serialize;

use super::aggregate::{TrendPoint, WindowAggregate};
use super::allocation::AllocationSummary;
use super::benchmark::Benchmarks;
use super::decomposition::Decomposition;
use super::dimensions::CostBasis;
use super::forecast::{BreakEven, Drift, Forecast};
use super::integrity::IntegrityReport;
use super::margin::MarginOverlay;
use super::window::{CompareMode, TimeWindow, WindowPair};
use crate::numeric::{pct_change, round_money, round_pct, round_unit};

/// Headline figures for the current window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total_cost: f64,
    pub total_quantity: f64,
    pub avg_unit_price: f64,
    pub direct_cost: f64,
    pub shared_cost: f64,
    pub commitment_benefit: f64,
    pub cost_change_pct: f64,
    pub quantity_change_pct: f64,
    pub unit_price_change_pct: f64,
    pub row_count: usize,
    pub active_days: usize,
}

impl Kpis {
    pub fn from_aggregates(current: &WindowAggregate, previous: &WindowAggregate) -> Self {
        Self {
            total_cost: round_money(current.total_cost),
            total_quantity: round_unit(current.total_quantity),
            avg_unit_price: round_unit(current.avg_unit_price),
            direct_cost: round_money(current.direct_cost),
            shared_cost: round_money(current.shared_cost),
            commitment_benefit: round_money(current.commitment_benefit),
            cost_change_pct: round_pct(pct_change(previous.total_cost, current.total_cost)),
            quantity_change_pct: round_pct(pct_change(previous.total_quantity, current.total_quantity)),
            unit_price_change_pct: round_pct(pct_change(previous.avg_unit_price, current.avg_unit_price)),
            row_count: current.row_count,
            active_days: current.trend.len(),
        }
    }
}

/// Date range as reported in the result; null dates when the window is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRange {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl From<Option<&TimeWindow>> for WindowRange {
    fn from(window: Option<&TimeWindow>) -> Self {
        Self { start_date: window.map(TimeWindow::start_date), end_date: window.map(TimeWindow::end_date) }
    }
}

/// Totals of one window in the comparison block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSummary {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_cost: f64,
    pub total_quantity: f64,
    pub avg_unit_price: f64,
    pub direct_cost: f64,
    pub shared_cost: f64,
    pub commitment_benefit: f64,
    pub row_count: usize,
}

impl WindowSummary {
    pub fn from_aggregate(aggregate: &WindowAggregate) -> Self {
        let range = WindowRange::from(aggregate.window.as_ref());
        Self {
            start_date: range.start_date,
            end_date: range.end_date,
            total_cost: round_money(aggregate.total_cost),
            total_quantity: round_unit(aggregate.total_quantity),
            avg_unit_price: round_unit(aggregate.avg_unit_price),
            direct_cost: round_money(aggregate.direct_cost),
            shared_cost: round_money(aggregate.shared_cost),
            commitment_benefit: round_money(aggregate.commitment_benefit),
            row_count: aggregate.row_count,
        }
    }

    fn empty(window: Option<&TimeWindow>) -> Self {
        let range = WindowRange::from(window);
        Self { start_date: range.start_date, end_date: range.end_date, ..Default::default() }
    }
}

/// Current minus previous.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonDeltas {
    pub cost: f64,
    pub cost_pct: f64,
    pub quantity: f64,
    pub quantity_pct: f64,
    pub unit_price: f64,
    pub unit_price_pct: f64,
}

impl ComparisonDeltas {
    pub fn between(previous: &WindowAggregate, current: &WindowAggregate) -> Self {
        Self {
            cost: round_money(current.total_cost - previous.total_cost),
            cost_pct: round_pct(pct_change(previous.total_cost, current.total_cost)),
            quantity: round_unit(current.total_quantity - previous.total_quantity),
            quantity_pct: round_pct(pct_change(previous.total_quantity, current.total_quantity)),
            unit_price: round_unit(current.avg_unit_price - previous.avg_unit_price),
            unit_price_pct: round_pct(pct_change(previous.avg_unit_price, current.avg_unit_price)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub compare_to: CompareMode,
    pub cost_basis: CostBasis,
    pub current: WindowSummary,
    pub previous: WindowSummary,
    pub deltas: ComparisonDeltas,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitEconomics {
    pub cost_window: WindowRange,
    pub volume_window: WindowRange,
    pub decomposition: Decomposition,
    pub benchmarks: Benchmarks,
    pub margin: MarginOverlay,
    pub forecast: Forecast,
    pub break_even: BreakEven,
    pub drift: Drift,
}

/// Everything the engine returns for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub kpis: Kpis,
    pub trend: Vec<TrendPoint>,
    pub comparison: Comparison,
    pub allocation: AllocationSummary,
    pub unit_economics: UnitEconomics,
    pub integrity: IntegrityReport,
}

impl AnalysisResult {
    /// The all-zero result. Window dates are filled in when `windows` resolved.
    pub fn empty(windows: Option<&WindowPair>, compare_to: CompareMode, cost_basis: CostBasis) -> Self {
        let current = windows.map(|pair| &pair.current);
        let previous = windows.and_then(|pair| pair.previous.as_ref());
        Self {
            comparison: Comparison {
                compare_to,
                cost_basis,
                current: WindowSummary::empty(current),
                previous: WindowSummary::empty(previous),
                deltas: ComparisonDeltas::default(),
            },
            allocation: AllocationSummary::empty(),
            unit_economics: UnitEconomics {
                cost_window: WindowRange::from(current),
                volume_window: WindowRange::from(current),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
