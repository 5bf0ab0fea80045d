//! Folds usage rows into per-day trend points and window totals.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use costscope_source::UsageRow;
use serde::Serialize;

use super::dimensions::{ClassifiedRow, CostBasis, classify};
use super::window::TimeWindow;
use crate::config::TagConfig;
use crate::numeric::{round_money, round_unit, safe_div};

/// One day of the cost trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub cost: f64,
    pub quantity: f64,
    pub unit_price: f64,
}

impl TrendPoint {
    pub fn rounded(&self) -> Self {
        Self {
            date: self.date,
            cost: round_money(self.cost),
            quantity: round_unit(self.quantity),
            unit_price: round_unit(self.unit_price),
        }
    }
}

/// Totals for a single window.
///
/// `direct_cost + shared_cost == total_cost`, and `avg_unit_price` is
/// `total_cost / total_quantity` (zero without quantity).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowAggregate {
    pub window: Option<TimeWindow>,
    pub trend: Vec<TrendPoint>,
    pub total_cost: f64,
    pub total_quantity: f64,
    pub avg_unit_price: f64,
    pub direct_cost: f64,
    pub shared_cost: f64,
    pub commitment_benefit: f64,
    pub row_count: usize,
}

/// Savings from a commitment discount on one row.
///
/// `(list - contracted) * quantity` when both prices are positive and the contracted
/// price is below list; never negative.
pub fn commitment_benefit(row: &UsageRow) -> f64 {
    let list = row.list_unit_price;
    let contracted = row.contracted_unit_price;
    if list > 0.0 && contracted > 0.0 && contracted < list {
        ((list - contracted) * row.consumed_quantity).max(0.0)
    } else {
        0.0
    }
}

#[derive(Default)]
struct DayTotals {
    cost: f64,
    quantity: f64,
}

/// Aggregates already-classified rows in a single pass, grouped by UTC charge day.
pub fn aggregate(rows: &[ClassifiedRow<'_>], window: Option<TimeWindow>) -> WindowAggregate {
    let mut days: BTreeMap<NaiveDate, DayTotals> = BTreeMap::new();
    let mut agg = WindowAggregate { window, ..Default::default() };

    for classified in rows {
        let cost = classified.cost;
        let quantity = classified.quantity();

        let day = days.entry(classified.row.charge_date()).or_default();
        day.cost += cost;
        day.quantity += quantity;

        agg.total_cost += cost;
        agg.total_quantity += quantity;
        if classified.shared {
            agg.shared_cost += cost;
        } else {
            agg.direct_cost += cost;
        }
        agg.commitment_benefit += commitment_benefit(classified.row);
        agg.row_count += 1;
    }

    agg.avg_unit_price = safe_div(agg.total_cost, agg.total_quantity);
    agg.trend = days
        .into_iter()
        .map(|(date, totals)| TrendPoint {
            date,
            cost: totals.cost,
            quantity: totals.quantity,
            unit_price: safe_div(totals.cost, totals.quantity),
        })
        .collect();
    agg
}

/// Classifies and aggregates raw rows under `basis`.
pub fn aggregate_rows(rows: &[UsageRow], basis: CostBasis, tags: &TagConfig, window: Option<TimeWindow>) -> WindowAggregate {
    aggregate(&classify(rows, basis, tags), window)
}
