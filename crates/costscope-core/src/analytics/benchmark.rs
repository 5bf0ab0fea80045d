//! Period-over-period benchmarks by team/product, environment, and region.
//!
//! Each window's shared pool is redistributed across the dimension's values the
//! same way the allocation engine does, so `final_cost` is allocation-equivalent.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::allocation::redistribute;
use super::dimensions::ClassifiedRow;
use crate::numeric::{pct_change, round_money, round_pct, round_unit, safe_div};

/// Dimension a benchmark groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkDimension {
    TeamProduct,
    Environment,
    Region,
}

impl BenchmarkDimension {
    fn key_of(self, row: &ClassifiedRow<'_>) -> String {
        match self {
            Self::TeamProduct => format!("{} / {}", row.dims.team.value, row.dims.product.value),
            Self::Environment => row.dims.environment.value.clone(),
            Self::Region => row.dims.region.value.clone(),
        }
    }
}

/// One side (current or previous) of a benchmark row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkSide {
    pub final_cost: f64,
    pub quantity: f64,
    pub unit_cost: f64,
}

impl BenchmarkSide {
    fn rounded(self) -> Self {
        Self {
            final_cost: round_money(self.final_cost),
            quantity: round_unit(self.quantity),
            unit_cost: round_unit(self.unit_cost),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRow {
    pub key: String,
    pub current: BenchmarkSide,
    pub previous: BenchmarkSide,
    pub delta_cost: f64,
    pub delta_cost_pct: f64,
    pub delta_quantity: f64,
    pub delta_unit_cost: f64,
}

impl BenchmarkRow {
    pub fn rounded(&self) -> Self {
        Self {
            key: self.key.clone(),
            current: self.current.rounded(),
            previous: self.previous.rounded(),
            delta_cost: round_money(self.delta_cost),
            delta_cost_pct: round_pct(self.delta_cost_pct),
            delta_quantity: round_unit(self.delta_quantity),
            delta_unit_cost: round_unit(self.delta_unit_cost),
        }
    }
}

/// All three benchmark tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Benchmarks {
    pub team_product: Vec<BenchmarkRow>,
    pub environment: Vec<BenchmarkRow>,
    pub region: Vec<BenchmarkRow>,
}

impl Benchmarks {
    pub fn rounded(&self) -> Self {
        Self {
            team_product: self.team_product.iter().map(BenchmarkRow::rounded).collect(),
            environment: self.environment.iter().map(BenchmarkRow::rounded).collect(),
            region: self.region.iter().map(BenchmarkRow::rounded).collect(),
        }
    }
}

/// Allocation-equivalent totals per dimension value for one window.
pub fn dimension_totals(rows: &[ClassifiedRow<'_>], dimension: BenchmarkDimension) -> BTreeMap<String, BenchmarkSide> {
    let mut direct: BTreeMap<String, f64> = BTreeMap::new();
    let mut sides: BTreeMap<String, BenchmarkSide> = BTreeMap::new();
    let mut pool = 0.0;

    for row in rows {
        let key = dimension.key_of(row);
        let side = sides.entry(key.clone()).or_default();
        side.quantity += row.quantity();
        if row.shared {
            pool += row.cost;
        } else {
            side.final_cost += row.cost;
            *direct.entry(key).or_default() += row.cost;
        }
    }

    let shares = redistribute(&direct, pool);
    if shares.is_empty() {
        // Nothing to weight by: shared cost stays with the rows that carried it.
        for row in rows.iter().filter(|r| r.shared) {
            if let Some(side) = sides.get_mut(&dimension.key_of(row)) {
                side.final_cost += row.cost;
            }
        }
    } else {
        for (key, share) in shares {
            if let Some(side) = sides.get_mut(&key) {
                side.final_cost += share;
            }
        }
    }

    for side in sides.values_mut() {
        side.unit_cost = safe_div(side.final_cost, side.quantity);
    }
    sides
}

/// Full outer join of two windows' totals; a missing side counts as zero.
pub fn join_windows(
    current: &BTreeMap<String, BenchmarkSide>,
    previous: &BTreeMap<String, BenchmarkSide>,
) -> Vec<BenchmarkRow> {
    let keys: BTreeSet<&String> = current.keys().chain(previous.keys()).collect();
    let mut rows: Vec<BenchmarkRow> = keys
        .into_iter()
        .map(|key| {
            let current = current.get(key).copied().unwrap_or_default();
            let previous = previous.get(key).copied().unwrap_or_default();
            BenchmarkRow {
                key: key.clone(),
                current,
                previous,
                delta_cost: current.final_cost - previous.final_cost,
                delta_cost_pct: pct_change(previous.final_cost, current.final_cost),
                delta_quantity: current.quantity - previous.quantity,
                delta_unit_cost: current.unit_cost - previous.unit_cost,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.current
            .final_cost
            .partial_cmp(&a.current.final_cost)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    rows
}

/// Builds one benchmark table.
pub fn build_benchmark(
    current: &[ClassifiedRow<'_>],
    previous: &[ClassifiedRow<'_>],
    dimension: BenchmarkDimension,
) -> Vec<BenchmarkRow> {
    join_windows(&dimension_totals(current, dimension), &dimension_totals(previous, dimension))
}

/// Builds all three benchmark tables.
pub fn build_benchmarks(current: &[ClassifiedRow<'_>], previous: &[ClassifiedRow<'_>]) -> Benchmarks {
    Benchmarks {
        team_product: build_benchmark(current, previous, BenchmarkDimension::TeamProduct),
        environment: build_benchmark(current, previous, BenchmarkDimension::Environment),
        region: build_benchmark(current, previous, BenchmarkDimension::Region),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::dimensions::{CostBasis, classify};
    use crate::config::TagConfig;
    use chrono::NaiveDate;
    use costscope_source::UsageRow;

    fn row(cost: f64, quantity: f64) -> UsageRow {
        UsageRow::on_date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
            .with_costs(cost, cost, cost)
            .with_quantity(quantity)
    }

    #[test]
    fn test_environment_benchmark_with_shared_pool() {
        let tags = TagConfig::default();
        let current_rows = vec![
            row(75.0, 10.0).with_environment("prod"),
            row(25.0, 5.0).with_environment("dev"),
            row(20.0, 0.0).with_tag("allocation_type", "shared").with_environment("prod"),
        ];
        let previous_rows = vec![row(50.0, 10.0).with_environment("prod")];
        let current = classify(&current_rows, CostBasis::Actual, &tags);
        let previous = classify(&previous_rows, CostBasis::Actual, &tags);

        let rows = build_benchmark(&current, &previous, BenchmarkDimension::Environment);
        assert_eq!(rows.len(), 2);
        let prod = &rows[0];
        assert_eq!(prod.key, "prod");
        assert!((prod.current.final_cost - 90.0).abs() < 1e-9);
        assert!((prod.current.unit_cost - 9.0).abs() < 1e-9);
        assert_eq!(prod.previous.final_cost, 50.0);
        assert!((prod.delta_cost - 40.0).abs() < 1e-9);
        assert!((prod.delta_cost_pct - 80.0).abs() < 1e-9);

        let dev = &rows[1];
        assert!((dev.current.final_cost - 30.0).abs() < 1e-9);
        assert_eq!(dev.previous, BenchmarkSide::default());
        assert_eq!(dev.delta_cost_pct, 0.0);
    }

    #[test]
    fn test_missing_current_side_kept() {
        let tags = TagConfig::default();
        let previous_rows = vec![row(40.0, 4.0).with_region("eu-west-1")];
        let previous = classify(&previous_rows, CostBasis::Actual, &tags);
        let rows = build_benchmark(&[], &previous, BenchmarkDimension::Region);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].current, BenchmarkSide::default());
        assert_eq!(rows[0].delta_cost, -40.0);
        assert_eq!(rows[0].delta_unit_cost, -10.0);
    }

    #[test]
    fn test_team_product_key_and_fallback_region() {
        let tags = TagConfig::default();
        let current_rows = vec![row(10.0, 1.0).with_team("Core").with_product("API")];
        let current = classify(&current_rows, CostBasis::Actual, &tags);
        let benchmarks = build_benchmarks(&current, &[]);
        assert_eq!(benchmarks.team_product[0].key, "Core / API");
        assert_eq!(benchmarks.region[0].key, "Unknown Region");
        assert_eq!(benchmarks.environment[0].key, "Unspecified");
    }

    #[test]
    fn test_totals_partition_window_cost() {
        let tags = TagConfig::default();
        let current_rows = vec![
            row(33.0, 1.0).with_region("us-east-1"),
            row(67.0, 1.0).with_region("us-west-2"),
            row(9.0, 0.0).with_product("shared tooling").with_region("global"),
        ];
        let current = classify(&current_rows, CostBasis::Actual, &tags);
        let totals = dimension_totals(&current, BenchmarkDimension::Region);
        let sum: f64 = totals.values().map(|s| s.final_cost).sum();
        assert!((sum - 109.0).abs() < 1e-9);
        // The shared-only region keeps its quantity but receives no cost.
        assert_eq!(totals["global"].final_cost, 0.0);
    }
}
