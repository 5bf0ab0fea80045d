//! Per-unit margin from tag-sourced revenue.

use costscope_source::UsageRow;
use serde::Serialize;

use super::aggregate::WindowAggregate;
use super::dimensions::ClassifiedRow;
use crate::numeric::{pct_change, round_money, round_pct, round_unit, safe_div};

/// Revenue carried by one row: the first alias whose tag parses to a positive number.
pub fn revenue_of(row: &UsageRow, aliases: &[String]) -> f64 {
    aliases
        .iter()
        .filter_map(|key| row.tag(key))
        .filter_map(|value| value.parse::<f64>().ok())
        .find(|value| value.is_finite() && *value > 0.0)
        .unwrap_or(0.0)
}

/// Total revenue of a window's rows.
pub fn window_revenue(rows: &[ClassifiedRow<'_>], aliases: &[String]) -> f64 {
    rows.iter().map(|classified| revenue_of(classified.row, aliases)).sum()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginOverlay {
    pub available: bool,
    pub revenue: f64,
    pub revenue_per_unit: f64,
    pub cost_per_unit: f64,
    pub margin_per_unit: f64,
    pub margin_pct: f64,
    pub previous_revenue: f64,
    pub previous_margin_per_unit: f64,
    pub margin_trend_pct: f64,
}

impl MarginOverlay {
    pub fn rounded(&self) -> Self {
        Self {
            available: self.available,
            revenue: round_money(self.revenue),
            revenue_per_unit: round_unit(self.revenue_per_unit),
            cost_per_unit: round_unit(self.cost_per_unit),
            margin_per_unit: round_unit(self.margin_per_unit),
            margin_pct: round_pct(self.margin_pct),
            previous_revenue: round_money(self.previous_revenue),
            previous_margin_per_unit: round_unit(self.previous_margin_per_unit),
            margin_trend_pct: round_pct(self.margin_trend_pct),
        }
    }
}

fn margin_per_unit(revenue: f64, aggregate: &WindowAggregate) -> f64 {
    safe_div(revenue, aggregate.total_quantity) - aggregate.avg_unit_price
}

/// Builds the overlay. Unavailable (all zero) when the current window has no revenue.
pub fn margin_overlay(
    current_revenue: f64,
    previous_revenue: f64,
    current: &WindowAggregate,
    previous: &WindowAggregate,
) -> MarginOverlay {
    if current_revenue <= 0.0 {
        return MarginOverlay::default();
    }

    let revenue_per_unit = safe_div(current_revenue, current.total_quantity);
    let margin = margin_per_unit(current_revenue, current);
    let previous_margin = if previous_revenue > 0.0 { margin_per_unit(previous_revenue, previous) } else { 0.0 };

    MarginOverlay {
        available: true,
        revenue: current_revenue,
        revenue_per_unit,
        cost_per_unit: current.avg_unit_price,
        margin_per_unit: margin,
        margin_pct: safe_div(margin, revenue_per_unit) * 100.0,
        previous_revenue,
        previous_margin_per_unit: previous_margin,
        margin_trend_pct: pct_change(previous_margin, margin),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::dimensions::{CostBasis, classify};
    use crate::config::TagConfig;
    use chrono::NaiveDate;

    fn row() -> UsageRow {
        UsageRow::on_date(NaiveDate::from_ymd_opt(2026, 5, 2).unwrap())
    }

    fn aggregate(cost: f64, quantity: f64) -> WindowAggregate {
        WindowAggregate {
            total_cost: cost,
            total_quantity: quantity,
            avg_unit_price: safe_div(cost, quantity),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_positive_alias_wins() {
        let aliases = TagConfig::default().revenue;
        let r = row().with_tag("revenue", "0").with_tag("revenue_amount", "abc").with_tag("business_revenue", "42.5");
        assert_eq!(revenue_of(&r, &aliases), 42.5);
        let r = row().with_tag("gross_revenue", " 7 ").with_tag("Revenue", "3");
        assert_eq!(revenue_of(&r, &aliases), 3.0);
        assert_eq!(revenue_of(&row().with_tag("revenue", "-5"), &aliases), 0.0);
    }

    #[test]
    fn test_window_revenue_sums_rows() {
        let tags = TagConfig::default();
        let rows = vec![row().with_tag("revenue", "10"), row(), row().with_tag("gross_revenue", "2.5")];
        let classified = classify(&rows, CostBasis::Actual, &tags);
        assert_eq!(window_revenue(&classified, &tags.revenue), 12.5);
    }

    #[test]
    fn test_margin_overlay() {
        let current = aggregate(200.0, 100.0);
        let previous = aggregate(150.0, 100.0);
        let overlay = margin_overlay(500.0, 400.0, &current, &previous);
        assert!(overlay.available);
        assert_eq!(overlay.revenue_per_unit, 5.0);
        assert_eq!(overlay.cost_per_unit, 2.0);
        assert_eq!(overlay.margin_per_unit, 3.0);
        assert!((overlay.margin_pct - 60.0).abs() < 1e-9);
        assert_eq!(overlay.previous_margin_per_unit, 2.5);
        assert!((overlay.margin_trend_pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_unavailable_without_current_revenue() {
        let overlay = margin_overlay(0.0, 400.0, &aggregate(10.0, 1.0), &aggregate(10.0, 1.0));
        assert_eq!(overlay, MarginOverlay::default());
        assert!(!overlay.available);
    }
}
