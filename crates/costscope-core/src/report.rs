//! Plain-text rendering of an [`AnalysisResult`].

use chrono::NaiveDate;

use crate::analytics::AnalysisResult;

/// Number of allocation buckets listed in the text report.
const TOP_BUCKETS: usize = 5;

/// Formats analysis results as a human-readable report.
pub struct SummaryFormatter;

impl SummaryFormatter {
    pub fn format(&self, result: &AnalysisResult) -> String {
        let mut output = String::new();
        let comparison = &result.comparison;

        output.push_str("Unit Economics Summary\n");
        output.push_str("══════════════════════\n\n");
        output.push_str(&format!(
            "Current:  {}\n",
            Self::format_range(comparison.current.start_date, comparison.current.end_date)
        ));
        output.push_str(&format!(
            "Previous: {}\n",
            Self::format_range(comparison.previous.start_date, comparison.previous.end_date)
        ));
        output.push_str(&format!("Compare:  {}   Basis: {}\n\n", comparison.compare_to, comparison.cost_basis));

        let kpis = &result.kpis;
        output.push_str("KPIs\n");
        output.push_str("────\n");
        output.push_str(&format!(
            "  Total cost:  ${:.2} ({})\n",
            kpis.total_cost,
            Self::format_percentage(kpis.cost_change_pct)
        ));
        output.push_str(&format!(
            "  Quantity:    {} ({})\n",
            kpis.total_quantity,
            Self::format_percentage(kpis.quantity_change_pct)
        ));
        output.push_str(&format!(
            "  Unit price:  ${:.6} ({})\n",
            kpis.avg_unit_price,
            Self::format_percentage(kpis.unit_price_change_pct)
        ));
        output.push_str(&format!("  Direct / shared: ${:.2} / ${:.2}\n", kpis.direct_cost, kpis.shared_cost));
        output.push_str(&format!("  Rows: {}   Active days: {}\n\n", kpis.row_count, kpis.active_days));

        let allocation = &result.allocation;
        output.push_str("Allocation\n");
        output.push_str("──────────\n");
        output.push_str(&format!(
            "  Shared pool: ${:.2} ({})\n",
            allocation.shared_pool_total, allocation.rule
        ));
        output.push_str(&format!(
            "  Coverage: team {:.1}%, owner {:.1}%, product {:.1}%\n",
            allocation.coverage.team_pct, allocation.coverage.owner_pct, allocation.coverage.product_pct
        ));
        output.push_str(&format!(
            "  Confidence: {:.1} ({})\n",
            allocation.confidence.score,
            allocation.confidence.level.as_str()
        ));
        for bucket in allocation.buckets.iter().take(TOP_BUCKETS) {
            output.push_str(&format!(
                "  {:<24} {:<20} {:<12} ${:>12.2}\n",
                bucket.team, bucket.product, bucket.environment, bucket.total_cost
            ));
        }
        if allocation.buckets.len() > TOP_BUCKETS {
            output.push_str(&format!("  … {} more\n", allocation.buckets.len() - TOP_BUCKETS));
        }
        output.push('\n');

        let decomposition = &result.unit_economics.decomposition;
        output.push_str("Unit Cost Waterfall\n");
        output.push_str("───────────────────\n");
        output.push_str(&format!(
            "  {:.6} → {:.6}\n",
            decomposition.start_unit_cost, decomposition.end_unit_cost
        ));
        for component in &decomposition.components {
            output.push_str(&format!("  {:<44} {}\n", component.label, Self::format_delta(component.value)));
        }
        output.push('\n');

        let forecast = &result.unit_economics.forecast;
        output.push_str("Forecast\n");
        output.push_str("────────\n");
        output.push_str(&format!(
            "  Next {} days: ${:.2} (${:.2} – ${:.2}), volatility {:.1}%\n\n",
            forecast.horizon_days, forecast.projected_cost, forecast.lower_bound, forecast.upper_bound, forecast.volatility_pct
        ));

        let integrity = &result.integrity;
        output.push_str("Integrity\n");
        output.push_str("─────────\n");
        output.push_str(&format!(
            "  Decomposition balance: {}\n",
            Self::format_check(integrity.decomposition_balance.is_balanced)
        ));
        output.push_str(&format!(
            "  Aggregation guard:     {}\n",
            Self::format_check(integrity.aggregation_guard.valid)
        ));
        output.push_str(&format!(
            "  Period alignment:      {}\n",
            Self::format_check(integrity.period_alignment.valid)
        ));

        output
    }

    fn format_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
        match (start, end) {
            (Some(start), Some(end)) => format!("{} .. {}", start, end),
            _ => "n/a".to_string(),
        }
    }

    fn format_delta(delta: f64) -> String {
        if delta >= 0.0 {
            format!("+{:.6}", delta)
        } else {
            format!("{:.6}", delta)
        }
    }

    fn format_percentage(pct: f64) -> String {
        if pct >= 0.0 {
            format!("+{:.1}%", pct)
        } else {
            format!("{:.1}%", pct)
        }
    }

    fn format_check(ok: bool) -> &'static str {
        if ok { "ok" } else { "FAILED" }
    }
}
