//! Post-hoc consistency checks over the produced artifacts.
//!
//! Checks never fail the request. Each reports whether it passed and the
//! numeric difference it found, and [`IntegrityReport::failures`] names the ones
//! that did not pass so the orchestrator can log them.

use serde::Serialize;

use super::allocation::AllocationSummary;
use super::decomposition::Decomposition;
use super::window::TimeWindow;
use crate::config::ToleranceConfig;
use crate::numeric::{round_money, round_unit};

/// Waterfall closure: `|sum(components) - (end - start)|`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecompositionBalance {
    pub is_balanced: bool,
    pub difference: f64,
}

impl Default for DecompositionBalance {
    fn default() -> Self {
        Self { is_balanced: true, difference: 0.0 }
    }
}

/// A pass/fail check with the difference it measured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardCheck {
    pub valid: bool,
    pub difference: f64,
}

impl Default for GuardCheck {
    fn default() -> Self {
        Self { valid: true, difference: 0.0 }
    }
}

/// Outcome of all three validators.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub decomposition_balance: DecompositionBalance,
    pub aggregation_guard: GuardCheck,
    pub period_alignment: GuardCheck,
}

impl IntegrityReport {
    pub fn all_ok(&self) -> bool {
        self.decomposition_balance.is_balanced && self.aggregation_guard.valid && self.period_alignment.valid
    }

    /// Names of failed checks.
    pub fn failures(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if !self.decomposition_balance.is_balanced {
            failed.push("decomposition_balance");
        }
        if !self.aggregation_guard.valid {
            failed.push("aggregation_guard");
        }
        if !self.period_alignment.valid {
            failed.push("period_alignment");
        }
        failed
    }

    pub fn rounded(&self) -> Self {
        Self {
            decomposition_balance: DecompositionBalance {
                is_balanced: self.decomposition_balance.is_balanced,
                difference: round_unit(self.decomposition_balance.difference),
            },
            aggregation_guard: GuardCheck {
                valid: self.aggregation_guard.valid,
                difference: round_money(self.aggregation_guard.difference),
            },
            period_alignment: self.period_alignment.clone(),
        }
    }
}

pub fn check_decomposition_balance(decomposition: &Decomposition, tolerances: &ToleranceConfig) -> DecompositionBalance {
    let expected = decomposition.end_unit_cost - decomposition.start_unit_cost;
    let difference = (decomposition.component_sum() - expected).abs();
    DecompositionBalance { is_balanced: difference <= tolerances.unit_cost_epsilon, difference }
}

/// Bucket totals must reconcile to the source total.
pub fn check_aggregation_guard(allocation: &AllocationSummary, source_total: f64, tolerances: &ToleranceConfig) -> GuardCheck {
    let difference = (allocation.bucket_total() - source_total).abs();
    GuardCheck { valid: difference <= tolerances.money_epsilon, difference }
}

/// Cost and volume must be measured over the same date range.
pub fn check_period_alignment(cost_window: Option<&TimeWindow>, volume_window: Option<&TimeWindow>) -> GuardCheck {
    match (cost_window, volume_window) {
        (None, None) => GuardCheck::default(),
        (Some(cost), Some(volume)) => {
            let start = (cost.start_date() - volume.start_date()).num_days().abs();
            let end = (cost.end_date() - volume.end_date()).num_days().abs();
            let difference = (start + end) as f64;
            GuardCheck { valid: difference == 0.0, difference }
        }
        (Some(window), None) | (None, Some(window)) => GuardCheck { valid: false, difference: window.days() as f64 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::allocation::AllocationBucket;
    use crate::analytics::decomposition::{ComponentKind, DecompositionComponent};
    use chrono::NaiveDate;

    fn window(start: u32, end: u32) -> TimeWindow {
        TimeWindow::new(
            NaiveDate::from_ymd_opt(2026, 6, start).unwrap(),
            NaiveDate::from_ymd_opt(2026, 6, end).unwrap(),
        )
        .unwrap()
    }

    fn bucket(total: f64) -> AllocationBucket {
        AllocationBucket {
            team: "t".into(),
            product: "p".into(),
            environment: "e".into(),
            direct_cost: total,
            shared_allocated_cost: 0.0,
            unallocated_shared_cost: 0.0,
            quantity: 0.0,
            total_cost: total,
        }
    }

    #[test]
    fn test_decomposition_balance() {
        let mut d = Decomposition {
            start_unit_cost: 1.0,
            end_unit_cost: 1.5,
            components: vec![DecompositionComponent { key: ComponentKind::UsageGrowth, label: "u".into(), value: 0.5 }],
            ..Default::default()
        };
        let tolerances = ToleranceConfig::default();
        assert!(check_decomposition_balance(&d, &tolerances).is_balanced);

        d.components[0].value = 0.49;
        let balance = check_decomposition_balance(&d, &tolerances);
        assert!(!balance.is_balanced);
        assert!((balance.difference - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_aggregation_guard() {
        let tolerances = ToleranceConfig::default();
        let allocation = AllocationSummary { buckets: vec![bucket(60.0), bucket(40.0)], ..AllocationSummary::empty() };
        assert!(check_aggregation_guard(&allocation, 100.004, &tolerances).valid);

        let guard = check_aggregation_guard(&allocation, 101.0, &tolerances);
        assert!(!guard.valid);
        assert!((guard.difference - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_period_alignment() {
        assert!(check_period_alignment(Some(&window(1, 7)), Some(&window(1, 7))).valid);
        assert!(check_period_alignment(None, None).valid);

        let misaligned = check_period_alignment(Some(&window(1, 7)), Some(&window(2, 9)));
        assert!(!misaligned.valid);
        assert_eq!(misaligned.difference, 3.0);

        let missing = check_period_alignment(Some(&window(1, 7)), None);
        assert!(!missing.valid);
    }

    #[test]
    fn test_report_failures() {
        let mut report = IntegrityReport::default();
        assert!(report.all_ok());
        assert!(report.failures().is_empty());

        report.aggregation_guard = GuardCheck { valid: false, difference: 2.0 };
        assert!(!report.all_ok());
        assert_eq!(report.failures(), vec!["aggregation_guard"]);
    }
}
