//! Near-term projection, unit-price drift, and break-even against a target unit cost.

use serde::Serialize;

use super::aggregate::TrendPoint;
use crate::config::{DriftConfig, ForecastConfig};
use crate::numeric::{mean, pct_change, round_money, round_pct, round_unit, safe_div, sample_std_dev};

/// How much to trust a forecast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastConfidence {
    #[default]
    Low,
    Medium,
    High,
}

/// Projected cost and volume over a bounded horizon.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub horizon_days: u32,
    pub projected_cost: f64,
    pub projected_volume: f64,
    pub projected_unit_cost: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub volatility_pct: f64,
    pub confidence: ForecastConfidence,
}

impl Forecast {
    pub fn rounded(&self) -> Self {
        Self {
            horizon_days: self.horizon_days,
            projected_cost: round_money(self.projected_cost),
            projected_volume: round_unit(self.projected_volume),
            projected_unit_cost: round_unit(self.projected_unit_cost),
            lower_bound: round_money(self.lower_bound),
            upper_bound: round_money(self.upper_bound),
            volatility_pct: round_pct(self.volatility_pct),
            confidence: self.confidence,
        }
    }
}

/// Coefficient of variation of daily cost, as a percentage.
///
/// Zero for fewer than two points or a non-positive mean.
pub fn cost_volatility(trend: &[TrendPoint]) -> f64 {
    if trend.len() < 2 {
        return 0.0;
    }
    let costs: Vec<f64> = trend.iter().map(|p| p.cost).collect();
    let avg = mean(&costs);
    if avg <= 0.0 {
        return 0.0;
    }
    safe_div(sample_std_dev(&costs, avg), avg) * 100.0
}

/// Clamps a requested horizon into the configured range.
pub fn clamp_horizon(requested: Option<u32>, config: &ForecastConfig) -> u32 {
    requested
        .unwrap_or(config.default_horizon_days)
        .clamp(config.min_horizon_days, config.max_horizon_days)
}

fn confidence_for(volatility_pct: f64, config: &ForecastConfig) -> ForecastConfidence {
    if volatility_pct >= config.low_volatility_pct {
        ForecastConfidence::Low
    } else if volatility_pct >= config.medium_volatility_pct {
        ForecastConfidence::Medium
    } else {
        ForecastConfidence::High
    }
}

/// Projects cost and volume from the trailing moving average of the trend.
pub fn forecast(trend: &[TrendPoint], volatility_pct: f64, horizon: Option<u32>, config: &ForecastConfig) -> Forecast {
    let horizon_days = clamp_horizon(horizon, config);
    if trend.is_empty() {
        return Forecast { horizon_days, ..Default::default() };
    }

    let tail = &trend[trend.len().saturating_sub(config.moving_average_days)..];
    let daily_cost = mean(&tail.iter().map(|p| p.cost).collect::<Vec<_>>());
    let daily_volume = mean(&tail.iter().map(|p| p.quantity).collect::<Vec<_>>());

    let days = f64::from(horizon_days);
    let projected_cost = daily_cost * days;
    let projected_volume = daily_volume * days;
    let band = (volatility_pct / 100.0).max(0.0);

    Forecast {
        horizon_days,
        projected_cost,
        projected_volume,
        projected_unit_cost: safe_div(projected_cost, projected_volume),
        lower_bound: (projected_cost * (1.0 - band)).max(0.0),
        upper_bound: projected_cost * (1.0 + band),
        volatility_pct,
        confidence: confidence_for(volatility_pct, config),
    }
}

/// Direction of unit-price movement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftDirection {
    Up,
    Down,
    #[default]
    Flat,
}

/// Unit-price drift between the early and late halves of the trend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Drift {
    pub early_unit_price: f64,
    pub late_unit_price: f64,
    pub drift_pct: f64,
    pub direction: DriftDirection,
    pub significant: bool,
}

impl Drift {
    pub fn rounded(&self) -> Self {
        Self {
            early_unit_price: round_unit(self.early_unit_price),
            late_unit_price: round_unit(self.late_unit_price),
            drift_pct: round_pct(self.drift_pct),
            direction: self.direction,
            significant: self.significant,
        }
    }
}

fn half_unit_price(points: &[TrendPoint]) -> f64 {
    let cost: f64 = points.iter().map(|p| p.cost).sum();
    let quantity: f64 = points.iter().map(|p| p.quantity).sum();
    safe_div(cost, quantity)
}

/// Compares unit price across trend halves. The middle point of an odd series
/// belongs to the late half.
pub fn detect_drift(trend: &[TrendPoint], config: &DriftConfig) -> Drift {
    if trend.len() < 2 {
        return Drift::default();
    }
    let (early, late) = trend.split_at(trend.len() / 2);
    let early_unit_price = half_unit_price(early);
    let late_unit_price = half_unit_price(late);
    let drift_pct = pct_change(early_unit_price, late_unit_price);

    let direction = if drift_pct > 0.0 {
        DriftDirection::Up
    } else if drift_pct < 0.0 {
        DriftDirection::Down
    } else {
        DriftDirection::Flat
    };

    Drift {
        early_unit_price,
        late_unit_price,
        drift_pct,
        direction,
        significant: drift_pct != 0.0 && drift_pct.abs() >= config.threshold_pct,
    }
}

/// Volume and cost needed to reach a target unit cost. Every field is null when no
/// meaningful target exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakEven {
    pub target_unit_cost: Option<f64>,
    pub required_volume: Option<f64>,
    pub volume_gap: Option<f64>,
    pub cost_gap: Option<f64>,
    pub improvement_needed_pct: Option<f64>,
}

impl BreakEven {
    pub fn rounded(&self) -> Self {
        Self {
            target_unit_cost: self.target_unit_cost.map(round_unit),
            required_volume: self.required_volume.map(round_unit),
            volume_gap: self.volume_gap.map(round_unit),
            cost_gap: self.cost_gap.map(round_money),
            improvement_needed_pct: self.improvement_needed_pct.map(round_pct),
        }
    }
}

/// Break-even inputs from the current and previous windows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BreakEvenInputs {
    pub current_cost: f64,
    pub current_volume: f64,
    pub current_unit_cost: f64,
    pub previous_unit_cost: f64,
    pub explicit_target: Option<f64>,
}

pub fn break_even(inputs: &BreakEvenInputs) -> BreakEven {
    let target = inputs
        .explicit_target
        .filter(|t| *t > 0.0 && t.is_finite())
        .or_else(|| (inputs.previous_unit_cost > 0.0).then_some(inputs.previous_unit_cost));

    let Some(target) = target else {
        return BreakEven::default();
    };
    if inputs.current_unit_cost <= 0.0 {
        return BreakEven::default();
    }

    let required_volume = safe_div(inputs.current_cost, target);
    BreakEven {
        target_unit_cost: Some(target),
        required_volume: Some(required_volume),
        volume_gap: Some(required_volume - inputs.current_volume),
        cost_gap: Some(inputs.current_cost - target * inputs.current_volume),
        improvement_needed_pct: Some(safe_div(inputs.current_unit_cost - target, inputs.current_unit_cost) * 100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trend(points: &[(f64, f64)]) -> Vec<TrendPoint> {
        let start = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        points
            .iter()
            .enumerate()
            .map(|(i, (cost, quantity))| TrendPoint {
                date: start + chrono::Days::new(i as u64),
                cost: *cost,
                quantity: *quantity,
                unit_price: safe_div(*cost, *quantity),
            })
            .collect()
    }

    #[test]
    fn test_volatility_of_flat_series_is_zero() {
        let t = trend(&[(10.0, 1.0), (10.0, 1.0), (10.0, 1.0)]);
        assert_eq!(cost_volatility(&t), 0.0);
        assert_eq!(cost_volatility(&t[..1]), 0.0);
        assert_eq!(cost_volatility(&[]), 0.0);
    }

    #[test]
    fn test_volatility_coefficient_of_variation() {
        // mean 20, sample std dev 10
        let t = trend(&[(10.0, 1.0), (20.0, 1.0), (30.0, 1.0)]);
        assert!((cost_volatility(&t) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_horizon_clamped() {
        let config = ForecastConfig::default();
        assert_eq!(clamp_horizon(None, &config), 14);
        assert_eq!(clamp_horizon(Some(2), &config), 7);
        assert_eq!(clamp_horizon(Some(90), &config), 30);
        assert_eq!(clamp_horizon(Some(21), &config), 21);
    }

    #[test]
    fn test_forecast_uses_trailing_window() {
        let config = ForecastConfig::default();
        let mut points = vec![(1000.0, 1.0); 3];
        points.extend(vec![(10.0, 5.0); 7]);
        let f = forecast(&trend(&points), 10.0, Some(10), &config);
        assert_eq!(f.horizon_days, 10);
        assert!((f.projected_cost - 100.0).abs() < 1e-9);
        assert!((f.projected_volume - 50.0).abs() < 1e-9);
        assert!((f.projected_unit_cost - 2.0).abs() < 1e-9);
        assert!((f.lower_bound - 90.0).abs() < 1e-9);
        assert!((f.upper_bound - 110.0).abs() < 1e-9);
        assert_eq!(f.confidence, ForecastConfidence::High);
    }

    #[test]
    fn test_forecast_confidence_bands() {
        let config = ForecastConfig::default();
        let t = trend(&[(10.0, 1.0)]);
        assert_eq!(forecast(&t, 15.0, None, &config).confidence, ForecastConfidence::Medium);
        assert_eq!(forecast(&t, 35.0, None, &config).confidence, ForecastConfidence::Low);
        let wild = forecast(&t, 150.0, None, &config);
        assert_eq!(wild.lower_bound, 0.0);
    }

    #[test]
    fn test_forecast_empty_trend() {
        let f = forecast(&[], 0.0, None, &ForecastConfig::default());
        assert_eq!(f.horizon_days, 14);
        assert_eq!(f.projected_cost, 0.0);
        assert_eq!(f.confidence, ForecastConfidence::Low);
    }

    #[test]
    fn test_drift_halves() {
        let config = DriftConfig::default();
        // early: 10/10 = 1.0, late (incl. middle): 36/30 = 1.2
        let t = trend(&[(5.0, 5.0), (5.0, 5.0), (12.0, 10.0), (12.0, 10.0), (12.0, 10.0)]);
        let drift = detect_drift(&t, &config);
        assert!((drift.early_unit_price - 1.0).abs() < 1e-9);
        assert!((drift.late_unit_price - 1.2).abs() < 1e-9);
        assert!((drift.drift_pct - 20.0).abs() < 1e-9);
        assert_eq!(drift.direction, DriftDirection::Up);
        assert!(drift.significant);
    }

    #[test]
    fn test_drift_small_change_not_significant() {
        let t = trend(&[(100.0, 100.0), (95.0, 100.0)]);
        let drift = detect_drift(&t, &DriftConfig::default());
        assert_eq!(drift.direction, DriftDirection::Down);
        assert!(!drift.significant);
        assert_eq!(detect_drift(&t[..1], &DriftConfig::default()), Drift::default());
    }

    #[test]
    fn test_break_even_with_explicit_target() {
        let be = break_even(&BreakEvenInputs {
            current_cost: 200.0,
            current_volume: 80.0,
            current_unit_cost: 2.5,
            previous_unit_cost: 3.0,
            explicit_target: Some(2.0),
        });
        assert_eq!(be.target_unit_cost, Some(2.0));
        assert_eq!(be.required_volume, Some(100.0));
        assert_eq!(be.volume_gap, Some(20.0));
        assert_eq!(be.cost_gap, Some(40.0));
        assert_eq!(be.improvement_needed_pct, Some(20.0));
    }

    #[test]
    fn test_break_even_falls_back_to_previous_unit_cost() {
        let be = break_even(&BreakEvenInputs {
            current_cost: 120.0,
            current_volume: 40.0,
            current_unit_cost: 3.0,
            previous_unit_cost: 2.0,
            explicit_target: Some(0.0),
        });
        assert_eq!(be.target_unit_cost, Some(2.0));
        assert_eq!(be.required_volume, Some(60.0));
    }

    #[test]
    fn test_break_even_null_without_target_or_unit_cost() {
        let no_target = BreakEvenInputs { current_cost: 10.0, current_volume: 5.0, current_unit_cost: 2.0, ..Default::default() };
        assert_eq!(break_even(&no_target), BreakEven::default());

        let no_unit_cost = BreakEvenInputs { explicit_target: Some(1.0), current_cost: 10.0, ..Default::default() };
        assert_eq!(break_even(&no_unit_cost), BreakEven::default());
    }
}
