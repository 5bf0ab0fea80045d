//! Guarded arithmetic and output rounding.
//!
//! Every ratio in the engine goes through [`safe_div`]; nothing divides directly.

/// Decimal places for monetary fields.
pub const MONEY_DECIMALS: i32 = 2;
/// Decimal places for unit-price fields.
pub const UNIT_DECIMALS: i32 = 6;
/// Decimal places for percentage fields.
pub const PCT_DECIMALS: i32 = 2;

/// Rounds half away from zero to `decimals` places. Non-finite input and negative zero become `0.0`.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 { 0.0 } else { rounded }
}

pub fn round_money(value: f64) -> f64 {
    round_to(value, MONEY_DECIMALS)
}

pub fn round_unit(value: f64) -> f64 {
    round_to(value, UNIT_DECIMALS)
}

pub fn round_pct(value: f64) -> f64 {
    round_to(value, PCT_DECIMALS)
}

/// Rounds each value to cents so the parts sum exactly to `total` rounded to cents.
///
/// Largest-remainder apportionment: every value is floored to whole cents, then the
/// cents still owed go to the values with the largest fractional remainders (ties
/// to the earlier index). A surplus is taken back from the smallest remainders.
pub fn apportion_money(values: &[f64], total: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let scaled: Vec<f64> = values.iter().map(|v| if v.is_finite() { v * 100.0 } else { 0.0 }).collect();
    let mut cents: Vec<i64> = scaled.iter().map(|v| v.floor() as i64).collect();
    let target = (round_money(total) * 100.0).round() as i64;
    let mut gap = target - cents.iter().sum::<i64>();

    let mut order: Vec<usize> = (0..scaled.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = scaled[a] - scaled[a].floor();
        let rb = scaled[b] - scaled[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });

    let n = order.len();
    let mut step = 0;
    while gap > 0 {
        cents[order[step % n]] += 1;
        gap -= 1;
        step += 1;
    }
    step = 0;
    while gap < 0 {
        cents[order[n - 1 - step % n]] -= 1;
        gap += 1;
        step += 1;
    }

    cents.into_iter().map(|c| round_money(c as f64 / 100.0)).collect()
}

/// Divides, returning `0.0` for a zero denominator or a non-finite quotient.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let quotient = numerator / denominator;
    if quotient.is_finite() { quotient } else { 0.0 }
}

/// Percentage of `whole` represented by `part`.
pub fn share_pct(part: f64, whole: f64) -> f64 {
    safe_div(part, whole) * 100.0
}

/// Percentage change from `old` to `new`, relative to `|old|`. Zero when `old` is zero.
pub fn pct_change(old: f64, new: f64) -> f64 {
    safe_div(new - old, old.abs()) * 100.0
}

/// Calculates the mean of a slice of values.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculates the sample standard deviation of a slice of values.
pub fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;

    variance.sqrt()
}
