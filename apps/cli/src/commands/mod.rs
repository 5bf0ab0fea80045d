//! CLI command implementations.

pub mod analyze;
pub mod windows;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};

/// Parses an optional `YYYY-MM-DD` argument, defaulting to today (UTC).
pub fn parse_date_or_today(value: Option<&str>, name: &str) -> Result<NaiveDate> {
    match value {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("Invalid --{} date '{}', expected YYYY-MM-DD", name, raw)),
        None => Ok(Utc::now().date_naive()),
    }
}

/// Parses a value with its `FromStr` impl, wrapping the message for the user.
pub fn parse_arg<T>(value: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse::<T>().map_err(|e| anyhow::anyhow!(e))
}
