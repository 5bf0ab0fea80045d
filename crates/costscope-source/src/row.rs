//! Usage-fact rows and their loosely-typed wire form.
//!
//! Billing exports arrive with numbers encoded as JSON numbers, numeric strings,
//! or not at all. Every numeric field goes through [`parse_or_zero`] exactly once
//! while converting a [`RawUsageRow`] into a [`UsageRow`]; nothing downstream
//! coerces types again.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SourceError;

/// Converts a loosely-typed JSON value into a finite `f64`, falling back to zero.
///
/// Numbers are taken as-is, strings are trimmed and parsed, and anything else
/// (null, booleans, arrays, unparseable text, NaN, infinities) becomes `0.0`.
pub fn parse_or_zero(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() { parsed } else { 0.0 }
}

/// A usage row exactly as a billing export delivers it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawUsageRow {
    /// Start of the charge period (RFC 3339, `YYYY-MM-DD HH:MM:SS`, or `YYYY-MM-DD`).
    pub charge_period_start: Option<String>,
    pub charge_category: Option<String>,
    pub consumed_quantity: Value,
    pub billed_cost: Value,
    pub effective_cost: Value,
    pub contracted_cost: Value,
    pub list_unit_price: Value,
    pub contracted_unit_price: Value,
    /// Free-form tags; values may be strings or numbers.
    pub tags: BTreeMap<String, Value>,
    pub sku_id: Option<String>,
    pub commitment_discount_id: Option<String>,
    pub provider: Option<String>,
    pub service: Option<String>,
    pub region: Option<String>,
    pub team: Option<String>,
    pub product: Option<String>,
    pub environment: Option<String>,
    pub owner: Option<String>,
}

/// A single usage fact belonging to exactly one charge day.
///
/// Cost fields are never negative. Tag keys are lower-cased on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawUsageRow")]
pub struct UsageRow {
    pub charge_period_start: DateTime<Utc>,
    pub charge_category: String,
    pub consumed_quantity: f64,
    pub billed_cost: f64,
    pub effective_cost: f64,
    pub contracted_cost: f64,
    pub list_unit_price: f64,
    pub contracted_unit_price: f64,
    pub tags: BTreeMap<String, String>,
    pub sku_id: Option<String>,
    pub commitment_discount_id: Option<String>,
    pub provider: Option<String>,
    pub service: Option<String>,
    pub region: Option<String>,
    pub team: Option<String>,
    pub product: Option<String>,
    pub environment: Option<String>,
    pub owner: Option<String>,
}

impl UsageRow {
    /// Creates an empty usage row for the given charge period start.
    pub fn new(charge_period_start: DateTime<Utc>) -> Self {
        Self {
            charge_period_start,
            charge_category: "Usage".to_string(),
            consumed_quantity: 0.0,
            billed_cost: 0.0,
            effective_cost: 0.0,
            contracted_cost: 0.0,
            list_unit_price: 0.0,
            contracted_unit_price: 0.0,
            tags: BTreeMap::new(),
            sku_id: None,
            commitment_discount_id: None,
            provider: None,
            service: None,
            region: None,
            team: None,
            product: None,
            environment: None,
            owner: None,
        }
    }

    /// Creates an empty usage row charged at midnight UTC of `date`.
    pub fn on_date(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    /// Sets billed, effective, and contracted cost. Negative inputs are clamped to zero.
    #[must_use]
    pub fn with_costs(mut self, billed: f64, effective: f64, contracted: f64) -> Self {
        self.billed_cost = non_negative(billed);
        self.effective_cost = non_negative(effective);
        self.contracted_cost = non_negative(contracted);
        self
    }

    /// Sets the consumed quantity.
    #[must_use]
    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.consumed_quantity = finite(quantity);
        self
    }

    /// Sets list and contracted unit prices.
    #[must_use]
    pub fn with_unit_prices(mut self, list: f64, contracted: f64) -> Self {
        self.list_unit_price = finite(list);
        self.contracted_unit_price = finite(contracted);
        self
    }

    /// Adds a tag; the key is lower-cased.
    #[must_use]
    pub fn with_tag(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.tags.insert(key.as_ref().to_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    #[must_use]
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// The UTC calendar day this row is charged to.
    pub fn charge_date(&self) -> NaiveDate {
        self.charge_period_start.date_naive()
    }

    /// Looks up a tag by (case-insensitive) key, ignoring blank values.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .get(&key.to_lowercase())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

impl TryFrom<RawUsageRow> for UsageRow {
    type Error = SourceError;

    fn try_from(raw: RawUsageRow) -> Result<Self, Self::Error> {
        let start = raw
            .charge_period_start
            .as_deref()
            .ok_or_else(|| SourceError::InvalidRow("missing chargePeriodStart".to_string()))?;
        let charge_period_start = parse_timestamp(start)?;

        let tags = raw
            .tags
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((key.to_lowercase(), text))
            })
            .collect();

        Ok(Self {
            charge_period_start,
            charge_category: raw.charge_category.unwrap_or_else(|| "Usage".to_string()),
            consumed_quantity: parse_or_zero(&raw.consumed_quantity),
            billed_cost: non_negative(parse_or_zero(&raw.billed_cost)),
            effective_cost: non_negative(parse_or_zero(&raw.effective_cost)),
            contracted_cost: non_negative(parse_or_zero(&raw.contracted_cost)),
            list_unit_price: parse_or_zero(&raw.list_unit_price),
            contracted_unit_price: parse_or_zero(&raw.contracted_unit_price),
            tags,
            sku_id: raw.sku_id,
            commitment_discount_id: raw.commitment_discount_id,
            provider: raw.provider,
            service: raw.service,
            region: raw.region,
            team: raw.team,
            product: raw.product,
            environment: raw.environment,
            owner: raw.owner,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, SourceError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|e| SourceError::InvalidRow(format!("invalid chargePeriodStart '{}': {}", value, e)))
}

fn finite(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn non_negative(value: f64) -> f64 {
    finite(value).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_or_zero_variants() {
        assert_eq!(parse_or_zero(&json!(12.5)), 12.5);
        assert_eq!(parse_or_zero(&json!(" 7.25 ")), 7.25);
        assert_eq!(parse_or_zero(&json!("n/a")), 0.0);
        assert_eq!(parse_or_zero(&json!(null)), 0.0);
        assert_eq!(parse_or_zero(&json!(true)), 0.0);
        assert_eq!(parse_or_zero(&json!("NaN")), 0.0);
        assert_eq!(parse_or_zero(&json!("inf")), 0.0);
    }

    #[test]
    fn test_raw_row_conversion() {
        let raw: RawUsageRow = serde_json::from_value(json!({
            "chargePeriodStart": "2026-03-04T10:15:00Z",
            "consumedQuantity": "40",
            "billedCost": 100,
            "effectiveCost": "80.5",
            "contractedCost": null,
            "tags": {"Team": "Payments", "Revenue": 250}
        }))
        .unwrap();
        let row = UsageRow::try_from(raw).unwrap();

        assert_eq!(row.charge_date(), NaiveDate::from_ymd_opt(2026, 3, 4).unwrap());
        assert_eq!(row.consumed_quantity, 40.0);
        assert_eq!(row.billed_cost, 100.0);
        assert_eq!(row.effective_cost, 80.5);
        assert_eq!(row.contracted_cost, 0.0);
        assert_eq!(row.tag("team"), Some("Payments"));
        assert_eq!(row.tag("REVENUE"), Some("250"));
        assert_eq!(row.charge_category, "Usage");
    }

    #[test]
    fn test_negative_costs_clamped() {
        let row: UsageRow = serde_json::from_value(json!({
            "chargePeriodStart": "2026-03-04",
            "billedCost": "-5"
        }))
        .unwrap();
        assert_eq!(row.billed_cost, 0.0);
    }

    #[test]
    fn test_missing_timestamp_rejected() {
        let raw = RawUsageRow::default();
        let err = UsageRow::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("chargePeriodStart"));
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        let result = serde_json::from_value::<UsageRow>(json!({"chargePeriodStart": "yesterday"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_tag_ignored() {
        let row = UsageRow::on_date(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()).with_tag("Team", "  ");
        assert_eq!(row.tag("team"), None);
    }

    #[test]
    fn test_serialize_roundtrip_keeps_tags_lowercase() {
        let row = UsageRow::on_date(NaiveDate::from_ymd_opt(2026, 1, 2).unwrap())
            .with_costs(10.0, 9.0, 8.0)
            .with_tag("Environment", "prod");
        let json = serde_json::to_string(&row).unwrap();
        let back: UsageRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }
}
