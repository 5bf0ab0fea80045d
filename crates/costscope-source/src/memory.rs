//! In-memory row source for tests, fixtures, and file-driven runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::{RawUsageRow, Result, RowScope, UsageFilters, UsageRow, UsageRowSource};

/// Row source backed by a map of scope to rows.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRowSource {
    scopes: HashMap<RowScope, Vec<UsageRow>>,
}

/// Accepted shapes for a JSON rows document.
#[derive(Deserialize)]
#[serde(untagged)]
enum RowsDocument {
    Flat(Vec<RawUsageRow>),
    Scoped(HashMap<String, Vec<RawUsageRow>>),
}

impl InMemoryRowSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source holding `rows` under `scope`.
    pub fn with_rows(scope: impl Into<RowScope>, rows: Vec<UsageRow>) -> Self {
        let mut source = Self::new();
        source.insert(scope, rows);
        source
    }

    /// Appends rows to a scope.
    pub fn insert(&mut self, scope: impl Into<RowScope>, rows: Vec<UsageRow>) {
        self.scopes.entry(scope.into()).or_default().extend(rows);
    }

    /// Parses a JSON document that is either an array of rows (stored under
    /// `default_scope`) or an object mapping scope ids to arrays of rows.
    pub fn from_json_str(json: &str, default_scope: &RowScope) -> Result<Self> {
        let document: RowsDocument = serde_json::from_str(json)?;
        let mut source = Self::new();
        match document {
            RowsDocument::Flat(raw) => {
                source.insert(default_scope.clone(), convert(raw)?);
            }
            RowsDocument::Scoped(map) => {
                for (scope, raw) in map {
                    source.insert(RowScope::new(scope), convert(raw)?);
                }
            }
        }
        Ok(source)
    }

    /// Number of rows held for a scope.
    pub fn len(&self, scope: &RowScope) -> usize {
        self.scopes.get(scope).map_or(0, Vec::len)
    }

    /// Returns true if the scope holds no rows.
    pub fn is_empty(&self, scope: &RowScope) -> bool {
        self.len(scope) == 0
    }

    fn scoped<'a>(&'a self, filters: &'a UsageFilters, scope: &RowScope) -> impl Iterator<Item = &'a UsageRow> + 'a {
        if !self.scopes.contains_key(scope) {
            debug!(scope = %scope, "Unknown row scope, treating as empty");
        }
        self.scopes
            .get(scope)
            .into_iter()
            .flatten()
            .filter(move |row| filters.matches(row))
    }
}

fn convert(raw: Vec<RawUsageRow>) -> Result<Vec<UsageRow>> {
    raw.into_iter().map(UsageRow::try_from).collect()
}

#[async_trait]
impl UsageRowSource for InMemoryRowSource {
    async fn latest_charge_date(&self, filters: &UsageFilters, scope: &RowScope) -> Result<Option<NaiveDate>> {
        Ok(self.scoped(filters, scope).map(UsageRow::charge_date).max())
    }

    async fn rows(
        &self,
        filters: &UsageFilters,
        start: NaiveDate,
        end: NaiveDate,
        scope: &RowScope,
    ) -> Result<Vec<UsageRow>> {
        let rows: Vec<UsageRow> = self
            .scoped(filters, scope)
            .filter(|row| {
                let date = row.charge_date();
                date >= start && date <= end
            })
            .cloned()
            .collect();
        debug!(scope = %scope, %start, %end, rows = rows.len(), "Fetched usage rows");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    fn source() -> InMemoryRowSource {
        InMemoryRowSource::with_rows(
            "acme",
            vec![
                UsageRow::on_date(date(1)).with_costs(10.0, 10.0, 10.0).with_provider("aws"),
                UsageRow::on_date(date(5)).with_costs(20.0, 20.0, 20.0).with_provider("gcp"),
                UsageRow::on_date(date(9)).with_costs(30.0, 30.0, 30.0).with_provider("aws"),
            ],
        )
    }

    #[tokio::test]
    async fn test_latest_charge_date_respects_filters() {
        let source = source();
        let scope = RowScope::new("acme");
        let all = source.latest_charge_date(&UsageFilters::default(), &scope).await.unwrap();
        assert_eq!(all, Some(date(9)));

        let gcp = UsageFilters { provider: Some("gcp".to_string()), ..Default::default() };
        let latest = source.latest_charge_date(&gcp, &scope).await.unwrap();
        assert_eq!(latest, Some(date(5)));
    }

    #[tokio::test]
    async fn test_rows_inclusive_range() {
        let source = source();
        let rows = source
            .rows(&UsageFilters::default(), date(1), date(5), &RowScope::new("acme"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_scope_is_empty() {
        let source = source();
        let scope = RowScope::new("other");
        assert_eq!(source.latest_charge_date(&UsageFilters::default(), &scope).await.unwrap(), None);
        assert!(source.is_empty(&scope));
    }

    #[test]
    fn test_from_json_flat_and_scoped() {
        let flat = r#"[{"chargePeriodStart": "2026-04-02", "billedCost": "12.5"}]"#;
        let source = InMemoryRowSource::from_json_str(flat, &RowScope::default()).unwrap();
        assert_eq!(source.len(&RowScope::default()), 1);

        let scoped = r#"{"t1": [{"chargePeriodStart": "2026-04-02"}], "t2": []}"#;
        let source = InMemoryRowSource::from_json_str(scoped, &RowScope::default()).unwrap();
        assert_eq!(source.len(&RowScope::new("t1")), 1);
        assert!(source.is_empty(&RowScope::new("t2")));
    }

    #[test]
    fn test_from_json_rejects_bad_rows() {
        let bad = r#"[{"billedCost": 3}]"#;
        assert!(InMemoryRowSource::from_json_str(bad, &RowScope::default()).is_err());
    }
}
