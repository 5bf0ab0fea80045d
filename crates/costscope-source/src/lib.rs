//! Usage Row Source boundary for costscope.
//!
//! This crate defines the usage-fact row model and the trait the analytics engine
//! uses to fetch already-scoped rows. Persistence and tenant isolation live behind
//! [`UsageRowSource`]; the engine only ever sees materialized row sets.

mod memory;
mod row;

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::InMemoryRowSource;
pub use row::{RawUsageRow, UsageRow, parse_or_zero};

/// Errors raised at the row-source I/O boundary.
#[derive(Error, Debug)]
pub enum SourceError {
    /// A row could not be converted into a [`UsageRow`].
    #[error("invalid usage row: {0}")]
    InvalidRow(String),

    /// The backing store could not be reached or queried.
    #[error("row source unavailable: {0}")]
    Unavailable(String),

    /// Row payload could not be decoded.
    #[error("row payload error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for row-source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Opaque handle identifying which rows the caller is allowed to see.
///
/// Resolution (tenant, account set, etc.) happens before the engine is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowScope(String);

impl RowScope {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RowScope {
    fn default() -> Self {
        Self::new("default")
    }
}

impl fmt::Display for RowScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowScope {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RowScope {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Dimensional filters applied by the row source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageFilters {
    pub provider: Option<String>,
    pub service: Option<String>,
    pub region: Option<String>,
}

impl UsageFilters {
    /// Returns true if the row satisfies every set filter (case-insensitive).
    pub fn matches(&self, row: &UsageRow) -> bool {
        fn check(filter: Option<&String>, value: Option<&String>) -> bool {
            match filter.map(|f| f.trim()).filter(|f| !f.is_empty()) {
                None => true,
                Some(wanted) => value.is_some_and(|v| v.trim().eq_ignore_ascii_case(wanted)),
            }
        }

        check(self.provider.as_ref(), row.provider.as_ref())
            && check(self.service.as_ref(), row.service.as_ref())
            && check(self.region.as_ref(), row.region.as_ref())
    }

    /// Stable textual form, used in cache keys and logs.
    pub fn key(&self) -> String {
        format!(
            "provider={}|service={}|region={}",
            self.provider.as_deref().unwrap_or("*"),
            self.service.as_deref().unwrap_or("*"),
            self.region.as_deref().unwrap_or("*"),
        )
    }
}

/// Source of usage-fact rows for a resolved scope.
///
/// Implementations are expected to apply `filters` and `scope` themselves; the
/// engine trusts the returned rows as the complete, authorized row set.
#[async_trait]
pub trait UsageRowSource: Send + Sync {
    /// Latest charge date available for the scope, or `None` if it holds no rows.
    async fn latest_charge_date(&self, filters: &UsageFilters, scope: &RowScope) -> Result<Option<NaiveDate>>;

    /// All rows whose charge date falls within `[start, end]` (inclusive).
    async fn rows(
        &self,
        filters: &UsageFilters,
        start: NaiveDate,
        end: NaiveDate,
        scope: &RowScope,
    ) -> Result<Vec<UsageRow>>;
}
