//! Cost basis selection and dimension resolution for usage rows.
//!
//! Dimensions resolve in a fixed order: the first non-empty tag among the
//! configured candidate keys, then the row's own column, then a fallback literal.
//! Each row is resolved once into a [`ClassifiedRow`] that the aggregator,
//! allocation engine, benchmarks, and margin overlay all share.

use std::fmt;
use std::str::FromStr;

use costscope_source::UsageRow;
use serde::{Deserialize, Serialize};

use crate::config::TagConfig;

pub const UNASSIGNED_TEAM: &str = "Unassigned Team";
pub const UNMAPPED_PRODUCT: &str = "Unmapped Product";
pub const UNSPECIFIED_ENVIRONMENT: &str = "Unspecified";
pub const UNASSIGNED_OWNER: &str = "Unassigned Owner";
pub const UNKNOWN_REGION: &str = "Unknown Region";

/// Which cost figure a computation uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostBasis {
    /// Billed cost.
    #[default]
    Actual,
    /// Effective cost, falling back to billed.
    Amortized,
    /// Contracted cost, falling back to effective, then billed.
    Net,
}

impl CostBasis {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Actual => "actual",
            Self::Amortized => "amortized",
            Self::Net => "net",
        }
    }

    /// Cost of `row` under this basis: the first non-zero field in the basis's fallback order.
    pub fn cost_of(self, row: &UsageRow) -> f64 {
        let candidates: &[f64] = match self {
            Self::Actual => &[row.billed_cost],
            Self::Amortized => &[row.effective_cost, row.billed_cost],
            Self::Net => &[row.contracted_cost, row.effective_cost, row.billed_cost],
        };
        candidates.iter().copied().find(|c| *c != 0.0).unwrap_or(0.0)
    }
}

impl fmt::Display for CostBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CostBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "actual" => Ok(Self::Actual),
            "amortized" => Ok(Self::Amortized),
            "net" => Ok(Self::Net),
            other => Err(format!("unknown cost basis '{}' (expected actual, amortized, net)", other)),
        }
    }
}

/// An allocation dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Team,
    Product,
    Environment,
    Owner,
    Region,
}

impl Dimension {
    /// Literal used when neither a tag nor a column supplies a value.
    pub fn fallback(self) -> &'static str {
        match self {
            Self::Team => UNASSIGNED_TEAM,
            Self::Product => UNMAPPED_PRODUCT,
            Self::Environment => UNSPECIFIED_ENVIRONMENT,
            Self::Owner => UNASSIGNED_OWNER,
            Self::Region => UNKNOWN_REGION,
        }
    }

    fn candidates(self, tags: &TagConfig) -> &[String] {
        match self {
            Self::Team => &tags.team,
            Self::Product => &tags.product,
            Self::Environment => &tags.environment,
            Self::Owner => &tags.owner,
            Self::Region => &tags.region,
        }
    }

    fn column(self, row: &UsageRow) -> Option<&str> {
        let value = match self {
            Self::Team => row.team.as_deref(),
            Self::Product => row.product.as_deref(),
            Self::Environment => row.environment.as_deref(),
            Self::Owner => row.owner.as_deref(),
            Self::Region => row.region.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Returns the first non-empty tag value among `candidates`, in order.
pub fn lookup_tag<'a>(row: &'a UsageRow, candidates: &[String]) -> Option<&'a str> {
    candidates.iter().find_map(|key| row.tag(key))
}

/// A resolved dimension value and whether it came from data rather than the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub value: String,
    pub explicit: bool,
}

/// Resolves one dimension: tag, then column, then fallback literal.
pub fn resolve(row: &UsageRow, dimension: Dimension, tags: &TagConfig) -> ResolvedValue {
    match lookup_tag(row, dimension.candidates(tags)).or_else(|| dimension.column(row)) {
        Some(value) => ResolvedValue { value: value.to_string(), explicit: true },
        None => ResolvedValue { value: dimension.fallback().to_string(), explicit: false },
    }
}

/// All dimensions of a row, resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDimensions {
    pub team: ResolvedValue,
    pub product: ResolvedValue,
    pub environment: ResolvedValue,
    pub owner: ResolvedValue,
    pub region: ResolvedValue,
}

impl RowDimensions {
    pub fn resolve(row: &UsageRow, tags: &TagConfig) -> Self {
        Self {
            team: resolve(row, Dimension::Team, tags),
            product: resolve(row, Dimension::Product, tags),
            environment: resolve(row, Dimension::Environment, tags),
            owner: resolve(row, Dimension::Owner, tags),
            region: resolve(row, Dimension::Region, tags),
        }
    }
}

/// Shared if an allocation-type tag carries a shared marker, or the resolved
/// team/product name contains "shared".
pub fn is_shared(row: &UsageRow, dims: &RowDimensions, tags: &TagConfig) -> bool {
    let marked = lookup_tag(row, &tags.allocation_type).is_some_and(|value| {
        tags.shared_markers.iter().any(|marker| value.eq_ignore_ascii_case(marker))
    });
    marked
        || dims.product.value.to_lowercase().contains("shared")
        || dims.team.value.to_lowercase().contains("shared")
}

/// A usage row with its basis cost, dimensions, and shared flag resolved.
#[derive(Debug, Clone)]
pub struct ClassifiedRow<'a> {
    pub row: &'a UsageRow,
    pub cost: f64,
    pub dims: RowDimensions,
    pub shared: bool,
}

impl<'a> ClassifiedRow<'a> {
    pub fn new(row: &'a UsageRow, basis: CostBasis, tags: &TagConfig) -> Self {
        let dims = RowDimensions::resolve(row, tags);
        let shared = is_shared(row, &dims, tags);
        Self { row, cost: basis.cost_of(row), dims, shared }
    }

    pub fn quantity(&self) -> f64 {
        self.row.consumed_quantity
    }
}

/// Classifies every row under `basis`.
pub fn classify<'a>(rows: &'a [UsageRow], basis: CostBasis, tags: &TagConfig) -> Vec<ClassifiedRow<'a>> {
    rows.iter().map(|row| ClassifiedRow::new(row, basis, tags)).collect()
}
