//! Team/product/environment cost allocation with shared-pool redistribution.
//!
//! Direct costs are bucketed by `(team, product, environment)`. The shared pool
//! (rows tagged or inferred as shared) is redistributed to buckets in proportion
//! to their direct cost, so bucket totals partition the window total.

use std::collections::BTreeMap;

use costscope_source::UsageRow;
use serde::{Deserialize, Serialize};

use super::dimensions::{ClassifiedRow, CostBasis, classify};
use crate::config::{ConfidenceConfig, EngineConfig};
use crate::numeric::{apportion_money, round_money, round_pct, round_unit, safe_div, share_pct};

/// Redistribution rule reported with every allocation.
pub const SHARED_POOL_RULE: &str = "proportional_direct_cost";

/// Bucket identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub team: String,
    pub product: String,
    pub environment: String,
}

/// Allocated cost for one `(team, product, environment)` combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationBucket {
    pub team: String,
    pub product: String,
    pub environment: String,
    pub direct_cost: f64,
    pub shared_allocated_cost: f64,
    /// Shared cost that could not be redistributed (only when no direct cost exists).
    pub unallocated_shared_cost: f64,
    pub quantity: f64,
    pub total_cost: f64,
}

impl AllocationBucket {
    fn new(key: BucketKey) -> Self {
        Self {
            team: key.team,
            product: key.product,
            environment: key.environment,
            direct_cost: 0.0,
            shared_allocated_cost: 0.0,
            unallocated_shared_cost: 0.0,
            quantity: 0.0,
            total_cost: 0.0,
        }
    }

    pub fn rounded(&self) -> Self {
        Self {
            team: self.team.clone(),
            product: self.product.clone(),
            environment: self.environment.clone(),
            direct_cost: round_money(self.direct_cost),
            shared_allocated_cost: round_money(self.shared_allocated_cost),
            unallocated_shared_cost: round_money(self.unallocated_shared_cost),
            quantity: round_unit(self.quantity),
            total_cost: round_money(self.total_cost),
        }
    }
}

/// Tag coverage as a share of total cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageMetrics {
    pub team_pct: f64,
    pub owner_pct: f64,
    pub product_pct: f64,
    /// Cost not attributable to any team: `max(0, total - spend_with_team)`.
    pub unallocated_amount: f64,
}

impl CoverageMetrics {
    pub fn rounded(&self) -> Self {
        Self {
            team_pct: round_pct(self.team_pct),
            owner_pct: round_pct(self.owner_pct),
            product_pct: round_pct(self.product_pct),
            unallocated_amount: round_money(self.unallocated_amount),
        }
    }
}

/// Allocation confidence bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Allocation confidence score in [0, 100] and its level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationConfidence {
    pub score: f64,
    pub level: ConfidenceLevel,
}

/// Externally supplied data-completeness scores, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessScores {
    pub billing: f64,
    pub volume: f64,
}

impl Default for CompletenessScores {
    fn default() -> Self {
        Self { billing: 100.0, volume: 100.0 }
    }
}

/// Output of the allocation engine for one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSummary {
    pub rule: String,
    pub buckets: Vec<AllocationBucket>,
    pub total_cost: f64,
    pub direct_cost_total: f64,
    pub shared_pool_total: f64,
    pub shared_pool_allocated: f64,
    pub unallocated_shared_cost: f64,
    pub coverage: CoverageMetrics,
    pub confidence: AllocationConfidence,
}

impl AllocationSummary {
    /// Empty allocation with every figure zero.
    pub fn empty() -> Self {
        Self { rule: SHARED_POOL_RULE.to_string(), ..Default::default() }
    }

    /// Sum of bucket totals.
    pub fn bucket_total(&self) -> f64 {
        self.buckets.iter().map(|b| b.total_cost).sum()
    }

    /// Rounds for output. Bucket totals are apportioned to cents so they still sum
    /// to the rounded total, and shared shares sum to the rounded pool figures.
    pub fn rounded(&self) -> Self {
        let totals: Vec<f64> = self.buckets.iter().map(|b| b.total_cost).collect();
        let shared: Vec<f64> = self.buckets.iter().map(|b| b.shared_allocated_cost).collect();
        let unallocated: Vec<f64> = self.buckets.iter().map(|b| b.unallocated_shared_cost).collect();
        let totals = apportion_money(&totals, self.total_cost);
        let shared = apportion_money(&shared, self.shared_pool_allocated);
        let unallocated = apportion_money(&unallocated, self.unallocated_shared_cost);

        let buckets = self
            .buckets
            .iter()
            .enumerate()
            .map(|(i, bucket)| AllocationBucket {
                direct_cost: round_money(totals[i] - shared[i] - unallocated[i]),
                shared_allocated_cost: shared[i],
                unallocated_shared_cost: unallocated[i],
                total_cost: totals[i],
                ..bucket.rounded()
            })
            .collect();

        Self {
            rule: self.rule.clone(),
            buckets,
            total_cost: round_money(self.total_cost),
            direct_cost_total: round_money(self.direct_cost_total),
            shared_pool_total: round_money(self.shared_pool_total),
            shared_pool_allocated: round_money(self.shared_pool_allocated),
            unallocated_shared_cost: round_money(self.unallocated_shared_cost),
            coverage: self.coverage.rounded(),
            confidence: AllocationConfidence {
                score: round_pct(self.confidence.score),
                level: self.confidence.level,
            },
        }
    }
}

/// Splits `pool` across keys proportionally to their weight.
///
/// Returns an empty map when the total weight is not positive; callers must then
/// keep the pool unallocated rather than divide by zero.
pub fn redistribute<K: Ord + Clone>(weights: &BTreeMap<K, f64>, pool: f64) -> BTreeMap<K, f64> {
    let total: f64 = weights.values().sum();
    if total <= 0.0 {
        return BTreeMap::new();
    }
    weights
        .iter()
        .map(|(key, weight)| (key.clone(), pool * safe_div(*weight, total)))
        .collect()
}

/// Maps a confidence score onto its level. Monotonic in `score`.
pub fn confidence_level(score: f64, config: &ConfidenceConfig) -> ConfidenceLevel {
    if score < config.low_below {
        ConfidenceLevel::Low
    } else if score < config.medium_below {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::High
    }
}

/// Weighted confidence score, clamped to [0, 100].
pub fn confidence_score(
    coverage: &CoverageMetrics,
    shared_ratio_pct: f64,
    completeness: CompletenessScores,
    config: &ConfidenceConfig,
) -> f64 {
    let tag_coverage = (coverage.team_pct + coverage.owner_pct + coverage.product_pct) / 3.0;
    let score = config.coverage_weight * tag_coverage
        + config.shared_pool_weight * (100.0 - shared_ratio_pct.clamp(0.0, 100.0))
        + config.billing_completeness_weight * completeness.billing.clamp(0.0, 100.0)
        + config.volume_completeness_weight * completeness.volume.clamp(0.0, 100.0);
    if score.is_finite() { score.clamp(0.0, 100.0) } else { 0.0 }
}

/// Allocation engine for a single window's rows.
pub struct AllocationEngine<'a> {
    config: &'a EngineConfig,
}

impl<'a> AllocationEngine<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Classifies raw rows under `basis` and allocates them.
    pub fn allocate_rows(&self, rows: &[UsageRow], basis: CostBasis, completeness: CompletenessScores) -> AllocationSummary {
        self.allocate(&classify(rows, basis, &self.config.tags), completeness)
    }

    /// Allocates classified rows.
    pub fn allocate(&self, rows: &[ClassifiedRow<'_>], completeness: CompletenessScores) -> AllocationSummary {
        let mut buckets: BTreeMap<BucketKey, AllocationBucket> = BTreeMap::new();
        let mut shared_rows: Vec<&ClassifiedRow<'_>> = Vec::new();
        let mut total_cost = 0.0;
        let mut shared_pool_total = 0.0;
        let mut spend_with_team = 0.0;
        let mut spend_with_owner = 0.0;
        let mut spend_with_product = 0.0;

        for row in rows {
            total_cost += row.cost;
            if row.dims.team.explicit {
                spend_with_team += row.cost;
            }
            if row.dims.owner.explicit {
                spend_with_owner += row.cost;
            }
            if row.dims.product.explicit {
                spend_with_product += row.cost;
            }

            if row.shared {
                shared_pool_total += row.cost;
                shared_rows.push(row);
            } else {
                let bucket = buckets.entry(bucket_key(row)).or_insert_with_key(|k| AllocationBucket::new(k.clone()));
                bucket.direct_cost += row.cost;
                bucket.quantity += row.quantity();
            }
        }

        let direct_weights: BTreeMap<BucketKey, f64> =
            buckets.iter().map(|(key, bucket)| (key.clone(), bucket.direct_cost)).collect();
        let direct_cost_total: f64 = direct_weights.values().sum();
        let shares = redistribute(&direct_weights, shared_pool_total);

        let mut shared_pool_allocated = 0.0;
        let mut unallocated_shared_cost = 0.0;
        if shares.is_empty() {
            // No direct cost to weight by: shared rows stay with their own keys, unallocated.
            for row in shared_rows {
                let bucket = buckets.entry(bucket_key(row)).or_insert_with_key(|k| AllocationBucket::new(k.clone()));
                bucket.unallocated_shared_cost += row.cost;
                bucket.quantity += row.quantity();
                unallocated_shared_cost += row.cost;
            }
        } else {
            for (key, share) in shares {
                if let Some(bucket) = buckets.get_mut(&key) {
                    bucket.shared_allocated_cost += share;
                    shared_pool_allocated += share;
                }
            }
        }

        let mut buckets: Vec<AllocationBucket> = buckets
            .into_values()
            .map(|mut bucket| {
                bucket.total_cost = bucket.direct_cost + bucket.shared_allocated_cost + bucket.unallocated_shared_cost;
                bucket
            })
            .collect();
        buckets.sort_by(|a, b| {
            b.total_cost
                .partial_cmp(&a.total_cost)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (&a.team, &a.product, &a.environment).cmp(&(&b.team, &b.product, &b.environment)))
        });

        let coverage = CoverageMetrics {
            team_pct: share_pct(spend_with_team, total_cost),
            owner_pct: share_pct(spend_with_owner, total_cost),
            product_pct: share_pct(spend_with_product, total_cost),
            unallocated_amount: (total_cost - spend_with_team).max(0.0),
        };

        let confidence = if rows.is_empty() {
            AllocationConfidence::default()
        } else {
            let shared_ratio_pct = share_pct(shared_pool_total, total_cost);
            let score = confidence_score(&coverage, shared_ratio_pct, completeness, &self.config.confidence);
            AllocationConfidence { score, level: confidence_level(score, &self.config.confidence) }
        };

        AllocationSummary {
            rule: SHARED_POOL_RULE.to_string(),
            buckets,
            total_cost,
            direct_cost_total,
            shared_pool_total,
            shared_pool_allocated,
            unallocated_shared_cost,
            coverage,
            confidence,
        }
    }
}

fn bucket_key(row: &ClassifiedRow<'_>) -> BucketKey {
    BucketKey {
        team: row.dims.team.value.clone(),
        product: row.dims.product.value.clone(),
        environment: row.dims.environment.value.clone(),
    }
}
