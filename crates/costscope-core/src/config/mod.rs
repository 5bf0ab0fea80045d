//! Engine configuration.
//!
//! Every tolerance, threshold, and tag alias list the engine uses lives here so the
//! numeric conventions stay documented in one place and can be tuned per deployment.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Numeric tolerances used by the integrity validators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceConfig {
    /// Epsilon for monetary reconciliation (allocation totals vs. source totals).
    pub money_epsilon: f64,
    /// Epsilon for unit-cost closure of the decomposition waterfall.
    pub unit_cost_epsilon: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self { money_epsilon: 0.01, unit_cost_epsilon: 0.0002 }
    }
}

/// Allocation confidence scoring.
///
/// Score = `coverage_weight * mean(team%, owner%, product%)`
/// `+ shared_pool_weight * (100 - shared%)`
/// `+ billing_completeness_weight * billing + volume_completeness_weight * volume`, clamped to [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Scores strictly below this are `low`.
    pub low_below: f64,
    /// Scores strictly below this (and not low) are `medium`; the rest are `high`.
    pub medium_below: f64,
    pub coverage_weight: f64,
    pub shared_pool_weight: f64,
    pub billing_completeness_weight: f64,
    pub volume_completeness_weight: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            low_below: 50.0,
            medium_below: 80.0,
            coverage_weight: 0.5,
            shared_pool_weight: 0.2,
            billing_completeness_weight: 0.15,
            volume_completeness_weight: 0.15,
        }
    }
}

/// Forecast horizon and volatility banding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub default_horizon_days: u32,
    pub min_horizon_days: u32,
    pub max_horizon_days: u32,
    /// Number of trailing trend points averaged for the projection.
    pub moving_average_days: usize,
    /// Volatility (%) at or above which confidence drops to `medium`.
    pub medium_volatility_pct: f64,
    /// Volatility (%) at or above which confidence drops to `low`.
    pub low_volatility_pct: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            default_horizon_days: 14,
            min_horizon_days: 7,
            max_horizon_days: 30,
            moving_average_days: 7,
            medium_volatility_pct: 15.0,
            low_volatility_pct: 35.0,
        }
    }
}

/// Unit-price drift detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Absolute drift (%) at or above which drift is flagged as significant.
    pub threshold_pct: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self { threshold_pct: 10.0 }
    }
}

/// Ordered candidate tag keys per dimension. The first non-empty match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    pub team: Vec<String>,
    pub product: Vec<String>,
    pub environment: Vec<String>,
    pub owner: Vec<String>,
    pub region: Vec<String>,
    /// Keys whose value marks a row's allocation type.
    pub allocation_type: Vec<String>,
    /// Allocation-type values that classify a row as shared.
    pub shared_markers: Vec<String>,
    /// Tag keys carrying business revenue, in priority order.
    pub revenue: Vec<String>,
}

fn keys(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            team: keys(&["team", "team_name", "owner_team", "cost_center_team"]),
            product: keys(&["product", "product_name", "application", "app"]),
            environment: keys(&["environment", "env", "stage"]),
            owner: keys(&["owner", "owner_email", "created_by"]),
            region: keys(&["region", "location"]),
            allocation_type: keys(&["allocation_type", "cost_allocation", "allocation"]),
            shared_markers: keys(&["shared", "common", "platform_shared"]),
            revenue: keys(&["revenue", "revenue_amount", "business_revenue", "gross_revenue"]),
        }
    }
}

/// Optional result memoization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: false, ttl_seconds: 60 }
    }
}

/// Root configuration for the unit economics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Period code used when a request carries none.
    pub default_period: String,
    pub tolerances: ToleranceConfig,
    pub confidence: ConfidenceConfig,
    pub forecast: ForecastConfig,
    pub drift: DriftConfig,
    pub tags: TagConfig,
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_period: "last_30_days".to_string(),
            tolerances: ToleranceConfig::default(),
            confidence: ConfidenceConfig::default(),
            forecast: ForecastConfig::default(),
            drift: DriftConfig::default(),
            tags: TagConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load engine configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns error if any value would break the engine's numeric conventions.
    pub fn validate(&self) -> Result<()> {
        let t = &self.tolerances;
        if !(t.money_epsilon > 0.0) || !(t.unit_cost_epsilon > 0.0) {
            return Err(EngineError::Config("tolerances must be > 0".to_string()));
        }

        let c = &self.confidence;
        if !(0.0..=100.0).contains(&c.low_below) || !(0.0..=100.0).contains(&c.medium_below) {
            return Err(EngineError::Config("confidence thresholds must be within 0..=100".to_string()));
        }
        if c.low_below > c.medium_below {
            return Err(EngineError::Config(format!(
                "confidence.low_below ({}) must not exceed confidence.medium_below ({})",
                c.low_below, c.medium_below
            )));
        }
        let weights = [
            c.coverage_weight,
            c.shared_pool_weight,
            c.billing_completeness_weight,
            c.volume_completeness_weight,
        ];
        if weights.iter().any(|w| !(*w >= 0.0)) {
            return Err(EngineError::Config("confidence weights must be >= 0".to_string()));
        }

        let f = &self.forecast;
        if f.min_horizon_days == 0 || f.min_horizon_days > f.max_horizon_days {
            return Err(EngineError::Config(format!(
                "invalid forecast horizon range {}..={}",
                f.min_horizon_days, f.max_horizon_days
            )));
        }
        if f.moving_average_days == 0 {
            return Err(EngineError::Config("forecast.moving_average_days must be > 0".to_string()));
        }
        if f.medium_volatility_pct > f.low_volatility_pct {
            return Err(EngineError::Config(
                "forecast.medium_volatility_pct must not exceed forecast.low_volatility_pct".to_string(),
            ));
        }

        if self.drift.threshold_pct < 0.0 {
            return Err(EngineError::Config("drift.threshold_pct must be >= 0".to_string()));
        }

        let tags = &self.tags;
        for (name, list) in [
            ("team", &tags.team),
            ("product", &tags.product),
            ("environment", &tags.environment),
            ("owner", &tags.owner),
            ("region", &tags.region),
            ("revenue", &tags.revenue),
        ] {
            if list.is_empty() {
                return Err(EngineError::Config(format!("tags.{} must list at least one key", name)));
            }
        }

        if self.default_period.trim().is_empty() {
            return Err(EngineError::Config("default_period must not be empty".to_string()));
        }

        Ok(())
    }
}
