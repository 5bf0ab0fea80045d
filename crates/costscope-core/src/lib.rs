//! Costscope Core - unit economics and cost allocation engine.
//!
//! This crate turns a time-scoped set of usage rows into:
//! - team/product/environment allocation with shared-pool redistribution
//! - unit-cost decomposition, drift, and period-over-period benchmarks
//! - forecast, break-even, and margin overlays
//! - integrity checks that reconcile every figure back to the source rows
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chrono::NaiveDate;
//! use costscope_core::{EngineConfig, EngineRequest, UnitEconomicsEngine};
//! use costscope_source::InMemoryRowSource;
//!
//! # async fn run() -> costscope_core::Result<()> {
//! let source = Arc::new(InMemoryRowSource::new());
//! let engine = UnitEconomicsEngine::new(source, EngineConfig::default());
//! let now = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap_or_default();
//! let result = engine.analyze(&EngineRequest::new(now).with_period("last_30_days")).await?;
//! println!("{}", result.to_json());
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod numeric;
pub mod report;

pub use analytics::{
    AllocationSummary, AnalysisResult, CompareMode, CompletenessScores, CostBasis, PeriodCode, TimeWindow, WindowPair,
    resolve_windows,
};
pub use cache::{CacheKey, ResultCache};
pub use config::EngineConfig;
pub use engine::{EngineRequest, UnitEconomicsEngine, compute_analysis};
pub use error::{EngineError, Result};
pub use report::SummaryFormatter;
