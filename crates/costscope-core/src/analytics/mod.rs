//! Cost analytics for a single request.
//!
//! Every component here is a pure function of already-fetched rows: window
//! resolution, aggregation, allocation, decomposition, benchmarks, forecast,
//! margin, and integrity checks.

pub mod aggregate;
pub mod allocation;
pub mod benchmark;
pub mod decomposition;
pub mod dimensions;
pub mod forecast;
pub mod integrity;
pub mod margin;
pub mod result;
pub mod window;

pub use aggregate::{TrendPoint, WindowAggregate, aggregate, aggregate_rows};
pub use allocation::{
    AllocationBucket, AllocationEngine, AllocationSummary, CompletenessScores, ConfidenceLevel, CoverageMetrics,
    SHARED_POOL_RULE,
};
pub use benchmark::{BenchmarkDimension, BenchmarkRow, BenchmarkSide, Benchmarks, build_benchmarks};
pub use decomposition::{ComponentKind, Decomposition, DecompositionComponent, DecompositionInputs, decompose};
pub use dimensions::{ClassifiedRow, CostBasis, Dimension, classify};
pub use forecast::{BreakEven, BreakEvenInputs, Drift, DriftDirection, Forecast, ForecastConfidence};
pub use integrity::{DecompositionBalance, GuardCheck, IntegrityReport};
pub use margin::MarginOverlay;
pub use result::{AnalysisResult, Comparison, ComparisonDeltas, Kpis, UnitEconomics, WindowRange, WindowSummary};
pub use window::{CompareMode, PeriodCode, TimeWindow, WindowPair, resolve_windows};
