//! Data models module
//!
//! Contains run samples, benchmark result records, the derived
//! performance metrics computed from them, and the identifiers exchanged
//! with the generation server.

pub mod ids;
pub mod result;

// Re-export commonly used types
pub use ids::{AssetHandle, CorrelationId, JobId};
pub use result::{BenchmarkResult, PerformanceMetrics, Resolution, RunSample, SamplePhase};
