//! Benchmark engine module
//!
//! Contains the measurement driver, the job runner seam it drives, and
//! mode planning for runs where the conditioning image is unavailable.

pub mod driver;

// Re-export commonly used types
pub use driver::{plan_modes, EngineJobRunner, JobRunner, MeasurementDriver};
