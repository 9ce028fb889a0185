//! Generation server client
//!
//! HTTP endpoints (liveness, submission, asset upload), the per-job event
//! stream monitor, and conditioning image staging.

pub mod asset;
pub mod http;
pub mod monitor;

pub use asset::AssetStager;
pub use http::EngineClient;
pub use monitor::{EngineEvent, ExecutionMonitor, MonitorState, ProgressUpdate};
