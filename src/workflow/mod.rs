//! Execution graph construction
//!
//! Builds the fixed family of parameterized graphs submitted to the
//! generation server. Pure data, no I/O.

pub mod graph;
pub mod slots;
pub mod templates;

pub use graph::{GraphBuilder, InputValue, Inputs, Literal, NodeHandle, NodeRef, NodeSpec, WorkflowGraph};
pub use templates::{GraphTemplate, JobParams};
