//! Cross-implementation consensus benchmark harness.
//!
//! Drives a reference node through a fixed set of workloads, normalizes a
//! second implementation's statistics report into the same canonical keys,
//! and joins the two into a comparison report.

pub mod benches;
pub mod compare;
pub mod criterion_report;
pub mod error;
pub mod harness;
pub mod node;
pub mod normalize;
pub mod report;
pub mod schema;

pub use error::{ControllerError, ReportError, WorkloadError};
pub use harness::{BenchConfig, Profile};
