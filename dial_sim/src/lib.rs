//! DIAL scenario harness.
//!
//! Ships a handful of classic distributed algorithms and topologies, a
//! catalogue of scenarios combining them, and a runner that drives each
//! scenario through the simulator while checking that every step can be
//! undone and replayed exactly.
//!
//! # Usage
//!
//! ```
//! use dial_sim::{ScenarioId, ScenarioRunner};
//!
//! let result = ScenarioRunner::new(42).with_steps(50).run(ScenarioId::Echo);
//! assert!(result.passed);
//! ```

pub mod algorithms;
pub mod topologies;
pub mod scenarios;
mod runner;
mod exporter;

pub use exporter::SimExport;
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
