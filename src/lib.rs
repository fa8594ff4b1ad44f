//! Quarterly macroeconomic model engine.
//!
//! Re-implements the equation system of a published macro forecasting
//! model: a transpiler from the model's equation notation into
//! executable expression trees over time-indexed variables, a
//! Gauss-Seidel fixed-point solver for the densely coupled quarterly
//! system, and the closure/scenario machinery that swaps variable roles
//! and reports shocked-vs-baseline deviations.
//!
//! Typical flow:
//!
//! ```no_run
//! use macrosolve::{Model, Quarter, Reform, Registry, Simulator, SourceOptions, Span};
//!
//! # fn main() -> Result<(), macrosolve::ModelError> {
//! let registry = Registry::from_source(include_str!("../demos/demand.eqs"), &SourceOptions::default())?;
//! let span = Span::new("1970Q1".parse().unwrap(), "2030Q4".parse().unwrap()).unwrap();
//! let mut model = Model::new(registry, span);
//! model.set("CGG", 420_000.0);
//! // ... load remaining calibration series ...
//!
//! let sim = Simulator::new(model);
//! let reform = Reform::new(
//!     "gov spending",
//!     "CGG",
//!     1250.0,
//!     "2025Q1".parse::<Quarter>().unwrap(),
//!     "2027Q4".parse::<Quarter>().unwrap(),
//!     4,
//! );
//! let outcome = sim.run_reform(&reform)?;
//! println!("{}", outcome.report.to_json().unwrap());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod model;
pub mod parse;
pub mod registry;
pub mod scenario;
pub mod solve;
pub mod store;

pub use error::ModelError;
pub use model::Model;
pub use registry::{Group, Registry, RegistryError, SourceOptions};
pub use scenario::{
    Closure, ClosureError, DeviationReport, DeviationRow, Reform, ReformClosure, ReformOutcome,
    ScenarioError, Simulator,
};
pub use solve::{
    AddFactors, OrderingStrategy, SolveError, SolveOptions, SolvePlan, SolveSummary,
};
pub use store::{PairedStore, Quarter, Span, StoreError, VariableStore};
