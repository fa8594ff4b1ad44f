//! Closure swaps and shock-scenario machinery.
pub mod closure;
pub mod reform;

pub use closure::{build_plan, Closure, ClosureError, RoleOverride};
pub use reform::{
    DeviationReport, DeviationRow, Reform, ReformClosure, ReformOutcome, ScenarioError, Simulator,
    GDP_VARIABLE,
};
