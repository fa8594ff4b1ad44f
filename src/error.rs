//! Crate-level error aggregation for callers mixing build, solve and
//! scenario stages in one flow.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Parse(#[from] crate::parse::ParseError),
    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
    #[error(transparent)]
    Solve(#[from] crate::solve::SolveError),
    #[error(transparent)]
    Closure(#[from] crate::scenario::ClosureError),
    #[error(transparent)]
    Scenario(#[from] crate::scenario::ScenarioError),
}
