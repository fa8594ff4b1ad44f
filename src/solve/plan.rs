//! The executable view of a registry under a closure.

use crate::registry::{Equation, Registry};
use crate::store::VarId;

/// An immutable equation list ready to solve: the registry's equations
/// with any closure overrides already merged in. The registry itself is
/// never modified; a plan owns copies.
///
/// Invariant (enforced by the constructors' callers): targets are
/// unique, so every endogenous variable has exactly one governing
/// equation.
#[derive(Debug, Clone)]
pub struct SolvePlan {
    pub name: String,
    pub equations: Vec<Equation>,
    endogenous: Vec<VarId>,
}

impl SolvePlan {
    pub fn new(name: impl Into<String>, equations: Vec<Equation>) -> Self {
        let endogenous = equations.iter().map(|eq| eq.target()).collect();
        Self { name: name.into(), equations, endogenous }
    }

    /// The registry's default closure: its own equation list, in order.
    pub fn from_registry(registry: &Registry) -> Self {
        Self::new("default", registry.equations().to_vec())
    }

    /// Targets of the plan's equations, in plan order.
    pub fn endogenous(&self) -> &[VarId] {
        &self.endogenous
    }

    pub fn governs(&self, var: VarId) -> bool {
        self.endogenous.contains(&var)
    }
}
