//! Add-factors: per-(variable, quarter) residuals that make behavioral
//! equations reproduce the calibrated baseline exactly.
//!
//! For each non-level equation, the residual is what the calibrated data
//! shows minus what the equation predicts from the same data. Adding it
//! back during a solve pins the baseline to the published path. Reform
//! runs solve without add-factors on both legs, so deviations compare
//! like with like.

use super::gauss_seidel::candidate;
use super::plan::SolvePlan;
use super::SolveError;
use crate::parse::Form;
use crate::store::{Quarter, VarId, VariableStore};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct AddFactors {
    map: HashMap<(VarId, usize), f64>,
}

impl AddFactors {
    /// Computes residuals over `from..=to` against the data already in
    /// `store`. Quarters where either the data or the prediction is not
    /// finite contribute nothing.
    pub fn compute(
        store: &VariableStore,
        plan: &SolvePlan,
        from: Quarter,
        to: Quarter,
    ) -> Result<AddFactors, SolveError> {
        let span = store.span();
        let t0 = span.index_of(from).ok_or(SolveError::Horizon(from))?;
        let t1 = span.index_of(to).ok_or(SolveError::Horizon(to))?;

        let mut map = HashMap::new();
        for t in t0..=t1 {
            for eq in &plan.equations {
                if eq.parsed.form == Form::Level {
                    continue;
                }
                let predicted = candidate(store, &eq.parsed, t)?;
                let actual = store.value(eq.target(), t).unwrap_or(f64::NAN);
                if predicted.is_finite() && actual.is_finite() {
                    map.insert((eq.target(), t), actual - predicted);
                }
            }
        }

        info!(count = map.len(), plan = plan.name.as_str(), "computed add-factors");
        Ok(AddFactors { map })
    }

    #[inline(always)]
    pub fn get(&self, var: VarId, t: usize) -> Option<f64> {
        self.map.get(&(var, t)).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
