//! Baseline/shocked store pairing for deviation analysis.

use super::quarter::Quarter;
use super::variables::{StoreError, VariableStore};

/// The two solved paths of a scenario, side by side.
///
/// Deviation queries never mutate either store; the shocked store is a
/// clone taken before the baseline was perturbed, so isolation is
/// structural rather than disciplined.
#[derive(Debug, Clone)]
pub struct PairedStore {
    baseline: VariableStore,
    shocked: VariableStore,
}

impl PairedStore {
    pub fn new(baseline: VariableStore, shocked: VariableStore) -> Self {
        Self { baseline, shocked }
    }

    pub fn baseline(&self) -> &VariableStore {
        &self.baseline
    }

    pub fn shocked(&self) -> &VariableStore {
        &self.shocked
    }

    /// `shocked - baseline` for the full span.
    pub fn delta(&self, name: &str) -> Result<Vec<f64>, StoreError> {
        let base = self.baseline.series(name)?;
        let shock = self.shocked.series(name)?;
        Ok(shock.iter().zip(base).map(|(s, b)| s - b).collect())
    }

    pub fn delta_at(&self, name: &str, quarter: Quarter) -> Result<f64, StoreError> {
        Ok(self.shocked.value_at(name, quarter)? - self.baseline.value_at(name, quarter)?)
    }

    /// Deviation of `name` as a percentage of baseline `gdp` at `quarter`.
    pub fn pct_of_gdp_at(
        &self,
        name: &str,
        gdp: &str,
        quarter: Quarter,
    ) -> Result<f64, StoreError> {
        let delta = self.delta_at(name, quarter)?;
        let base_gdp = self.baseline.value_at(gdp, quarter)?;
        Ok(100.0 * delta / base_gdp)
    }
}
