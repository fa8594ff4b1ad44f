//! The model facade: a registry plus its calibrated variable store.
//!
//! There is no process-wide "current model"; construct a `Model` once
//! from transpiled equations and calibration data, then solve as many
//! times as needed against clones.

use crate::registry::Registry;
use crate::scenario::closure::{build_plan, Closure, ClosureError};
use crate::solve::{solve_span, AddFactors, SolveError, SolveOptions, SolvePlan, SolveSummary};
use crate::store::{Quarter, Span, StoreError, VariableStore};

#[derive(Debug, Clone)]
pub struct Model {
    registry: Registry,
    store: VariableStore,
}

impl Model {
    /// A model over `span`, with one store column per registry symbol.
    pub fn new(registry: Registry, span: Span) -> Self {
        let store = VariableStore::with_symbols(registry.symbols().clone(), span);
        Self { registry, store }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut VariableStore {
        &mut self.store
    }

    /// Interns `name` in the registry's symbol table first, then mirrors
    /// it into the store. All calibration goes through here, so the two
    /// id spaces intern names in the same order and closure equations
    /// parsed later resolve against the right columns.
    fn ensure(&mut self, name: &str) {
        self.registry.symbols_mut().intern(name);
        self.store.sync(self.registry.symbols());
    }

    /// Sets a variable to a constant across the whole span.
    pub fn set(&mut self, name: &str, value: f64) {
        self.ensure(name);
        self.store.set_all(name, value);
    }

    pub fn set_at(&mut self, name: &str, quarter: Quarter, value: f64) -> Result<(), StoreError> {
        self.ensure(name);
        self.store.set_at(name, quarter, value)
    }

    /// Loads a series starting at the span's first quarter.
    pub fn load_series(&mut self, name: &str, values: &[f64]) -> Result<(), StoreError> {
        let start = self.store.span().start();
        self.load_series_from(name, start, values)
    }

    pub fn load_series_from(
        &mut self,
        name: &str,
        start: Quarter,
        values: &[f64],
    ) -> Result<(), StoreError> {
        self.ensure(name);
        self.store.load_series_from(name, start, values)
    }

    pub fn series(&self, name: &str) -> Result<&[f64], StoreError> {
        self.store.series(name)
    }

    pub fn value_at(&self, name: &str, quarter: Quarter) -> Result<f64, StoreError> {
        self.store.value_at(name, quarter)
    }

    /// Resolves a closure against the registry into a solve plan and
    /// grows the store to cover any symbols the closure introduced.
    pub fn plan(&mut self, closure: Option<&Closure>) -> Result<SolvePlan, ClosureError> {
        let plan = build_plan(&mut self.registry, closure)?;
        self.store.sync(self.registry.symbols());
        Ok(plan)
    }

    /// Solves the default closure over `from..=to`.
    pub fn run(
        &mut self,
        from: Quarter,
        to: Quarter,
        opts: &SolveOptions,
    ) -> Result<SolveSummary, SolveError> {
        let plan = SolvePlan::from_registry(&self.registry);
        solve_span(&mut self.store, &plan, from, to, opts, None)
    }

    /// Solves an explicit plan, optionally pinned to the calibrated
    /// baseline by add-factors.
    pub fn run_with(
        &mut self,
        plan: &SolvePlan,
        from: Quarter,
        to: Quarter,
        opts: &SolveOptions,
        add: Option<&AddFactors>,
    ) -> Result<SolveSummary, SolveError> {
        solve_span(&mut self.store, plan, from, to, opts, add)
    }

    pub fn compute_add_factors(
        &self,
        plan: &SolvePlan,
        from: Quarter,
        to: Quarter,
    ) -> Result<AddFactors, SolveError> {
        AddFactors::compute(&self.store, plan, from, to)
    }

    /// Adds `shock` to `name` for `periods` quarters starting at
    /// `start`. The window must fit inside the span.
    pub fn apply_shock(
        &mut self,
        name: &str,
        shock: f64,
        start: Quarter,
        periods: usize,
    ) -> Result<(), StoreError> {
        let span = self.store.span();
        let t0 = span.index_of(start).ok_or(StoreError::OutsideSpan(start))?;
        if t0 + periods > span.len() {
            return Err(StoreError::SeriesOverrun { variable: name.to_string(), start });
        }
        let id = self.store.resolve(name)?;
        for t in t0..t0 + periods {
            let old = self.store.value(id, t).unwrap_or(f64::NAN);
            self.store.set(id, t, old + shock);
        }
        Ok(())
    }
}
