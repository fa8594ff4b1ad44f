//! Reform scenarios: shock an exogenous series, re-solve, and report the
//! deviation from baseline.

use super::closure::{Closure, ClosureError};
use crate::model::Model;
use crate::solve::{solve_span, SolveError, SolveOptions, SolveSummary};
use crate::store::{PairedStore, Quarter, StoreError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// The headline output variable every deviation report is anchored on.
pub const GDP_VARIABLE: &str = "GDPM";

/// Which closure a reform solves under.
#[derive(Debug, Clone, Default)]
pub enum ReformClosure {
    /// The registry's default roles (GDP already a residual identity).
    #[default]
    None,
    /// The standard fiscal swap ([`Closure::fiscal`]).
    Fiscal,
    /// The investment closure ([`Closure::investment`]).
    Investment,
    Custom(Closure),
}

impl ReformClosure {
    fn resolve(&self) -> Option<Closure> {
        match self {
            ReformClosure::None => None,
            ReformClosure::Fiscal => Some(Closure::fiscal()),
            ReformClosure::Investment => Some(Closure::investment()),
            ReformClosure::Custom(c) => Some(c.clone()),
        }
    }
}

/// One policy experiment: an additive shock to an exogenous series over
/// a bounded window, solved over `start..=end`. After `periods` quarters
/// the series reverts to its baseline trajectory.
#[derive(Debug, Clone)]
pub struct Reform {
    pub name: String,
    pub variable: String,
    pub shock: f64,
    pub start: Quarter,
    pub end: Quarter,
    pub periods: usize,
    pub closure: ReformClosure,
}

impl Reform {
    pub fn new(
        name: impl Into<String>,
        variable: impl Into<String>,
        shock: f64,
        start: Quarter,
        end: Quarter,
        periods: usize,
    ) -> Self {
        Self {
            name: name.into(),
            variable: variable.into(),
            shock,
            start,
            end,
            periods,
            closure: ReformClosure::None,
        }
    }

    pub fn with_closure(mut self, closure: ReformClosure) -> Self {
        self.closure = closure;
        self
    }
}

/// One quarter of shocked-minus-baseline deviations. Monetary deltas are
/// in the model's native units (millions); `delta_gdp_bn` rescales to
/// billions for headline reporting. Component deltas are `None` when the
/// model does not carry that variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviationRow {
    pub period: Quarter,
    pub reform: String,
    pub delta_gdp_m: f64,
    pub delta_gdp_bn: f64,
    /// GDP deviation as a percentage of baseline GDP.
    pub pct_gdp: f64,
    pub delta_cons_m: Option<f64>,
    pub delta_if_m: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviationReport {
    pub rows: Vec<DeviationRow>,
}

impl DeviationReport {
    /// JSON for downstream charting/reporting; the engine itself never
    /// renders or persists results.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.rows)
    }
}

#[derive(Debug, Clone)]
pub struct ReformOutcome {
    pub reform: String,
    pub report: DeviationReport,
    /// Both solved paths, for follow-up queries beyond the report.
    pub stores: PairedStore,
    pub baseline: SolveSummary,
    pub shocked: SolveSummary,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScenarioError {
    #[error(transparent)]
    Closure(#[from] ClosureError),
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("reform '{reform}': shock window {start} +{periods}Q leaves the store span")]
    ShockWindow { reform: String, start: Quarter, periods: usize },
}

/// Runs reform scenarios against a calibrated model.
///
/// The simulator's own model is never mutated: every run clones it, so
/// independent reforms can execute in parallel.
#[derive(Debug, Clone)]
pub struct Simulator {
    model: Model,
    opts: SolveOptions,
}

impl Simulator {
    pub fn new(model: Model) -> Self {
        Self { model, opts: SolveOptions::default() }
    }

    pub fn with_options(model: Model, opts: SolveOptions) -> Self {
        Self { model, opts }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Baseline solve, shock, shocked solve, deviation report.
    pub fn run_reform(&self, reform: &Reform) -> Result<ReformOutcome, ScenarioError> {
        info!(
            reform = reform.name.as_str(),
            variable = reform.variable.as_str(),
            shock = reform.shock,
            periods = reform.periods,
            "running reform"
        );

        let mut model = self.model.clone();
        let closure = reform.closure.resolve();
        let plan = model.plan(closure.as_ref())?;

        // Baseline leg.
        let mut baseline_store = model.store().clone();
        let baseline =
            solve_span(&mut baseline_store, &plan, reform.start, reform.end, &self.opts, None)?;

        // Shocked leg: clone the solved baseline, perturb, re-solve. If
        // the plan governs the shocked variable it is exogenized first,
        // so the shock is not overwritten by its old equation.
        let shock_plan = match model.store().symbols().resolve(&reform.variable) {
            Some(id) if plan.governs(id) => {
                let extra = closure
                    .unwrap_or_else(|| Closure::new(reform.name.clone()))
                    .exogenize(&reform.variable);
                model.plan(Some(&extra))?
            }
            _ => plan.clone(),
        };

        let mut shocked_store = baseline_store.clone();
        let span = shocked_store.span();
        let t0 = span.index_of(reform.start).ok_or_else(|| ScenarioError::ShockWindow {
            reform: reform.name.clone(),
            start: reform.start,
            periods: reform.periods,
        })?;
        if t0 + reform.periods > span.len() {
            return Err(ScenarioError::ShockWindow {
                reform: reform.name.clone(),
                start: reform.start,
                periods: reform.periods,
            });
        }
        let id = shocked_store.resolve(&reform.variable)?;
        for p in 0..reform.periods {
            let t = t0 + p;
            let old = shocked_store.value(id, t).unwrap_or(f64::NAN);
            shocked_store.set(id, t, old + reform.shock);
        }

        let shocked =
            solve_span(&mut shocked_store, &shock_plan, reform.start, reform.end, &self.opts, None)?;

        let stores = PairedStore::new(baseline_store, shocked_store);
        let report = self.build_report(reform, &stores)?;
        Ok(ReformOutcome { reform: reform.name.clone(), report, stores, baseline, shocked })
    }

    /// Independent reforms have no data dependency on each other, so the
    /// batch runs them in parallel, each against its own model clone.
    pub fn run_reforms(&self, reforms: &[Reform]) -> Vec<Result<ReformOutcome, ScenarioError>> {
        reforms.par_iter().map(|r| self.run_reform(r)).collect()
    }

    fn build_report(
        &self,
        reform: &Reform,
        stores: &PairedStore,
    ) -> Result<DeviationReport, ScenarioError> {
        let span = stores.baseline().span();
        let t0 = span.index_of(reform.start).ok_or(SolveError::Horizon(reform.start))?;
        let t1 = span.index_of(reform.end).ok_or(SolveError::Horizon(reform.end))?;

        let mut rows = Vec::with_capacity(t1.saturating_sub(t0) + 1);
        for t in t0..=t1 {
            let q = span.quarter_at(t);
            let delta_gdp_m = stores.delta_at(GDP_VARIABLE, q)?;
            rows.push(DeviationRow {
                period: q,
                reform: reform.name.clone(),
                delta_gdp_m,
                delta_gdp_bn: delta_gdp_m / 1000.0,
                pct_gdp: stores.pct_of_gdp_at(GDP_VARIABLE, GDP_VARIABLE, q)?,
                delta_cons_m: stores.delta_at("CONS", q).ok(),
                delta_if_m: stores.delta_at("IF", q).ok(),
            });
        }
        Ok(DeviationReport { rows })
    }
}
