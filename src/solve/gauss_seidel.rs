//! Gauss-Seidel iteration over one quarter of the coupled system.
//!
//! Each pass evaluates every equation in plan order and immediately
//! overwrites its target's current-quarter value, so later equations in
//! the same pass see the fresh values of earlier ones. The pass repeats
//! until the maximum relative change across endogenous variables drops
//! below tolerance, or fails loudly at the iteration cap.

use super::addfactor::AddFactors;
use super::ordering::execution_order;
use super::plan::SolvePlan;
use super::{SolveError, SolveOptions, SolveSummary};
use crate::parse::{Form, ParsedEquation, Role};
use crate::store::{Quarter, Snapshot, StoreError, VarId, VariableStore};
use std::collections::HashSet;
use tracing::{debug, info, trace};

/// The value an equation assigns to its target this quarter, before any
/// add-factor. Non-level forms anchor on the target's own lag.
pub(crate) fn candidate(
    store: &VariableStore,
    parsed: &ParsedEquation,
    t: usize,
) -> Result<f64, StoreError> {
    let snap = Snapshot::new(store, t);
    let rhs = parsed.rhs.eval(&snap)?;
    Ok(match parsed.form {
        Form::Level => rhs,
        Form::Diff => snap.get(parsed.target, -1)? + rhs,
        Form::LogDiff => snap.get(parsed.target, -1)? * rhs.exp(),
        Form::Ratio => snap.get(parsed.target, -1)? * rhs,
    })
}

/// Seeds unset endogenous values with the prior quarter's value, so the
/// first pass iterates from a plausible point instead of NaN.
fn seed(store: &mut VariableStore, plan: &SolvePlan, t: usize) {
    if t == 0 {
        return;
    }
    for &var in plan.endogenous() {
        let current = store.value(var, t).unwrap_or(f64::NAN);
        if current.is_nan() {
            if let Some(prior) = store.value(var, t - 1) {
                if prior.is_finite() {
                    store.set(var, t, prior);
                }
            }
        }
    }
}

/// Solves one quarter. `order` is the pass order from
/// [`execution_order`], resolved once per horizon. Returns the number of
/// passes taken.
pub fn solve_quarter(
    store: &mut VariableStore,
    plan: &SolvePlan,
    order: &[usize],
    t: usize,
    opts: &SolveOptions,
    add: Option<&AddFactors>,
) -> Result<u32, SolveError> {
    seed(store, plan, t);

    // Targets read at offset zero by an equation that runs earlier in
    // the pass. If such a target only obtains its first finite value
    // mid-pass, the earlier reader saw NaN and the pass must repeat;
    // any other cold target settles in the pass that computes it.
    let mut seen_reads: HashSet<VarId> = HashSet::new();
    let mut alive_forces_pass: HashSet<VarId> = HashSet::new();
    for &i in order {
        let eq = &plan.equations[i];
        if seen_reads.contains(&eq.target()) {
            alive_forces_pass.insert(eq.target());
        }
        for read in &eq.parsed.reads {
            if read.offset == 0 {
                seen_reads.insert(read.var);
            }
        }
    }

    let mut worst = f64::INFINITY;
    let mut worst_var: Option<VarId> = None;

    for iter in 1..=opts.max_iter {
        let prev: Vec<f64> = plan
            .endogenous()
            .iter()
            .map(|&v| store.value(v, t).unwrap_or(f64::NAN))
            .collect();

        for &i in order {
            let eq = &plan.equations[i];
            let mut value = candidate(store, &eq.parsed, t)?;
            if let Some(add) = add {
                value += add.get(eq.target(), t).unwrap_or(0.0);
            }
            if value.is_finite() {
                store.set(eq.target(), t, value);
            } else {
                // Transient NaN/inf while the system is still far from
                // its fixed point: keep the previous value. A persistent
                // one surfaces as NonConvergence or NotFinite below.
                trace!(
                    variable = eq.parsed.source.as_str(),
                    "skipped non-finite update"
                );
            }
        }

        worst = 0.0;
        worst_var = None;
        for (k, &var) in plan.endogenous().iter().enumerate() {
            let old = prev[k];
            let new = store.value(var, t).unwrap_or(f64::NAN);
            let delta = if old.is_finite() && new.is_finite() {
                (new - old).abs() / old.abs().max(opts.rel_floor)
            } else if new.is_finite() && alive_forces_pass.contains(&var) {
                // Came alive after an earlier equation had already read
                // it as NaN; that reader has not seen it settle.
                f64::INFINITY
            } else {
                continue;
            };
            if delta > worst {
                worst = delta;
                worst_var = Some(var);
            }
        }

        if worst < opts.tol {
            // Converged, but an endogenous variable that never obtained
            // a finite value is a missing-data failure, not a solution.
            for &var in plan.endogenous() {
                let value = store.value(var, t).unwrap_or(f64::NAN);
                if !value.is_finite() {
                    return Err(SolveError::NotFinite {
                        quarter: store.span().quarter_at(t),
                        variable: store.symbols().name(var).to_string(),
                    });
                }
            }
            return Ok(iter);
        }
    }

    let quarter = store.span().quarter_at(t);
    let variable = worst_var
        .map(|v| store.symbols().name(v).to_string())
        .unwrap_or_else(|| "<none>".to_string());
    Err(SolveError::NonConvergence {
        quarter,
        variable,
        residual: worst,
        iterations: opts.max_iter,
    })
}

/// Solves every quarter from `from` to `to` inclusive, strictly in
/// order: lags read already-solved quarters, so quarters cannot be
/// reordered or parallelized within one scenario.
pub fn solve_span(
    store: &mut VariableStore,
    plan: &SolvePlan,
    from: Quarter,
    to: Quarter,
    opts: &SolveOptions,
    add: Option<&AddFactors>,
) -> Result<SolveSummary, SolveError> {
    let span = store.span();
    let t0 = span.index_of(from).ok_or(SolveError::Horizon(from))?;
    let t1 = span.index_of(to).ok_or(SolveError::Horizon(to))?;
    if t1 < t0 {
        return Err(SolveError::Horizon(to));
    }

    let order = execution_order(plan, opts.ordering);
    let mut iterations = Vec::with_capacity(t1 - t0 + 1);
    for t in t0..=t1 {
        let iters = solve_quarter(store, plan, &order, t, opts, add)?;
        debug!(quarter = %span.quarter_at(t), iters, plan = plan.name.as_str(), "converged");
        iterations.push((span.quarter_at(t), iters));
    }

    let summary = SolveSummary { iterations };
    info!(
        plan = plan.name.as_str(),
        quarters = summary.quarters(),
        total_iterations = summary.total_iterations(),
        "solve complete"
    );
    Ok(summary)
}

/// Residuals of level-form identity equations at `t`: for each, the
/// absolute difference between the stored target value and its
/// re-evaluated right-hand side. All near zero once a quarter has
/// converged.
pub fn identity_gaps(
    store: &VariableStore,
    plan: &SolvePlan,
    t: usize,
) -> Result<Vec<(VarId, f64)>, SolveError> {
    let mut gaps = Vec::new();
    for eq in &plan.equations {
        let p = &eq.parsed;
        if p.role != Role::Identity || p.form != Form::Level {
            continue;
        }
        let rhs = p.rhs.eval(&Snapshot::new(store, t))?;
        let actual = store.value(p.target, t).unwrap_or(f64::NAN);
        gaps.push((p.target, (actual - rhs).abs()));
    }
    Ok(gaps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, SourceOptions};
    use crate::store::Span;

    fn q(s: &str) -> Quarter {
        s.parse().unwrap()
    }

    fn setup(src: &str, exog: &[(&str, f64)]) -> (SolvePlan, VariableStore) {
        let registry = Registry::from_source(src, &SourceOptions::default()).unwrap();
        let plan = SolvePlan::from_registry(&registry);
        let span = Span::new(q("2024Q1"), q("2026Q4")).unwrap();
        let mut store = VariableStore::with_symbols(registry.symbols().clone(), span);
        for (name, v) in exog {
            store.set_all(name, *v);
        }
        (plan, store)
    }

    const DEMAND_BLOCK: &str = "\
@group consumption
CONS = 100 + 0.6 * YD
@group income
YD = GDPM - TAX
TAX = 0.25 * GDPM
@group gdp
GDPM = CONS + IF + CGG + DINV + (X - M)
";

    #[test]
    fn pure_identity_with_known_inputs_is_exact_in_one_pass() {
        let (plan, mut store) = setup(
            "GDPM = CONS + IF + CGG + DINV + (X - M)\n",
            &[
                ("CONS", 1650.0),
                ("IF", 400.0),
                ("CGG", 420.0),
                ("DINV", 10.0),
                ("X", 820.0),
                ("M", 780.0),
            ],
        );
        let opts = SolveOptions::default();
        let order = execution_order(&plan, opts.ordering);
        let iters = solve_quarter(&mut store, &plan, &order, 0, &opts, None).unwrap();
        assert_eq!(iters, 1);
        assert_eq!(store.value_at("GDPM", q("2024Q1")).unwrap(), 2520.0);
    }

    #[test]
    fn simultaneous_block_converges_to_the_fixed_point() {
        let (plan, mut store) = setup(
            DEMAND_BLOCK,
            &[
                ("IF", 200.0),
                ("CGG", 300.0),
                ("DINV", 50.0),
                ("X", 150.0),
                ("M", 100.0),
                // Calibration starting guesses for the endogenous block.
                ("GDPM", 1000.0),
                ("CONS", 500.0),
                ("YD", 800.0),
                ("TAX", 250.0),
            ],
        );
        let opts = SolveOptions::default();
        let summary =
            solve_span(&mut store, &plan, q("2024Q1"), q("2024Q4"), &opts, None).unwrap();
        assert_eq!(summary.quarters(), 4);

        // GDPM = 100 + 0.45*GDPM + 600  =>  GDPM = 700 / 0.55
        let expected = 700.0 / 0.55;
        let got = store.value_at("GDPM", q("2024Q3")).unwrap();
        assert!((got - expected).abs() / expected < 1e-5, "{got} vs {expected}");

        for t in 0..4 {
            for (_, gap) in identity_gaps(&store, &plan, t).unwrap() {
                assert!(gap < expected * 1e-5);
            }
        }
    }

    #[test]
    fn determinism_two_runs_identical() {
        let exog: &[(&str, f64)] = &[
            ("IF", 200.0),
            ("CGG", 300.0),
            ("DINV", 50.0),
            ("X", 150.0),
            ("M", 100.0),
            ("GDPM", 1000.0),
            ("CONS", 500.0),
            ("YD", 800.0),
            ("TAX", 250.0),
        ];
        let (plan, mut a) = setup(DEMAND_BLOCK, exog);
        let mut b = a.clone();
        let opts = SolveOptions::default();
        solve_span(&mut a, &plan, q("2024Q1"), q("2025Q4"), &opts, None).unwrap();
        solve_span(&mut b, &plan, q("2024Q1"), q("2025Q4"), &opts, None).unwrap();
        for name in ["GDPM", "CONS", "YD", "TAX"] {
            assert_eq!(a.series(name).unwrap(), b.series(name).unwrap(), "{name}");
        }
    }

    #[test]
    fn divergent_equation_fails_loudly() {
        let (plan, mut store) = setup("X = 2 * X + 1\n", &[]);
        store.set_at("X", q("2024Q1"), 1.0).unwrap();
        let opts = SolveOptions { max_iter: 25, ..SolveOptions::default() };
        let order = execution_order(&plan, opts.ordering);
        let err = solve_quarter(&mut store, &plan, &order, 0, &opts, None).unwrap_err();
        match err {
            SolveError::NonConvergence { variable, iterations, residual, .. } => {
                assert_eq!(variable, "X");
                assert_eq!(iterations, 25);
                assert!(residual > 1.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lag_before_horizon_is_fatal() {
        let (plan, mut store) = setup("A = B(-1)\n", &[("B", 5.0)]);
        let opts = SolveOptions::default();
        let order = execution_order(&plan, opts.ordering);
        let err = solve_quarter(&mut store, &plan, &order, 0, &opts, None).unwrap_err();
        assert!(matches!(err, SolveError::Store(StoreError::OutOfRange { .. })));
        // One quarter in, the lag resolves.
        assert!(solve_quarter(&mut store, &plan, &order, 1, &opts, None).is_ok());
    }

    #[test]
    fn seeding_carries_the_prior_quarter_forward() {
        let (plan, mut store) = setup("A = 0.5 * A + B\n", &[("B", 10.0)]);
        store.set_at("A", q("2024Q1"), 20.0).unwrap();
        let opts = SolveOptions::default();
        solve_span(&mut store, &plan, q("2024Q2"), q("2024Q3"), &opts, None).unwrap();
        // Fixed point A = 20 regardless of seed, reached from the seeded 20.
        let got = store.value_at("A", q("2024Q3")).unwrap();
        assert!((got - 20.0).abs() < 1e-4);
    }

    #[test]
    fn behavioral_forms_build_on_the_lag() {
        let src = "\
dlog(CONS) = 0.01
d(LFSUR) = -0.1
KMSXH/KMSXH(-1) = 1.005
";
        let (plan, mut store) = setup(src, &[]);
        store.set_at("CONS", q("2024Q1"), 1000.0).unwrap();
        store.set_at("LFSUR", q("2024Q1"), 4.0).unwrap();
        store.set_at("KMSXH", q("2024Q1"), 500.0).unwrap();
        let opts = SolveOptions::default();
        solve_span(&mut store, &plan, q("2024Q2"), q("2024Q2"), &opts, None).unwrap();
        let cons = store.value_at("CONS", q("2024Q2")).unwrap();
        assert!((cons - 1000.0 * 0.01f64.exp()).abs() < 1e-9);
        assert!((store.value_at("LFSUR", q("2024Q2")).unwrap() - 3.9).abs() < 1e-12);
        assert!((store.value_at("KMSXH", q("2024Q2")).unwrap() - 502.5).abs() < 1e-9);
    }

    #[test]
    fn missing_inputs_fail_instead_of_converging_to_nan() {
        // B has no data anywhere, so A can never obtain a finite value.
        let (plan, mut store) = setup("A = B + 1\n", &[]);
        let opts = SolveOptions::default();
        let order = execution_order(&plan, opts.ordering);
        let err = solve_quarter(&mut store, &plan, &order, 0, &opts, None).unwrap_err();
        match err {
            SolveError::NotFinite { variable, .. } => assert_eq!(variable, "A"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unseeded_chain_resolves_across_passes() {
        // In registry order A runs before its producer, so A only picks
        // up B's value on the second pass; that pass must not be skipped.
        let (plan, mut store) = setup("A = B\nB = 2\n", &[]);
        let opts = SolveOptions::default();
        let order = execution_order(&plan, opts.ordering);
        solve_quarter(&mut store, &plan, &order, 0, &opts, None).unwrap();
        assert_eq!(store.value_at("A", q("2024Q1")).unwrap(), 2.0);
    }

    #[test]
    fn horizon_outside_span_is_rejected() {
        let (plan, mut store) = setup("A = 1\n", &[]);
        let opts = SolveOptions::default();
        let err =
            solve_span(&mut store, &plan, q("2010Q1"), q("2024Q4"), &opts, None).unwrap_err();
        assert!(matches!(err, SolveError::Horizon(_)));
    }
}
