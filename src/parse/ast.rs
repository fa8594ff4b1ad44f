//! Expression trees and their interpreter.
//!
//! A closed tagged-variant representation: every construct the notation
//! can express is one of the variants below, and a single `eval` walks
//! the tree against a store snapshot. `dlog(...)`, `d(...)` and
//! `@movav(...)` never reach this layer; the parser expands them into
//! offset-shifted subtrees.

use crate::store::{Quarter, Snapshot, StoreError, VarId};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Log,
    Exp,
    Abs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCmp {
    Eq,
    Ge,
    Le,
    Gt,
    Lt,
}

/// One variable read: which variable, at which temporal offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarRef {
    pub var: VarId,
    pub offset: i32,
}

pub type ReadSet = SmallVec<[VarRef; 8]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(f64),
    Var(VarRef),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `@recode(@date <cmp> @dateval("..."), a, b)`: `a` when the current
    /// quarter (shifted by `offset`) satisfies the comparison, else `b`.
    Recode {
        cmp: DateCmp,
        pivot: Quarter,
        offset: i32,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    /// `@trend(base)`: quarters elapsed since the base period.
    Trend {
        base: Quarter,
        offset: i32,
    },
    /// `@elem(VAR, "1970Q1")`: a variable's value at an absolute quarter.
    Elem {
        var: VarId,
        at: Quarter,
    },
}

impl Expr {
    /// Evaluates against one quarter of the store. Arithmetic follows
    /// IEEE semantics (division by zero yields an infinity); the solver
    /// guards against writing non-finite values.
    pub fn eval(&self, snap: &Snapshot) -> Result<f64, StoreError> {
        match self {
            Expr::Literal(v) => Ok(*v),
            Expr::Var(r) => snap.get(r.var, r.offset),
            Expr::Unary { op, operand } => {
                let v = operand.eval(snap)?;
                Ok(match op {
                    UnaryOp::Neg => -v,
                    UnaryOp::Log => v.ln(),
                    UnaryOp::Exp => v.exp(),
                    UnaryOp::Abs => v.abs(),
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.eval(snap)?;
                let r = rhs.eval(snap)?;
                Ok(match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div => l / r,
                    BinOp::Pow => l.powf(r),
                })
            }
            Expr::Recode { cmp, pivot, offset, if_true, if_false } => {
                let current = snap.quarter().offset_by(*offset);
                let holds = match cmp {
                    DateCmp::Eq => current == *pivot,
                    DateCmp::Ge => current >= *pivot,
                    DateCmp::Le => current <= *pivot,
                    DateCmp::Gt => current > *pivot,
                    DateCmp::Lt => current < *pivot,
                };
                if holds { if_true.eval(snap) } else { if_false.eval(snap) }
            }
            Expr::Trend { base, offset } => {
                Ok(snap.quarter().offset_by(*offset).quarters_since(*base) as f64)
            }
            Expr::Elem { var, at } => snap.elem(*var, *at),
        }
    }

    /// The same expression evaluated `lag` quarters earlier: every
    /// temporal reference moves back, including date comparisons and
    /// trends. `@elem` is absolute and does not move.
    pub fn shift(&self, lag: u32) -> Expr {
        let k = lag as i32;
        match self {
            Expr::Literal(v) => Expr::Literal(*v),
            Expr::Var(r) => Expr::Var(VarRef { var: r.var, offset: r.offset - k }),
            Expr::Unary { op, operand } => {
                Expr::Unary { op: *op, operand: Box::new(operand.shift(lag)) }
            }
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(lhs.shift(lag)),
                rhs: Box::new(rhs.shift(lag)),
            },
            Expr::Recode { cmp, pivot, offset, if_true, if_false } => Expr::Recode {
                cmp: *cmp,
                pivot: *pivot,
                offset: offset - k,
                if_true: Box::new(if_true.shift(lag)),
                if_false: Box::new(if_false.shift(lag)),
            },
            Expr::Trend { base, offset } => Expr::Trend { base: *base, offset: offset - k },
            Expr::Elem { var, at } => Expr::Elem { var: *var, at: *at },
        }
    }

    /// Collects every (variable, offset) pair the expression reads,
    /// deduplicated, in first-seen order. Absolute `@elem` reads resolve
    /// behind the solve frontier and impose no within-quarter
    /// dependency, so they stay out of the read-set.
    pub fn collect_reads(&self, out: &mut ReadSet) {
        match self {
            Expr::Literal(_) | Expr::Trend { .. } | Expr::Elem { .. } => {}
            Expr::Var(r) => {
                if !out.contains(r) {
                    out.push(*r);
                }
            }
            Expr::Unary { operand, .. } => operand.collect_reads(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_reads(out);
                rhs.collect_reads(out);
            }
            Expr::Recode { if_true, if_false, .. } => {
                if_true.collect_reads(out);
                if_false.collect_reads(out);
            }
        }
    }
}

/// The syntactic form of an equation's left-hand side, which determines
/// how a solved right-hand side maps onto the target's level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// `X = rhs`
    Level,
    /// `d(X) = rhs`, so `X[t] = X[t-1] + rhs`.
    Diff,
    /// `dlog(X) = rhs`, so `X[t] = X[t-1] * exp(rhs)`.
    LogDiff,
    /// `X/X(-1) = rhs`, so `X[t] = X[t-1] * rhs`.
    Ratio,
}

/// Accounting identity vs. estimated behavioral relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Identity,
    Behavioral,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Span, VariableStore};

    fn store() -> VariableStore {
        let span = Span::new("2020Q1".parse().unwrap(), "2021Q4".parse().unwrap()).unwrap();
        let mut store = VariableStore::new(span);
        store.load_series_from(
            "CONS",
            "2020Q1".parse().unwrap(),
            &[100.0, 110.0, 121.0, 133.1, 146.4, 161.0, 177.1, 194.8],
        )
        .unwrap();
        store
    }

    fn var(store: &VariableStore, name: &str, offset: i32) -> Expr {
        Expr::Var(VarRef { var: store.resolve(name).unwrap(), offset })
    }

    #[test]
    fn arithmetic_eval() {
        let store = store();
        let snap = Snapshot::new(&store, 2);
        let e = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(var(&store, "CONS", 0)),
            rhs: Box::new(Expr::Binary {
                op: BinOp::Mul,
                lhs: Box::new(Expr::Literal(2.0)),
                rhs: Box::new(var(&store, "CONS", -1)),
            }),
        };
        assert_eq!(e.eval(&snap).unwrap(), 121.0 + 2.0 * 110.0);
    }

    #[test]
    fn shift_moves_every_reference() {
        let store = store();
        let e = Expr::Unary {
            op: UnaryOp::Log,
            operand: Box::new(var(&store, "CONS", 0)),
        };
        // dlog-style expansion: log(X) - log(X(-1)).
        let dlog = Expr::Binary {
            op: BinOp::Sub,
            lhs: Box::new(e.clone()),
            rhs: Box::new(e.shift(1)),
        };
        let snap = Snapshot::new(&store, 3);
        let got = dlog.eval(&snap).unwrap();
        assert!((got - (133.1f64.ln() - 121.0f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn recode_picks_the_right_arm() {
        let store = store();
        let e = Expr::Recode {
            cmp: DateCmp::Ge,
            pivot: "2020Q3".parse().unwrap(),
            offset: 0,
            if_true: Box::new(Expr::Literal(1.0)),
            if_false: Box::new(Expr::Literal(0.0)),
        };
        assert_eq!(e.eval(&Snapshot::new(&store, 1)).unwrap(), 0.0);
        assert_eq!(e.eval(&Snapshot::new(&store, 2)).unwrap(), 1.0);
        // Shifted by one quarter the pivot is reached one quarter later.
        assert_eq!(e.shift(1).eval(&Snapshot::new(&store, 2)).unwrap(), 0.0);
    }

    #[test]
    fn trend_counts_quarters() {
        let store = store();
        let e = Expr::Trend { base: "2020Q1".parse().unwrap(), offset: 0 };
        assert_eq!(e.eval(&Snapshot::new(&store, 5)).unwrap(), 5.0);
    }

    #[test]
    fn read_set_is_deduplicated() {
        let store = store();
        let e = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(var(&store, "CONS", 0)),
            rhs: Box::new(Expr::Binary {
                op: BinOp::Sub,
                lhs: Box::new(var(&store, "CONS", 0)),
                rhs: Box::new(var(&store, "CONS", -1)),
            }),
        };
        let mut reads = ReadSet::new();
        e.collect_reads(&mut reads);
        assert_eq!(reads.len(), 2);
    }

    #[test]
    fn absolute_reads_stay_out_of_the_read_set() {
        let store = store();
        let e = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(var(&store, "CONS", 0)),
            rhs: Box::new(Expr::Elem {
                var: store.resolve("CONS").unwrap(),
                at: "2020Q1".parse().unwrap(),
            }),
        };
        let mut reads = ReadSet::new();
        e.collect_reads(&mut reads);
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].offset, 0);
    }
}
