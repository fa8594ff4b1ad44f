//! The equation registry: every parsed equation, tagged with its target,
//! role and topical group, in the calibrated solve order.

mod source;

pub use source::SourceOptions;

use crate::parse::{ParseError, ParsedEquation};
use crate::store::{SymbolTable, VarId};
use std::collections::HashMap;
use thiserror::Error;

/// Topical calibration groups. Equations are grouped for calibration
/// convenience but solved as one coupled system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Prices,
    Output,
    Labour,
    Consumption,
    Investment,
    Income,
    Gdp,
    BalanceOfPayments,
    Housing,
}

impl Group {
    pub fn parse(name: &str) -> Option<Group> {
        match name.to_ascii_lowercase().as_str() {
            "prices" => Some(Group::Prices),
            "output" => Some(Group::Output),
            "labour" | "labor" => Some(Group::Labour),
            "consumption" => Some(Group::Consumption),
            "investment" => Some(Group::Investment),
            "income" => Some(Group::Income),
            "gdp" => Some(Group::Gdp),
            "balance_of_payments" | "bop" => Some(Group::BalanceOfPayments),
            "housing" => Some(Group::Housing),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Group::Prices => "prices",
            Group::Output => "output",
            Group::Labour => "labour",
            Group::Consumption => "consumption",
            Group::Investment => "investment",
            Group::Income => "income",
            Group::Gdp => "gdp",
            Group::BalanceOfPayments => "balance_of_payments",
            Group::Housing => "housing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EquationId(pub u32);

impl EquationId {
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// One registered equation. Immutable once pushed; closures work on
/// copies, never on the registry's own entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub group: Group,
    pub parsed: ParsedEquation,
}

impl Equation {
    pub fn target(&self) -> VarId {
        self.parsed.target
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("line {second}: variable '{variable}' already has a governing equation (line {first})")]
    DuplicateTarget { variable: String, first: u32, second: u32 },
    #[error("line {line}: unknown equation group '{name}'")]
    UnknownGroup { line: u32, name: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// All model equations plus the symbol table their references are bound
/// to. A variable with no entry in `by_target` is exogenous by default.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    symbols: SymbolTable,
    equations: Vec<Equation>,
    by_target: HashMap<VarId, EquationId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        group: Group,
        parsed: ParsedEquation,
    ) -> Result<EquationId, RegistryError> {
        if let Some(&prev) = self.by_target.get(&parsed.target) {
            return Err(RegistryError::DuplicateTarget {
                variable: self.symbols.name(parsed.target).to_string(),
                first: self.equations[prev.index()].parsed.line,
                second: parsed.line,
            });
        }
        let id = EquationId(self.equations.len() as u32);
        self.by_target.insert(parsed.target, id);
        self.equations.push(Equation { group, parsed });
        Ok(id)
    }

    /// Compiles a single equation line against this registry's symbols
    /// without registering it. Used for closure-override equations.
    pub fn parse_line(&mut self, text: &str) -> Result<ParsedEquation, ParseError> {
        crate::parse::parse_equation(text, 0, &mut self.symbols)
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub(crate) fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn equation_for(&self, var: VarId) -> Option<EquationId> {
        self.by_target.get(&var).copied()
    }

    pub fn is_exogenous(&self, var: VarId) -> bool {
        !self.by_target.contains_key(&var)
    }

    pub fn name(&self, var: VarId) -> &str {
        self.symbols.name(var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_targets_are_rejected() {
        let mut registry = Registry::new();
        let a = registry.parse_line("GDPM = CONS + IF").unwrap();
        let b = registry.parse_line("GDPM = X - M").unwrap();
        registry.push(Group::Gdp, a).unwrap();
        let err = registry.push(Group::Gdp, b).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTarget { ref variable, .. } if variable == "GDPM"));
    }

    #[test]
    fn role_defaults() {
        let mut registry = Registry::new();
        let eq = registry.parse_line("CONS = 100 + 0.6 * YD").unwrap();
        let id = registry.push(Group::Consumption, eq).unwrap();
        let target = registry.equations()[id.index()].target();
        assert_eq!(registry.equation_for(target), Some(id));
        // YD has no equation, so it is exogenous by default.
        let yd = registry.symbols().resolve("YD").unwrap();
        assert!(registry.is_exogenous(yd));
    }

    #[test]
    fn group_names_round_trip() {
        for g in [
            Group::Prices,
            Group::Output,
            Group::Labour,
            Group::Consumption,
            Group::Investment,
            Group::Income,
            Group::Gdp,
            Group::BalanceOfPayments,
            Group::Housing,
        ] {
            assert_eq!(Group::parse(g.name()), Some(g));
        }
        assert_eq!(Group::parse("bop"), Some(Group::BalanceOfPayments));
        assert_eq!(Group::parse("weather"), None);
    }
}
