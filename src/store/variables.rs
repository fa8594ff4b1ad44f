//! Dense columnar variable store with interned names.
//!
//! One `Vec<f64>` column per variable, spanning the full quarter range.
//! Unknown observations are `f64::NAN`. Equations hold `VarId` handles
//! interned through the shared `SymbolTable`, so a parsed equation reads
//! against any store derived from the same registry, including scenario
//! clones.

use super::quarter::{Quarter, Span};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct VarId(pub u32);

impl VarId {
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn new(idx: usize) -> Self {
        Self(idx as u32)
    }
}

/// Name interner shared between the transpiler and the store.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    names: Vec<String>,
    index: HashMap<String, VarId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> VarId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = VarId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        id
    }

    pub fn resolve(&self, name: &str) -> Option<VarId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: VarId) -> &str {
        &self.names[id.index()]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("'{variable}' offset {offset} leaves the data horizon at {quarter}")]
    OutOfRange {
        variable: String,
        offset: i32,
        quarter: Quarter,
    },
    #[error("quarter {0} is outside the store span")]
    OutsideSpan(Quarter),
    #[error("series for '{variable}' from {start} overruns the store span")]
    SeriesOverrun { variable: String, start: Quarter },
}

/// Quarterly time-series store for all model variables.
#[derive(Debug, Clone)]
pub struct VariableStore {
    span: Span,
    symbols: SymbolTable,
    columns: Vec<Vec<f64>>,
}

impl VariableStore {
    pub fn new(span: Span) -> Self {
        Self { span, symbols: SymbolTable::new(), columns: Vec::new() }
    }

    /// A store with one column per symbol already interned in `symbols`.
    pub fn with_symbols(symbols: SymbolTable, span: Span) -> Self {
        let columns = (0..symbols.len()).map(|_| vec![f64::NAN; span.len()]).collect();
        Self { span, symbols, columns }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Interns `name`, allocating its column on first sight.
    pub fn ensure(&mut self, name: &str) -> VarId {
        let id = self.symbols.intern(name);
        while self.columns.len() < self.symbols.len() {
            self.columns.push(vec![f64::NAN; self.span.len()]);
        }
        id
    }

    /// Adopts symbols interned elsewhere (e.g. closure equations parsed
    /// after this store was built). Interning order is append-only, so
    /// ids stay aligned.
    pub fn sync(&mut self, symbols: &SymbolTable) {
        for name in symbols.names() {
            self.ensure(name);
        }
    }

    pub fn resolve(&self, name: &str) -> Result<VarId, StoreError> {
        self.symbols
            .resolve(name)
            .filter(|id| id.index() < self.columns.len())
            .ok_or_else(|| StoreError::UnknownVariable(name.to_string()))
    }

    pub fn series(&self, name: &str) -> Result<&[f64], StoreError> {
        let id = self.resolve(name)?;
        Ok(&self.columns[id.index()])
    }

    /// Direct indexed read; `None` when the column does not exist.
    #[inline(always)]
    pub fn value(&self, id: VarId, t: usize) -> Option<f64> {
        self.columns.get(id.index()).map(|col| col[t])
    }

    #[inline(always)]
    pub fn set(&mut self, id: VarId, t: usize, value: f64) {
        self.columns[id.index()][t] = value;
    }

    /// Fills the whole span with a constant (calibration convenience).
    pub fn set_all(&mut self, name: &str, value: f64) {
        let id = self.ensure(name);
        self.columns[id.index()].fill(value);
    }

    pub fn set_at(&mut self, name: &str, quarter: Quarter, value: f64) -> Result<(), StoreError> {
        let t = self.span.index_of(quarter).ok_or(StoreError::OutsideSpan(quarter))?;
        let id = self.ensure(name);
        self.columns[id.index()][t] = value;
        Ok(())
    }

    /// Loads a series starting at the span's first quarter.
    pub fn load_series(&mut self, name: &str, values: &[f64]) -> Result<(), StoreError> {
        self.load_series_from(name, self.span.start(), values)
    }

    /// Loads a contiguous series starting at `start`. The series must fit
    /// inside the span.
    pub fn load_series_from(
        &mut self,
        name: &str,
        start: Quarter,
        values: &[f64],
    ) -> Result<(), StoreError> {
        let t0 = self.span.index_of(start).ok_or(StoreError::OutsideSpan(start))?;
        if t0 + values.len() > self.span.len() {
            return Err(StoreError::SeriesOverrun { variable: name.to_string(), start });
        }
        let id = self.ensure(name);
        self.columns[id.index()][t0..t0 + values.len()].copy_from_slice(values);
        Ok(())
    }

    pub fn value_at(&self, name: &str, quarter: Quarter) -> Result<f64, StoreError> {
        let t = self.span.index_of(quarter).ok_or(StoreError::OutsideSpan(quarter))?;
        let id = self.resolve(name)?;
        Ok(self.columns[id.index()][t])
    }
}

/// A read view of the store positioned at the quarter being solved.
///
/// Offset 0 is the current quarter, negative offsets are lags, positive
/// offsets are leads. Lags that fall before the span and leads past the
/// current quarter are `OutOfRange`: an equation must never observe an
/// unsolved future value implicitly.
#[derive(Clone, Copy)]
pub struct Snapshot<'a> {
    store: &'a VariableStore,
    t: usize,
}

impl<'a> Snapshot<'a> {
    pub fn new(store: &'a VariableStore, t: usize) -> Self {
        Self { store, t }
    }

    pub fn t(&self) -> usize {
        self.t
    }

    pub fn quarter(&self) -> Quarter {
        self.store.span.quarter_at(self.t)
    }

    pub fn get(&self, id: VarId, offset: i32) -> Result<f64, StoreError> {
        let idx = self.t as i64 + offset as i64;
        if idx < 0 || idx > self.t as i64 {
            return Err(StoreError::OutOfRange {
                variable: self.store.symbols.name(id).to_string(),
                offset,
                quarter: self.quarter(),
            });
        }
        self.store
            .value(id, idx as usize)
            .ok_or_else(|| StoreError::UnknownVariable(self.store.symbols.name(id).to_string()))
    }

    /// Value of `id` at an absolute quarter (the `@elem` lookup). The
    /// quarter must be inside the span and not ahead of the solve.
    pub fn elem(&self, id: VarId, at: Quarter) -> Result<f64, StoreError> {
        let idx = self.store.span.index_of(at).ok_or(StoreError::OutsideSpan(at))?;
        if idx > self.t {
            return Err(StoreError::OutOfRange {
                variable: self.store.symbols.name(id).to_string(),
                offset: (idx - self.t) as i32,
                quarter: self.quarter(),
            });
        }
        self.store
            .value(id, idx)
            .ok_or_else(|| StoreError::UnknownVariable(self.store.symbols.name(id).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::new("2020Q1".parse().unwrap(), "2021Q4".parse().unwrap()).unwrap()
    }

    #[test]
    fn intern_is_stable() {
        let mut syms = SymbolTable::new();
        let a = syms.intern("GDPM");
        let b = syms.intern("CONS");
        assert_eq!(syms.intern("GDPM"), a);
        assert_eq!(syms.name(b), "CONS");
        assert_eq!(syms.resolve("CONS"), Some(b));
        assert_eq!(syms.resolve("NOPE"), None);
    }

    #[test]
    fn columns_default_to_nan() {
        let mut store = VariableStore::new(span());
        let id = store.ensure("GDPM");
        assert!(store.value(id, 0).unwrap().is_nan());
    }

    #[test]
    fn load_and_read_back() {
        let mut store = VariableStore::new(span());
        store
            .load_series_from("CGG", "2020Q1".parse().unwrap(), &[1.0, 2.0, 3.0])
            .unwrap();
        assert_eq!(store.value_at("CGG", "2020Q3".parse().unwrap()).unwrap(), 3.0);
        assert!(store.value_at("CGG", "2020Q4".parse().unwrap()).unwrap().is_nan());
    }

    #[test]
    fn series_overrun_is_rejected() {
        let mut store = VariableStore::new(span());
        let err = store
            .load_series_from("CGG", "2021Q4".parse().unwrap(), &[1.0, 2.0])
            .unwrap_err();
        assert!(matches!(err, StoreError::SeriesOverrun { .. }));
    }

    #[test]
    fn snapshot_lag_and_lead_bounds() {
        let mut store = VariableStore::new(span());
        store.set_all("CONS", 10.0);
        let id = store.resolve("CONS").unwrap();

        let snap = Snapshot::new(&store, 2);
        assert_eq!(snap.get(id, 0).unwrap(), 10.0);
        assert_eq!(snap.get(id, -2).unwrap(), 10.0);
        // Lag past the horizon.
        assert!(matches!(snap.get(id, -3), Err(StoreError::OutOfRange { .. })));
        // Leads are never observable while solving.
        assert!(matches!(snap.get(id, 1), Err(StoreError::OutOfRange { .. })));
    }

    #[test]
    fn snapshot_elem_respects_frontier() {
        let mut store = VariableStore::new(span());
        store.set_all("PGDP", 100.0);
        let id = store.resolve("PGDP").unwrap();
        let snap = Snapshot::new(&store, 1);
        assert_eq!(snap.elem(id, "2020Q1".parse().unwrap()).unwrap(), 100.0);
        assert!(snap.elem(id, "2021Q1".parse().unwrap()).is_err());
    }

    #[test]
    fn sync_adopts_new_symbols() {
        let mut syms = SymbolTable::new();
        syms.intern("GDPM");
        let mut store = VariableStore::with_symbols(syms.clone(), span());
        syms.intern("DINV");
        store.sync(&syms);
        assert!(store.resolve("DINV").is_ok());
    }
}
