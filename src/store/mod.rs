//! Time-indexed variable storage.
pub mod quarter;
pub mod scenario;
pub mod variables;

pub use quarter::{Quarter, QuarterParseError, Span};
pub use scenario::PairedStore;
pub use variables::{Snapshot, StoreError, SymbolTable, VarId, VariableStore};
