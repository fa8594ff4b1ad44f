//! Transpiler for the model's equation notation.
//!
//! One equation per line, `TARGET = expression`. Variables are short
//! mnemonic codes starting with an uppercase letter; a trailing
//! parenthesised integer is a temporal offset (`CONS(-1)` is last
//! quarter's consumption). Function names start lowercase or with `@`.
//! The parser compiles each line into a closed expression tree plus the
//! set of variable references it reads; it never evaluates anything, so
//! the same parsed equation is reused across baseline and shocked runs.
pub mod ast;
pub mod parser;
pub mod token;

pub use ast::{BinOp, DateCmp, Expr, Form, Role, UnaryOp, VarRef};
pub use parser::{parse_equation, ParsedEquation};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}: syntax error: {msg}")]
    Syntax { line: u32, msg: String },
    #[error("line {line}: unknown function '{name}'")]
    UnknownFunction { line: u32, name: String },
    #[error("line {line}: malformed equation target '{target}'")]
    BadTarget { line: u32, target: String },
}
