//! Intermediate representation for the rill compiler.
//!
//! This crate defines the expression and statement trees that every later
//! stage of the compiler consumes, plus the machinery that operates on them
//! uniformly.
//!
//! # Module Organization
//!
//! - [`types`] - operator enums, loop kinds, constant values
//! - [`expr`] - the interned [`Expr`] tree
//! - [`stmt`] - the imperative [`Stmt`] tree
//! - [`intern`] - hash-consing for expressions
//! - [`visitor`] / [`mutator`] - the two traversal idioms
//! - [`analysis`] - free variables, calls, touched buffers
//! - [`substitute`] - variable substitution
//! - [`printer`] / [`parser`] - canonical text form and its reader
//! - [`eval`] - constant evaluation of scalar operations
//! - [`interval`] - constant interval arithmetic
//! - [`pattern`] - the `Pat` matching DSL and the rule dispatch table
//! - [`rewrite`] - bottom-up rewrite engine with scoping and sharing
//! - [`simplify`] - the algebraic simplifier built on all of the above

// Make this crate available as `rill_ir` inside its own macro expansions
extern crate self as rill_ir;

pub mod analysis;
pub mod error;
pub mod eval;
pub mod expr;
pub mod intern;
pub mod interval;
pub mod mutator;
pub mod ops;
pub mod parser;
#[macro_use]
pub mod pattern;
pub mod printer;
pub mod rewrite;
pub mod simplify;
pub mod stmt;
pub mod substitute;
pub mod types;
pub mod visitor;

#[cfg(test)]
mod test;

pub use error::{Error, Result};
pub use expr::{Expr, ExprNode};
pub use ops::{IntoExpr, clamp, max, min, select};
pub use interval::ConstantInterval;
pub use mutator::Mutator;
pub use pattern::{Pat, PatternMatcher};
pub use rewrite::Rewriter;
pub use simplify::{Simplifier, simplify, simplify_stmt};
pub use stmt::{Range, Stmt, StmtNode};
pub use types::{BinaryOp, CallType, ConstValue, ForKind, MemoryType, UnaryOp};
pub use visitor::Visitor;

// Re-export the type model for convenience
pub use rill_dtype::{Type, TypeCode};
