//! Function, reduction domain and schedule model.
//!
//! The frontend builds a graph of [`Func`]s: each has a pure definition,
//! optional update definitions, and a [`schedule::FuncSchedule`] set
//! through chained directives. Once compilation starts the graph is
//! frozen into immutable [`function::Function`] snapshots that the
//! lowering crate consumes; the live `Func` handles are never mutated by
//! compilation.
//!
//! # Module Organization
//!
//! - [`var`] - named pure variables with expression sugar
//! - [`rdom`] - reduction domains and reduction variables
//! - [`schedule`] - schedules as plain data
//! - [`function`] - function contents, registry, frozen snapshots
//! - [`directives`] - the chained scheduling API
//! - [`graph`] - call-graph extraction, cycle rejection, orders
//! - [`image`] - input buffer parameters

pub mod directives;
pub mod error;
pub mod function;
pub mod graph;
pub mod image;
pub mod rdom;
pub mod schedule;
pub mod var;

#[cfg(test)]
mod test;

pub use error::{Error, Result};
pub use function::{Func, Function, UpdateDefinition};
pub use graph::{Environment, build_environment};
pub use image::ImageParam;
pub use rdom::{RDom, RVar, ReductionDomain, ReductionVariable};
pub use schedule::{Dim, FuncSchedule, LoopLevel, Specialization, Split, SplitKind, StageSchedule, TailStrategy};
pub use var::Var;
