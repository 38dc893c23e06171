//! Backend interface for the rill compiler.
//!
//! The compiler core's output is a [`LoweredModule`]: the final
//! statement tree plus buffer and parameter metadata. A [`Backend`]
//! consumes that bundle and produces a [`Callable`]. Machine-code
//! backends are external; the in-tree [`interp::InterpreterBackend`]
//! executes the final IR directly and is what JIT compilation and the
//! test suite use.
//!
//! # Module Organization
//!
//! - [`target`] - target triple parsing and validation
//! - [`buffer`] - runtime buffer descriptors and storage
//! - [`module`] - the lowered-module bundle
//! - [`backend`] - the backend/callable traits
//! - [`interp`] - the interpreter backend

pub mod backend;
pub mod buffer;
pub mod error;
pub mod interp;
pub mod module;
pub mod target;

#[cfg(test)]
mod test;

pub use backend::{Backend, Callable, RunEnv};
pub use buffer::{Buffer, DimSpec};
pub use error::{Error, Result, RuntimeError};
pub use interp::InterpreterBackend;
pub use module::{BufferInfo, DeviceAffinity, LoweredModule, ParallelClosure, ScalarParam};
pub use target::{Arch, Os, Target, TargetFeature};
