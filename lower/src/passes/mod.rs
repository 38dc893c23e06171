//! The fixed-order optimization passes.
//!
//! Every pass is a [`rill_ir::Mutator`]; a pass that finds no work
//! returns its input tree unchanged (same allocations), which keeps
//! no-op passes cheap and downstream caching effective. The order is
//! fixed and lives in [`crate::driver`].

pub mod device;
pub mod early_free;
pub mod parallel;
pub mod sliding_window;
pub mod storage_folding;
pub mod substitute_lets;
pub mod tighten;
pub mod trivial_loops;
pub mod unroll;
pub mod vectorize;

pub use device::device_lowering;
pub use early_free::inject_early_frees;
pub use parallel::lower_parallel_tasks;
pub use sliding_window::sliding_window;
pub use storage_folding::storage_folding;
pub use substitute_lets::substitute_in_lets;
pub use tighten::allocation_bounds_tightening;
pub use trivial_loops::remove_trivial_loops;
pub use unroll::unroll_loops;
pub use vectorize::vectorize_loops;
