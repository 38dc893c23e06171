use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Bounds analysis produced an unbounded interval where a concrete
    /// region is required.
    #[snafu(display("cannot infer bounds of {func:?} in dimension {dim}: {detail}"))]
    BoundsCannotBeInferred { func: String, dim: usize, detail: String },

    /// Inline functions must be pure; update definitions have storage
    /// semantics that cannot be substituted into call sites.
    #[snafu(display("function {func:?} has update definitions and cannot be inlined"))]
    InlinedUpdates { func: String },

    /// Tail strategy incompatible with the stage it is applied to.
    #[snafu(display("bad split of {var:?} on {func:?}: {message}"))]
    BadSplit { func: String, var: String, message: String },

    /// Parallel reduction without atomics or a safe-association proof.
    #[snafu(display("concurrency hazard on {func:?}: {message}"))]
    ConcurrencyHazard { func: String, message: String },

    /// A compute_at/store_at level names a loop that does not exist in
    /// the lowered consumer.
    #[snafu(display("no loop of {consumer:?} over {var:?} found when placing {func:?}"))]
    LoopNotFound { func: String, consumer: String, var: String },

    /// Vectorized loops need a constant extent.
    #[snafu(display("vectorized loop {loop_var:?} has non-constant extent {extent}"))]
    VectorizeNonConstant { loop_var: String, extent: String },

    /// Unrolled loops need a constant extent.
    #[snafu(display("unrolled loop {loop_var:?} has non-constant extent {extent}"))]
    UnrollNonConstant { loop_var: String, extent: String },

    /// Host-side compute placed inside a device loop.
    #[snafu(display("host-side allocation {name:?} inside device loop {loop_var:?}"))]
    HostComputeInDeviceLoop { name: String, loop_var: String },

    /// The target lacks a feature the schedule requires.
    #[snafu(display("{source}"), context(false))]
    Target { source: rill_codegen::Error },

    /// Graph-model error surfaced during lowering.
    #[snafu(display("{source}"), context(false))]
    Graph { source: rill_func::Error },

    /// Compilation was cancelled between passes. No partial IR is
    /// returned.
    #[snafu(display("compilation cancelled after pass {after_pass:?}"))]
    Cancelled { after_pass: String },
}
