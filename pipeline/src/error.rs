use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The single error surface the frontend sees: every compilation
/// failure arrives here with its structured kind preserved in the
/// source chain, and runtime faults keep their integer code.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Graph construction or schedule validation failed.
    #[snafu(display("{source}"), context(false))]
    Graph { source: rill_func::Error },

    /// Lowering failed (bounds, splits, placement, concurrency,
    /// cancellation).
    #[snafu(display("{source}"), context(false))]
    Lower { source: rill_lower::Error },

    /// Target parsing/validation or backend compilation failed.
    #[snafu(display("{source}"), context(false))]
    Codegen { source: rill_codegen::Error },

    /// The compiled pipeline faulted while running.
    #[snafu(display("{source}"), context(false))]
    Runtime { source: rill_codegen::RuntimeError },

    /// The reference evaluator hit a construct it does not model.
    #[snafu(display("reference evaluator: {message}"))]
    Reference { message: String },
}
