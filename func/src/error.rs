use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// A call refers to a function that was never defined.
    #[snafu(display("undefined function {name:?} called from {caller:?}"))]
    UndefinedFunction { name: String, caller: String },

    /// Defining this function would close a cycle in the call graph.
    #[snafu(display("definition of {name:?} would create a cycle through {through:?}"))]
    CyclicGraph { name: String, through: String },

    /// A function was given a second pure definition.
    #[snafu(display("function {name:?} is already defined"))]
    AlreadyDefined { name: String },

    /// An update was added before the pure definition.
    #[snafu(display("function {name:?} has no pure definition to update"))]
    UpdateBeforeDefinition { name: String },

    /// The tuple arity of a definition does not match earlier ones.
    #[snafu(display("function {name:?} value count changed: {expected} vs {actual}"))]
    TupleArityMismatch { name: String, expected: usize, actual: usize },

    /// An update's left-hand side uses a variable that is neither a pure
    /// argument nor a reduction variable.
    #[snafu(display("update of {name:?} has unknown variable {var:?} on the left-hand side"))]
    UnknownUpdateVariable { name: String, var: String },

    /// Scheduling directive contradicts an earlier one.
    #[snafu(display("schedule conflict on {func:?}: {message}"))]
    ScheduleConflict { func: String, message: String },

    /// A scheduling directive names a dimension that does not exist.
    #[snafu(display("function {func:?} has no dimension {var:?}"))]
    UnknownDimension { func: String, var: String },

    /// Split factor must be a positive integer.
    #[snafu(display("bad split of {var:?} on {func:?}: {message}"))]
    BadSplit { func: String, var: String, message: String },

    /// The graph was mutated after compilation froze it.
    #[snafu(display("function {name:?} is frozen; compilation has started"))]
    Frozen { name: String },
}
