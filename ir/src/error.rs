use rill_dtype::Type;
use snafu::Snafu;

use crate::types::{BinaryOp, UnaryOp};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Operand types disagree in a binary operation.
    #[snafu(display("type mismatch in {op}: {lhs} vs {rhs}"))]
    TypeMismatch { op: BinaryOp, lhs: Type, rhs: Type },

    /// An operation received a type outside its domain.
    #[snafu(display("invalid type for {op}: {ty}"))]
    InvalidTypeForUnaryOp { op: UnaryOp, ty: Type },

    /// A boolean expression was required.
    #[snafu(display("{context} must be boolean, got {actual}"))]
    ExpectedBool { context: &'static str, actual: Type },

    /// An integer expression was required.
    #[snafu(display("{context} must be integral, got {actual}"))]
    ExpectedInteger { context: &'static str, actual: Type },

    /// A scalar expression was required.
    #[snafu(display("{context} must be scalar, got {actual}"))]
    ExpectedScalar { context: &'static str, actual: Type },

    /// Select branches disagree.
    #[snafu(display("select branches have different types: {true_value} vs {false_value}"))]
    SelectBranchMismatch { true_value: Type, false_value: Type },

    /// Vector node built with an inconsistent lane count.
    #[snafu(display("{context}: expected {expected} lanes, got {actual}"))]
    LanesMismatch { context: &'static str, expected: u16, actual: u16 },

    /// Shuffle index out of range of the concatenated input lanes.
    #[snafu(display("shuffle index {index} out of bounds for {input_lanes} input lanes"))]
    ShuffleIndexOutOfBounds { index: u16, input_lanes: u16 },

    /// A call was built with a tuple index past the callee's arity.
    #[snafu(display("tuple index {index} out of bounds for call to {name}"))]
    TupleIndexOutOfBounds { name: String, index: usize },

    /// The canonical-form parser rejected its input.
    #[snafu(display("parse error at byte {offset}: {message}"))]
    Parse { message: String, offset: usize },
}
