use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The target string did not parse.
    #[snafu(display("malformed target {target:?}: {message}"))]
    MalformedTarget { target: String, message: String },

    /// The target does not support something the schedule requires.
    #[snafu(display("target {target} does not support {feature}"))]
    TargetMismatch { target: String, feature: String },

    /// The module references a buffer the caller did not supply.
    #[snafu(display("missing buffer {name:?}"))]
    MissingBuffer { name: String },

    /// The module references a scalar parameter the caller did not
    /// supply.
    #[snafu(display("missing scalar parameter {name:?}"))]
    MissingParam { name: String },
}

/// Integer codes carried by runtime faults in generated code.
pub mod runtime_codes {
    pub const BOUNDS_VIOLATION: i32 = 1;
    pub const ASSERT_FAILED: i32 = 2;
    pub const BAD_INDEX: i32 = 3;
    pub const UNDEFINED_SYMBOL: i32 = 4;
    pub const UNSUPPORTED_IR: i32 = 5;
}

/// A fault raised while running compiled (interpreted) code. Carries a
/// structured integer code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(display("runtime error {code}: {message}"))]
pub struct RuntimeError {
    pub code: i32,
    pub message: String,
}

impl RuntimeError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn bounds(message: impl Into<String>) -> Self {
        Self::new(runtime_codes::BOUNDS_VIOLATION, message)
    }
}
