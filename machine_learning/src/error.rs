use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    /// A length or shape invariant was violated.
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// An operation that needs at least one sample got none.
    EmptyInput { what: &'static str },
    /// An input is invalid for domain reasons.
    InvalidInput(&'static str),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch for {what}: got {got}, expected {expected}"),
            MlErr::EmptyInput { what } => write!(f, "empty input: {what} has no samples"),
            MlErr::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl Error for MlErr {}
