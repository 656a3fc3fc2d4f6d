use std::{error::Error, fmt, io};

use machine_learning::MlErr;

/// The tree regularizer's result type.
pub type Result<T> = std::result::Result<T, TrainErr>;

/// Every failure of a training run. None of them is recoverable inside the training loop.
#[derive(Debug)]
pub enum TrainErr {
    /// Invalid configuration, caught before training starts.
    Config(String),
    /// A parameter vector or matrix doesn't have the expected length.
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// An estimate was requested over a set with no samples.
    EmptyInput { what: &'static str },
    /// The surrogate was asked to fit fewer observations than it needs.
    InsufficientData { got: usize, required: usize },
    /// A loss turned NaN or infinite.
    NonFiniteLoss { epoch: usize, loss: f32 },
    /// A dataset file line couldn't be parsed.
    Parse { line: usize, msg: String },
    Io(io::Error),
    Ml(MlErr),
}

impl fmt::Display for TrainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainErr::Config(msg) => write!(f, "invalid config: {msg}"),
            TrainErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch for {what}: got {got}, expected {expected}"),
            TrainErr::EmptyInput { what } => write!(f, "{what} is empty"),
            TrainErr::InsufficientData { got, required } => write!(
                f,
                "insufficient data: got {got} observations, at least {required} are required"
            ),
            TrainErr::NonFiniteLoss { epoch, loss } => {
                write!(f, "loss became {loss} at epoch {epoch}")
            }
            TrainErr::Parse { line, msg } => write!(f, "parse error at line {line}: {msg}"),
            TrainErr::Io(e) => write!(f, "io error: {e}"),
            TrainErr::Ml(e) => write!(f, "{e}"),
        }
    }
}

impl Error for TrainErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainErr::Io(e) => Some(e),
            TrainErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TrainErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<MlErr> for TrainErr {
    fn from(value: MlErr) -> Self {
        match value {
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => Self::ShapeMismatch {
                what,
                got,
                expected,
            },
            MlErr::EmptyInput { what } => Self::EmptyInput { what },
            other => Self::Ml(other),
        }
    }
}

impl From<serde_json::Error> for TrainErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}
