use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid ICO record {symbol}: {reason}")]
    InvalidRecord { symbol: String, reason: String },

    #[error("invalid fixed parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid strategy vector: expected {expected} values, got {got}")]
    StrategyLength { expected: usize, got: usize },

    #[error("invalid bounds for dimension {dim}: lower {lower} must be below upper {upper}")]
    InvalidBounds { dim: usize, lower: f64, upper: f64 },

    #[error("bounds length mismatch: {lower} lower vs {upper} upper")]
    BoundsLength { lower: usize, upper: usize },

    #[error("optimizer configuration error: {0}")]
    Optimizer(String),
}

pub type Result<T> = std::result::Result<T, Error>;
