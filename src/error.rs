use serde::Serialize;
use thiserror::Error;

/// Failure of a single dashboard request.
///
/// Every variant is recoverable at the request boundary: the caller turns it
/// into a user-visible message and stops without partial output.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BetaError {
    /// The price provider could not deliver a series (unknown symbol, network
    /// failure, timeout, empty or malformed response).
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Fewer than two observations where at least two are required.
    #[error("insufficient data for {series}: {observations} observation(s), at least 2 required")]
    InsufficientData { series: String, observations: usize },

    /// The regression is undefined for this input (e.g. constant market returns).
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// The request itself is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl BetaError {
    pub fn data_unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        BetaError::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    pub fn insufficient(series: impl Into<String>, observations: usize) -> Self {
        BetaError::InsufficientData {
            series: series.into(),
            observations,
        }
    }

    /// Stable label for logs and JSON bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            BetaError::DataUnavailable { .. } => "data_unavailable",
            BetaError::InsufficientData { .. } => "insufficient_data",
            BetaError::DegenerateInput(_) => "degenerate_input",
            BetaError::InvalidInput(_) => "invalid_input",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl From<&BetaError> for ErrorBody {
    fn from(error: &BetaError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
