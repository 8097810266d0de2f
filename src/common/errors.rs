//! Error types for the engine

use thiserror::Error;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine operations
///
/// Business outcomes (ineligible markets, a halted breaker) are never errors;
/// they travel as `Action::Skip`. Only malformed input, broken caller
/// contracts and I/O failures end up here.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Snapshot failed validation at the ingestion boundary
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A caller broke a lifecycle contract (e.g. two positions for one market)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Position state machine transition that is not allowed
    #[error("Invalid transition for {market_id}: {from} -> {to}")]
    InvalidTransition {
        market_id: String,
        from: String,
        to: String,
    },

    /// Confirmation or request for a market with no active position
    #[error("No active position for market: {0}")]
    UnknownPosition(String),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Order executor failures
    #[error("Execution error: {0}")]
    Execution(String),
}

impl From<url::ParseError> for EngineError {
    fn from(err: url::ParseError) -> Self {
        EngineError::Configuration(format!("invalid url: {}", err))
    }
}
