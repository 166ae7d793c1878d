use thiserror::Error;

/// Errors shared by navigation, companion and protocol layers.
///
/// None of these are fatal: each is terminal at the point of detection and
/// only surfaces through logs or, for queries, through the resolved result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed action or query payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Navigation surface unbaked, or companion without an agent
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Unresolvable companion id or gesture name
    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    /// Query left unanswered past its deadline
    #[error("Query {id} timed out after {timeout_ms}ms")]
    Timeout { id: String, timeout_ms: u64 },

    /// Response whose id matches no outstanding query
    #[error("Duplicate or late response: {0}")]
    DuplicateResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
