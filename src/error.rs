//! Error types for the risk assessment orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

/// Classification of tool-level failures.
///
/// These never escape the ReAct loop; they are surfaced back to the
/// reasoning backend as `TOOL_ERROR` observations so it can retry with a
/// different tool or different arguments.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolErrorKind {
    #[error("NOT_FOUND")]
    NotFound,
    #[error("RATE_LIMITED")]
    RateLimited,
    #[error("TIMEOUT")]
    Timeout,
    #[error("MALFORMED_RESPONSE")]
    MalformedResponse,
    #[error("UNAVAILABLE")]
    Unavailable,
}

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Recoverable (observation-level)
    // =============================

    #[error("Tool error ({kind}): {message}")]
    Tool {
        kind: ToolErrorKind,
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    // =============================
    // Fatal to the current run
    // =============================

    #[error("Reasoning backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Reasoning backend timed out: {0}")]
    BackendTimeout(String),

    #[error("Invalid routing decision: {0}")]
    InvalidDecision(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("State error: {0}")]
    State(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl OrchestrationError {
    /// Shorthand for a typed tool failure.
    pub fn tool(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self::Tool {
            kind,
            message: message.into(),
        }
    }

    /// True for errors that fail the whole session rather than a single
    /// observation. The graph converts these into `SessionStatus::Failed`
    /// while keeping the last good checkpoint resumable.
    pub fn is_backend_fatal(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_) | Self::BackendTimeout(_)
        )
    }
}
