//! Error types for the routing orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Fatal
    // =============================

    /// Missing credentials or endpoints for an external service.
    /// The only error allowed to cross the dispatcher boundary.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // =============================
    // Contained inside the pipeline
    // =============================

    #[error("Handler error: {0}")]
    HandlerError(String),

    #[error("Supervisor parse error: {0}")]
    SupervisorParseError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    // =============================
    // Outside the state machine
    // =============================

    #[error("State persistence error: {0}")]
    StateError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Goal error: {0}")]
    GoalError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl OrchestrationError {
    /// Fatal errors abort the request; everything else degrades to text.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OrchestrationError::ConfigurationError(_))
    }
}
