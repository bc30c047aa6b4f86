//! Error taxonomy for the action pipeline.

use thiserror::Error;

/// Failure to obtain a usable plan from the completion provider.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The upstream model call itself failed (transport, HTTP status, empty candidates).
    #[error("completion provider failed: {0}")]
    Provider(String),

    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("response missing required JSON keys: {}", .0.join(", "))]
    MissingKeys(Vec<&'static str>),

    #[error("duration_minutes is not a whole number of minutes: {0}")]
    InvalidDuration(String),
}

/// Failure reported while materializing a calendar event.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// The provider rejected the request; carries the provider's reason string.
    #[error("{0}")]
    Provider(String),

    /// Network or decoding failure talking to the provider.
    #[error("{0}")]
    Transport(String),
}

/// Failure in the embedded goal/credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled: {0}")]
    Sled(#[from] sled::Error),

    #[error("corrupt record: {0}")]
    Serde(#[from] serde_json::Error),

    /// The blocking worker running the store call panicked or was cancelled.
    #[error("store worker failed: {0}")]
    Worker(String),
}

/// Pipeline-level error. Each variant has a fixed client-facing status at the gateway.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Goal not found. Please create the goal first.")]
    GoalNotFound,

    #[error("{0}")]
    Unauthorized(String),

    #[error("AI JSON generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Google Calendar API error: {0}")]
    Provider(String),

    #[error("Action executed but no output was produced.")]
    Unhandled,

    #[error("{0}")]
    Internal(String),
}
