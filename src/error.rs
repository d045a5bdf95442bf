use thiserror::Error;

use crate::auth::AuthorizationDenied;

// Top-level error for one invocation. Pipeline::handle folds every variant into a Reply.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authorization denied: {0}")]
    Denied(#[from] AuthorizationDenied),

    #[error("Malformed input: {0}")]
    Input(#[from] InputError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Schema violation: {0}")]
    Schema(#[from] CoerceError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("Logger error: {0}")]
    Logger(#[from] log::SetLoggerError),
}

// Failures of the reasoning call itself.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Oracle returned an empty response")]
    Empty,

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

// The oracle answered, but not in the shape the contract demands.
#[derive(Debug, Error)]
pub enum CoerceError {
    #[error("No JSON object found in response")]
    NoJson,

    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing key: {0}")]
    MissingKey(String),

    #[error("Unexpected key: {0}")]
    UnexpectedKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl CoerceError {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        CoerceError::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

// Caller-supplied state that cannot be turned into an operation input.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("No user message carrying state")]
    NoUserMessage,

    #[error("Caller state is not a JSON object")]
    NotAnObject,

    #[error("Invalid JSON in caller state: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid stats: {0}")]
    InvalidStats(String),

    #[error("Input already contains generated key: {0}")]
    ReservedKey(String),

    #[error("Invalid round state: {0}")]
    InvalidRoundState(String),
}
