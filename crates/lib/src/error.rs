//! Failure kinds of a conversational turn.
//!
//! Every error raised while handling a turn ends up as one of these variants; the
//! gateway maps each kind to exactly one HTTP outcome (see `gateway::server`).

use crate::dialogflow::{CredentialsError, DialogflowError};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Required settings (project id, service-account key) are missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The inbound request is missing required fields.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Shared secret missing or mismatched.
    #[error("unauthorized")]
    Auth,

    /// Token exchange or detect-intent call failed.
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<CredentialsError> for BridgeError {
    fn from(e: CredentialsError) -> Self {
        BridgeError::Configuration(e.to_string())
    }
}

impl From<DialogflowError> for BridgeError {
    fn from(e: DialogflowError) -> Self {
        match e {
            DialogflowError::Credentials(e) => e.into(),
            other => BridgeError::Backend(other.to_string()),
        }
    }
}
