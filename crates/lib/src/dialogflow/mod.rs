//! Dialogflow ES client: service-account auth and detect-intent over REST.

mod auth;
mod client;
mod types;

pub use auth::{CredentialsError, ServiceAccountKey, TokenSource};
pub use client::{SessionName, SessionsClient};
pub use types::{
    DetectIntentRequest, DetectIntentResponse, FulfillmentMessage, Intent, MessageText,
    QueryInput, QueryResult, TextInput,
};

#[derive(Debug, thiserror::Error)]
pub enum DialogflowError {
    #[error("dialogflow credentials: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("dialogflow request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("dialogflow token exchange failed: {0}")]
    Token(String),
    #[error("dialogflow api error: {0}")]
    Api(String),
    #[error("dialogflow url: {0}")]
    Url(String),
}
