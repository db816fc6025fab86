//! Dialogflow ES v2 sessions client (REST).

use crate::dialogflow::auth::{ServiceAccountKey, TokenSource};
use crate::dialogflow::types::{DetectIntentRequest, DetectIntentResponse};
use crate::dialogflow::{CredentialsError, DialogflowError};
use std::fmt;

/// An agent session: `projects/{project}/agent/sessions/{session_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionName {
    project_id: String,
    session_id: String,
}

impl SessionName {
    pub fn new(project_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Path segments of the `:detectIntent` method; each one is percent-encoded on its own.
    fn detect_intent_segments(&self) -> [String; 6] {
        [
            "v2".to_string(),
            "projects".to_string(),
            self.project_id.clone(),
            "agent".to_string(),
            "sessions".to_string(),
            format!("{}:detectIntent", self.session_id),
        ]
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/agent/sessions/{}",
            self.project_id, self.session_id
        )
    }
}

/// Client for `projects.agent.sessions`.
pub struct SessionsClient {
    base_url: String,
    client: reqwest::Client,
    tokens: TokenSource,
}

impl SessionsClient {
    /// Build a client from service-account key JSON. Parses the key once.
    pub fn new(credentials_json: &str, base_url: &str) -> Result<Self, CredentialsError> {
        let key = ServiceAccountKey::from_json(credentials_json)?;
        let client = reqwest::Client::new();
        let tokens = TokenSource::new(&key, client.clone())?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            tokens,
        })
    }

    /// POST `/v2/{session}:detectIntent`.
    pub async fn detect_intent(
        &self,
        session: &SessionName,
        request: &DetectIntentRequest,
    ) -> Result<DetectIntentResponse, DialogflowError> {
        let url = self.detect_intent_url(session)?;
        let token = self.tokens.token().await?;
        let res = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(DialogflowError::Api(format!("{} {}", status, body)));
        }
        let data: DetectIntentResponse = res.json().await?;
        Ok(data)
    }

    fn detect_intent_url(&self, session: &SessionName) -> Result<reqwest::Url, DialogflowError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| DialogflowError::Url(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| DialogflowError::Url(format!("{}: cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(session.detect_intent_segments());
        Ok(url)
    }
}
