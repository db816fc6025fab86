//! Session gateway: one Dialogflow session per chat user.
//!
//! The sessions client is created on first use and shared for the life of the process.
//! Concurrent first requests wait on the same initialization; a failed initialization
//! is not cached, so every request keeps reporting the configuration problem.

use crate::config::DialogflowSettings;
use crate::dialogflow::{DetectIntentRequest, QueryResult, SessionName, SessionsClient};
use crate::error::BridgeError;
use async_trait::async_trait;
use tokio::sync::OnceCell;

/// Anything that can answer a user's text within that user's session.
#[async_trait]
pub trait IntentBackend: Send + Sync {
    /// Run one turn. `language_code` falls back to the backend default when `None` or blank.
    async fn query(
        &self,
        user_id: &str,
        text: &str,
        language_code: Option<&str>,
    ) -> Result<QueryResult, BridgeError>;

    /// Whether required settings are present (reported by the health endpoint).
    fn is_configured(&self) -> bool {
        true
    }
}

/// Dialogflow-backed [`IntentBackend`].
pub struct SessionGateway {
    settings: DialogflowSettings,
    client: OnceCell<SessionsClient>,
}

impl SessionGateway {
    pub fn new(settings: DialogflowSettings) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    /// Session a user's turns run in: `projects/{project}/agent/sessions/{user_id}`.
    pub fn session_key(&self, user_id: &str) -> Result<SessionName, BridgeError> {
        Ok(SessionName::new(self.project_id()?, user_id))
    }

    /// True once the shared client has been built.
    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }

    fn project_id(&self) -> Result<&str, BridgeError> {
        self.settings
            .project_id
            .as_deref()
            .ok_or_else(|| BridgeError::Configuration("missing Dialogflow project id (DF_PROJECT_ID)".to_string()))
    }

    fn language_code<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.settings.language_code)
    }

    async fn client(&self) -> Result<&SessionsClient, BridgeError> {
        self.client
            .get_or_try_init(|| async {
                let project_id = self.project_id()?;
                let creds = self.settings.credentials_json.as_deref().ok_or_else(|| {
                    BridgeError::Configuration(self.settings.credentials_error.clone().unwrap_or_else(
                        || {
                            "missing service-account credentials (GOOGLE_APPLICATION_CREDENTIALS_JSON)"
                                .to_string()
                        },
                    ))
                })?;
                let client = SessionsClient::new(creds, &self.settings.api_base)?;
                log::info!("dialogflow sessions client ready for project {}", project_id);
                Ok::<_, BridgeError>(client)
            })
            .await
    }
}

#[async_trait]
impl IntentBackend for SessionGateway {
    async fn query(
        &self,
        user_id: &str,
        text: &str,
        language_code: Option<&str>,
    ) -> Result<QueryResult, BridgeError> {
        let session = self.session_key(user_id)?;
        let client = self.client().await?;
        let request = DetectIntentRequest::text(text, self.language_code(language_code));
        log::debug!("detectIntent for {}", session);
        let response = client.detect_intent(&session, &request).await?;
        Ok(response.query_result.unwrap_or_default())
    }

    fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(project_id: Option<&str>, creds: Option<&str>) -> DialogflowSettings {
        DialogflowSettings {
            project_id: project_id.map(str::to_string),
            credentials_json: creds.map(str::to_string),
            credentials_error: None,
            language_code: "en".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
        }
    }

    #[test]
    fn session_key_is_deterministic_and_distinct() {
        let gw = SessionGateway::new(settings(Some("autosales-1"), None));
        let a1 = gw.session_key("1001").unwrap();
        let a2 = gw.session_key("1001").unwrap();
        let b = gw.session_key("1002").unwrap();
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(a1.session_id(), "1001");
        assert_eq!(a1.to_string(), "projects/autosales-1/agent/sessions/1001");
    }

    #[test]
    fn language_default_applies_to_missing_or_blank() {
        let gw = SessionGateway::new(settings(Some("p"), None));
        assert_eq!(gw.language_code(None), "en");
        assert_eq!(gw.language_code(Some("  ")), "en");
        assert_eq!(gw.language_code(Some("ru")), "ru");
    }

    #[tokio::test]
    async fn missing_project_id_is_configuration_error() {
        let gw = SessionGateway::new(settings(None, Some("{}")));
        let err = gw.query("1", "hi", None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
        assert!(!gw.is_configured());
        assert!(!gw.is_connected());
    }

    #[tokio::test]
    async fn missing_credentials_fail_every_request() {
        let gw = SessionGateway::new(settings(Some("p"), None));
        for _ in 0..2 {
            let err = gw.query("1", "hi", None).await.unwrap_err();
            assert!(matches!(err, BridgeError::Configuration(_)));
        }
        assert!(!gw.is_connected());
    }

    #[tokio::test]
    async fn unreadable_key_file_is_reported_per_request() {
        let mut s = settings(Some("p"), None);
        s.credentials_error = Some("reading service-account key from /missing/key.json".to_string());
        let gw = SessionGateway::new(s);
        match gw.query("1", "hi", None).await.unwrap_err() {
            BridgeError::Configuration(msg) => assert!(msg.contains("/missing/key.json"), "{}", msg),
            other => panic!("expected configuration error, got {:?}", other),
        }
        assert!(!gw.is_configured());
    }

    #[tokio::test]
    async fn malformed_credentials_are_configuration_error() {
        let gw = SessionGateway::new(settings(Some("p"), Some("{not json")));
        let err = gw.query("1", "hi", None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }
}
