//! Service-account credentials and OAuth2 access tokens (JWT bearer grant).
//!
//! The key JSON is parsed once; the signed assertion is exchanged at the key's
//! `token_uri` for a short-lived bearer token which is cached until shortly
//! before it expires.

use crate::dialogflow::DialogflowError;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &str =
    "https://www.googleapis.com/auth/cloud-platform https://www.googleapis.com/auth/dialogflow";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this many seconds before the token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("service-account key is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("service-account key has no {0}")]
    MissingField(&'static str),
    #[error("service-account private key rejected: {0}")]
    InvalidKey(String),
}

/// Fields of a Google service-account key file that the bridge uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, CredentialsError> {
        let key: ServiceAccountKey = serde_json::from_str(json)?;
        if key.client_email.trim().is_empty() {
            return Err(CredentialsError::MissingField("client_email"));
        }
        if key.private_key.trim().is_empty() {
            return Err(CredentialsError::MissingField("private_key"));
        }
        Ok(key)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: i64,
}

impl AccessToken {
    fn is_fresh(&self, now: i64) -> bool {
        now + EXPIRY_MARGIN_SECS < self.expires_at
    }
}

/// Mints and caches bearer tokens for one service account.
pub struct TokenSource {
    client_email: String,
    key_id: Option<String>,
    token_uri: String,
    signing_key: EncodingKey,
    http: reqwest::Client,
    cached: RwLock<Option<AccessToken>>,
}

impl TokenSource {
    /// Parse the PEM private key up front so a bad key is reported as a configuration problem.
    pub fn new(key: &ServiceAccountKey, http: reqwest::Client) -> Result<Self, CredentialsError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| CredentialsError::InvalidKey(e.to_string()))?;
        let token_uri = key
            .token_uri
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_TOKEN_URI)
            .to_string();
        Ok(Self {
            client_email: key.client_email.clone(),
            key_id: key.private_key_id.clone(),
            token_uri,
            signing_key,
            http,
            cached: RwLock::new(None),
        })
    }

    /// Current bearer token, minting a new one when the cached token is missing or about to expire.
    pub async fn token(&self) -> Result<String, DialogflowError> {
        let now = chrono::Utc::now().timestamp();
        if let Some(t) = self.cached.read().await.as_ref() {
            if t.is_fresh(now) {
                return Ok(t.value.clone());
            }
        }
        let mut slot = self.cached.write().await;
        // Another request may have refreshed while we waited for the write lock.
        if let Some(t) = slot.as_ref() {
            if t.is_fresh(now) {
                return Ok(t.value.clone());
            }
        }
        let fresh = self.fetch(now).await?;
        let value = fresh.value.clone();
        *slot = Some(fresh);
        Ok(value)
    }

    fn assertion(&self, now: i64) -> Result<String, DialogflowError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();
        let claims = Claims {
            iss: &self.client_email,
            scope: SCOPES,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|e| DialogflowError::Token(format!("signing assertion: {}", e)))
    }

    async fn fetch(&self, now: i64) -> Result<AccessToken, DialogflowError> {
        let assertion = self.assertion(now)?;
        log::debug!("minting access token for {}", self.client_email);
        let res = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(DialogflowError::Token(format!("{} {}", status, body)));
        }
        let data: TokenResponse = res.json().await?;
        Ok(AccessToken {
            value: data.access_token,
            expires_at: now + data.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS),
        })
    }
}
