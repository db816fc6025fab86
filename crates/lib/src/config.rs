//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.fuelbridge/config.json`) and environment.
//! Environment variables win over the file so the bridge can run from env alone on
//! serverless hosts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Webhook server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Dialogflow agent settings.
    #[serde(default)]
    pub dialogflow: DialogflowConfig,
}

/// Gateway bind, port, route and shared secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 3000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Route the chat platform POSTs to (default "/chatfuel").
    #[serde(default = "default_gateway_path")]
    pub path: String,

    /// Shared secret expected in the `X-Secret` header. Overridden by BOT_SECRET env.
    #[serde(default)]
    pub secret: Option<String>,
}

/// Dialogflow ES agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogflowConfig {
    /// GCP project that owns the agent. Overridden by DF_PROJECT_ID env.
    #[serde(default)]
    pub project_id: Option<String>,

    /// Service-account key as inline JSON. Overridden by GOOGLE_APPLICATION_CREDENTIALS_JSON env.
    #[serde(default)]
    pub credentials_json: Option<String>,

    /// Path to a service-account key file. Used when no inline JSON is set. Overridden by GOOGLE_APPLICATION_CREDENTIALS env.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,

    /// Language tag used when the inbound request carries none (default "en").
    #[serde(default = "default_language_code")]
    pub language_code: String,

    /// Dialogflow REST base URL (default https://dialogflow.googleapis.com).
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_path() -> String {
    "/chatfuel".to_string()
}

fn default_language_code() -> String {
    "en".to_string()
}

fn default_api_base() -> String {
    "https://dialogflow.googleapis.com".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            path: default_gateway_path(),
            secret: None,
        }
    }
}

impl Default for DialogflowConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            credentials_json: None,
            credentials_path: None,
            language_code: default_language_code(),
            api_base: default_api_base(),
        }
    }
}

/// Everything the Dialogflow session layer needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct DialogflowSettings {
    pub project_id: Option<String>,
    /// Raw service-account key JSON (inline or read from the key file).
    pub credentials_json: Option<String>,
    /// Why the key file could not be loaded; reported on every turn instead of failing startup.
    pub credentials_error: Option<String>,
    pub language_code: String,
    pub api_base: String,
}

impl DialogflowSettings {
    /// True when both project id and credentials are present.
    pub fn is_configured(&self) -> bool {
        self.project_id.is_some() && self.credentials_json.is_some()
    }
}

fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn env_non_blank(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| non_blank(&s))
}

/// Resolve the webhook shared secret: env BOT_SECRET overrides config.
pub fn resolve_gateway_secret(config: &Config) -> Option<String> {
    env_non_blank("BOT_SECRET").or_else(|| {
        config
            .gateway
            .secret
            .as_deref()
            .and_then(non_blank)
    })
}

/// Resolve the Dialogflow project id: env DF_PROJECT_ID overrides config.
pub fn resolve_project_id(config: &Config) -> Option<String> {
    env_non_blank("DF_PROJECT_ID").or_else(|| {
        config
            .dialogflow
            .project_id
            .as_deref()
            .and_then(non_blank)
    })
}

/// Resolve the service-account key JSON. Precedence: GOOGLE_APPLICATION_CREDENTIALS_JSON env,
/// `dialogflow.credentialsJson`, then the key file from GOOGLE_APPLICATION_CREDENTIALS env or
/// `dialogflow.credentialsPath`. A key file that cannot be read is an error.
pub fn resolve_credentials_json(config: &Config) -> Result<Option<String>> {
    if let Some(json) = env_non_blank("GOOGLE_APPLICATION_CREDENTIALS_JSON") {
        return Ok(Some(json));
    }
    if let Some(json) = config
        .dialogflow
        .credentials_json
        .as_deref()
        .and_then(non_blank)
    {
        return Ok(Some(json));
    }
    let path = env_non_blank("GOOGLE_APPLICATION_CREDENTIALS")
        .map(PathBuf::from)
        .or_else(|| {
            config
                .dialogflow
                .credentials_path
                .clone()
                .filter(|p| !p.as_os_str().is_empty())
        });
    match path {
        Some(p) => {
            let s = std::fs::read_to_string(&p)
                .with_context(|| format!("reading service-account key from {}", p.display()))?;
            Ok(non_blank(&s))
        }
        None => Ok(None),
    }
}

/// Build the startup view of the Dialogflow settings (env applied). An unreadable key file
/// leaves the bridge unconfigured rather than stopping it.
pub fn resolve_dialogflow_settings(config: &Config) -> DialogflowSettings {
    let language_code =
        non_blank(&config.dialogflow.language_code).unwrap_or_else(default_language_code);
    let api_base = non_blank(&config.dialogflow.api_base)
        .unwrap_or_else(default_api_base)
        .trim_end_matches('/')
        .to_string();
    let (credentials_json, credentials_error) = match resolve_credentials_json(config) {
        Ok(json) => (json, None),
        Err(e) => {
            log::error!("{:#}", e);
            (None, Some(format!("{:#}", e)))
        }
    };
    DialogflowSettings {
        project_id: resolve_project_id(config),
        credentials_json,
        credentials_error,
        language_code,
        api_base,
    }
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("FUELBRIDGE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".fuelbridge").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or FUELBRIDGE_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Write a default config file if none exists at `path`. Returns true when a file was written.
pub fn init_config_file(path: &Path) -> Result<bool> {
    if path.exists() {
        log::debug!("config already exists at {}, skipping", path.display());
        return Ok(false);
    }
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating config directory {}", dir.display()))?;
    let body = serde_json::to_string_pretty(&Config::default())?;
    std::fs::write(path, body)
        .with_context(|| format!("writing default config to {}", path.display()))?;
    log::info!("created default config at {}", path.display());
    Ok(true)
}
