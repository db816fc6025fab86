//! Chat-platform webhook wire types (inbound request, outbound reply).

use crate::error::BridgeError;
use crate::normalize::{DisplayMessage, Normalized};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute name carrying the matched intent back to the chat platform.
pub const INTENT_ATTRIBUTE: &str = "df_intent";

pub const MISSING_FIELDS_TEXT: &str = "Missing user_id or text";

/// A validated inbound turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub user_id: String,
    pub text: String,
    pub language_code: Option<String>,
}

impl InboundMessage {
    /// Coerce a loosely typed JSON body. Strings are taken as-is and numbers are
    /// stringified (chat platforms send numeric user ids); any other shape, an empty
    /// string or an unparsable body counts as missing.
    pub fn from_body(body: &[u8]) -> Result<Self, BridgeError> {
        let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, BridgeError> {
        let user_id = coerce_field(value.get("user_id"));
        let text = coerce_field(value.get("text"));
        let (Some(user_id), Some(text)) = (user_id, text) else {
            return Err(BridgeError::Validation(MISSING_FIELDS_TEXT.to_string()));
        };
        let language_code = value
            .get("language_code")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(Self {
            user_id,
            text,
            language_code,
        })
    }
}

fn coerce_field(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reply body: `{ "messages": [{ "text" }], "set_attributes": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundPayload {
    pub messages: Vec<DisplayMessage>,
    #[serde(default)]
    pub set_attributes: BTreeMap<String, String>,
}

impl OutboundPayload {
    /// Single message, no attributes.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            messages: vec![DisplayMessage::new(text)],
            set_attributes: BTreeMap::new(),
        }
    }
}

impl From<Normalized> for OutboundPayload {
    fn from(n: Normalized) -> Self {
        let mut set_attributes = BTreeMap::new();
        if let Some(intent) = n.intent {
            set_attributes.insert(INTENT_ATTRIBUTE.to_string(), intent);
        }
        Self {
            messages: n.messages,
            set_attributes,
        }
    }
}

/// Body for non-conversational rejections (405, 401).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
