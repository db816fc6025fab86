//! Dialogflow ES v2 REST wire types (subset used by the bridge).

use serde::{Deserialize, Serialize};

/// Body of `POST .../sessions/{session}:detectIntent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectIntentRequest {
    pub query_input: QueryInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryInput {
    pub text: TextInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextInput {
    pub text: String,
    pub language_code: String,
}

impl DetectIntentRequest {
    pub fn text(text: impl Into<String>, language_code: impl Into<String>) -> Self {
        Self {
            query_input: QueryInput {
                text: TextInput {
                    text: text.into(),
                    language_code: language_code.into(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectIntentResponse {
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub query_result: Option<QueryResult>,
}

/// Result of one detect-intent call. Everything the normalizer reads lives here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub fulfillment_text: Option<String>,
    #[serde(default)]
    pub fulfillment_messages: Vec<FulfillmentMessage>,
    #[serde(default)]
    pub intent: Option<Intent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// One response fragment. Dialogflow sends exactly one of text, card, quickReplies,
/// payload, ...; only text is modeled, the rest is kept raw in `other`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentMessage {
    #[serde(default)]
    pub text: Option<MessageText>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageText {
    #[serde(default)]
    pub text: Vec<String>,
}

impl FulfillmentMessage {
    /// Text fragment from its lines (handy for building results by hand).
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text: Some(MessageText {
                text: lines.into_iter().map(Into::into).collect(),
            }),
            ..Default::default()
        }
    }
}
