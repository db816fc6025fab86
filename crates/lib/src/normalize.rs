//! Response normalizer: collapse a Dialogflow query result into flat display messages.
//!
//! Priority (first rule that applies wins):
//! 1. structured fragments: one message per text fragment, lines joined with `\n`;
//! 2. otherwise the flat `fulfillmentText`;
//! 3. if nothing usable came out, a single placeholder message.

use crate::dialogflow::{FulfillmentMessage, QueryResult};
use serde::{Deserialize, Serialize};

/// Text shown when the agent produced nothing displayable.
pub const PLACEHOLDER_TEXT: &str = "…";

/// One chat bubble as the chat platform expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub text: String,
}

impl DisplayMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Normalizer output. `messages` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub messages: Vec<DisplayMessage>,
    /// Matched intent display name; `None` when absent or empty.
    pub intent: Option<String>,
}

/// Map a query result to display messages and the matched intent.
pub fn normalize(result: &QueryResult) -> Normalized {
    let mut messages: Vec<DisplayMessage> = if !result.fulfillment_messages.is_empty() {
        result
            .fulfillment_messages
            .iter()
            .filter_map(display_from_fragment)
            .collect()
    } else {
        result
            .fulfillment_text
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(DisplayMessage::new)
            .into_iter()
            .collect()
    };
    if messages.is_empty() {
        messages.push(DisplayMessage::new(PLACEHOLDER_TEXT));
    }
    Normalized {
        messages,
        intent: intent_label(result),
    }
}

/// Display message for a single fragment. Only text fragments map today; cards, quick
/// replies and custom payloads are dropped here and would get their own variants.
pub fn display_from_fragment(fragment: &FulfillmentMessage) -> Option<DisplayMessage> {
    match fragment.text.as_ref() {
        Some(t) if !t.text.is_empty() => Some(DisplayMessage::new(t.text.join("\n"))),
        _ => {
            if !fragment.other.is_empty() {
                log::debug!(
                    "dropping non-text fragment ({})",
                    fragment.other.keys().cloned().collect::<Vec<_>>().join(",")
                );
            }
            None
        }
    }
}

fn intent_label(result: &QueryResult) -> Option<String> {
    result
        .intent
        .as_ref()
        .and_then(|i| i.display_name.as_deref())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogflow::Intent;

    fn texts(n: &Normalized) -> Vec<&str> {
        n.messages.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn fragments_join_lines_in_order() {
        let result = QueryResult {
            fulfillment_messages: vec![
                FulfillmentMessage::from_lines(["Hello", "World"]),
                FulfillmentMessage::from_lines(["Bye"]),
            ],
            fulfillment_text: Some("ignored".to_string()),
            ..Default::default()
        };
        assert_eq!(texts(&normalize(&result)), vec!["Hello\nWorld", "Bye"]);
    }

    #[test]
    fn empty_fragments_are_skipped() {
        let result = QueryResult {
            fulfillment_messages: vec![
                FulfillmentMessage::from_lines(Vec::<String>::new()),
                FulfillmentMessage::from_lines(["Only me"]),
            ],
            ..Default::default()
        };
        assert_eq!(texts(&normalize(&result)), vec!["Only me"]);
    }

    #[test]
    fn flat_text_when_no_fragments() {
        let result = QueryResult {
            fulfillment_text: Some("Hi there".to_string()),
            ..Default::default()
        };
        assert_eq!(texts(&normalize(&result)), vec!["Hi there"]);
    }

    #[test]
    fn placeholder_when_nothing_usable() {
        assert_eq!(texts(&normalize(&QueryResult::default())), vec![PLACEHOLDER_TEXT]);
        let blank = QueryResult {
            fulfillment_text: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(texts(&normalize(&blank)), vec!["…"]);
    }

    #[test]
    fn rich_only_fragments_fall_to_placeholder_not_flat_text() {
        let mut card = FulfillmentMessage::default();
        card.other.insert("card".to_string(), serde_json::json!({ "title": "Cars" }));
        let result = QueryResult {
            fulfillment_messages: vec![card],
            fulfillment_text: Some("flat".to_string()),
            ..Default::default()
        };
        assert_eq!(texts(&normalize(&result)), vec!["…"]);
    }

    #[test]
    fn intent_label_only_when_non_empty() {
        let mut result = QueryResult {
            intent: Some(Intent {
                name: Some("projects/p/agent/intents/1".to_string()),
                display_name: Some("order.status".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(normalize(&result).intent.as_deref(), Some("order.status"));
        result.intent = Some(Intent {
            name: None,
            display_name: Some(String::new()),
        });
        assert_eq!(normalize(&result).intent, None);
        result.intent = None;
        assert_eq!(normalize(&result).intent, None);
    }
}
