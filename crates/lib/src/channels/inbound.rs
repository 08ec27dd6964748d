//! Inbound webhook payloads from the WhatsApp Cloud API and extraction of the message to answer.
//!
//! Deliveries are walked as raw JSON down to `entry[0].changes[0].value`; anything outside that
//! path (later entries, sibling changes, non-text messages) is never deserialized, so a broken
//! sibling cannot block the message we answer.

use serde::Deserialize;
use serde_json::Value;

/// `object` marker carried by every WhatsApp Business webhook delivery.
pub const WHATSAPP_OBJECT: &str = "whatsapp_business_account";

/// The selected text message. Only this one is deserialized.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<TextBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// A text message from a sender, ready for the relay loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: String,
    pub text: String,
}

/// What a delivery contains once the first entry/change has been opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// No `messages` array (e.g. a status callback) or an empty entry/change list.
    NoMessages,
    /// Messages were present but none had type `text`.
    NoText,
    /// The first text message; `skipped` counts the other messages in the batch left unhandled.
    Text { message: InboundMessage, skipped: usize },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InboundError {
    #[error("text message has no sender")]
    MissingSender,
    #[error("text message from {0} has no body")]
    MissingTextBody(String),
    #[error("malformed text message: {0}")]
    MalformedMessage(String),
}

/// True when the delivery's `object` marker is the WhatsApp Business one.
pub fn is_whatsapp(raw: &Value) -> bool {
    raw.get("object").and_then(Value::as_str) == Some(WHATSAPP_OBJECT)
}

/// `entry[0].changes[0].value`, when every step of the path exists.
pub fn first_change_value(raw: &Value) -> Option<&Value> {
    raw.get("entry")?.get(0)?.get("changes")?.get(0)?.get("value")
}

/// Open entry[0].changes[0].value and pick the first text message.
/// Only one text message per delivery is answered; the rest are counted in `skipped`.
pub fn extract(raw: &Value) -> Result<Extracted, InboundError> {
    let Some(messages) = first_change_value(raw)
        .and_then(|v| v.get("messages"))
        .and_then(Value::as_array)
    else {
        return Ok(Extracted::NoMessages);
    };
    let Some((pos, first)) = messages
        .iter()
        .enumerate()
        .find(|(_, m)| m.get("type").and_then(Value::as_str) == Some("text"))
    else {
        return Ok(Extracted::NoText);
    };
    let message: WebhookMessage = serde_json::from_value(first.clone())
        .map_err(|e| InboundError::MalformedMessage(e.to_string()))?;
    let sender = message
        .from
        .filter(|s| !s.trim().is_empty())
        .ok_or(InboundError::MissingSender)?;
    let text = message
        .text
        .ok_or_else(|| InboundError::MissingTextBody(sender.clone()))?;
    Ok(Extracted::Text {
        message: InboundMessage {
            sender,
            text: text.body,
        },
        skipped: messages.len() - pos - 1,
    })
}
