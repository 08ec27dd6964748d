//! Reply generation: assemble a bounded prompt from a conversation record and ask the
//! completion API for the assistant's next message. Never fails; see [`generate_reply`].

use crate::config::CompletionConfig;
use crate::conversation::{ConversationRecord, Role, Turn};
use crate::llm::{AnthropicClient, ChatMessage, CompletionError, CompletionRequest};
use crate::policy::{self, Fallback};

/// Reply when no completion API key is configured.
pub const TECHNICAL_DIFFICULTY_REPLY: &str =
    "Desculpe, estou com problemas técnicos de configuração. Por favor, tente mais tarde.";

/// Reply when the completion call fails for any other reason.
pub const MAINTENANCE_REPLY: &str =
    "Olá! No momento estou em manutenção. Por favor, tente novamente em alguns minutos.";

impl Fallback for CompletionError {
    fn fallback_reply(&self) -> &'static str {
        match self {
            CompletionError::MissingApiKey => TECHNICAL_DIFFICULTY_REPLY,
            _ => MAINTENANCE_REPLY,
        }
    }
}

/// Last `window` history entries followed by the new user message.
pub fn build_messages(history: &[Turn], window: usize, text: &str) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(window);
    history[start..]
        .iter()
        .map(|t| ChatMessage {
            role: t.role,
            content: t.content.clone(),
        })
        .chain(std::iter::once(ChatMessage {
            role: Role::User,
            content: text.to_string(),
        }))
        .collect()
}

/// Full request for one reply: fixed system instructions, recent context, the new message.
pub fn build_request(
    settings: &CompletionConfig,
    record: &ConversationRecord,
    text: &str,
) -> CompletionRequest {
    CompletionRequest {
        system: settings.system_prompt.clone(),
        messages: build_messages(&record.history, settings.history_window, text),
        max_tokens: settings.max_tokens,
    }
}

/// Ask the completion API for a reply to `text`. Errors degrade to a fixed fallback reply,
/// so the caller always gets something to send back.
pub async fn generate_reply(
    client: &AnthropicClient,
    settings: &CompletionConfig,
    record: &ConversationRecord,
    text: &str,
) -> String {
    let request = build_request(settings, record, text);
    match serde_json::to_string(&request.messages) {
        Ok(json) => log::info!("completion request ({}): {}", client.model(), json),
        Err(e) => log::debug!("completion request not loggable: {}", e),
    }
    let result = client.complete(&request).await;
    if let Ok(ref reply) = result {
        log::info!("completion reply: {}", reply);
    }
    policy::degrade_to_fallback("completion", result)
}
