//! WhatsApp channel: send text and template messages via the Cloud API `/messages` endpoint.

use serde::Serialize;

use crate::config::WhatsAppConfig;

const WHATSAPP_API_BASE: &str = "https://graph.facebook.com";
const WHATSAPP_API_VERSION: &str = "v21.0";
/// Language code used for every template send.
pub const TEMPLATE_LANGUAGE: &str = "en_US";

/// What `content` means in [`WhatsAppChannel::send`]: the literal body or a template name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Template,
}

/// Body of POST /{phone-number-id}/messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundPayload {
    pub messaging_product: &'static str,
    pub to: String,
    #[serde(flatten)]
    pub body: OutboundBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundBody {
    Text { text: TextContent },
    Template { template: TemplateContent },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextContent {
    pub preview_url: bool,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateContent {
    pub name: String,
    pub language: TemplateLanguage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateLanguage {
    pub code: String,
}

impl OutboundPayload {
    pub fn new(to: &str, content: &str, kind: MessageKind) -> Self {
        let body = match kind {
            MessageKind::Text => OutboundBody::Text {
                text: TextContent {
                    preview_url: false,
                    body: content.to_string(),
                },
            },
            MessageKind::Template => OutboundBody::Template {
                template: TemplateContent {
                    name: content.to_string(),
                    language: TemplateLanguage {
                        code: TEMPLATE_LANGUAGE.to_string(),
                    },
                },
            },
        };
        Self {
            messaging_product: "whatsapp",
            to: normalize_recipient(to),
            body,
        }
    }
}

/// Strip parentheses, spaces and hyphens, then prefix `+` unless already present.
pub fn normalize_recipient(raw: &str) -> String {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | ' ' | '-'))
        .collect();
    if digits.starts_with('+') {
        digits
    } else {
        format!("+{}", digits)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WhatsAppError {
    #[error("whatsapp {0} not configured")]
    NotConfigured(&'static str),
    #[error("whatsapp request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("whatsapp send failed: {status} {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Outbound WhatsApp connector.
#[derive(Clone)]
pub struct WhatsAppChannel {
    base_url: String,
    api_version: String,
    token: Option<String>,
    phone_number_id: Option<String>,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(
        base_url: Option<String>,
        api_version: Option<String>,
        token: Option<String>,
        phone_number_id: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| WHATSAPP_API_BASE.to_string()),
            api_version: api_version.unwrap_or_else(|| WHATSAPP_API_VERSION.to_string()),
            token,
            phone_number_id,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &WhatsAppConfig) -> Self {
        Self::new(
            Some(config.api_base_url.clone()),
            Some(config.api_version.clone()),
            config.token.clone(),
            config.phone_number_id.clone(),
        )
    }

    fn messages_url(&self) -> Result<String, WhatsAppError> {
        let phone_number_id = self
            .phone_number_id
            .as_ref()
            .ok_or(WhatsAppError::NotConfigured("phone number id"))?;
        Ok(format!(
            "{}/{}/{}/messages",
            self.base_url, self.api_version, phone_number_id
        ))
    }

    /// Send `content` to `to` and return the provider's JSON response.
    /// A non-2xx status is logged with its body and returned as an error.
    pub async fn send(
        &self,
        to: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<serde_json::Value, WhatsAppError> {
        let token = self
            .token
            .as_ref()
            .ok_or(WhatsAppError::NotConfigured("token"))?;
        let url = self.messages_url()?;
        let payload = OutboundPayload::new(to, content, kind);
        log::info!(
            "whatsapp send to {}: {}",
            url,
            serde_json::to_string(&payload).unwrap_or_default()
        );
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            log::error!("whatsapp response status: {}", status);
            log::error!("whatsapp response body: {}", body);
            return Err(WhatsAppError::Api { status, body });
        }
        let data: serde_json::Value = res.json().await?;
        log::info!("whatsapp message sent: {}", data);
        Ok(data)
    }

    pub async fn send_text(
        &self,
        to: &str,
        body: &str,
    ) -> Result<serde_json::Value, WhatsAppError> {
        self.send(to, body, MessageKind::Text).await
    }

    pub async fn send_template(
        &self,
        to: &str,
        template_name: &str,
    ) -> Result<serde_json::Value, WhatsAppError> {
        self.send(to, template_name, MessageKind::Template).await
    }
}
