//! Gateway HTTP wire types (query parameters and JSON response bodies).

use serde::{Deserialize, Serialize};

/// Query string of `GET /webhook` (`hub.mode`, `hub.verify_token`, `hub.challenge`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Body of every `POST /webhook` response. Always served with HTTP 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookStatus {
    Ignored,
    NoMessage,
    Processed,
    Error { message: String },
}

/// Query string of `POST /test/send-text`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendTextParams {
    pub phone: String,
    pub message: String,
}

/// Query string of `POST /test/send-template`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendTemplateParams {
    pub phone: String,
    #[serde(default = "default_template_name")]
    pub template_name: String,
}

fn default_template_name() -> String {
    "hello_world".to_string()
}

/// Body of the diagnostic send endpoints: `{"status":"success","request","response"}` or
/// `{"status":"error","message"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendOutcome {
    Success {
        request: serde_json::Value,
        response: serde_json::Value,
    },
    Error {
        message: String,
    },
}
