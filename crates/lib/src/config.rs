//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.clinic-relay/config.json`) and then overlaid
//! with environment variables, so secrets can live in `.env` instead of the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Env var that overrides `gateway.verifyToken`.
pub const ENV_VERIFY_TOKEN: &str = "WEBHOOK_VERIFY_TOKEN";
/// Env var that overrides `completion.apiKey`.
pub const ENV_COMPLETION_API_KEY: &str = "ANTHROPIC_API_KEY";
/// Env var that overrides `whatsapp.token`.
pub const ENV_WHATSAPP_TOKEN: &str = "WHATSAPP_TOKEN";
/// Env var that overrides `whatsapp.phoneNumberId`.
pub const ENV_PHONE_NUMBER_ID: &str = "WHATSAPP_PHONE_NUMBER_ID";
/// Env var that overrides `environment`.
pub const ENV_ENVIRONMENT: &str = "ENVIRONMENT";

const DEFAULT_SYSTEM_PROMPT: &str = "Você é uma recepcionista virtual de uma clínica médica.
Seja sempre cordial e profissional. Identifique-se como Ana, a assistente virtual.
Suas principais funções são:
1. Dar boas vindas
2. Coletar nome do paciente
3. Entender qual serviço procura
4. Verificar disponibilidade de horários
5. Agendar consultas

Mantenha as respostas curtas e objetivas. Não ultrapasse 200 caracteres por mensagem.
";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Deployment flavour; selects default log verbosity.
    #[serde(default)]
    pub environment: Environment,

    /// HTTP listener and webhook verification settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// WhatsApp Cloud API credentials and endpoint.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Completion API credentials, model and prompt shape.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Bounds for the in-memory conversation store.
    #[serde(default)]
    pub conversations: ConversationsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    /// Parse the `ENVIRONMENT` value; anything other than "development" is production.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("development") {
            Environment::Development
        } else {
            Environment::Production
        }
    }

    /// Log filter used when RUST_LOG is not set.
    pub fn default_log_filter(self) -> &'static str {
        match self {
            Environment::Development => "debug",
            Environment::Production => "info",
        }
    }
}

/// Gateway bind, port, and webhook verification token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 8000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; the messaging provider must reach the webhook).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Shared secret echoed by the provider during `hub.verify_token` verification.
    /// Overridden by WEBHOOK_VERIFY_TOKEN env.
    pub verify_token: Option<String>,
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            verify_token: None,
        }
    }
}

/// WhatsApp Cloud API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppConfig {
    /// Graph API root, without version (default "https://graph.facebook.com").
    #[serde(default = "default_whatsapp_base_url")]
    pub api_base_url: String,
    /// Graph API version segment (default "v21.0").
    #[serde(default = "default_whatsapp_api_version")]
    pub api_version: String,
    /// Bearer token. Overridden by WHATSAPP_TOKEN env.
    pub token: Option<String>,
    /// Sender phone-number id. Overridden by WHATSAPP_PHONE_NUMBER_ID env.
    pub phone_number_id: Option<String>,
}

fn default_whatsapp_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_whatsapp_api_version() -> String {
    "v21.0".to_string()
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_whatsapp_base_url(),
            api_version: default_whatsapp_api_version(),
            token: None,
            phone_number_id: None,
        }
    }
}

/// Completion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionConfig {
    /// API key. Overridden by ANTHROPIC_API_KEY env.
    /// When absent, replies degrade to a fixed message.
    pub api_key: Option<String>,
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    /// Response-length cap sent with every request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// How many trailing history entries go into each prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Send a tiny request at startup and refuse to start if it fails (only when a key is set).
    #[serde(default = "default_true")]
    pub probe_on_startup: bool,
}

fn default_completion_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_completion_model() -> String {
    "claude-3-sonnet-20240229".to_string()
}

fn default_max_tokens() -> u32 {
    150
}

fn default_history_window() -> usize {
    4
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            max_tokens: default_max_tokens(),
            history_window: default_history_window(),
            system_prompt: default_system_prompt(),
            probe_on_startup: true,
        }
    }
}

/// Conversation store bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationsConfig {
    /// Maximum number of senders kept in memory; least recently used is evicted.
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,
    /// Maximum user/assistant exchanges kept per sender (0 = unbounded).
    #[serde(default = "default_max_exchanges")]
    pub max_exchanges: usize,
}

fn default_max_conversations() -> usize {
    10_000
}

fn default_max_exchanges() -> usize {
    50
}

impl Default for ConversationsConfig {
    fn default() -> Self {
        Self {
            max_conversations: default_max_conversations(),
            max_exchanges: default_max_exchanges(),
        }
    }
}

/// Log sinks besides stderr.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Append-only log file (default "logs/app.log"). Null disables the file sink.
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("logs").join("app.log"))
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

/// Env value wins when set and non-blank; otherwise the trimmed, non-blank config value.
fn pick_secret(env_value: Option<String>, configured: Option<&String>) -> Option<String> {
    env_value
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            configured
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

fn resolve_secret(var: &str, configured: Option<&String>) -> Option<String> {
    pick_secret(std::env::var(var).ok(), configured)
}

impl Config {
    /// Overlay WEBHOOK_VERIFY_TOKEN, ANTHROPIC_API_KEY, WHATSAPP_TOKEN, WHATSAPP_PHONE_NUMBER_ID
    /// and ENVIRONMENT onto the file values.
    pub fn with_env_overrides(mut self) -> Self {
        self.gateway.verify_token =
            resolve_secret(ENV_VERIFY_TOKEN, self.gateway.verify_token.as_ref());
        self.completion.api_key =
            resolve_secret(ENV_COMPLETION_API_KEY, self.completion.api_key.as_ref());
        self.whatsapp.token = resolve_secret(ENV_WHATSAPP_TOKEN, self.whatsapp.token.as_ref());
        self.whatsapp.phone_number_id =
            resolve_secret(ENV_PHONE_NUMBER_ID, self.whatsapp.phone_number_id.as_ref());
        if let Ok(v) = std::env::var(ENV_ENVIRONMENT) {
            if !v.trim().is_empty() {
                self.environment = Environment::from_env_value(&v);
            }
        }
        self
    }

    /// Verify token with blank values treated as absent.
    pub fn verify_token(&self) -> Option<&str> {
        self.gateway
            .verify_token
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".clinic-relay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, RELAY_CONFIG_PATH, or the default. Missing file => defaults.
/// Environment overrides are applied on top. Returns the config and the path that was used.
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
    Ok((config.with_env_overrides(), path))
}
