//! Gateway HTTP server: webhook verification, inbound dispatch and diagnostic send routes.

use crate::agent;
use crate::channels::{
    self, Extracted, InboundError, InboundMessage, WhatsAppChannel, WhatsAppError,
};
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::gateway::protocol::{
    SendOutcome, SendTemplateParams, SendTextParams, VerifyParams, WebhookStatus,
};
use crate::gateway::verify::{verify_subscription, Challenge, VerifyError};
use crate::llm::AnthropicClient;
use crate::policy;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Shared state for the gateway (config, conversations, downstream clients).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    verify_token: Arc<str>,
    pub conversations: Arc<ConversationStore>,
    pub completion: AnthropicClient,
    pub whatsapp: WhatsAppChannel,
}

impl GatewayState {
    /// Build state from config without touching the network. Fails when no verify token is
    /// configured: the webhook could never be verified without one.
    pub fn new(config: Config) -> Result<Self> {
        let verify_token: Arc<str> = match config.verify_token() {
            Some(t) => Arc::from(t),
            None => anyhow::bail!(
                "webhook verify token not configured (set gateway.verifyToken or {})",
                crate::config::ENV_VERIFY_TOKEN
            ),
        };
        let completion = AnthropicClient::from_config(&config.completion);
        let whatsapp = WhatsAppChannel::from_config(&config.whatsapp);
        let conversations = Arc::new(ConversationStore::new(config.conversations));
        Ok(Self {
            config: Arc::new(config),
            verify_token,
            conversations,
            completion,
            whatsapp,
        })
    }
}

/// Failures inside webhook processing. Reported to the provider as an error status body.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid webhook body: {0}")]
    InvalidBody(#[from] serde_json::Error),
    #[error(transparent)]
    Inbound(#[from] InboundError),
    #[error(transparent)]
    Send(#[from] WhatsAppError),
}

/// Routes: health, webhook verify/receive, and the diagnostic send endpoints.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health_http))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/test/send-text", post(test_send_text))
        .route("/test/send-template", post(test_send_template))
        .with_state(state)
}

/// Handle one webhook delivery: ignore foreign payloads, answer the first text message.
/// Only invalid JSON or a broken selected text message is an error.
pub async fn dispatch(state: &GatewayState, body: &[u8]) -> Result<WebhookStatus, DispatchError> {
    let raw: serde_json::Value = serde_json::from_slice(body)?;
    log::info!("webhook POST received: {}", raw);
    if !channels::is_whatsapp(&raw) {
        log::info!("ignoring non-WhatsApp event");
        return Ok(WebhookStatus::Ignored);
    }
    match channels::extract(&raw)? {
        Extracted::NoMessages | Extracted::NoText => {
            log::info!("no text message to process");
            Ok(WebhookStatus::NoMessage)
        }
        Extracted::Text { message, skipped } => {
            if skipped > 0 {
                log::warn!(
                    "first text message answered; {} later message(s) from {} left unhandled",
                    skipped,
                    message.sender
                );
            }
            process_inbound_message(state, message).await?;
            Ok(WebhookStatus::Processed)
        }
    }
}

/// Relay one text message: lock the sender's record, generate a reply, record the exchange,
/// send the reply. The record stays locked until the send finishes so a second delivery from
/// the same sender sees the completed exchange.
pub async fn process_inbound_message(
    state: &GatewayState,
    msg: InboundMessage,
) -> Result<serde_json::Value, WhatsAppError> {
    log::info!("processing message from {}: {}", msg.sender, msg.text);
    let slot = state.conversations.checkout(&msg.sender).await;
    let mut record = slot.lock().await;
    let reply = agent::generate_reply(
        &state.completion,
        &state.config.completion,
        &record,
        &msg.text,
    )
    .await;
    record.push_exchange(
        msg.text.as_str(),
        reply.as_str(),
        state.conversations.limits().max_exchanges,
    );
    log::info!("sending reply to {}", msg.sender);
    policy::propagate("reply delivery", state.whatsapp.send_text(&msg.sender, &reply).await)
}

/// Probe the completion API (when a key is set) and warn about missing send credentials.
async fn startup_checks(state: &GatewayState) -> Result<()> {
    if !state.completion.has_api_key() {
        log::warn!(
            "completion api key not configured; replies will use the technical-difficulty message"
        );
    } else if state.config.completion.probe_on_startup {
        state
            .completion
            .probe()
            .await
            .context("completion client probe failed")?;
        log::info!("completion client ready (model {})", state.completion.model());
    }
    if state.config.whatsapp.token.is_none() || state.config.whatsapp.phone_number_id.is_none() {
        log::warn!("whatsapp token or phone number id not configured; replies cannot be delivered");
    }
    Ok(())
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Fails before binding when the verify token is missing or the completion probe fails.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let state = GatewayState::new(config)?;
    startup_checks(&state).await?;

    let bind_addr = format!(
        "{}:{}",
        state.config.gateway.bind.trim(),
        state.config.gateway.port
    );
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET /health: liveness probe.
async fn health_http() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Local::now().to_rfc3339(),
    }))
}

/// GET /webhook: subscription handshake; echoes the challenge as a JSON integer.
async fn verify_webhook(
    State(state): State<GatewayState>,
    Query(params): Query<VerifyParams>,
) -> Result<Challenge, VerifyError> {
    log::info!(
        "webhook verification: mode={:?} challenge={:?}",
        params.mode,
        params.challenge
    );
    let challenge = verify_subscription(&params, &state.verify_token)?;
    log::info!("webhook verified, challenge {}", challenge.as_str());
    Ok(challenge)
}

/// POST /webhook: always 200; failures become `{"status":"error","message":..}` so the
/// provider does not retry the delivery.
async fn receive_webhook(State(state): State<GatewayState>, body: Bytes) -> Json<WebhookStatus> {
    match dispatch(&state, &body).await {
        Ok(status) => Json(status),
        Err(e) => {
            log::error!("webhook processing failed: {:?}", e);
            Json(WebhookStatus::Error {
                message: e.to_string(),
            })
        }
    }
}

/// POST /test/send-text?phone&message
async fn test_send_text(
    State(state): State<GatewayState>,
    Query(params): Query<SendTextParams>,
) -> Json<SendOutcome> {
    let result = policy::propagate(
        "test send-text",
        state.whatsapp.send_text(&params.phone, &params.message).await,
    );
    Json(match result {
        Ok(response) => SendOutcome::Success {
            request: json!({
                "to": params.phone,
                "message": params.message,
                "type": "text",
            }),
            response,
        },
        Err(e) => SendOutcome::Error {
            message: e.to_string(),
        },
    })
}

/// POST /test/send-template?phone&template_name (default `hello_world`)
async fn test_send_template(
    State(state): State<GatewayState>,
    Query(params): Query<SendTemplateParams>,
) -> Json<SendOutcome> {
    let result = policy::propagate(
        "test send-template",
        state
            .whatsapp
            .send_template(&params.phone, &params.template_name)
            .await,
    );
    Json(match result {
        Ok(response) => SendOutcome::Success {
            request: json!({
                "to": params.phone,
                "template": params.template_name,
            }),
            response,
        },
        Err(e) => SendOutcome::Error {
            message: e.to_string(),
        },
    })
}
