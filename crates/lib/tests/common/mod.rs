//! Shared helpers: mock completion / WhatsApp servers and a gateway bound to an ephemeral port.
#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use relay::config::Config;
use relay::gateway::{self, GatewayState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const VERIFY_TOKEN: &str = "test-verify-token";
pub const WHATSAPP_TOKEN: &str = "wa-test-token";
pub const PHONE_NUMBER_ID: &str = "123456789";

/// Request bodies captured by a mock, in arrival order.
#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<Value>>>);

impl Recorded {
    pub fn all(&self) -> Vec<Value> {
        self.0.lock().expect("recorded lock").clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().expect("recorded lock").len()
    }

    fn push(&self, v: Value) -> usize {
        let mut g = self.0.lock().expect("recorded lock");
        g.push(v);
        g.len()
    }
}

/// Serve `app` on 127.0.0.1 with an OS-assigned port; returns its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

async fn completion_ok(State(rec): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    let n = rec.push(body);
    Json(json!({
        "id": format!("msg_{}", n),
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": format!("R{}", n) }],
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 10, "output_tokens": 2 }
    }))
}

async fn completion_slow(State(rec): State<Recorded>, body: Json<Value>) -> Json<Value> {
    let reply = completion_ok(State(rec), body).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    reply
}

async fn completion_failing(
    State(rec): State<Recorded>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    rec.push(body);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "type": "error", "error": { "type": "api_error", "message": "overloaded" } })),
    )
}

/// Completion API mock replying "R1", "R2", ... in request order.
pub async fn completion_mock() -> (String, Recorded) {
    let rec = Recorded::default();
    let app = Router::new()
        .route("/v1/messages", post(completion_ok))
        .with_state(rec.clone());
    (serve(app).await, rec)
}

/// Like [`completion_mock`], but each reply is held back briefly after the request is recorded.
pub async fn slow_completion_mock() -> (String, Recorded) {
    let rec = Recorded::default();
    let app = Router::new()
        .route("/v1/messages", post(completion_slow))
        .with_state(rec.clone());
    (serve(app).await, rec)
}

/// Completion API mock that always answers 500.
pub async fn failing_completion_mock() -> (String, Recorded) {
    let rec = Recorded::default();
    let app = Router::new()
        .route("/v1/messages", post(completion_failing))
        .with_state(rec.clone());
    (serve(app).await, rec)
}

fn capture(rec: &Recorded, phone_id: String, headers: &HeaderMap, body: Value) -> usize {
    rec.push(json!({
        "phone_id": phone_id,
        "authorization": headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
        "body": body,
    }))
}

async fn whatsapp_ok(
    State(rec): State<Recorded>,
    Path(phone_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let n = capture(&rec, phone_id, &headers, body);
    Json(json!({
        "messaging_product": "whatsapp",
        "messages": [{ "id": format!("wamid.TEST{}", n) }]
    }))
}

async fn whatsapp_rejecting(
    State(rec): State<Recorded>,
    Path(phone_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    capture(&rec, phone_id, &headers, body);
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": { "message": "Invalid OAuth access token.", "code": 190 } })),
    )
}

/// WhatsApp Cloud API mock accepting every send.
pub async fn whatsapp_mock() -> (String, Recorded) {
    let rec = Recorded::default();
    let app = Router::new()
        .route("/v21.0/:phone_id/messages", post(whatsapp_ok))
        .with_state(rec.clone());
    (serve(app).await, rec)
}

/// WhatsApp Cloud API mock rejecting every send with 401.
pub async fn rejecting_whatsapp_mock() -> (String, Recorded) {
    let rec = Recorded::default();
    let app = Router::new()
        .route("/v21.0/:phone_id/messages", post(whatsapp_rejecting))
        .with_state(rec.clone());
    (serve(app).await, rec)
}

/// Config pointing at the mocks. `completion_url = None` leaves the API key unset.
pub fn config(completion_url: Option<&str>, whatsapp_url: &str) -> Config {
    let mut c = Config::default();
    c.gateway.verify_token = Some(VERIFY_TOKEN.to_string());
    if let Some(url) = completion_url {
        c.completion.base_url = url.to_string();
        c.completion.api_key = Some("test-key".to_string());
    }
    c.whatsapp.api_base_url = whatsapp_url.to_string();
    c.whatsapp.token = Some(WHATSAPP_TOKEN.to_string());
    c.whatsapp.phone_number_id = Some(PHONE_NUMBER_ID.to_string());
    c.logging.file = None;
    c
}

/// Serve the gateway router for `config`; returns its base URL and the shared state.
pub async fn spawn_gateway(config: Config) -> (String, GatewayState) {
    let state = GatewayState::new(config).expect("gateway state");
    let url = serve(gateway::router(state.clone())).await;
    (url, state)
}

/// Webhook envelope carrying the given messages.
pub fn whatsapp_delivery(messages: Value) -> Value {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA_ID",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "15550000000",
                        "phone_number_id": PHONE_NUMBER_ID
                    },
                    "contacts": [{ "profile": { "name": "Maria" }, "wa_id": "5511988887777" }],
                    "messages": messages
                }
            }]
        }]
    })
}

pub fn text_message(from: &str, body: &str) -> Value {
    json!({
        "from": from,
        "id": "wamid.IN",
        "timestamp": "1700000000",
        "type": "text",
        "text": { "body": body }
    })
}
