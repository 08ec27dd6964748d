//! Gateway: HTTP surface of the relay.
//!
//! Single port serves the provider-facing webhook (GET handshake, POST deliveries), a health
//! probe and two diagnostic send routes.

mod protocol;
mod server;
mod verify;

pub use protocol::{SendOutcome, SendTemplateParams, SendTextParams, VerifyParams, WebhookStatus};
pub use server::{
    dispatch, process_inbound_message, router, run_gateway, DispatchError, GatewayState,
};
pub use verify::{verify_subscription, Challenge, VerifyError};
