//! Messaging channel: WhatsApp Cloud API.
//!
//! Inbound webhook deliveries are parsed into [`InboundMessage`]s; replies go out through
//! [`WhatsAppChannel`].

mod inbound;
mod whatsapp;

pub use inbound::{
    extract, first_change_value, is_whatsapp, Extracted, InboundError, InboundMessage, TextBody,
    WebhookMessage, WHATSAPP_OBJECT,
};
pub use whatsapp::{
    normalize_recipient, MessageKind, OutboundBody, OutboundPayload, WhatsAppChannel,
    WhatsAppError, TEMPLATE_LANGUAGE,
};
