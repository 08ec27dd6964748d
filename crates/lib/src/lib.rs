//! Clinic relay core library: WhatsApp webhook gateway, per-sender conversation store,
//! completion client and reply delivery, used by the `clinic-relay` CLI.

pub mod agent;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod gateway;
pub mod llm;
pub mod policy;
pub mod token;
