//! Failure policies for downstream calls.
//!
//! The completion step degrades: a failed call turns into a canned reply so the sender still
//! hears back. The send step propagates: the caller decides how to report it (the webhook
//! converts it into an error status body, the diagnostic endpoints echo it).

use std::fmt::Display;

/// Errors that know which reply should stand in for the value they replaced.
pub trait Fallback {
    fn fallback_reply(&self) -> &'static str;
}

/// Log the failure and substitute the error's fallback reply.
pub fn degrade_to_fallback<E>(step: &str, result: Result<String, E>) -> String
where
    E: Fallback + Display,
{
    match result {
        Ok(text) => text,
        Err(e) => {
            log::error!("{} failed, replying with fallback: {}", step, e);
            e.fallback_reply().to_string()
        }
    }
}

/// Log the failure and hand it back unchanged.
pub fn propagate<T, E: Display>(step: &str, result: Result<T, E>) -> Result<T, E> {
    if let Err(ref e) = result {
        log::error!("{} failed: {}", step, e);
    }
    result
}
