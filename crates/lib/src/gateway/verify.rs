//! Webhook subscription handshake: the provider sends `hub.mode=subscribe`, our shared
//! verify token and a numeric challenge; we echo the challenge back as an integer.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::gateway::protocol::VerifyParams;

const SUBSCRIBE_MODE: &str = "subscribe";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("Missing parameters")]
    MissingParameters,
    #[error("Verification failed")]
    Forbidden,
    #[error("Missing challenge")]
    MissingChallenge,
    #[error("Invalid challenge: {0}")]
    InvalidChallenge(String),
}

impl VerifyError {
    pub fn status(&self) -> StatusCode {
        match self {
            VerifyError::MissingParameters | VerifyError::MissingChallenge => {
                StatusCode::BAD_REQUEST
            }
            VerifyError::Forbidden => StatusCode::FORBIDDEN,
            VerifyError::InvalidChallenge(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for VerifyError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Challenge in canonical integer form (optional `-`, no leading zeros). Any length is kept,
/// so it is echoed as raw JSON text rather than through a fixed-width integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge(String);

impl Challenge {
    /// Accepts surrounding whitespace, one leading sign and ASCII digits.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        let (negative, digits) = match s.as_bytes().first()? {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let digits = digits.trim_start_matches('0');
        Some(Challenge(match (digits.is_empty(), negative) {
            (true, _) => "0".to_string(),
            (false, true) => format!("-{}", digits),
            (false, false) => digits.to_string(),
        }))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl IntoResponse for Challenge {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "application/json")], self.0).into_response()
    }
}

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Check the handshake parameters against `expected` and return the challenge to echo.
pub fn verify_subscription(
    params: &VerifyParams,
    expected: &str,
) -> Result<Challenge, VerifyError> {
    let (Some(mode), Some(token)) = (non_empty(&params.mode), non_empty(&params.verify_token))
    else {
        return Err(VerifyError::MissingParameters);
    };
    if mode != SUBSCRIBE_MODE || token != expected {
        log::error!(
            "webhook verification rejected: mode={}, token match={}",
            mode,
            token == expected
        );
        return Err(VerifyError::Forbidden);
    }
    let challenge = non_empty(&params.challenge).ok_or(VerifyError::MissingChallenge)?;
    Challenge::parse(&challenge).ok_or(VerifyError::InvalidChallenge(challenge))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: Option<&str>, token: Option<&str>, challenge: Option<&str>) -> VerifyParams {
        VerifyParams {
            mode: mode.map(String::from),
            verify_token: token.map(String::from),
            challenge: challenge.map(String::from),
        }
    }

    #[test]
    fn matching_subscription_echoes_challenge() {
        let p = params(Some("subscribe"), Some("secret"), Some("1158201444"));
        assert_eq!(
            verify_subscription(&p, "secret").unwrap().as_str(),
            "1158201444"
        );
    }

    #[test]
    fn challenge_keeps_integers_of_any_size() {
        let big = "99999999999999999999";
        assert_eq!(Challenge::parse(big).unwrap().as_str(), big);
        assert_eq!(Challenge::parse(" +007 ").unwrap().as_str(), "7");
        assert_eq!(Challenge::parse("-42").unwrap().as_str(), "-42");
        assert_eq!(Challenge::parse("-000").unwrap().as_str(), "0");
        for bad in ["", " ", "-", "+", "1.5", "1e3", "12a", "--1", "0x1f"] {
            assert_eq!(Challenge::parse(bad), None, "{:?}", bad);
        }
    }

    #[test]
    fn every_other_combination_is_rejected() {
        let modes = [None, Some("subscribe"), Some("unsubscribe")];
        let tokens = [None, Some("secret"), Some("wrong")];
        let challenges = [None, Some("42")];
        for mode in modes {
            for token in tokens {
                for challenge in challenges {
                    let p = params(mode, token, challenge);
                    let result = verify_subscription(&p, "secret");
                    let expected = match (mode, token, challenge) {
                        (None, _, _) | (_, None, _) => Err(VerifyError::MissingParameters),
                        (Some("subscribe"), Some("secret"), None) => {
                            Err(VerifyError::MissingChallenge)
                        }
                        (Some("subscribe"), Some("secret"), Some(_)) => {
                            Ok(Challenge("42".to_string()))
                        }
                        _ => Err(VerifyError::Forbidden),
                    };
                    assert_eq!(
                        result, expected,
                        "mode={:?} token={:?} challenge={:?}",
                        mode, token, challenge
                    );
                }
            }
        }
    }

    #[test]
    fn empty_values_count_as_missing() {
        let p = params(Some(""), Some("secret"), Some("1"));
        assert_eq!(
            verify_subscription(&p, "secret"),
            Err(VerifyError::MissingParameters)
        );
    }

    #[test]
    fn non_numeric_challenge_is_server_error() {
        let p = params(Some("subscribe"), Some("secret"), Some("abc"));
        let err = verify_subscription(&p, "secret").unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            VerifyError::MissingParameters.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            VerifyError::MissingChallenge.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(VerifyError::Forbidden.status(), StatusCode::FORBIDDEN);
    }
}
