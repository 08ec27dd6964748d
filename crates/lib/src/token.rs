//! Webhook verify-token generation and `.env` persistence.

use anyhow::{Context, Result};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::config::ENV_VERIFY_TOKEN;

/// Random bytes drawn per token (before base64).
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// A freshly generated token and its SHA-256 hex digest (for storing a non-reversible copy).
#[derive(Debug, Clone)]
pub struct VerifyToken {
    pub token: String,
    pub hash: String,
}

/// Generate a URL-safe, unpadded base64 token from `len` random bytes.
pub fn generate_verify_token(len: usize) -> Result<VerifyToken> {
    let mut bytes = vec![0u8; len.max(1)];
    getrandom::getrandom(&mut bytes).map_err(|e| anyhow::anyhow!("reading random bytes: {}", e))?;
    let token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&bytes);
    let hash = sha256_hex(&token);
    Ok(VerifyToken { token, hash })
}

fn sha256_hex(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Replace the first `key=` line in `contents`, or append one. Other lines are kept as-is.
pub fn upsert_env_line(contents: &str, key: &str, value: &str) -> String {
    let prefix = format!("{}=", key);
    let new_line = format!("{}{}", prefix, value);
    let mut replaced = false;
    let mut out: Vec<String> = contents
        .lines()
        .map(|line| {
            if !replaced && line.starts_with(&prefix) {
                replaced = true;
                new_line.clone()
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        out.push(new_line);
    }
    let mut s = out.join("\n");
    s.push('\n');
    s
}

/// Write WEBHOOK_VERIFY_TOKEN into the env file at `path`, creating it if missing.
pub fn save_token_to_env(path: &Path, token: &str) -> Result<()> {
    let existing = if path.exists() {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    } else {
        String::new()
    };
    let updated = upsert_env_line(&existing, ENV_VERIFY_TOKEN, token);
    std::fs::write(path, updated).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
