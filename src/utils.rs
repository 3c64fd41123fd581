//! Identifier helpers

use bech32::Bech32m;
use uuid7::uuid7;

pub const REQUIREMENT_HRP: &str = "req_";
pub const DOCUMENT_HRP: &str = "doc_";
pub const NOTIFICATION_HRP: &str = "ntf_";

/// Mint a time-ordered identifier: a uuid7 encoded as bech32m under `prefix`.
pub fn new_bech32_id(prefix: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(prefix)?;
    let id = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(id)
}

/// Recipient addresses compare case-insensitively when deduplicating email batches.
pub fn email_dedup_key(email: &str) -> String {
    email.trim().to_lowercase()
}
