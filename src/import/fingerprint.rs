//! Content hashing for the import dedup layers.
//!
//! Layer 1 hashes the raw file bytes. Layer 3 hashes a normalized trade
//! tuple so the same economic trade matches across broker exports that
//! format numbers or timestamps slightly differently.

use crate::domain::{CallPut, Decimal, InstrumentType, Symbol, TimeMs};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};

/// SHA-256 hex of the raw upload, for file-level dedup.
pub fn file_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Inputs to the normalized trade fingerprint. `external_ref` is
/// deliberately absent: two exports of the same trade may carry different
/// broker ids but must still collide here.
#[derive(Debug, Clone)]
pub struct FingerprintParts<'a> {
    pub account_id: i64,
    pub occurred_at: TimeMs,
    pub symbol: &'a Symbol,
    pub instrument: InstrumentType,
    pub action: &'a str,
    pub expiration: Option<NaiveDate>,
    pub strike: Option<Decimal>,
    pub call_put: Option<CallPut>,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fees: Decimal,
}

/// SHA-256 hex over the normalized tuple. Timestamps round to the nearest
/// minute; decimals are fixed-width so "2.5" and "2.50" collide.
pub fn trade_fingerprint(parts: &FingerprintParts) -> String {
    let minute_ms = (parts.occurred_at.as_i64() + 30_000).div_euclid(60_000) * 60_000;
    let tuple = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
        parts.account_id,
        minute_ms,
        parts.symbol.as_str(),
        parts.instrument.as_str(),
        parts.action.to_uppercase(),
        parts
            .expiration
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        parts
            .strike
            .map(|s| s.format_fixed(2))
            .unwrap_or_default(),
        parts.call_put.map(|cp| cp.as_str()).unwrap_or(""),
        parts.quantity.format_fixed(4),
        parts.price.format_fixed(4),
        parts.fees.format_fixed(2),
    );

    let mut hasher = Sha256::new();
    hasher.update(tuple.as_bytes());
    hex::encode(hasher.finalize())
}
