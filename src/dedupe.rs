use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::errors::AppError;
use crate::models::DedupeEntry;
use crate::store::{DocumentStore, WriteMode};

pub const DEDUPE_COLLECTION: &str = "leads_dedupe";

/// Last four digits of a phone number, ignoring formatting characters.
pub fn phone_last4(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    digits[digits.len().saturating_sub(4)..].iter().collect()
}

/// SHA-256 (hex) of `lowercase(email)|last4(phone)|YYYY-MM-DD` for the UTC submission day.
///
/// The index stores the digest rather than raw contact details, and the key
/// changes every calendar day so the same person on a new day is a new lead.
pub fn dedupe_key(email: &str, phone: &str, submitted_at: DateTime<Utc>) -> String {
    let material = format!(
        "{}|{}|{}",
        email.trim().to_lowercase(),
        phone_last4(phone),
        submitted_at.format("%Y-%m-%d")
    );
    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    hex::encode(hasher.finalize())
}

/// Same-day duplicate detection over the `leads_dedupe` index.
#[derive(Clone)]
pub struct DedupeGate {
    store: Arc<dyn DocumentStore>,
}

impl DedupeGate {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Returns the entry recorded under `key`, if any.
    pub async fn lookup(&self, key: &str) -> Result<Option<DedupeEntry>, AppError> {
        let Some(doc) = self.store.get(DEDUPE_COLLECTION, key).await? else {
            return Ok(None);
        };

        match serde_json::from_value::<DedupeEntry>(doc.data) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                // An unreadable entry cannot point anywhere; treat it as a miss.
                tracing::warn!("Ignoring malformed dedupe entry {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Records `lead_id` under `key`. Entries are written once and never mutated.
    pub async fn record(
        &self,
        key: &str,
        lead_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let entry = DedupeEntry {
            lead_id: lead_id.to_string(),
            created_at,
        };
        let data: Value = serde_json::to_value(&entry).map_err(|e| {
            AppError::InternalError(format!("Failed to serialize dedupe entry: {}", e))
        })?;
        self.store
            .set(DEDUPE_COLLECTION, key, data, WriteMode::Replace)
            .await
    }
}
