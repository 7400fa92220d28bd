use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::store::Document;

// ============ Stored Models ============

/// Stored timestamps use a fixed-width RFC 3339 form (microseconds, `Z`) so
/// lexical order in the document store equals chronological order.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            ts: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => serializer.serialize_str(&super::format(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
        }
    }
}

/// A captured lead, as stored in the `leads` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Mirrors the document id once the lead is created.
    pub lead_id: String,
    pub contact: Contact,
    pub status: LeadStatus,
    pub metadata: LeadMetadata,
    /// Resubmission interactions, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub first_name: String,
    pub last_name: String,
    /// Always lowercased.
    pub email: String,
    pub phone: String,
    #[serde(default = "default_preferred_contact")]
    pub preferred_contact: String,
    #[serde(default)]
    pub suburb: String,
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub selling_interest: bool,
    #[serde(default)]
    pub buying_interest: bool,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub category: String,
}

pub fn default_preferred_contact() -> String {
    "both".to_string()
}

pub fn default_timeframe() -> String {
    "not sure".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadStatus {
    pub current: String,
    /// Append-only audit trail.
    #[serde(default)]
    pub history: Vec<StatusHistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: String,
    #[serde(with = "timestamp")]
    pub changed_at: DateTime<Utc>,
    pub changed_by: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadMetadata {
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    #[serde(default, with = "timestamp::option")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: Map<String, Value>,
}

fn default_version() -> u32 {
    1
}

impl LeadMetadata {
    /// Adds a tag unless it is blank or already present.
    pub fn add_tag(&mut self, tag: &str) {
        let tag = tag.trim();
        if !tag.is_empty() && !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }
}

/// One resubmission of the public form that hit an existing lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub kind: String,
    #[serde(with = "timestamp")]
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub changes: Vec<FieldChange>,
    pub score: i64,
    pub category: String,
    pub source: String,
}

/// A trackable contact field whose value differed on resubmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

impl Lead {
    /// Converts a stored document into a lead, keeping the document id authoritative.
    pub fn from_document(doc: Document) -> Result<Self, AppError> {
        let mut lead: Lead = serde_json::from_value(doc.data).map_err(|e| {
            AppError::StoreError(format!("Stored lead {} is malformed: {}", doc.id, e))
        })?;
        if lead.lead_id != doc.id {
            tracing::warn!(
                "Lead document {} carried lead_id '{}', using document id",
                doc.id,
                lead.lead_id
            );
            lead.lead_id = doc.id;
        }
        Ok(lead)
    }

    pub fn to_document_data(&self) -> Result<Value, AppError> {
        serde_json::to_value(self)
            .map_err(|e| AppError::InternalError(format!("Failed to serialize lead: {}", e)))
    }
}

/// Dedupe index entry, keyed by the dedupe hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupeEntry {
    pub lead_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Header/footer singleton content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDocument {
    pub id: String,
    pub message: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

// ============ API Request/Response Models ============

/// Homepage form submission.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PublicLeadForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub preferred_contact: Option<String>,
    pub suburb: Option<String>,
    pub address: Option<String>,
    pub timeframe: Option<String>,
    pub description: Option<String>,
    /// Selling interest, `"yes"` / `"no"`.
    pub interested: Option<String>,
    pub interested_buying: Option<String>,
    /// Alias of `interested_buying`.
    pub buying: Option<String>,
}

/// Caller identity attached to a mutation.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user_id: Option<String>,
}

impl RequestContext {
    pub fn actor(&self) -> String {
        self.user_id.clone().unwrap_or_else(|| "system".to_string())
    }
}

/// Result of a public form submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub reused: bool,
    pub lead_id: String,
    pub score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<FieldChange>>,
    /// Set when the dedupe entry pointed at a lead that no longer exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Query parameters for listing leads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListLeadsParams {
    pub status: Option<String>,
    pub suburb: Option<String>,
    pub address: Option<String>,
    pub q: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusUpdate {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub changed_by: Option<String>,
}

/// Admin patch over a lead; every section optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeadPatch {
    pub contact: Option<ContactPatch>,
    pub status: Option<StatusPatch>,
    pub metadata: Option<MetadataPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub preferred_contact: Option<String>,
    pub suburb: Option<String>,
    pub address: Option<String>,
    pub timeframe: Option<String>,
    pub description: Option<String>,
    pub selling_interest: Option<bool>,
    pub buying_interest: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusPatch {
    pub current: Option<String>,
    pub notes: Option<String>,
    pub changed_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataPatch {
    pub tags: Option<Vec<String>>,
    pub custom_fields: Option<Map<String, Value>>,
}

/// Header/footer update body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentUpdate {
    pub message: Option<String>,
    pub active: Option<bool>,
}

/// Success envelope returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
