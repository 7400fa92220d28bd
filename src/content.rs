//! Header and footer content singletons.
//!
//! Each kind lives in its own collection under the fixed id `main`. A missing
//! document is not an error: readers get the built-in default, which is never
//! written back.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::errors::{AppError, ResultExt};
use crate::models::{timestamp, ContentDocument, ContentUpdate};
use crate::store::{DocumentStore, WriteMode};

pub const CONTENT_ID: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Header,
    Footer,
}

impl ContentKind {
    pub fn collection(self) -> &'static str {
        match self {
            ContentKind::Header => "form_header",
            ContentKind::Footer => "footer",
        }
    }

    /// Kind-specific id mirror stored alongside the message.
    fn id_field(self) -> &'static str {
        match self {
            ContentKind::Header => "header_id",
            ContentKind::Footer => "footer_id",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ContentKind::Header => "Chào mừng bạn đến với Stone Real Estate",
            ContentKind::Footer => "© 2025 Stone Real Estate. Tất cả quyền được bảo lưu.",
        }
    }

    pub fn seed_message(self) -> &'static str {
        match self {
            ContentKind::Header => {
                "Chào mừng bạn đến với Stone Real Estate - Nền tảng bất động sản hàng đầu"
            }
            ContentKind::Footer => {
                "© 2025 Stone Real Estate. Tất cả quyền được bảo lưu. Liên hệ: info@stonerealestate.com | Hotline: 1900-XXX-XXX"
            }
        }
    }

    fn label(self) -> &'static str {
        match self {
            ContentKind::Header => "form header",
            ContentKind::Footer => "footer",
        }
    }
}

fn default_document(kind: ContentKind, now: DateTime<Utc>) -> ContentDocument {
    ContentDocument {
        id: CONTENT_ID.to_string(),
        message: kind.default_message().to_string(),
        active: true,
        created_at: now,
        updated_at: now,
    }
}

fn decode(kind: ContentKind, mut data: Value) -> Result<ContentDocument, AppError> {
    if let Value::Object(ref mut map) = data {
        map.insert("id".into(), json!(CONTENT_ID));
    }
    serde_json::from_value(data).map_err(|e| {
        AppError::StoreError(format!("Stored {} content is malformed: {}", kind.label(), e))
    })
}

#[derive(Clone)]
pub struct ContentService {
    store: Arc<dyn DocumentStore>,
}

impl ContentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Current content, or the default when nothing has been stored yet.
    pub async fn get(&self, kind: ContentKind) -> Result<ContentDocument, AppError> {
        match self.store.get(kind.collection(), CONTENT_ID).await? {
            Some(doc) => decode(kind, doc.data),
            None => {
                tracing::debug!("No stored {} content, serving default", kind.label());
                Ok(default_document(kind, Utc::now()))
            }
        }
    }

    /// Merges `update` into the stored content.
    ///
    /// `created_at` is set only when the document did not exist before this
    /// call. The existence check and the write are separate operations.
    pub async fn update(
        &self,
        kind: ContentKind,
        update: &ContentUpdate,
    ) -> Result<ContentDocument, AppError> {
        let collection = kind.collection();
        let now = timestamp::format(&Utc::now());
        let exists = self.store.get(collection, CONTENT_ID).await?.is_some();

        let mut payload = Map::new();
        payload.insert(kind.id_field().into(), json!(CONTENT_ID));
        payload.insert("updated_at".into(), json!(now));
        if let Some(ref message) = update.message {
            payload.insert("message".into(), json!(message.trim()));
        } else if !exists {
            payload.insert("message".into(), json!(kind.default_message()));
        }
        if let Some(active) = update.active {
            payload.insert("active".into(), json!(active));
        }
        if !exists {
            payload.insert("created_at".into(), json!(now));
        }

        self.store
            .set(collection, CONTENT_ID, Value::Object(payload), WriteMode::Merge)
            .await
            .with_context(|| format!("Failed to save {} content", kind.label()))?;

        tracing::info!(
            "{} content {}",
            kind.label(),
            if exists { "updated" } else { "created" }
        );

        let doc = self
            .store
            .get(collection, CONTENT_ID)
            .await?
            .ok_or_else(|| {
                AppError::StoreError(format!("{} content vanished after write", kind.label()))
            })?;
        decode(kind, doc.data)
    }

    /// Overwrites the document with its seed message.
    pub async fn seed(&self, kind: ContentKind) -> Result<ContentDocument, AppError> {
        let now = timestamp::format(&Utc::now());
        let data = json!({
            (kind.id_field()): CONTENT_ID,
            "message": kind.seed_message(),
            "active": true,
            "created_at": now,
            "updated_at": now,
        });
        self.store
            .set(kind.collection(), CONTENT_ID, data.clone(), WriteMode::Replace)
            .await
            .with_context(|| format!("Failed to seed {} content", kind.label()))?;
        decode(kind, data)
    }
}
