use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;

use crate::config::Config;
use crate::db_storage::PgDocumentStore;
use crate::store::{DocumentStore, MemoryStore};

const SCHEMA: &str = include_str!("../migrations/0001_documents.sql");

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        // Idempotent schema bootstrap
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }
}

/// Opens the configured document store: Postgres when a database URL is
/// set, otherwise a process-local in-memory store.
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.database_url {
        Some(ref url) => {
            let db = Database::new(url).await?;
            tracing::info!("Database connection pool established");
            Ok(Arc::new(PgDocumentStore::new(db.pool)))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MailerSettings, NotificationSettings};
    use crate::store::WriteMode;
    use serde_json::json;

    #[tokio::test]
    async fn falls_back_to_memory_store_without_database_url() {
        let config = Config {
            port: 3000,
            database_url: None,
            admin_api_token: None,
            notifications: NotificationSettings::default(),
            mailer: MailerSettings {
                resend_api_key: None,
                resend_base_url: "https://api.resend.com".into(),
            },
        };

        let store = open_store(&config).await.unwrap();
        store
            .set("leads", "L1", json!({"lead_id": "L1"}), WriteMode::Replace)
            .await
            .unwrap();

        let doc = store.get("leads", "L1").await.unwrap().unwrap();
        assert_eq!(doc.data["lead_id"], json!("L1"));
    }
}
