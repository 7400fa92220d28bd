use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::errors::{AppError, ResultExt};
use crate::store::{
    merge_json, Document, DocumentQuery, DocumentStore, FieldFilter, Mutation, SortDirection,
    WriteMode,
};

/// Postgres-backed document store.
///
/// Every collection shares the `documents` table; a document is one JSONB
/// row keyed by `(collection, id)`. Field paths are bound as `text[]`
/// parameters, so callers never splice paths into SQL.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn path_segments(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

/// Text form used for range comparisons; strings compare as themselves.
fn comparable_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Converts a pagination bound to the `BIGINT` Postgres expects.
fn sql_count(name: &str, value: usize) -> Result<i64, AppError> {
    i64::try_from(value)
        .map_err(|_| AppError::BadRequest(format!("'{}' is out of range", name)))
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Failed to read {}/{}", collection, id))?;

        Ok(row.map(|(data,)| Document {
            id: id.to_string(),
            data,
        }))
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        data: Value,
        mode: WriteMode,
    ) -> Result<(), AppError> {
        match mode {
            WriteMode::Replace => {
                sqlx::query(
                    r#"
                    INSERT INTO documents (collection, id, data)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (collection, id)
                    DO UPDATE SET data = EXCLUDED.data, updated_at = now()
                    "#,
                )
                .bind(collection)
                .bind(id)
                .bind(&data)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to write {}/{}", collection, id))?;
            }
            WriteMode::Merge => {
                let mut tx = self.pool.begin().await?;

                let existing: Option<(Value,)> = sqlx::query_as(
                    "SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
                )
                .bind(collection)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .with_context(|| format!("Failed to lock {}/{}", collection, id))?;

                let mut merged = existing
                    .map(|(data,)| data)
                    .unwrap_or_else(|| Value::Object(Map::new()));
                merge_json(&mut merged, data);

                sqlx::query(
                    r#"
                    INSERT INTO documents (collection, id, data)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (collection, id)
                    DO UPDATE SET data = EXCLUDED.data, updated_at = now()
                    "#,
                )
                .bind(collection)
                .bind(id)
                .bind(&merged)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to merge {}/{}", collection, id))?;

                tx.commit().await?;
            }
        }

        tracing::debug!("Stored document {}/{} ({:?})", collection, id, mode);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Result<Vec<Document>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT id, data FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());

        for filter in &query.filters {
            match filter {
                FieldFilter::Eq(path, value) => {
                    builder.push(" AND data #> ");
                    builder.push_bind(path_segments(path));
                    builder.push("::text[] = ");
                    builder.push_bind(value.clone());
                }
                FieldFilter::Gte(path, value) | FieldFilter::Lte(path, value) => {
                    let op = if matches!(filter, FieldFilter::Gte(..)) {
                        ">="
                    } else {
                        "<="
                    };
                    builder.push(" AND (data #>> ");
                    builder.push_bind(path_segments(path));
                    builder.push(format!("::text[]) COLLATE \"C\" {} ", op));
                    builder.push_bind(comparable_text(value));
                }
            }
        }

        if let Some((path, direction)) = &query.order_by {
            builder.push(" AND data #> ");
            builder.push_bind(path_segments(path));
            builder.push("::text[] IS NOT NULL AND jsonb_typeof(data #> ");
            builder.push_bind(path_segments(path));
            builder.push("::text[]) <> 'null' ORDER BY (data #>> ");
            builder.push_bind(path_segments(path));
            builder.push(match direction {
                SortDirection::Asc => "::text[]) COLLATE \"C\" ASC",
                SortDirection::Desc => "::text[]) COLLATE \"C\" DESC",
            });
        }

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(sql_count("limit", limit)?);
        }
        if query.offset > 0 {
            builder.push(" OFFSET ");
            builder.push_bind(sql_count("offset", query.offset)?);
        }

        let rows: Vec<(String, Value)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to query {}", collection))?;

        Ok(rows
            .into_iter()
            .map(|(id, data)| Document { id, data })
            .collect())
    }

    async fn transact(
        &self,
        collection: &str,
        id: &str,
        mutation: Mutation,
    ) -> Result<Option<Document>, AppError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(Value,)> = sqlx::query_as(
            "SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .with_context(|| format!("Failed to lock {}/{}", collection, id))?;

        let Some((current,)) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        // Dropping `tx` on a mutation error rolls the transaction back.
        let next = mutation(current)?;

        sqlx::query(
            "UPDATE documents SET data = $3, updated_at = now() WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(&next)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to update {}/{}", collection, id))?;

        tx.commit().await?;

        Ok(Some(Document {
            id: id.to_string(),
            data: next,
        }))
    }
}
