use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::store::{into_object, Document, DocumentStore, Filter, SortBy, StoreError};

/// Postgres-backed document store over a single JSONB `documents` table.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// serde_json maps are ordered by key, so this is stable for equal filters.
fn upsert_key(filter: &Filter) -> Result<String, StoreError> {
    Ok(serde_json::to_string(filter)?)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let body = sqlx::query_scalar::<_, Value>(
            "SELECT body FROM documents WHERE collection = $1 AND body @> $2 ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(collection)
        .bind(Value::Object(filter.clone()))
        .fetch_optional(&self.pool)
        .await?;

        Ok(body)
    }

    async fn upsert(&self, collection: &str, filter: &Filter, document: Document) -> Result<(), StoreError> {
        let mut body = filter.clone();
        body.extend(into_object(document)?);

        sqlx::query(
            r#"
            INSERT INTO documents (collection, upsert_key, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, upsert_key)
            DO UPDATE SET body = documents.body || EXCLUDED.body, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(upsert_key(filter)?)
        .bind(Value::Object(body))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        let id = Uuid::new_v4();
        let mut body = into_object(document)?;
        body.insert("_id".into(), Value::String(id.to_string()));

        sqlx::query("INSERT INTO documents (id, collection, body) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(collection)
            .bind(Value::Object(body))
            .execute(&self.pool)
            .await?;

        Ok(id.to_string())
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<i64>,
        sort: Option<SortBy>,
    ) -> Result<Vec<Document>, StoreError> {
        // LIMIT NULL is LIMIT ALL in Postgres.
        let docs = match sort {
            Some(sort) => {
                let direction = if sort.descending { "DESC NULLS LAST" } else { "ASC NULLS FIRST" };
                let sql = format!(
                    "SELECT body FROM documents WHERE collection = $1 AND body @> $2 \
                     ORDER BY body -> $3 {direction} LIMIT $4"
                );
                sqlx::query_scalar::<_, Value>(&sql)
                    .bind(collection)
                    .bind(Value::Object(filter.clone()))
                    .bind(sort.field)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, Value>(
                    "SELECT body FROM documents WHERE collection = $1 AND body @> $2 \
                     ORDER BY created_at LIMIT $3",
                )
                .bind(collection)
                .bind(Value::Object(filter.clone()))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(docs)
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
