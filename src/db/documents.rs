use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::errors::ServiceResult;
use crate::models::Document;
use crate::services::document_service::DocumentIndex;

#[derive(Clone)]
pub struct PgDocumentIndex {
    pool: Pool<Postgres>,
}

impl PgDocumentIndex {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const DOCUMENT_COLUMNS: &str = "document_id, filename, original_filename, storage_key, url, \
                                size, mime_type, owner_id, description, category, created_at";

#[async_trait]
impl DocumentIndex for PgDocumentIndex {
    async fn save(&self, document: &Document) -> ServiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents
                (document_id, filename, original_filename, storage_key, url,
                 size, mime_type, owner_id, description, category, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(document.document_id)
        .bind(&document.filename)
        .bind(&document.original_filename)
        .bind(&document.storage_key)
        .bind(&document.url)
        .bind(document.size)
        .bind(&document.mime_type)
        .bind(document.owner_id)
        .bind(&document.description)
        .bind(&document.category)
        .bind(document.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, document_id: Uuid) -> ServiceResult<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE document_id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(document)
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> ServiceResult<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents WHERE owner_id = $1 ORDER BY created_at DESC",
            DOCUMENT_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(documents)
    }

    async fn list_all(&self) -> ServiceResult<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>(&format!(
            "SELECT {} FROM documents ORDER BY created_at DESC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(documents)
    }

    async fn delete(&self, document_id: Uuid) -> ServiceResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE document_id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
