use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::errors::ServiceResult;
use crate::models::ChatMessage;
use crate::services::chat_service::ChatHistoryStore;

#[derive(Clone)]
pub struct PgChatHistory {
    pool: Pool<Postgres>,
}

impl PgChatHistory {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatHistoryStore for PgChatHistory {
    async fn append(&self, message: &ChatMessage) -> ServiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (message_id, owner_id, role, content, timestamp, model_used)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.message_id)
        .bind(message.owner_id)
        .bind(&message.role)
        .bind(&message.content)
        .bind(message.timestamp)
        .bind(&message.model_used)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest-first, as the store natively orders them. The chat service
    /// resequences before presenting.
    async fn recent(&self, owner_id: Uuid, limit: i64) -> ServiceResult<Vec<ChatMessage>> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            "SELECT message_id, owner_id, role, content, timestamp, model_used \
             FROM chat_messages WHERE owner_id = $1 \
             ORDER BY timestamp DESC LIMIT $2",
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn clear(&self, owner_id: Uuid) -> ServiceResult<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE owner_id = $1")
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
