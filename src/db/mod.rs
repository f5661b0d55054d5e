use sqlx::{Pool, Postgres};

pub mod users;
pub mod documents;
pub mod chat_messages;

pub use users::PgUserStore;
pub use documents::PgDocumentIndex;
pub use chat_messages::PgChatHistory;

pub async fn init_pool(database_url: &str) -> Result<Pool<Postgres>, sqlx::Error> {
    Pool::<Postgres>::connect(database_url).await
}

/// Provision the backing tables on startup, mirroring the managed store's
/// create-if-absent table lifecycle.
pub async fn ensure_schema(pool: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id       UUID PRIMARY KEY,
            email         TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role          TEXT NOT NULL DEFAULT 'user',
            created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            document_id       UUID PRIMARY KEY,
            filename          TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            storage_key       TEXT NOT NULL,
            url               TEXT NOT NULL,
            size              BIGINT NOT NULL,
            mime_type         TEXT NOT NULL,
            owner_id          UUID NOT NULL,
            description       TEXT NOT NULL,
            category          TEXT NOT NULL,
            created_at        TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS documents_owner_idx ON documents (owner_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            message_id UUID PRIMARY KEY,
            owner_id   UUID NOT NULL,
            role       TEXT NOT NULL,
            content    TEXT NOT NULL,
            timestamp  TIMESTAMPTZ NOT NULL DEFAULT now(),
            model_used TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS chat_messages_owner_ts_idx \
         ON chat_messages (owner_id, timestamp DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
