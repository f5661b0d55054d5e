use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::errors::ServiceResult;
use crate::models::{User, ROLE_ADMIN};
use crate::services::auth_service::UserStore;

#[derive(Clone)]
pub struct PgUserStore {
    pool: Pool<Postgres>,
}

impl PgUserStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    /// Conditional write: succeeds only if no user with this email exists.
    async fn insert_if_absent(&self, user: &User) -> ServiceResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (user_id, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, email, password_hash, role, created_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, user_id: Uuid) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, email, password_hash, role, created_at \
             FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list(&self) -> ServiceResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT user_id, email, password_hash, role, created_at \
             FROM users ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn admin_exists(&self) -> ServiceResult<bool> {
        let found: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM users WHERE role = $1 LIMIT 1")
                .bind(ROLE_ADMIN)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }
}
