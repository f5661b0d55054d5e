use serde::{Serialize, Deserialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

pub const MESSAGE_ROLE_USER: &str = "user";
pub const MESSAGE_ROLE_ASSISTANT: &str = "assistant";

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: String, role: &str) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email,
            password_hash,
            role: role.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Document {
    pub document_id: Uuid,
    pub filename: String,
    pub original_filename: String,
    pub storage_key: String,
    pub url: String,
    pub size: i64,
    pub mime_type: String,
    pub owner_id: Uuid,
    pub description: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: Uuid,
    pub owner_id: Uuid,
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub model_used: Option<String>,
}

impl ChatMessage {
    pub fn user(owner_id: Uuid, content: String) -> Self {
        Self::new(owner_id, MESSAGE_ROLE_USER, content, None)
    }

    pub fn assistant(owner_id: Uuid, content: String, model_used: Option<String>) -> Self {
        Self::new(owner_id, MESSAGE_ROLE_ASSISTANT, content, model_used)
    }

    fn new(owner_id: Uuid, role: &str, content: String, model_used: Option<String>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            owner_id,
            role: role.to_string(),
            content,
            timestamp: Utc::now(),
            model_used,
        }
    }
}
