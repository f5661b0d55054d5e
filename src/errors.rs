use thiserror::Error;

/// Outcome type for every service call. External-service failures are caught
/// at the component boundary and converted into one of these variants; none
/// of the underlying SDK errors reach the HTTP layer directly.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("object storage error: {0}")]
    ObjectStore(#[from] crate::services::object_store::StorageError),

    #[error("{0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
