use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use uuid::Uuid;

use crate::errors::{ServiceError, ServiceResult};
use crate::models::{User, ROLE_ADMIN, ROLE_USER};
use crate::utils::hashing::{hash_password, verify_password};
use crate::utils::jwt::SessionSigner;

/// Credential & identity records, keyed by user identity with a uniqueness
/// constraint on email.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert-if-absent on email. Returns `false` when the email is taken;
    /// no state is mutated in that case.
    async fn insert_if_absent(&self, user: &User) -> ServiceResult<bool>;
    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>>;
    async fn find_by_id(&self, user_id: Uuid) -> ServiceResult<Option<User>>;
    async fn list(&self) -> ServiceResult<Vec<User>>;
    async fn admin_exists(&self) -> ServiceResult<bool>;
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    signer: SessionSigner,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, secret: String) -> Self {
        Self {
            users,
            signer: SessionSigner::new(&secret),
        }
    }

    fn validate_registration(email: &str, password: &str, confirm: &str) -> ServiceResult<()> {
        if !email.contains('@') || !email.contains('.') {
            return Err(ServiceError::Validation("email inválido".to_string()));
        }
        if password.len() < 6 {
            return Err(ServiceError::Validation(
                "la contraseña debe tener al menos 6 caracteres".to_string(),
            ));
        }
        if password != confirm {
            return Err(ServiceError::Validation(
                "las contraseñas deben coincidir".to_string(),
            ));
        }
        Ok(())
    }

    async fn create_account(&self, email: &str, password: &str, role: &str) -> ServiceResult<User> {
        let hash = hash_password(password).map_err(|e| ServiceError::Internal(e.to_string()))?;
        let user = User::new(email.trim().to_lowercase(), hash, role);
        if self.users.insert_if_absent(&user).await? {
            Ok(user)
        } else {
            Err(ServiceError::EmailTaken)
        }
    }

    /// New accounts always get the regular role; role changes happen
    /// out-of-band.
    pub async fn register(&self, email: &str, password: &str, confirm: &str) -> ServiceResult<User> {
        Self::validate_registration(email.trim(), password, confirm)?;
        self.create_account(email, password, ROLE_USER).await
    }

    /// Creates the initial admin account. Refused once any admin exists.
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> ServiceResult<User> {
        if self.users.admin_exists().await? {
            return Err(ServiceError::Validation(
                "ya existe una cuenta de administrador".to_string(),
            ));
        }
        Self::validate_registration(email.trim(), password, password)?;
        self.create_account(email, password, ROLE_ADMIN).await
    }

    /// Missing user and wrong password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<(User, String)> {
        let user = self
            .users
            .find_by_email(&email.trim().to_lowercase())
            .await?;
        match user {
            Some(user) if verify_password(&user.password_hash, password) => {
                let token = self
                    .signer
                    .issue(user.user_id, &user.role)
                    .map_err(|e| ServiceError::Internal(e.to_string()))?;
                Ok((user, token))
            }
            _ => Err(ServiceError::InvalidCredentials),
        }
    }

    /// Loads the user behind a session token. Any token or lookup miss is
    /// the unauthenticated state, not an error.
    pub async fn current_user(&self, token: &str) -> Option<User> {
        let claims = self.signer.verify(token).ok()?;
        match self.users.find_by_id(claims.sub).await {
            Ok(user) => user,
            Err(e) => {
                warn!("session user lookup failed: {}", e);
                None
            }
        }
    }

    pub async fn list_users(&self) -> ServiceResult<Vec<User>> {
        self.users.list().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio::sync::RwLock;

    use super::*;

    #[derive(Default)]
    struct MemoryUserStore {
        users: RwLock<HashMap<Uuid, User>>,
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn insert_if_absent(&self, user: &User) -> ServiceResult<bool> {
            let mut users = self.users.write().await;
            if users.values().any(|u| u.email == user.email) {
                return Ok(false);
            }
            users.insert(user.user_id, user.clone());
            Ok(true)
        }

        async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
            Ok(self
                .users
                .read()
                .await
                .values()
                .find(|u| u.email == email)
                .cloned())
        }

        async fn find_by_id(&self, user_id: Uuid) -> ServiceResult<Option<User>> {
            Ok(self.users.read().await.get(&user_id).cloned())
        }

        async fn list(&self) -> ServiceResult<Vec<User>> {
            Ok(self.users.read().await.values().cloned().collect())
        }

        async fn admin_exists(&self) -> ServiceResult<bool> {
            Ok(self
                .users
                .read()
                .await
                .values()
                .any(|u| u.role == ROLE_ADMIN))
        }
    }

    fn service() -> (AuthService, Arc<MemoryUserStore>) {
        let store = Arc::new(MemoryUserStore::default());
        (AuthService::new(store.clone(), "secret".to_string()), store)
    }

    #[tokio::test]
    async fn register_then_duplicate_email_is_rejected() {
        let (auth, store) = service();

        auth.register("ana@bmc.com", "secreta", "secreta")
            .await
            .unwrap();
        let result = auth.register("ana@bmc.com", "otra123", "otra123").await;

        assert!(matches!(result, Err(ServiceError::EmailTaken)));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn registration_normalizes_email_and_defaults_to_user_role() {
        let (auth, _store) = service();

        let user = auth
            .register("  Ana@BMC.com ", "secreta", "secreta")
            .await
            .unwrap();

        assert_eq!(user.email, "ana@bmc.com");
        assert_eq!(user.role, ROLE_USER);
    }

    #[tokio::test]
    async fn registration_validation_rejects_bad_input() {
        let (auth, store) = service();

        for (email, password, confirm) in [
            ("no-arroba", "secreta", "secreta"),
            ("ana@bmc.com", "corta", "corta"),
            ("ana@bmc.com", "secreta", "distinta"),
        ] {
            let result = auth.register(email, password, confirm).await;
            assert!(matches!(result, Err(ServiceError::Validation(_))));
        }
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_returns_the_user_for_that_email() {
        let (auth, _store) = service();
        let registered = auth
            .register("ana@bmc.com", "secreta", "secreta")
            .await
            .unwrap();

        let (user, token) = auth.login("ana@bmc.com", "secreta").await.unwrap();

        assert_eq!(user.user_id, registered.user_id);
        assert_eq!(user.email, "ana@bmc.com");
        assert!(!token.is_empty());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_identical() {
        let (auth, _store) = service();
        auth.register("ana@bmc.com", "secreta", "secreta")
            .await
            .unwrap();

        let wrong_password = auth.login("ana@bmc.com", "incorrecta").await;
        let unknown_email = auth.login("nadie@bmc.com", "secreta").await;

        assert!(matches!(wrong_password, Err(ServiceError::InvalidCredentials)));
        assert!(matches!(unknown_email, Err(ServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn session_token_round_trips_to_the_same_user() {
        let (auth, _store) = service();
        auth.register("ana@bmc.com", "secreta", "secreta")
            .await
            .unwrap();
        let (user, token) = auth.login("ana@bmc.com", "secreta").await.unwrap();

        let loaded = auth.current_user(&token).await.unwrap();
        assert_eq!(loaded.user_id, user.user_id);

        assert!(auth.current_user("garbage-token").await.is_none());
    }

    #[tokio::test]
    async fn bootstrap_admin_only_works_once() {
        let (auth, _store) = service();

        let admin = auth.bootstrap_admin("admin@bmc.com", "admin123").await.unwrap();
        assert_eq!(admin.role, ROLE_ADMIN);

        let second = auth.bootstrap_admin("otro@bmc.com", "admin123").await;
        assert!(matches!(second, Err(ServiceError::Validation(_))));
    }
}
