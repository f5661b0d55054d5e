use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SESSION_TTL_HOURS: i64 = 24;

/// Claims carried in the session cookie. The user record itself is re-loaded
/// from the store on every request; the token only names who to load.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub role: String,
    pub exp: usize,
}

/// Signs and verifies session tokens. Keys are derived from the configured
/// secret once, at construction, and shared across requests.
pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    pub fn issue(&self, user_id: Uuid, role: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let expires = Utc::now() + Duration::hours(SESSION_TTL_HOURS);
        let claims = SessionClaims {
            sub: user_id,
            role: role.to_string(),
            exp: expires.timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let signer = SessionSigner::new("secret");
        let user_id = Uuid::new_v4();

        let token = signer.issue(user_id, "admin").unwrap();
        let claims = signer.verify(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = SessionSigner::new("secret")
            .issue(Uuid::new_v4(), "user")
            .unwrap();
        assert!(SessionSigner::new("other").verify(&token).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let signer = SessionSigner::new("secret");
        let mut token = signer.issue(Uuid::new_v4(), "user").unwrap();
        token.push('x');
        assert!(signer.verify(&token).is_err());
    }
}
