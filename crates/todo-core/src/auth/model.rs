use crate::error::{Result, TodoError};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/auth/register` and `POST /api/auth/login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

// Keeps passwords out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// `{ user, token }` returned by register and login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// JWT payload claims issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    /// Reads the payload segment of a JWT.
    ///
    /// The signature is not verified; the backend remains the authority on
    /// token validity. This is only used to restore a session on startup.
    pub fn decode(token: &str) -> Result<Self> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(TodoError::internal("token is not a three-segment JWT")),
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| TodoError::internal(format!("token payload is not base64url: {e}")))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Encodes the claims as the payload segment of a JWT.
    pub fn encode_segment(&self) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(self)?))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_for(claims: &TokenClaims) -> String {
        format!("eyJhbGciOiJIUzI1NiJ9.{}.c2ln", claims.encode_segment().unwrap())
    }

    #[test]
    fn test_decode_claims() {
        let claims = TokenClaims {
            sub: "user-uuid-123".to_string(),
            email: "user@example.com".to_string(),
            iat: 1_704_067_200,
            exp: 1_704_153_600,
        };
        let decoded = TokenClaims::decode(&token_for(&claims)).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_decode_rejects_opaque_tokens() {
        assert!(TokenClaims::decode("not-a-jwt").is_err());
        assert!(TokenClaims::decode("a.b.c.d").is_err());
        assert!(TokenClaims::decode("a.!!!.c").is_err());
    }

    #[test]
    fn test_auth_response_debug_hides_token() {
        let response = AuthResponse {
            user: User {
                id: "user-1".to_string(),
                email: "user@example.com".to_string(),
            },
            token: "eyJhbGciOiJIUzI1NiJ9.payload.signature".to_string(),
        };
        let printed = format!("{response:?}");
        assert!(printed.contains("user@example.com"));
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("payload.signature"));
    }

    #[test]
    fn test_expiry() {
        let claims = TokenClaims {
            sub: "u".to_string(),
            email: "e".to_string(),
            iat: 0,
            exp: 100,
        };
        let before = DateTime::from_timestamp(99, 0).unwrap();
        let at = DateTime::from_timestamp(100, 0).unwrap();
        assert!(!claims.is_expired_at(before));
        assert!(claims.is_expired_at(at));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let rendered = format!("{:?}", Credentials::new("a@b.co", "SecurePass123"));
        assert!(!rendered.contains("SecurePass123"));
    }
}
