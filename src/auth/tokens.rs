//! Session token storage

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::Session;

/// Bearer token plus the user it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    /// Unix seconds, from the token's `exp` claim when it is a JWT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    pub user: Session,
}

impl StoredSession {
    pub fn new(token: String, user: Session) -> Self {
        let expires_at = jwt_expiry(&token);
        Self {
            token,
            expires_at,
            user,
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                // Consider expired if less than a minute remaining
                now + 60 >= exp
            }
            None => false,
        }
    }
}

/// Read the `exp` claim without verifying the signature. Opaque tokens
/// yield `None` and never expire client-side.
fn jwt_expiry(token: &str) -> Option<u64> {
    #[derive(Deserialize)]
    struct Claims {
        exp: Option<u64>,
    }

    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    claims.exp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, UserId};

    fn user() -> Session {
        Session {
            id: UserId(1),
            name: "Ana".to_string(),
            role: Role::Customer,
        }
    }

    fn jwt(claims: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(claims)
        )
    }

    #[test]
    fn test_expiry_from_jwt() {
        let s = StoredSession::new(jwt(r#"{"user_id":1,"exp":4102444800}"#), user());
        assert_eq!(s.expires_at, Some(4_102_444_800));
        assert!(!s.is_expired());

        let s = StoredSession::new(jwt(r#"{"exp":1000}"#), user());
        assert!(s.is_expired());
    }

    #[test]
    fn test_opaque_token_never_expires() {
        let s = StoredSession::new("not-a-jwt".to_string(), user());
        assert_eq!(s.expires_at, None);
        assert!(!s.is_expired());

        let s = StoredSession::new(jwt(r#"{"user_id":1}"#), user());
        assert_eq!(s.expires_at, None);
    }
}
