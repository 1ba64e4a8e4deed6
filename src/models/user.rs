//! Authenticated identity and presence models

use serde::{Deserialize, Serialize};

use super::UserId;

/// Account role as reported by the auth endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    Customer,
    Owner,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Owner => "owner",
            Role::Admin => "admin",
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "owner" => Role::Owner,
            "admin" => Role::Admin,
            // "user", "customer" and anything unrecognised
            _ => Role::Customer,
        }
    }
}

impl From<Role> for String {
    fn from(r: Role) -> Self {
        r.as_str().to_string()
    }
}

/// The logged-in user. The backend names the id `user_id` or `id`
/// depending on the endpoint, and some replies carry both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSession")]
pub struct Session {
    #[serde(rename = "user_id")]
    pub id: UserId,
    pub name: String,
    pub role: Role,
}

#[derive(Deserialize)]
struct RawSession {
    #[serde(default)]
    user_id: Option<UserId>,
    #[serde(default)]
    id: Option<UserId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

impl TryFrom<RawSession> for Session {
    type Error = String;

    fn try_from(raw: RawSession) -> Result<Self, Self::Error> {
        let id = raw
            .user_id
            .or(raw.id)
            .ok_or_else(|| "user without `user_id` or `id`".to_string())?;
        Ok(Session {
            id,
            name: raw.name.unwrap_or_default(),
            role: raw.role.map(Role::from).unwrap_or_default(),
        })
    }
}

/// Counterparty online state. Anything other than "online" reads as offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    #[default]
    #[serde(other)]
    Offline,
}

impl PresenceStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, PresenceStatus::Online)
    }
}

/// `user_status` event payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusUpdate {
    pub user_id: UserId,
    #[serde(default)]
    pub status: PresenceStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_accepts_either_id_field() {
        let a: Session = serde_json::from_str(r#"{"user_id": 3, "name": "Ana", "role": "owner"}"#)
            .unwrap();
        let b: Session = serde_json::from_str(r#"{"id": "3", "name": "Ana", "role": "owner"}"#)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.role, Role::Owner);
    }

    #[test]
    fn test_session_with_both_ids_prefers_user_id() {
        let s: Session =
            serde_json::from_str(r#"{"id": 4, "user_id": 3, "name": "Ana", "role": "admin"}"#)
                .unwrap();
        assert_eq!(s.id, UserId(3));
        assert_eq!(s.role, Role::Admin);

        tokio_test::assert_err!(serde_json::from_str::<Session>(r#"{"name": "Ana"}"#));
    }

    #[test]
    fn test_session_null_fields_use_defaults() {
        let s: Session =
            serde_json::from_str(r#"{"user_id": 3, "name": null, "role": null}"#).unwrap();
        assert_eq!(s.id, UserId(3));
        assert_eq!(s.name, "");
        assert_eq!(s.role, Role::Customer);
    }

    #[test]
    fn test_session_survives_config_round_trip() {
        let s = Session {
            id: UserId(8),
            name: "Bo".to_string(),
            role: Role::Owner,
        };
        let text = serde_json::to_string(&s).unwrap();
        assert!(text.contains(r#""user_id":8"#));
        assert_eq!(serde_json::from_str::<Session>(&text).unwrap(), s);
    }

    #[test]
    fn test_role_fallback() {
        let s: Session = serde_json::from_str(r#"{"id": 1, "role": "user"}"#).unwrap();
        assert_eq!(s.role, Role::Customer);
        let s: Session = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(s.role, Role::Customer);
    }

    #[test]
    fn test_status_update_unknown_status_is_offline() {
        let u: StatusUpdate =
            serde_json::from_str(r#"{"user_id": "9", "status": "away"}"#).unwrap();
        assert_eq!(u.user_id, UserId(9));
        assert_eq!(u.status, PresenceStatus::Offline);

        let u: StatusUpdate = serde_json::from_str(r#"{"user_id": 9, "status": "online"}"#).unwrap();
        assert!(u.status.is_online());
    }
}
