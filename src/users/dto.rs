use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{User, UserRole};

/// Public view of a user returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub email_verified: bool,
    pub is_locked: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            role: u.role,
            email_verified: u.email_verified,
            is_locked: u.is_locked,
            last_login_at: u.last_login_at,
            created_at: u.created_at,
        }
    }
}

/// Request body for admin-side user creation.
#[derive(Debug, Deserialize, Serialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UserListResponse {
    pub items: Vec<UserResponse>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}
fn default_limit() -> i64 {
    10
}

impl Pagination {
    /// Clamps to `0..` for `skip` and `1..=MAX_PAGE_SIZE` for `limit`.
    pub fn clamped(&self) -> (i64, i64) {
        (self.skip.max(0), self.limit.clamp(1, MAX_PAGE_SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        let p = Pagination { skip: -5, limit: 1000 };
        assert_eq!(p.clamped(), (0, MAX_PAGE_SIZE));
        let p = Pagination { skip: 20, limit: 0 };
        assert_eq!(p.clamped(), (20, 1));
    }

    #[test]
    fn pagination_defaults() {
        let p: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!((p.skip, p.limit), (0, 10));
    }

    #[test]
    fn create_request_defaults_to_authenticated_role() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{"username":"carol","email":"carol@example.com","password":"longenough"}"#,
        )
        .unwrap();
        assert_eq!(req.role, UserRole::Authenticated);
    }

    #[test]
    fn user_response_uses_rfc3339_timestamps() {
        let resp = UserResponse {
            id: Uuid::nil(),
            username: "dave".into(),
            email: "dave@example.com".into(),
            role: UserRole::Admin,
            email_verified: true,
            is_locked: false,
            last_login_at: None,
            created_at: time::macros::datetime!(2024-01-02 03:04:05 UTC),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["created_at"], "2024-01-02T03:04:05Z");
        assert!(json["last_login_at"].is_null());
        assert_eq!(json["role"], "ADMIN");
        assert!(json.get("hashed_password").is_none());
    }
}
