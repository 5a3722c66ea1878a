use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use tracing::warn;
use uuid::Uuid;

use super::{claims::TokenKind, jwt::JwtKeys};
use crate::users::model::UserRole;

/// Caller identity taken from a valid bearer access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
}

impl AuthUser {
    pub fn require_manager(&self) -> Result<(), (StatusCode, String)> {
        if self.role.can_manage_users() {
            Ok(())
        } else {
            warn!(user_id = %self.id, role = %self.role, "manager role required");
            Err((StatusCode::FORBIDDEN, "Operation not permitted".into()))
        }
    }

    pub fn require_admin(&self) -> Result<(), (StatusCode, String)> {
        if self.role == UserRole::Admin {
            Ok(())
        } else {
            warn!(user_id = %self.id, role = %self.role, "admin role required");
            Err((StatusCode::FORBIDDEN, "Operation not permitted".into()))
        }
    }

    /// Only admins may hand out the ADMIN role.
    pub fn require_can_assign(&self, role: UserRole) -> Result<(), (StatusCode, String)> {
        match role {
            UserRole::Admin => self.require_admin(),
            _ => Ok(()),
        }
    }

    /// Only admins may modify or remove an ADMIN account.
    pub fn require_can_modify(&self, target: UserRole) -> Result<(), (StatusCode, String)> {
        match target {
            UserRole::Admin => self.require_admin(),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header".to_string(),
            ))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header".to_string(),
            ))?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                ));
            }
        };

        if claims.kind != TokenKind::Access {
            return Err((
                StatusCode::UNAUTHORIZED,
                "Access token required".to_string(),
            ));
        }

        Ok(AuthUser {
            id: claims.sub,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{state::AppState, testing::offline_state};
    use axum::http::Request;

    async fn extract(
        state: &AppState,
        header: Option<String>,
    ) -> Result<AuthUser, (StatusCode, String)> {
        let mut builder = Request::builder().uri("/me");
        if let Some(h) = header {
            builder = builder.header(axum::http::header::AUTHORIZATION, h);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, state).await
    }

    #[tokio::test]
    async fn accepts_access_token() {
        let state = offline_state().unwrap();
        let keys = JwtKeys::from_ref(&state);
        let id = Uuid::new_v4();
        let token = keys.sign_access(id, UserRole::Manager).unwrap();
        let user = extract(&state, Some(format!("Bearer {token}"))).await.unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, UserRole::Manager);
    }

    #[tokio::test]
    async fn rejects_missing_header_and_refresh_tokens() {
        let state = offline_state().unwrap();
        let (status, _) = extract(&state, None).await.unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let keys = JwtKeys::from_ref(&state);
        let refresh = keys.sign_refresh(Uuid::new_v4(), UserRole::Admin).unwrap();
        let (status, msg) = extract(&state, Some(format!("Bearer {refresh}")))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(msg, "Access token required");

        let (status, _) = extract(&state, Some("Basic abc".into())).await.unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn role_guards() {
        let admin = AuthUser { id: Uuid::new_v4(), role: UserRole::Admin };
        let manager = AuthUser { id: Uuid::new_v4(), role: UserRole::Manager };
        let plain = AuthUser { id: Uuid::new_v4(), role: UserRole::Authenticated };
        assert!(admin.require_admin().is_ok());
        assert!(manager.require_manager().is_ok());
        assert_eq!(manager.require_admin().unwrap_err().0, StatusCode::FORBIDDEN);
        assert_eq!(plain.require_manager().unwrap_err().0, StatusCode::FORBIDDEN);
    }

    #[test]
    fn only_admins_touch_the_admin_role() {
        let admin = AuthUser { id: Uuid::new_v4(), role: UserRole::Admin };
        let manager = AuthUser { id: Uuid::new_v4(), role: UserRole::Manager };
        assert!(admin.require_can_assign(UserRole::Admin).is_ok());
        assert!(admin.require_can_modify(UserRole::Admin).is_ok());
        assert!(manager.require_can_assign(UserRole::Manager).is_ok());
        assert!(manager.require_can_modify(UserRole::Authenticated).is_ok());
        assert_eq!(
            manager.require_can_assign(UserRole::Admin).unwrap_err().0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            manager.require_can_modify(UserRole::Admin).unwrap_err().0,
            StatusCode::FORBIDDEN
        );
    }
}
