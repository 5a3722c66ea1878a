use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, Pagination, UserListResponse, UserResponse},
    model::{User, UserChanges, UserRole},
};
use crate::{
    auth::{
        extractors::AuthUser,
        services::{is_valid_email, is_valid_username, prepare_account, AuthError},
    },
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:id/unlock", post(unlock_user))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<UserListResponse>, (StatusCode, String)> {
    auth.require_manager()?;
    let (skip, limit) = p.clamped();
    let users = User::list(&state.db, skip, limit).await?;
    let total = User::count(&state.db).await?;
    Ok(Json(UserListResponse {
        items: users.into_iter().map(UserResponse::from).collect(),
        total,
        skip,
        limit,
    }))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), (StatusCode, String)> {
    auth.require_manager()?;
    auth.require_can_assign(payload.role)?;
    let new = prepare_account(
        &payload.username,
        &payload.email,
        &payload.password,
        payload.role,
    )?
    .verified(true);
    let user = User::create(&state.db, &new).await?;
    info!(created_by = %auth.id, user_id = %user.id, role = %user.role, "user created");
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn target_role(state: &AppState, id: Uuid) -> Result<UserRole, (StatusCode, String)> {
    User::find_by_id(&state.db, id)
        .await?
        .map(|u| u.role)
        .ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    auth.require_manager()?;
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, changes))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(changes): Json<UserChanges>,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    auth.require_manager()?;
    if let Some(username) = &changes.username {
        if !is_valid_username(username) {
            return Err(AuthError::InvalidUsername.into());
        }
    }
    if let Some(email) = &changes.email {
        if !is_valid_email(&email.trim().to_lowercase()) {
            return Err(AuthError::InvalidEmail.into());
        }
    }
    if let Some(role) = changes.role {
        auth.require_can_assign(role)?;
    }
    auth.require_can_modify(target_role(&state, id).await?)?;
    let user = User::update(&state.db, id, &changes).await?;
    info!(updated_by = %auth.id, user_id = %id, "user updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    auth.require_manager()?;
    auth.require_can_modify(target_role(&state, id).await?)?;
    User::delete(&state.db, id).await?;
    warn!(deleted_by = %auth.id, user_id = %id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn unlock_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    auth.require_admin()?;
    let user = User::unlock(&state.db, id).await?;
    info!(unlocked_by = %auth.id, user_id = %id, "user unlocked");
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::build_app,
        auth::jwt::JwtKeys,
        testing::{offline_state, TestClient},
    };
    use axum::extract::FromRef;

    #[tokio::test]
    async fn ordinary_users_are_forbidden_before_any_query() {
        let state = offline_state().unwrap();
        let token = JwtKeys::from_ref(&state)
            .sign_access(Uuid::new_v4(), UserRole::Authenticated)
            .unwrap();
        let client = TestClient::new(build_app(state));

        let res = client.get("/users").bearer(&token).send().await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = client
            .delete(&format!("/users/{}", Uuid::new_v4()))
            .bearer(&token)
            .send()
            .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn managers_cannot_unlock() {
        let state = offline_state().unwrap();
        let token = JwtKeys::from_ref(&state)
            .sign_access(Uuid::new_v4(), UserRole::Manager)
            .unwrap();
        let client = TestClient::new(build_app(state));
        let res = client
            .post(&format!("/users/{}/unlock", Uuid::new_v4()))
            .bearer(&token)
            .send()
            .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn managers_cannot_grant_admin_before_any_query() {
        let state = offline_state().unwrap();
        let token = JwtKeys::from_ref(&state)
            .sign_access(Uuid::new_v4(), UserRole::Manager)
            .unwrap();
        let client = TestClient::new(build_app(state));

        let res = client
            .post("/users")
            .bearer(&token)
            .json(&serde_json::json!({
                "username": "would_be_admin",
                "email": "admin@example.com",
                "password": "MySuperPassword$1234",
                "role": "ADMIN",
            }))
            .send()
            .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = client
            .put(&format!("/users/{}", Uuid::new_v4()))
            .bearer(&token)
            .json(&serde_json::json!({ "role": "ADMIN" }))
            .send()
            .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
}
