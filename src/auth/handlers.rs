use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{MessageResponse, RefreshRequest, RegisterRequest, TokenForm, TokenResponse},
    extractors::AuthUser,
    jwt::JwtKeys,
    services::{self, AuthError},
};
use crate::{
    state::AppState,
    users::{dto::UserResponse, model::User},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(login))
        .route("/token/refresh", post(refresh))
        .route("/verify-email/:user_id/:token", get(verify_email))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), (StatusCode, String)> {
    let user = services::register(
        &state.db,
        &payload.username,
        &payload.email,
        &payload.password,
    )
    .await
    .map_err(|e| {
        if let AuthError::Internal(_) | AuthError::User(_) = e {
            error!(error = %e, "register failed");
        }
        e
    })?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    let user = services::authenticate(
        &state.db,
        state.config.max_login_attempts,
        &form.username,
        &form.password,
    )
    .await?;

    let keys = JwtKeys::from_ref(&state);
    let tokens = services::issue_tokens(&keys, &user).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(tokens))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;

    // Role may have changed since the refresh token was issued.
    let user = User::find_by_id(&state.db, claims.sub)
        .await
        .map_err(<(StatusCode, String)>::from)?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    if user.is_locked {
        warn!(user_id = %user.id, "refresh on locked account");
        return Err(AuthError::AccountLocked.into());
    }

    let tokens = services::issue_tokens(&keys, &user)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(tokens))
}

#[instrument(skip(state, token))]
pub async fn verify_email(
    State(state): State<AppState>,
    Path((user_id, token)): Path<(Uuid, String)>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let verified = User::verify_email(&state.db, user_id, &token)
        .await
        .map_err(<(StatusCode, String)>::from)?;
    if !verified {
        warn!(%user_id, "invalid verification token");
        return Err((
            StatusCode::BAD_REQUEST,
            "Invalid or expired verification token".into(),
        ));
    }
    info!(%user_id, "email verified");
    Ok(Json(MessageResponse {
        message: "Email verified successfully".into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    let user = User::find_by_id(&state.db, auth.id)
        .await
        .map_err(<(StatusCode, String)>::from)?
        .ok_or_else(|| {
            error!(user_id = %auth.id, "user not found");
            (StatusCode::UNAUTHORIZED, "User not found".to_string())
        })?;

    Ok(Json(user.into()))
}
