use axum::http::StatusCode;
use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;
use sqlx::PgPool;
use tracing::{info, warn};

use super::{
    dto::TokenResponse,
    jwt::JwtKeys,
    password::{hash_password, verify_password},
};
use crate::users::{
    model::{NewUser, User, UserRole},
    repo::UserError,
};

pub const MIN_PASSWORD_LEN: usize = 8;
const VERIFICATION_TOKEN_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Invalid username")]
    InvalidUsername,
    #[error("Password too short")]
    PasswordTooShort,
    #[error("Incorrect username or password")]
    InvalidCredentials,
    #[error("Account locked due to too many failed login attempts")]
    AccountLocked,
    #[error("Email not verified")]
    EmailNotVerified,
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidEmail | Self::InvalidUsername | Self::PasswordTooShort => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::AccountLocked => StatusCode::BAD_REQUEST,
            Self::EmailNotVerified => StatusCode::FORBIDDEN,
            Self::User(e) => e.status(),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for (StatusCode, String) {
    fn from(e: AuthError) -> Self {
        (e.status(), e.to_string())
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{3,50}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

pub(crate) fn new_verification_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(VERIFICATION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Validates and hashes account input into an insert payload.
/// The email is trimmed and lowercased.
pub fn prepare_account(
    username: &str,
    email: &str,
    password: &str,
    role: UserRole,
) -> Result<NewUser, AuthError> {
    let username = username.trim();
    let email = email.trim().to_lowercase();

    if !is_valid_username(username) {
        warn!(%username, "invalid username");
        return Err(AuthError::InvalidUsername);
    }
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AuthError::InvalidEmail);
    }
    if password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AuthError::PasswordTooShort);
    }

    let hash = hash_password(password)?;
    Ok(NewUser::new(username, email, hash).role(role))
}

/// Self-service signup: an unverified AUTHENTICATED account with a fresh
/// verification token.
pub async fn register(
    db: &PgPool,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, AuthError> {
    let new = prepare_account(username, email, password, UserRole::Authenticated)?
        .verification_token(new_verification_token());
    let user = User::create(db, &new).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Checks credentials and applies the lockout policy.
///
/// Locked accounts are refused before the password is checked. A wrong
/// password counts toward `max_attempts`; success resets the counter.
pub async fn authenticate(
    db: &PgPool,
    max_attempts: i32,
    login: &str,
    password: &str,
) -> Result<User, AuthError> {
    let Some(user) = User::find_by_login(db, login).await? else {
        warn!(%login, "login unknown user");
        return Err(AuthError::InvalidCredentials);
    };

    if user.is_locked {
        warn!(user_id = %user.id, "login on locked account");
        return Err(AuthError::AccountLocked);
    }

    if !verify_password(password, &user.hashed_password)? {
        let updated = User::record_failed_login(db, user.id, max_attempts).await?;
        warn!(
            user_id = %user.id,
            attempts = updated.failed_login_attempts,
            locked = updated.is_locked,
            "login invalid password"
        );
        return Err(AuthError::InvalidCredentials);
    }

    if !user.email_verified {
        warn!(user_id = %user.id, "login with unverified email");
        return Err(AuthError::EmailNotVerified);
    }

    User::record_successful_login(db, user.id).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

pub fn issue_tokens(keys: &JwtKeys, user: &User) -> anyhow::Result<TokenResponse> {
    Ok(TokenResponse {
        access_token: keys.sign_access(user.id, user.role)?,
        refresh_token: keys.sign_refresh(user.id, user.role)?,
        token_type: "bearer".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("john.doe@example.com"));
        assert!(!is_valid_email("john.doe@example"));
        assert!(!is_valid_email("john doe@example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn username_validation() {
        assert!(is_valid_username("john_doe-42"));
        assert!(!is_valid_username("jd"));
        assert!(!is_valid_username("john doe"));
        assert!(!is_valid_username(&"x".repeat(51)));
    }

    #[test]
    fn prepare_account_normalizes_and_hashes() {
        let new = prepare_account(" alice ", " Alice@Example.COM ", "MySuperPassword$1234", UserRole::Manager)
            .expect("valid input");
        assert_eq!(new.username, "alice");
        assert_eq!(new.email, "alice@example.com");
        assert_eq!(new.role, UserRole::Manager);
        assert!(verify_password("MySuperPassword$1234", &new.hashed_password).unwrap());
    }

    #[test]
    fn prepare_account_rejects_bad_input() {
        let err = prepare_account("alice", "nope", "longenough", UserRole::Authenticated).unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail));
        let err = prepare_account("alice", "a@b.io", "short", UserRole::Authenticated).unwrap_err();
        assert!(matches!(err, AuthError::PasswordTooShort));
        let err = prepare_account("a!", "a@b.io", "longenough", UserRole::Authenticated).unwrap_err();
        assert!(matches!(err, AuthError::InvalidUsername));
    }

    #[test]
    fn verification_tokens_are_alphanumeric_and_distinct() {
        let a = new_verification_token();
        let b = new_verification_token();
        assert_eq!(a.len(), VERIFICATION_TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::AccountLocked.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::EmailNotVerified.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::User(UserError::Conflict("Email")).status(), StatusCode::CONFLICT);
    }
}
