use axum::http::StatusCode;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::model::{NewUser, User, UserChanges, USER_COLUMNS};

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("{0} already registered")]
    Conflict(&'static str),
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Database(sqlx::Error),
}

impl UserError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for UserError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                let field = match db.constraint() {
                    Some(c) if c.contains("username") => "Username",
                    _ => "Email",
                };
                return Self::Conflict(field);
            }
        }
        Self::Database(e)
    }
}

impl From<UserError> for (StatusCode, String) {
    fn from(e: UserError) -> Self {
        (e.status(), e.to_string())
    }
}

pub type UserResult<T> = Result<T, UserError>;

async fn insert<'e, E: PgExecutor<'e>>(executor: E, new: &NewUser) -> UserResult<User> {
    let sql = format!(
        r#"
        INSERT INTO users (id, username, email, hashed_password, role, email_verified,
                           is_locked, failed_login_attempts, verification_token)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {USER_COLUMNS}
        "#
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.hashed_password)
        .bind(new.role.as_str())
        .bind(new.email_verified)
        .bind(new.is_locked)
        .bind(new.failed_login_attempts)
        .bind(&new.verification_token)
        .fetch_one(executor)
        .await?;
    debug!(user_id = %user.id, role = %user.role, "user inserted");
    Ok(user)
}

impl User {
    /// Insert and commit a new user.
    pub async fn create(db: &PgPool, new: &NewUser) -> UserResult<User> {
        insert(db, new).await
    }

    /// Insert within a caller-owned transaction.
    pub async fn create_tx(tx: &mut Transaction<'_, Postgres>, new: &NewUser) -> UserResult<User> {
        insert(&mut **tx, new).await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> UserResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> UserResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await?)
    }

    pub async fn find_by_username(db: &PgPool, username: &str) -> UserResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(db)
            .await?)
    }

    /// Looks a login identifier up as a username first, then as an email.
    pub async fn find_by_login(db: &PgPool, login: &str) -> UserResult<Option<User>> {
        if let Some(user) = Self::find_by_username(db, login).await? {
            return Ok(Some(user));
        }
        Self::find_by_email(db, &login.trim().to_lowercase()).await
    }

    pub async fn list(db: &PgPool, skip: i64, limit: i64) -> UserResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(skip)
            .fetch_all(db)
            .await?)
    }

    pub async fn count(db: &PgPool) -> UserResult<i64> {
        let (n,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await?;
        Ok(n)
    }

    pub async fn update(db: &PgPool, id: Uuid, changes: &UserChanges) -> UserResult<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET username = COALESCE($2, username),
                   email = COALESCE($3, email),
                   role = COALESCE($4, role),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&changes.username)
            .bind(changes.email.as_deref().map(|e| e.trim().to_lowercase()))
            .bind(changes.role.map(|r| r.as_str()))
            .fetch_optional(db)
            .await?
            .ok_or(UserError::NotFound)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> UserResult<()> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(UserError::NotFound);
        }
        Ok(())
    }

    /// Counts a failed login; the account locks once `max_attempts` is reached.
    pub async fn record_failed_login(db: &PgPool, id: Uuid, max_attempts: i32) -> UserResult<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET failed_login_attempts = failed_login_attempts + 1,
                   is_locked = is_locked OR failed_login_attempts + 1 >= $2,
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(max_attempts)
            .fetch_optional(db)
            .await?
            .ok_or(UserError::NotFound)
    }

    pub async fn record_successful_login(db: &PgPool, id: Uuid) -> UserResult<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET failed_login_attempts = 0,
                   last_login_at = now(),
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Marks the email verified if `token` matches; returns whether it did.
    pub async fn verify_email(db: &PgPool, id: Uuid, token: &str) -> UserResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET email_verified = TRUE,
                   verification_token = NULL,
                   updated_at = now()
             WHERE id = $1 AND verification_token = $2
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    pub async fn unlock(db: &PgPool, id: Uuid) -> UserResult<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET is_locked = FALSE,
                   failed_login_attempts = 0,
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or(UserError::NotFound)
    }
}
