//! Table definitions. Statements are resolved against the connection's
//! `search_path`, so the same DDL serves the production schema and a
//! per-test namespace.

use anyhow::Context;
use sqlx::PgPool;
use tracing::debug;

const CREATE_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id                    UUID PRIMARY KEY,
        username              TEXT NOT NULL UNIQUE,
        email                 TEXT NOT NULL UNIQUE,
        hashed_password       TEXT NOT NULL,
        role                  TEXT NOT NULL DEFAULT 'AUTHENTICATED'
                              CHECK (role IN ('AUTHENTICATED', 'MANAGER', 'ADMIN')),
        email_verified        BOOLEAN NOT NULL DEFAULT FALSE,
        is_locked             BOOLEAN NOT NULL DEFAULT FALSE,
        failed_login_attempts INTEGER NOT NULL DEFAULT 0,
        verification_token    TEXT,
        last_login_at         TIMESTAMPTZ,
        created_at            TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at            TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS users_created_at_idx ON users (created_at)",
];

// Reverse dependency order.
const DROP_STATEMENTS: &[&str] = &["DROP TABLE IF EXISTS users CASCADE"];

/// Table names managed by this module.
pub const TABLES: &[&str] = &["users"];

pub async fn create_all(db: &PgPool) -> anyhow::Result<()> {
    for stmt in CREATE_STATEMENTS {
        sqlx::query(stmt)
            .execute(db)
            .await
            .with_context(|| format!("create schema: {}", first_line(stmt)))?;
    }
    debug!(tables = ?TABLES, "schema created");
    Ok(())
}

pub async fn drop_all(db: &PgPool) -> anyhow::Result<()> {
    for stmt in DROP_STATEMENTS {
        sqlx::query(stmt)
            .execute(db)
            .await
            .with_context(|| format!("drop schema: {}", first_line(stmt)))?;
    }
    debug!(tables = ?TABLES, "schema dropped");
    Ok(())
}

/// Names of managed tables visible through the current `search_path`.
pub async fn existing_tables(db: &PgPool) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT table_name::text
          FROM information_schema.tables
         WHERE table_schema = current_schema()
           AND table_name::text = ANY($1)
         ORDER BY table_name
        "#,
    )
    .bind(TABLES)
    .fetch_all(db)
    .await
    .context("list tables")?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

fn first_line(stmt: &str) -> &str {
    stmt.trim().lines().next().unwrap_or_default()
}
