//! Per-test database isolation.
//!
//! Every [`TestDatabase`] owns a private Postgres namespace. The full schema
//! is rebuilt inside it on acquire and the namespace is dropped on release,
//! so concurrent tests against one server never see each other's rows.

use anyhow::Context;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool, Postgres, Transaction,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::schema;

/// Single-connection handle bound to one test's namespace.
///
/// Clones share the same connection; the harness hands one clone to the
/// application state and keeps another for the test body.
#[derive(Clone, Debug)]
pub struct TestSession {
    pool: PgPool,
    namespace: String,
}

impl TestSession {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn begin(&self) -> sqlx::Result<Transaction<'static, Postgres>> {
        self.pool.begin().await
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

pub struct TestDatabase {
    admin: PgPool,
    session: TestSession,
}

impl TestDatabase {
    /// Creates a fresh namespace at `base_url` and builds the schema in it.
    pub async fn acquire(base_url: &str) -> anyhow::Result<Self> {
        let options: PgConnectOptions = base_url.parse().context("parse test database url")?;
        Self::acquire_with(options).await
    }

    /// Same as [`TestDatabase::acquire`] with explicit connect options.
    pub async fn acquire_with(options: PgConnectOptions) -> anyhow::Result<Self> {
        let admin = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await
            .context("connect to test database")?;

        let namespace = namespace_name();
        if let Err(e) = sqlx::query(&format!(r#"CREATE SCHEMA "{namespace}""#))
            .execute(&admin)
            .await
        {
            admin.close().await;
            return Err(e).with_context(|| format!("create namespace {namespace}"));
        }

        match open_session(options, &namespace).await {
            Ok(session) => {
                info!(%namespace, "test database acquired");
                Ok(Self { admin, session })
            }
            Err(e) => {
                // Don't leave a half-built namespace behind.
                if let Err(drop_err) = drop_namespace(&admin, &namespace).await {
                    warn!(%namespace, error = %drop_err, "cleanup after failed acquire");
                }
                admin.close().await;
                Err(e)
            }
        }
    }

    pub fn session(&self) -> &TestSession {
        &self.session
    }

    /// Closes the session, drops the namespace, then closes the admin
    /// connection. All three steps run even if dropping fails.
    ///
    /// Fails if the namespace is gone or cannot be dropped.
    pub async fn release(self) -> anyhow::Result<()> {
        let Self { admin, session } = self;
        let namespace = session.namespace;

        session.pool.close().await;
        let dropped = drop_namespace(&admin, &namespace).await;
        admin.close().await;

        dropped?;
        info!(%namespace, "test database released");
        Ok(())
    }
}

/// Whether `namespace` still exists on the server `db` points at.
pub async fn namespace_exists(db: &PgPool, namespace: &str) -> anyhow::Result<bool> {
    let (exists,) = sqlx::query_as::<_, (bool,)>(
        "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
    )
    .bind(namespace)
    .fetch_one(db)
    .await
    .context("query namespaces")?;
    Ok(exists)
}

async fn open_session(options: PgConnectOptions, namespace: &str) -> anyhow::Result<TestSession> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options.options([("search_path", namespace)]))
        .await
        .context("open test session")?;

    schema::drop_all(&pool).await.context("drop schema")?;
    schema::create_all(&pool).await.context("create schema")?;
    debug!(%namespace, "schema rebuilt");

    Ok(TestSession {
        pool,
        namespace: namespace.to_string(),
    })
}

async fn drop_namespace(admin: &PgPool, namespace: &str) -> anyhow::Result<()> {
    sqlx::query(&format!(r#"DROP SCHEMA "{namespace}" CASCADE"#))
        .execute(admin)
        .await
        .with_context(|| format!("drop namespace {namespace}"))?;
    Ok(())
}

fn namespace_name() -> String {
    format!("test_{}", Uuid::new_v4().simple())
}
