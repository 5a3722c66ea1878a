//! Seed helpers. Each one inserts and commits before returning, so the rows
//! are visible to handlers reached through the test client.

use anyhow::Context;
use tracing::debug;

use super::{fake, provider::TestSession};
use crate::{
    auth::password::hash_password,
    users::model::{NewUser, User, UserRole},
};

/// Plaintext credential behind every single-user seed.
pub const SEED_PASSWORD: &str = "MySuperPassword$1234";

fn fresh(role: UserRole) -> anyhow::Result<NewUser> {
    let hash = hash_password(SEED_PASSWORD)?;
    Ok(NewUser::new(fake::user_name(), fake::email(), hash).role(role))
}

/// Inserts `new` in its own transaction and commits it.
pub async fn insert(session: &TestSession, new: NewUser) -> anyhow::Result<User> {
    let mut tx = session.begin().await.context("begin seed tx")?;
    let user = User::create_tx(&mut tx, &new).await.context("insert seed user")?;
    tx.commit().await.context("commit seed tx")?;
    debug!(user_id = %user.id, username = %user.username, "seeded user");
    Ok(user)
}

/// AUTHENTICATED, unverified, unlocked.
pub async fn user(session: &TestSession) -> anyhow::Result<User> {
    insert(session, fresh(UserRole::Authenticated)?).await
}

pub async fn verified_user(session: &TestSession) -> anyhow::Result<User> {
    insert(session, fresh(UserRole::Authenticated)?.verified(true)).await
}

/// Locked with the attempt counter already at `max_login_attempts`.
pub async fn locked_user(session: &TestSession, max_login_attempts: i32) -> anyhow::Result<User> {
    insert(
        session,
        fresh(UserRole::Authenticated)?.locked(max_login_attempts),
    )
    .await
}

/// Verified so it can log in.
pub async fn admin_user(session: &TestSession) -> anyhow::Result<User> {
    insert(session, fresh(UserRole::Admin)?.verified(true)).await
}

/// Verified so it can log in.
pub async fn manager_user(session: &TestSession) -> anyhow::Result<User> {
    insert(session, fresh(UserRole::Manager)?.verified(true)).await
}

/// `count` users sharing `role`, committed together.
///
/// Credentials are random and hashed once for the whole batch; these users
/// are not meant to log in.
pub async fn users_with_same_role(
    session: &TestSession,
    count: usize,
    role: UserRole,
) -> anyhow::Result<Vec<User>> {
    let hash = hash_password(&fake::password())?;
    let mut tx = session.begin().await.context("begin bulk seed tx")?;
    let mut users = Vec::with_capacity(count);
    for _ in 0..count {
        let new = NewUser::new(fake::user_name(), fake::email(), hash.clone()).role(role);
        users.push(User::create_tx(&mut tx, &new).await.context("insert bulk seed user")?);
    }
    tx.commit().await.context("commit bulk seed tx")?;
    debug!(count, role = %role, "seeded users");
    Ok(users)
}

pub async fn users_with_same_role_50_users(session: &TestSession) -> anyhow::Result<Vec<User>> {
    users_with_same_role(session, 50, UserRole::Authenticated).await
}
