// src/auth/linker.rs
//! Account linker: find-or-create a local user from a provider profile
//!
//! Linking is keyed on the externally verified username only, so the same
//! email arriving from two different providers resolves to one local user.
//! There is no signup form and no password: trust in the username is
//! delegated entirely to the provider.

use sqlx::SqlitePool;
use tracing::{debug, info};

use super::models::{Provider, ProviderProfile, User};
use crate::common::{generate_identity_id, generate_user_id, safe_email_log, ApiError};

/// Resolve the profile to an existing user or create one.
/// Idempotent on username: a second call with the same profile returns the
/// same user and leaves exactly one row.
pub async fn sign_in_or_register(
    db: &SqlitePool,
    profile: &ProviderProfile,
) -> Result<User, ApiError> {
    let username = &profile.external_username;

    if let Some(user) = find_by_username(db, username).await? {
        debug!(
            user_id = %user.id,
            username = %safe_email_log(username),
            "Found existing user for provider profile"
        );
        return Ok(user);
    }

    let id = generate_user_id();
    info!(
        user_id = %id,
        username = %safe_email_log(username),
        "Creating new user account on first sign-in"
    );

    // A concurrent first sign-in for the same username wins the UNIQUE
    // index; the ignored insert then falls back to the surviving row.
    sqlx::query(
        "INSERT OR IGNORE INTO users (id, username, created_on, updated_on) \
         VALUES (?, ?, datetime('now'), datetime('now'))",
    )
    .bind(&id)
    .bind(username)
    .execute(db)
    .await
    .map_err(ApiError::DatabaseError)?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(db)
        .await
        .map_err(ApiError::DatabaseError)
}

async fn find_by_username(db: &SqlitePool, username: &str) -> Result<Option<User>, ApiError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(db)
        .await
        .map_err(ApiError::DatabaseError)
}

/// Persist the provider's access token against the user, one row per
/// (provider, user) pair. Re-authentication refreshes the stored token.
pub async fn upsert_linked_identity(
    db: &SqlitePool,
    user_id: &str,
    provider: Provider,
    token: &str,
) -> Result<(), ApiError> {
    sqlx::query(
        r#"
        INSERT INTO linked_identities (id, provider, token, user_id, created_on, updated_on)
        VALUES (?, ?, ?, ?, datetime('now'), datetime('now'))
        ON CONFLICT (provider, user_id) DO UPDATE SET
            token = excluded.token,
            updated_on = datetime('now')
        "#,
    )
    .bind(generate_identity_id())
    .bind(provider.as_str())
    .bind(token)
    .bind(user_id)
    .execute(db)
    .await
    .map_err(ApiError::DatabaseError)?;

    debug!(user_id = %user_id, provider = %provider, "Linked identity stored");

    Ok(())
}
