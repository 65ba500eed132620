//! Session extractor for Axum
//!
//! Resolves the signed session cookie against the users table. `MaybeUser`
//! never rejects: denials are the ownership gate's business, answered with a
//! notice and redirect rather than a status code, so every handler sees the
//! request as either a user or anonymous.

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

use super::models::User;
use super::session::{validate_session, SESSION_COOKIE};
use crate::common::{safe_email_log, ApiError, AppState};

/// `Some(user)` for a live session, `None` otherwise.
#[derive(Debug)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn username(&self) -> Option<&str> {
        self.0.as_ref().map(|u| u.username.as_str())
    }

    pub fn as_user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

async fn resolve_session_user<S>(parts: &mut Parts, state: &S) -> Result<Option<User>, ApiError>
where
    S: Send + Sync,
{
    let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
        Extension::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

    let app_state = state_lock.read().await.clone();

    let jar = CookieJar::from_headers(&parts.headers);
    let token = match jar.get(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => return Ok(None),
    };

    let user_id = match validate_session(&app_state.session_secret, &token) {
        Some(id) => id,
        None => {
            // Expired is the same as anonymous on the next request
            debug!("Session cookie invalid or expired, treating request as anonymous");
            return Ok(None);
        }
    };

    let user: Option<User> = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&user_id)
        .fetch_optional(&app_state.db)
        .await
        .map_err(|e| {
            error!(
                error = %e,
                user_id = %user_id,
                "Database error during user lookup in session resolution"
            );
            ApiError::DatabaseError(e)
        })?;

    if let Some(u) = &user {
        debug!(
            user_id = %u.id,
            username = %safe_email_log(&u.username),
            "Session resolved to authenticated user"
        );
    }

    Ok(user)
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_session_user(parts, state).await?))
    }
}
