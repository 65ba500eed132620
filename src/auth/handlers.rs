//! Authentication handlers
//!
//! The OAuth flow is one straight line inside the callback handler:
//! complete authorization -> account linker -> linked-identity upsert ->
//! session cookie. A provider failure aborts the line before the linker, so
//! no user row is ever created or touched by a failed sign-in.

use axum::{
    extract::{Extension, Path, Query},
    response::{Json, Redirect},
};
use axum_extra::extract::CookieJar;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::extractors::MaybeUser;
use super::linker;
use super::models::Provider;
use super::session::{clear_session_cookie, flash_cookie, issue_session, session_cookie};
use crate::common::{safe_email_log, ApiError, AppState};

fn parse_provider(raw: &str) -> Result<Provider, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("no such provider: {}", raw)))
}

fn callback_uri(state: &AppState, provider: Provider) -> String {
    format!("{}/login/{}/authorized", state.base_url, provider)
}

/// GET /login - list the sign-in options that are actually available.
/// A provider that failed configuration simply does not appear.
pub async fn login_options(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    user: MaybeUser,
) -> Json<serde_json::Value> {
    let state = state_lock.read().await.clone();

    let providers: Vec<serde_json::Value> = state
        .providers
        .iter()
        .map(|adapter| {
            serde_json::json!({
                "name": adapter.provider.as_str(),
                "url": format!("/login/{}", adapter.provider),
            })
        })
        .collect();

    Json(serde_json::json!({
        "providers": providers,
        "username": user.username(),
    }))
}

/// GET /login/:provider - redirect the browser to the provider's
/// authorization page.
pub async fn begin_login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(raw_provider): Path<String>,
) -> Result<Redirect, ApiError> {
    let provider = parse_provider(&raw_provider)?;
    let state = state_lock.read().await.clone();

    let adapter = state.adapter(provider).ok_or_else(|| {
        ApiError::NotFound(format!("sign-in with {} is not available", provider))
    })?;

    let url = adapter.begin_authorization(&callback_uri(&state, provider));

    info!(provider = %provider, "Redirecting to provider authorization page");

    Ok(Redirect::to(&url))
}

/// GET /login/:provider/authorized - the provider callback.
///
/// On any provider failure the request stays anonymous and the browser is
/// sent back to /login with a flash notice; the linker is never reached.
pub async fn finish_login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(raw_provider): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let provider = parse_provider(&raw_provider)?;
    let state = state_lock.read().await.clone();

    let adapter = state.adapter(provider).ok_or_else(|| {
        ApiError::NotFound(format!("sign-in with {} is not available", provider))
    })?;

    if let Some(error) = params.get("error") {
        warn!(provider = %provider, oauth_error = %error, "Provider returned an error on callback");
        return Ok((
            jar.add(flash_cookie(&format!("Failed to log in with {}", provider))),
            Redirect::to("/login"),
        ));
    }

    let grant = match adapter
        .complete_authorization(
            params.get("code").map(String::as_str),
            &callback_uri(&state, provider),
        )
        .await
    {
        Ok(grant) => grant,
        Err(e) => {
            warn!(provider = %provider, error = %e, "OAuth sign-in failed");
            return Ok((
                jar.add(flash_cookie(&format!("Failed to log in with {}", provider))),
                Redirect::to("/login"),
            ));
        }
    };

    let user = linker::sign_in_or_register(&state.db, &grant.profile).await?;
    linker::upsert_linked_identity(&state.db, &user.id, provider, &grant.access_token).await?;

    let token = issue_session(&state.session_secret, &user.id).map_err(|e| {
        error!(error = %e, user_id = %user.id, "Failed to sign session token");
        ApiError::InternalServer("session error".to_string())
    })?;

    info!(
        user_id = %user.id,
        username = %safe_email_log(&user.username),
        provider = %provider,
        "User signed in"
    );

    Ok((
        jar.add(session_cookie(&token, state.cookies_secure()))
            .add(flash_cookie(&format!(
                "Successfully signed in with {}",
                provider
            ))),
        Redirect::to("/"),
    ))
}

/// GET /logout - clear the session and go home.
pub async fn logout(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let state = state_lock.read().await.clone();

    info!("User logged out");

    (
        jar.add(clear_session_cookie(state.cookies_secure()))
            .add(flash_cookie("You have been logged out.")),
        Redirect::to("/"),
    )
}
