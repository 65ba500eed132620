// src/session_middleware.rs
//! Sliding-window session refresh
//!
//! Any request presenting a live session gets its cookie re-issued with the
//! expiry recomputed from "now", so activity keeps the 15-minute window
//! open. Requests with no session, or an expired one, pass through
//! untouched; expiry is detected lazily here and in the extractors.

use axum::{
    extract::{Extension, Request},
    http::{header::SET_COOKIE, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::auth::session::{issue_session, session_cookie, validate_session, SESSION_COOKIE};
use crate::common::AppState;

pub async fn refresh_session(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let (secret, secure) = {
        let state = state_lock.read().await;
        (state.session_secret.clone(), state.cookies_secure())
    };

    let refreshed = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| validate_session(&secret, cookie.value()))
        .and_then(|user_id| issue_session(&secret, &user_id).ok());

    let mut response = next.run(request).await;

    let Some(token) = refreshed else {
        return response;
    };

    // A handler that already set the session cookie (login, logout) wins;
    // appending the refresh on top would resurrect a cleared session.
    let prefix = format!("{}=", SESSION_COOKIE);
    let already_set = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .any(|v| v.to_str().map(|s| s.starts_with(&prefix)).unwrap_or(false));
    if already_set {
        return response;
    }

    if let Ok(value) = HeaderValue::from_str(&session_cookie(&token, secure).to_string()) {
        debug!("Sliding session window refreshed");
        response.headers_mut().append(SET_COOKIE, value);
    }

    response
}
