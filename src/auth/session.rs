// src/auth/session.rs
//! Signed session cookie with a sliding 15-minute window
//!
//! The session is not persisted server-side: the cookie value is an
//! HS256-signed claims pair `{sub: user id, exp}`. Every request presenting
//! a live session gets a re-issued cookie with the expiry recomputed from
//! "now" (see `session_middleware`), so the window slides instead of being
//! fixed at login time. An expired cookie is indistinguishable from no
//! cookie: there is no background sweep.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::models::SessionClaims;

pub const SESSION_COOKIE: &str = "catalog_session";
pub const FLASH_COOKIE: &str = "catalog_flash";
pub const SESSION_TTL_MINUTES: i64 = 15;

/// Sign a session token for the given user, expiring 15 minutes from now.
pub fn issue_session(secret: &str, user_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
    issue_session_at(secret, user_id, Utc::now())
}

/// Clock-injectable variant of `issue_session`.
pub fn issue_session_at(
    secret: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (now + Duration::minutes(SESSION_TTL_MINUTES)).timestamp() as usize;
    let claims = SessionClaims {
        sub: user_id.to_string(),
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate a session token and return the user id it is bound to.
pub fn validate_session(secret: &str, token: &str) -> Option<String> {
    validate_session_at(secret, token, Utc::now())
}

/// Clock-injectable variant of `validate_session`.
///
/// Expiry is compared against the supplied clock rather than the library's,
/// so the sliding window can be probed deterministically.
pub fn validate_session_at(secret: &str, token: &str, now: DateTime<Utc>) -> Option<String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;

    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .ok()?;

    if (data.claims.exp as i64) <= now.timestamp() {
        return None;
    }

    Some(data.claims.sub)
}

/// Build the httpOnly session cookie.
pub fn session_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::minutes(SESSION_TTL_MINUTES))
        .build()
}

/// Build an expired cookie that clears the session.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

/// Build a short-lived flash notice cookie.
/// Not httpOnly: the rendering front-end reads and clears it.
pub fn flash_cookie(message: &str) -> Cookie<'static> {
    Cookie::build((FLASH_COOKIE, message.to_string()))
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::minutes(1))
        .build()
}
