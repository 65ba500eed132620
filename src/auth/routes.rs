//! Authentication routes

use axum::{routing::get, Router};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /login` - Available sign-in options
/// - `GET /logout` - Clear the session, redirect to /
/// - `GET /login/:provider` - Redirect to the provider's authorization page
/// - `GET /login/:provider/authorized` - Provider callback
pub fn auth_routes() -> Router {
    Router::new()
        .route("/login", get(handlers::login_options))
        .route("/logout", get(handlers::logout))
        .route("/login/:provider", get(handlers::begin_login))
        .route("/login/:provider/authorized", get(handlers::finish_login))
}
