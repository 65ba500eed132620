//! Tests for the auth module
//!
//! These cover the session window, the provider adapters' pure halves, and
//! the account linker against an in-memory database:
//! - session cookie signing, validation and the sliding 15-minute expiry
//! - provider parsing, fixed scopes and authorize-URL construction
//! - find-or-create idempotence and cross-provider linking
//! - denial of a callback with no authorization code

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::auth::linker::{sign_in_or_register, upsert_linked_identity};
    use crate::auth::models::{LinkedIdentity, Provider, ProviderProfile, SessionClaims};
    use crate::auth::providers::{ProviderAdapter, ProviderError};
    use crate::auth::session::{
        issue_session, issue_session_at, validate_session, validate_session_at,
    };
    use chrono::{Duration, Utc};
    use sqlx::SqlitePool;

    const SECRET: &str = "test_secret_key";

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        crate::common::migrations::run_migrations(&pool)
            .await
            .expect("migrations");
        pool
    }

    fn profile(username: &str) -> ProviderProfile {
        ProviderProfile {
            external_username: username.to_string(),
        }
    }

    #[test]
    fn test_session_claims_structure() {
        let claims = SessionClaims {
            sub: "U_K7NP3X".to_string(),
            exp: 1234567890,
        };

        assert_eq!(claims.sub, "U_K7NP3X");
        assert_eq!(claims.exp, 1234567890);
    }

    #[test]
    fn test_session_round_trip() {
        let token = issue_session(SECRET, "U_K7NP3X").expect("Failed to sign session");
        let user_id = validate_session(SECRET, &token);

        assert_eq!(user_id.as_deref(), Some("U_K7NP3X"));
    }

    #[test]
    fn test_session_validation_fails_with_wrong_secret() {
        let token = issue_session(SECRET, "U_K7NP3X").expect("Failed to sign session");

        assert!(
            validate_session("wrong_secret_key", &token).is_none(),
            "Session validation should fail with wrong secret"
        );
    }

    #[test]
    fn test_session_expires_after_fifteen_minutes() {
        let t0 = Utc::now();
        let token = issue_session_at(SECRET, "U_K7NP3X", t0).expect("Failed to sign session");

        // Still live just inside the window
        assert!(validate_session_at(SECRET, &token, t0 + Duration::minutes(14)).is_some());

        // Anonymous one minute past the window, detected lazily on the probe
        assert!(validate_session_at(SECRET, &token, t0 + Duration::minutes(16)).is_none());
    }

    #[test]
    fn test_session_window_slides_on_each_probe() {
        let t0 = Utc::now();
        let token = issue_session_at(SECRET, "U_K7NP3X", t0).expect("Failed to sign session");

        // Probe at t0+10: still authenticated, so the middleware re-issues
        let probed = validate_session_at(SECRET, &token, t0 + Duration::minutes(10));
        assert_eq!(probed.as_deref(), Some("U_K7NP3X"));
        let refreshed =
            issue_session_at(SECRET, "U_K7NP3X", t0 + Duration::minutes(10)).expect("re-issue");

        // At t0+20 the refreshed session lives, the original does not
        assert!(validate_session_at(SECRET, &refreshed, t0 + Duration::minutes(20)).is_some());
        assert!(validate_session_at(SECRET, &token, t0 + Duration::minutes(20)).is_none());
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("facebook".parse::<Provider>().unwrap(), Provider::Facebook);
        assert_eq!("github".parse::<Provider>().unwrap(), Provider::Github);
        assert!("twitter".parse::<Provider>().is_err());
        assert!("Google".parse::<Provider>().is_err());
    }

    #[test]
    fn test_provider_scopes_are_fixed() {
        assert_eq!(Provider::Google.scopes(), ["openid", "profile", "email"]);
        assert_eq!(Provider::Facebook.scopes(), ["public_profile", "email"]);
        assert_eq!(Provider::Github.scopes(), ["public_profile", "email"]);
    }

    #[test]
    fn test_begin_authorization_url() {
        let adapter = ProviderAdapter::new(
            Provider::Google,
            "client-123".to_string(),
            "secret-456".to_string(),
            reqwest::Client::new(),
        );

        let url = adapter.begin_authorization("http://localhost:8000/login/google/authorized");

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8000%2Flogin%2Fgoogle%2Fauthorized"));
        assert!(url.contains("scope=openid%20profile%20email"));
        assert!(url.contains("response_type=code"));
        // The client secret never leaves the server
        assert!(!url.contains("secret-456"));
    }

    #[test]
    fn test_facebook_adapter_caches_app_token() {
        let facebook = ProviderAdapter::new(
            Provider::Facebook,
            "client-123".to_string(),
            "secret-456".to_string(),
            reqwest::Client::new(),
        )
        .with_app_token("app-token-789".to_string());

        assert_eq!(facebook.app_token(), Some("app-token-789"));

        // Other providers never carry one
        let github = ProviderAdapter::new(
            Provider::Github,
            "client-123".to_string(),
            "secret-456".to_string(),
            reqwest::Client::new(),
        );
        assert_eq!(github.app_token(), None);
    }

    #[tokio::test]
    async fn test_sign_in_is_idempotent() {
        let pool = test_pool().await;

        let first = sign_in_or_register(&pool, &profile("a@b.com")).await.unwrap();
        let second = sign_in_or_register(&pool, &profile("a@b.com")).await.unwrap();

        assert_eq!(first.id, second.id);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind("a@b.com")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_cross_provider_linking_by_username() {
        let pool = test_pool().await;

        // Same email from Google and later GitHub resolves to one local user
        let via_google = sign_in_or_register(&pool, &profile("a@b.com")).await.unwrap();
        upsert_linked_identity(&pool, &via_google.id, Provider::Google, "tok-g")
            .await
            .unwrap();

        let via_github = sign_in_or_register(&pool, &profile("a@b.com")).await.unwrap();
        upsert_linked_identity(&pool, &via_github.id, Provider::Github, "tok-h")
            .await
            .unwrap();

        assert_eq!(via_google.id, via_github.id);

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users, 1);

        let identities: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM linked_identities WHERE user_id = ?")
                .bind(&via_google.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(identities, 2);
    }

    #[tokio::test]
    async fn test_reauthentication_refreshes_token_without_duplicate_row() {
        let pool = test_pool().await;

        let user = sign_in_or_register(&pool, &profile("a@b.com")).await.unwrap();
        upsert_linked_identity(&pool, &user.id, Provider::Google, "old-token")
            .await
            .unwrap();
        upsert_linked_identity(&pool, &user.id, Provider::Google, "new-token")
            .await
            .unwrap();

        let rows: Vec<LinkedIdentity> = sqlx::query_as(
            "SELECT * FROM linked_identities WHERE user_id = ? AND provider = 'google'",
        )
        .bind(&user.id)
        .fetch_all(&pool)
        .await
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].token, "new-token");
        assert_eq!(rows[0].provider, "google");
    }

    #[tokio::test]
    async fn test_missing_code_never_creates_a_user() {
        let pool = test_pool().await;

        let adapter = ProviderAdapter::new(
            Provider::Github,
            "client-123".to_string(),
            "secret-456".to_string(),
            reqwest::Client::new(),
        );

        let err = adapter
            .complete_authorization(None, "http://localhost:8000/login/github/authorized")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::TokenMissing));

        let err = adapter
            .complete_authorization(Some(""), "http://localhost:8000/login/github/authorized")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::TokenMissing));

        // The linker was never reached: no user rows, session stays anonymous
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users, 0);
    }
}
