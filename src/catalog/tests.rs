//! Tests for the catalog module
//!
//! Payload validation plus the mutation handlers driven against an
//! in-memory database: a non-owner or anonymous edit answers with a notice
//! and redirect while the row stays untouched, the owner's edit bumps
//! `updated_on` and never touches `created_by`, and the image route only
//! serves names the upload handler could have written.

#[cfg(test)]
mod tests {
    use super::super::handlers::{serve_item_image, update_item};
    use super::super::models::{Item, ItemPayload};
    use super::super::validators::ItemValidator;
    use crate::auth::models::User;
    use crate::auth::MaybeUser;
    use crate::common::{generate_raw_id, ApiError, AppState, Validator};
    use axum::extract::{Extension, Json, Path};
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use axum_extra::extract::CookieJar;
    use sqlx::SqlitePool;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        crate::common::migrations::run_migrations(&pool)
            .await
            .expect("migrations");
        pool
    }

    fn test_state(pool: SqlitePool, images_dir: PathBuf) -> Arc<RwLock<AppState>> {
        Arc::new(RwLock::new(AppState {
            db: pool,
            http: reqwest::Client::new(),
            session_secret: "test_secret_key".to_string(),
            base_url: "http://localhost:8000".to_string(),
            images_dir,
            providers: Vec::new(),
            insecure_transport: true,
        }))
    }

    fn payload(name: &str, description: &str, category_id: &str) -> ItemPayload {
        ItemPayload {
            name: name.to_string(),
            description: description.to_string(),
            category_id: category_id.to_string(),
        }
    }

    fn user(username: &str) -> User {
        User {
            id: format!("U_{}", username.to_uppercase()),
            username: username.to_string(),
            created_on: None,
            updated_on: None,
        }
    }

    /// Seed one item owned by `owner` with timestamps a day in the past so
    /// a bumped `updated_on` is observable.
    async fn seed_item(pool: &SqlitePool, owner: &str) -> Item {
        let category_id: String = sqlx::query_scalar("SELECT id FROM categories LIMIT 1")
            .fetch_one(pool)
            .await
            .expect("seeded category");

        sqlx::query(
            "INSERT INTO items (id, name, description, category_id, created_by, created_on, updated_on) \
             VALUES ('T_TEST01', 'Ball', 'A round thing', ?, ?, datetime('now', '-1 day'), datetime('now', '-1 day'))",
        )
        .bind(&category_id)
        .bind(owner)
        .execute(pool)
        .await
        .expect("seed item");

        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = 'T_TEST01'")
            .fetch_one(pool)
            .await
            .expect("fetch seeded item")
    }

    /// Pull status, Location and Set-Cookie headers out of a handler response.
    fn response_parts(response: axum::response::Response) -> (StatusCode, String, Vec<String>) {
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        (status, location, cookies)
    }

    #[test]
    fn test_valid_payload_passes() {
        let result = ItemValidator.validate(&payload("Ball", "A round thing", "C_ABC123"));
        assert!(result.is_valid);
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = ItemValidator.validate(&payload("   ", "A round thing", "C_ABC123"));
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].field, "name");
    }

    #[test]
    fn test_oversized_name_rejected() {
        let long_name = "x".repeat(256);
        let result = ItemValidator.validate(&payload(&long_name, "A round thing", "C_ABC123"));
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].field, "name");
    }

    #[test]
    fn test_missing_description_and_category_rejected() {
        let result = ItemValidator.validate(&payload("Ball", "", ""));
        assert!(!result.is_valid);

        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"description"));
        assert!(fields.contains(&"category_id"));
    }

    #[tokio::test]
    async fn test_denied_edit_redirects_with_notice_and_leaves_item_unchanged() {
        let pool = test_pool().await;
        let item = seed_item(&pool, "alice").await;
        let state = test_state(pool.clone(), PathBuf::from("."));

        // Bob and the anonymous visitor both go through the real handler
        for acting in [MaybeUser(Some(user("bob"))), MaybeUser(None)] {
            let response = update_item(
                Extension(state.clone()),
                Path(item.id.clone()),
                acting,
                CookieJar::new(),
                Json(payload("Stolen Ball", "mine now", &item.category_id)),
            )
            .await
            .unwrap()
            .into_response();

            let (status, location, cookies) = response_parts(response);
            assert_eq!(status, StatusCode::SEE_OTHER);
            assert_eq!(location, format!("/catalog/items/{}", item.id));
            assert!(
                cookies
                    .iter()
                    .any(|c| c.starts_with("catalog_flash=") && c.contains("not authorized")),
                "denial should carry a flash notice, got {:?}",
                cookies
            );
        }

        let after = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
            .bind(&item.id)
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(after.name, "Ball");
        assert_eq!(after.created_by, "alice");
        assert_eq!(after.updated_on, item.updated_on);
    }

    #[tokio::test]
    async fn test_owner_edit_updates_fields_but_not_ownership() {
        let pool = test_pool().await;
        let item = seed_item(&pool, "alice").await;
        let state = test_state(pool.clone(), PathBuf::from("."));

        let response = update_item(
            Extension(state),
            Path(item.id.clone()),
            MaybeUser(Some(user("alice"))),
            CookieJar::new(),
            Json(payload("Beach Ball", "A bigger round thing", &item.category_id)),
        )
        .await
        .unwrap()
        .into_response();

        let (status, location, cookies) = response_parts(response);
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location, format!("/catalog/items/{}", item.id));
        assert!(cookies
            .iter()
            .any(|c| c.starts_with("catalog_flash=") && c.contains("Item updated")));

        let after = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
            .bind(&item.id)
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(after.name, "Beach Ball");
        assert_eq!(after.created_by, "alice");
        assert_eq!(after.created_on, item.created_on);
        assert_ne!(after.updated_on, item.updated_on);
    }

    #[tokio::test]
    async fn test_image_request_cannot_escape_images_dir() {
        let pool = test_pool().await;

        let root = std::env::temp_dir().join(format!("catalog_test_{}", generate_raw_id(8)));
        let images_dir = root.join("images");
        tokio::fs::create_dir_all(&images_dir).await.unwrap();
        tokio::fs::write(root.join("secret.txt"), b"do-not-serve")
            .await
            .unwrap();

        let state = test_state(pool, images_dir.clone());

        // The router percent-decodes the segment, so ..%2Fsecret.txt reaches
        // the handler as a literal relative path
        for escape in ["../secret.txt", "..\\secret.txt", "a/../../secret.txt"] {
            let result =
                serve_item_image(Extension(state.clone()), Path(escape.to_string())).await;
            assert!(
                matches!(result, Err(ApiError::BadRequest(_))),
                "{} should be rejected",
                escape
            );
        }

        // Names of the shape the upload handler writes are still served
        tokio::fs::write(images_dir.join("T_ABC123_XYZ78901.png"), b"png-bytes")
            .await
            .unwrap();
        let response = serve_item_image(
            Extension(state),
            Path("T_ABC123_XYZ78901.png".to_string()),
        )
        .await
        .unwrap()
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
