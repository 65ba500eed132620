// src/catalog/handlers.rs
//! Catalog CRUD handlers
//!
//! Reads are public. Every mutating handler consults the ownership gate
//! before touching any state; a denied mutation leaves the row untouched
//! and answers with a flash notice plus a redirect back to the item's read
//! view rather than a bare 403.

use axum::{
    extract::{Extension, Multipart, Path, Query},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Json, Redirect},
};
use axum_extra::extract::CookieJar;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::auth::ownership::can_mutate;
use crate::auth::session::flash_cookie;
use crate::auth::MaybeUser;
use crate::common::{generate_item_id, generate_raw_id, ApiError, AppState, Validator};

use super::models::*;
use super::validators::ItemValidator;

/// GET / - categories plus the most recent items
pub async fn home(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    let items = sqlx::query_as::<_, Item>(
        "SELECT * FROM items ORDER BY created_on DESC LIMIT 10",
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::DatabaseError)?;

    Ok(Json(serde_json::json!({
        "categories": categories,
        "items": items,
    })))
}

/// GET /catalog/categories - list all categories
pub async fn list_categories(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let state = state_lock.read().await.clone();

    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    Ok(Json(categories))
}

/// GET /catalog/items - list items (optional category filter, paginated)
pub async fn list_items(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(params): Query<ItemQueryParams>,
) -> Result<Json<ItemListResponse>, ApiError> {
    let state = state_lock.read().await.clone();

    // Parse pagination parameters with defaults
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * limit;

    let (total, items): (i64, Vec<Item>) = if let Some(category) = &params.category {
        let total = sqlx::query_scalar(
            "SELECT COUNT(*) FROM items \
             JOIN categories ON categories.id = items.category_id \
             WHERE lower(categories.name) = lower(?)",
        )
        .bind(category)
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        let items = sqlx::query_as::<_, Item>(
            "SELECT items.* FROM items \
             JOIN categories ON categories.id = items.category_id \
             WHERE lower(categories.name) = lower(?) \
             ORDER BY items.created_on DESC \
             LIMIT ? OFFSET ?",
        )
        .bind(category)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        (total, items)
    } else {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&state.db)
            .await
            .map_err(ApiError::DatabaseError)?;

        let items = sqlx::query_as::<_, Item>(
            "SELECT * FROM items ORDER BY created_on DESC LIMIT ? OFFSET ?",
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        (total, items)
    };

    debug!(
        item_count = items.len(),
        total = total,
        page = page,
        limit = limit,
        category = ?params.category,
        "Successfully loaded paginated items list"
    );

    Ok(Json(ItemListResponse {
        items,
        total: total as usize,
        page,
        page_size: limit,
    }))
}

/// GET /catalog/items/:id - item details
pub async fn get_item(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(item_id): Path<String>,
) -> Result<Json<Item>, ApiError> {
    let state = state_lock.read().await.clone();

    let item = load_item(&state.db, &item_id).await?;

    Ok(Json(item))
}

/// POST /catalog/items - create an item owned by the current user
pub async fn create_item(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    user: MaybeUser,
    jar: CookieJar,
    Json(payload): Json<ItemPayload>,
) -> Result<(CookieJar, Redirect), ApiError> {
    let state = state_lock.read().await.clone();

    let Some(acting) = user.as_user() else {
        warn!("Anonymous request tried to create an item");
        return Ok((
            jar.add(flash_cookie("You must be signed in to add items.")),
            Redirect::to("/login"),
        ));
    };

    validate_payload(&state.db, &payload).await?;

    let id = generate_item_id();
    sqlx::query(
        "INSERT INTO items (id, name, description, category_id, created_by, created_on, updated_on) \
         VALUES (?, ?, ?, ?, ?, datetime('now'), datetime('now'))",
    )
    .bind(&id)
    .bind(payload.name.trim())
    .bind(payload.description.trim())
    .bind(payload.category_id.trim())
    .bind(&acting.username)
    .execute(&state.db)
    .await
    .map_err(ApiError::DatabaseError)?;

    info!(item_id = %id, owner = %acting.username, "Item created");

    Ok((
        jar.add(flash_cookie("Item created.")),
        Redirect::to(&format!("/catalog/items/{}", id)),
    ))
}

/// PUT /catalog/items/:id - edit an item (owner only)
pub async fn update_item(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(item_id): Path<String>,
    user: MaybeUser,
    jar: CookieJar,
    Json(payload): Json<ItemPayload>,
) -> Result<(CookieJar, Redirect), ApiError> {
    let state = state_lock.read().await.clone();

    let item = load_item(&state.db, &item_id).await?;

    if !can_mutate(&item.created_by, user.as_user()) {
        return Ok(deny_mutation(jar, &item, user.username()));
    }

    validate_payload(&state.db, &payload).await?;

    apply_item_update(&state.db, &item.id, &payload).await?;

    info!(item_id = %item.id, owner = %item.created_by, "Item updated");

    Ok((
        jar.add(flash_cookie("Item updated.")),
        Redirect::to(&format!("/catalog/items/{}", item.id)),
    ))
}

/// DELETE /catalog/items/:id - delete an item (owner only)
pub async fn delete_item(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(item_id): Path<String>,
    user: MaybeUser,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let state = state_lock.read().await.clone();

    let item = load_item(&state.db, &item_id).await?;

    if !can_mutate(&item.created_by, user.as_user()) {
        return Ok(deny_mutation(jar, &item, user.username()));
    }

    sqlx::query("DELETE FROM items WHERE id = ?")
        .bind(&item.id)
        .execute(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    info!(item_id = %item.id, owner = %item.created_by, "Item deleted");

    Ok((jar.add(flash_cookie("Item deleted.")), Redirect::to("/")))
}

/// POST /catalog/items/:id/image - upload an item image (owner only)
pub async fn upload_item_image(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(item_id): Path<String>,
    user: MaybeUser,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<(CookieJar, Redirect), ApiError> {
    let state = state_lock.read().await.clone();

    let item = load_item(&state.db, &item_id).await?;

    if !can_mutate(&item.created_by, user.as_user()) {
        return Ok(deny_mutation(jar, &item, user.username()));
    }

    let mut file_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart body".to_string()))?
    {
        if field.name() == Some("image") {
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::BadRequest("Invalid file".to_string()))?
                    .to_vec(),
            );
        }
    }

    let data = file_data.ok_or_else(|| ApiError::BadRequest("No image provided".to_string()))?;

    let extension = sniff_image_extension(&data)
        .ok_or_else(|| ApiError::BadRequest("Images only! (jpg or png)".to_string()))?;

    let filename = format!("{}_{}.{}", item.id, generate_raw_id(8), extension);
    let file_path = state.images_dir.join(&filename);

    tokio::fs::write(&file_path, &data)
        .await
        .map_err(|_| ApiError::InternalServer("Failed to save image".to_string()))?;

    let url = format!("/catalog/images/{}", filename);
    sqlx::query("UPDATE items SET image = ?, updated_on = datetime('now') WHERE id = ?")
        .bind(&url)
        .bind(&item.id)
        .execute(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    info!(item_id = %item.id, filename = %filename, "Item image uploaded");

    Ok((
        jar.add(flash_cookie("Image uploaded.")),
        Redirect::to(&format!("/catalog/items/{}", item.id)),
    ))
}

/// GET /catalog/images/:filename - serve an uploaded item image
pub async fn serve_item_image(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    // The router percent-decodes the segment, so ..%2F arrives here as a
    // literal ../ and would escape the images directory when joined
    if !is_safe_image_filename(&filename) {
        warn!(filename = %filename, "Rejected image request outside the images directory");
        return Err(ApiError::BadRequest("Invalid image filename".to_string()));
    }

    let file_path = state.images_dir.join(&filename);

    if !file_path.exists() {
        return Err(ApiError::NotFound("Image not found".to_string()));
    }

    let content = tokio::fs::read(&file_path)
        .await
        .map_err(|_| ApiError::InternalServer("Failed to read image".to_string()))?;

    Ok(([(CONTENT_TYPE, content_type_for(&filename))], content))
}

// ---- Helpers ----

async fn load_item(db: &SqlitePool, item_id: &str) -> Result<Item, ApiError> {
    sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
        .bind(item_id)
        .fetch_optional(db)
        .await
        .map_err(ApiError::DatabaseError)?
        .ok_or_else(|| ApiError::NotFound(format!("Item not found: {}", item_id)))
}

/// Denied mutation: flash notice plus redirect back to the item's read view,
/// with all state untouched.
fn deny_mutation(jar: CookieJar, item: &Item, acting: Option<&str>) -> (CookieJar, Redirect) {
    warn!(
        item_id = %item.id,
        owner = %item.created_by,
        acting = ?acting,
        "Mutation denied by ownership gate"
    );

    (
        jar.add(flash_cookie("You are not authorized to modify this item.")),
        Redirect::to(&format!("/catalog/items/{}", item.id)),
    )
}

async fn validate_payload(db: &SqlitePool, payload: &ItemPayload) -> Result<(), ApiError> {
    let validation_result = ItemValidator.validate(payload);
    if !validation_result.is_valid {
        warn!(errors = ?validation_result.errors, "Item payload validation failed");
        return Err(ApiError::from(validation_result));
    }

    let category_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?")
        .bind(payload.category_id.trim())
        .fetch_one(db)
        .await
        .map_err(ApiError::DatabaseError)?;

    if category_exists == 0 {
        return Err(ApiError::ValidationError(format!(
            "category_id: unknown category {}",
            payload.category_id.trim()
        )));
    }

    Ok(())
}

/// Update the mutable item fields. `created_by` is deliberately not part of
/// the statement: ownership is set once at creation and immutable here.
async fn apply_item_update(
    db: &SqlitePool,
    item_id: &str,
    payload: &ItemPayload,
) -> Result<(), ApiError> {
    sqlx::query(
        "UPDATE items SET name = ?, description = ?, category_id = ?, \
         updated_on = datetime('now') WHERE id = ?",
    )
    .bind(payload.name.trim())
    .bind(payload.description.trim())
    .bind(payload.category_id.trim())
    .bind(item_id)
    .execute(db)
    .await
    .map_err(ApiError::DatabaseError)?;

    Ok(())
}

/// The upload handler only ever writes names of the shape
/// `T_XXXXXX_XXXXXXXX.ext`; anything carrying a separator or parent
/// component cannot be one of ours.
fn is_safe_image_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains("..")
        && std::path::Path::new(filename).file_name() == Some(std::ffi::OsStr::new(filename))
}

fn sniff_image_extension(data: &[u8]) -> Option<&'static str> {
    let infer = infer::Infer::new();
    match infer.get(data).map(|t| t.mime_type()) {
        Some("image/jpeg") | Some("image/jpg") => Some("jpg"),
        Some("image/png") => Some("png"),
        _ => None,
    }
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
