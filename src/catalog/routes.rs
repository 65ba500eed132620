// src/catalog/routes.rs

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Create the catalog router
pub fn catalog_routes() -> Router {
    Router::new()
        .route("/", get(handlers::home))
        // Public read routes
        .route("/catalog/categories", get(handlers::list_categories))
        .route(
            "/catalog/items",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route(
            "/catalog/items/:id",
            get(handlers::get_item)
                .put(handlers::update_item)
                .delete(handlers::delete_item),
        )
        // Ownership-gated image upload plus public serving
        .route("/catalog/items/:id/image", post(handlers::upload_item_image))
        .route("/catalog/images/:filename", get(handlers::serve_item_image))
}
