// src/catalog/models.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub created_on: Option<String>,
    pub updated_on: Option<String>,
}

/// Catalog item. `created_by` holds the owning user's username, set once at
/// creation from the authenticated session and never changed afterwards.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub category_id: String,
    pub created_by: String,
    pub created_on: Option<String>,
    pub updated_on: Option<String>,
}

/// Create/edit payload. Ownership is never part of the payload.
#[derive(Deserialize, Debug)]
pub struct ItemPayload {
    pub name: String,
    pub description: String,
    pub category_id: String,
}

#[derive(Deserialize, Debug)]
pub struct ItemQueryParams {
    pub category: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

// Paginated item list response
#[derive(Serialize, Debug)]
pub struct ItemListResponse {
    pub items: Vec<Item>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}
