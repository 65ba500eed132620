// src/catalog/validators.rs

use super::models::ItemPayload;
use crate::common::{ValidationResult, Validator};

pub const MAX_NAME_LENGTH: usize = 255;

pub struct ItemValidator;

impl Validator<ItemPayload> for ItemValidator {
    fn validate(&self, data: &ItemPayload) -> ValidationResult {
        let mut result = ValidationResult::new();

        let name = data.name.trim();
        if name.is_empty() {
            result.add_error("name", "Item name is required");
        } else if name.len() > MAX_NAME_LENGTH {
            result.add_error("name", "Item name must be at most 255 characters");
        }

        if data.description.trim().is_empty() {
            result.add_error("description", "Description is required");
        }

        if data.category_id.trim().is_empty() {
            result.add_error("category_id", "Category is required");
        }

        result
    }
}
