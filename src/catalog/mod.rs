//! # Catalog Module
//!
//! Category/Item CRUD. The identity core only reaches in through the
//! ownership gate: every mutating handler resolves the current user and
//! checks `can_mutate` against the item's `created_by` before touching
//! anything.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod validators;

#[cfg(test)]
mod tests;

pub use routes::catalog_routes;
