//! # Auth Module
//!
//! This module is the identity and authorization core:
//! - OAuth provider adapters (Google, Facebook, GitHub)
//! - Account linking: find-or-create a local user from a provider profile
//! - Signed session cookie with a sliding 15-minute window
//! - Ownership authorizer gating mutating catalog operations

pub mod extractors;
pub mod handlers;
pub mod linker;
pub mod models;
pub mod ownership;
pub mod providers;
pub mod routes;
pub mod session;

#[cfg(test)]
mod tests;

pub use extractors::MaybeUser;
pub use models::User;
pub use ownership::can_mutate;
pub use routes::auth_routes;
