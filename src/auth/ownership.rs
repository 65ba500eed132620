//! The single authorization rule in the system
//!
//! A mutation is permitted iff the request is authenticated and the acting
//! user's username matches the resource's recorded creator. No roles, no
//! admin override, no group ownership.

use super::models::User;

pub fn can_mutate(owner_username: &str, acting: Option<&User>) -> bool {
    matches!(acting, Some(user) if user.username == owner_username)
}
