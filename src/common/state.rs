// Application state shared across all modules

use reqwest::Client;
use sqlx::SqlitePool;
use std::path::PathBuf;

use crate::auth::models::Provider;
use crate::auth::providers::ProviderAdapter;

/// Application state containing database pool, HTTP client, and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub http: Client,
    pub session_secret: String,
    pub base_url: String,
    pub images_dir: PathBuf,
    /// Adapters for the OAuth providers that came up with valid credentials.
    /// A provider missing here has no login option at all.
    pub providers: Vec<ProviderAdapter>,
    /// Allows OAuth and session cookies over plain HTTP for local development.
    pub insecure_transport: bool,
}

impl AppState {
    pub fn adapter(&self, provider: Provider) -> Option<&ProviderAdapter> {
        self.providers.iter().find(|a| a.provider == provider)
    }

    /// Secure flag for cookies issued by this deployment.
    pub fn cookies_secure(&self) -> bool {
        !self.insecure_transport
    }
}
