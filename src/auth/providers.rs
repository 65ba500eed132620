// src/auth/providers.rs
//! OAuth provider adapters
//!
//! One adapter per configured provider. The adapter owns the two halves of
//! the dance: building the authorize redirect and turning the callback code
//! into a normalized profile plus the raw access token.

use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use std::env;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{Provider, ProviderProfile};
use crate::common::safe_token_log;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider returned no access token")]
    TokenMissing,

    #[error("failed to fetch user profile: {0}")]
    ProfileFetchFailed(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl Provider {
    fn authorize_endpoint(&self) -> &'static str {
        match self {
            Provider::Google => "https://accounts.google.com/o/oauth2/auth",
            Provider::Facebook => "https://www.facebook.com/dialog/oauth",
            Provider::Github => "https://github.com/login/oauth/authorize",
        }
    }

    fn token_endpoint(&self) -> &'static str {
        match self {
            Provider::Google => "https://oauth2.googleapis.com/token",
            Provider::Facebook => "https://graph.facebook.com/oauth/access_token",
            Provider::Github => "https://github.com/login/oauth/access_token",
        }
    }

    fn userinfo_endpoint(&self) -> &'static str {
        match self {
            Provider::Google => "https://www.googleapis.com/oauth2/v2/userinfo",
            Provider::Facebook => "https://graph.facebook.com/me?fields=email,name",
            Provider::Github => "https://api.github.com/user",
        }
    }

    /// Fixed scope set per provider.
    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            Provider::Google => &["openid", "profile", "email"],
            Provider::Facebook => &["public_profile", "email"],
            Provider::Github => &["public_profile", "email"],
        }
    }

    /// Profile field holding the stable username: email for Google and
    /// Facebook, login handle for GitHub.
    fn username_field(&self) -> &'static str {
        match self {
            Provider::Google | Provider::Facebook => "email",
            Provider::Github => "login",
        }
    }
}

/// Result of a completed authorization: who the user is, plus the raw token
/// to persist on their linked identity.
#[derive(Debug)]
pub struct AuthorizedGrant {
    pub profile: ProviderProfile,
    pub access_token: String,
}

#[derive(Clone)]
pub struct ProviderAdapter {
    pub provider: Provider,
    client_id: String,
    client_secret: String,
    /// Facebook's server-to-server app token, fetched once at configuration.
    app_token: Option<String>,
    http: Client,
}

impl ProviderAdapter {
    pub fn new(provider: Provider, client_id: String, client_secret: String, http: Client) -> Self {
        Self {
            provider,
            client_id,
            client_secret,
            app_token: None,
            http,
        }
    }

    /// Attach the app access token fetched at configuration.
    pub fn with_app_token(mut self, token: String) -> Self {
        self.app_token = Some(token);
        self
    }

    /// App access token cached at configuration for server-to-server Graph
    /// calls. Only Facebook adapters carry one.
    pub fn app_token(&self) -> Option<&str> {
        self.app_token.as_deref()
    }

    /// Build the provider's authorization URL for the browser redirect.
    pub fn begin_authorization(&self, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&response_type=code",
            self.provider.authorize_endpoint(),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&self.provider.scopes().join(" ")),
        )
    }

    /// Exchange the callback's authorization code for an access token and
    /// fetch the normalized profile.
    ///
    /// A missing or spent code, or an exchange that yields no token, maps to
    /// `TokenMissing`. Anything that goes wrong fetching the profile maps to
    /// `ProfileFetchFailed`.
    pub async fn complete_authorization(
        &self,
        code: Option<&str>,
        redirect_uri: &str,
    ) -> Result<AuthorizedGrant, ProviderError> {
        let code = match code {
            Some(c) if !c.is_empty() => c,
            _ => {
                warn!(provider = %self.provider, "OAuth callback carried no authorization code");
                return Err(ProviderError::TokenMissing);
            }
        };

        let access_token = self.exchange_code(code, redirect_uri).await?;

        debug!(
            provider = %self.provider,
            token = %safe_token_log(&access_token),
            "Token exchange succeeded, fetching user profile"
        );

        let profile = self.fetch_profile(&access_token).await?;

        Ok(AuthorizedGrant {
            profile,
            access_token,
        })
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(self.provider.token_endpoint())
            // GitHub answers with form-encoding unless JSON is requested
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!(provider = %self.provider, error = %e, "Token endpoint unreachable");
                ProviderError::TokenMissing
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                provider = %self.provider,
                http_status = %status,
                "Token exchange rejected by provider"
            );
            return Err(ProviderError::TokenMissing);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|_| ProviderError::TokenMissing)?;

        body.get("access_token")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or(ProviderError::TokenMissing)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, ProviderError> {
        let response = self
            .http
            .get(self.provider.userinfo_endpoint())
            .bearer_auth(access_token)
            // GitHub's API requires a User-Agent
            .header(USER_AGENT, "catalog-api")
            .send()
            .await
            .map_err(|e| {
                ProviderError::ProfileFetchFailed(format!(
                    "userinfo endpoint unreachable for {}: {}",
                    self.provider, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::ProfileFetchFailed(format!(
                "{} userinfo returned {}",
                self.provider, status
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            ProviderError::ProfileFetchFailed(format!("malformed profile response: {}", e))
        })?;

        let field = self.provider.username_field();
        let external_username = body
            .get(field)
            .and_then(|v| v.as_str())
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::ProfileFetchFailed(format!(
                    "profile from {} missing '{}'",
                    self.provider, field
                ))
            })?;

        Ok(ProviderProfile { external_username })
    }
}

/// Fetch Facebook's server-to-server app access token via a
/// client-credentials grant.
pub async fn fetch_facebook_app_token(
    http: &Client,
    client_id: &str,
    client_secret: &str,
) -> Result<String, ProviderError> {
    let url = format!(
        "https://graph.facebook.com/oauth/access_token?client_id={}&client_secret={}&grant_type=client_credentials",
        urlencoding::encode(client_id),
        urlencoding::encode(client_secret),
    );

    let response = http.get(&url).send().await.map_err(|e| {
        ProviderError::Unavailable(format!("facebook app token endpoint unreachable: {}", e))
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Unavailable(format!(
            "facebook app token request returned {}",
            status
        )));
    }

    let body: serde_json::Value = response.json().await.map_err(|e| {
        ProviderError::Unavailable(format!("malformed app token response: {}", e))
    })?;

    body.get("access_token")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Unavailable("app token response missing access_token".into()))
}

/// Build adapters for every provider with credentials in the environment.
///
/// Facebook additionally needs its app access token up front; on success the
/// token is cached on the adapter, and when the fetch fails its adapter is
/// skipped entirely so the login option simply disappears instead of failing
/// at request time or aborting startup.
pub async fn configure_providers(http: &Client) -> Vec<ProviderAdapter> {
    let mut adapters = Vec::new();

    for provider in Provider::ALL {
        let prefix = provider.as_str().to_uppercase();
        let client_id = env::var(format!("{}_CLIENT_ID", prefix)).ok();
        let client_secret = env::var(format!("{}_CLIENT_SECRET", prefix)).ok();

        let (client_id, client_secret) = match (client_id, client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => (id, secret),
            _ => {
                debug!(provider = %provider, "No credentials configured, skipping provider");
                continue;
            }
        };

        let app_token = if provider == Provider::Facebook {
            let token = match env::var("FACEBOOK_APP_TOKEN") {
                Ok(token) if !token.is_empty() => Ok(token),
                _ => fetch_facebook_app_token(http, &client_id, &client_secret).await,
            };

            match token {
                Ok(token) => Some(token),
                Err(e) => {
                    warn!(error = %e, "Facebook sign-in unavailable, skipping provider");
                    continue;
                }
            }
        } else {
            None
        };

        let mut adapter = ProviderAdapter::new(provider, client_id, client_secret, http.clone());
        if let Some(token) = app_token {
            adapter = adapter.with_app_token(token);
        }

        info!(
            provider = %provider,
            has_app_token = adapter.app_token().is_some(),
            "OAuth provider configured"
        );
        adapters.push(adapter);
    }

    adapters
}
