//! Identity data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Session cookie claims
#[derive(Serialize, Deserialize, Debug)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: usize,
}

/// Local user account, created on first successful OAuth sign-in.
/// The username is the provider-reported email or login handle.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_on: Option<String>,
    pub updated_on: Option<String>,
}

/// One provider's account linked to a local user.
/// At most one row per (provider, user) pair.
#[derive(FromRow, Serialize, Deserialize, Debug)]
pub struct LinkedIdentity {
    pub id: String,
    pub provider: String,
    pub token: String,
    pub user_id: String,
    pub created_on: Option<String>,
    pub updated_on: Option<String>,
}

/// The fixed set of supported OAuth providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Facebook,
    Github,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Google, Provider::Facebook, Provider::Github];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Facebook => "facebook",
            Provider::Github => "github",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Provider::Google),
            "facebook" => Ok(Provider::Facebook),
            "github" => Ok(Provider::Github),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug)]
pub struct UnknownProvider(pub String);

impl fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown provider: {}", self.0)
    }
}

/// Profile normalized across providers: email for Google/Facebook,
/// login handle for GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub external_username: String,
}
