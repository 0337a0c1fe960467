//! Content repository credentials, read from the environment at startup

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use crate::{Error, Result};

pub const ENDPOINT_VAR: &str = "PRISMIC_API_ENDPOINT";
pub const ACCESS_TOKEN_VAR: &str = "PRISMIC_ACCESS_TOKEN";
pub const PREVIEW_SECRET_VAR: &str = "PREVIEW_SECRET";

lazy_static! {
    static ref REPOSITORY_RE: Regex = Regex::new(r"([a-zA-Z0-9-]+)?(\.cdn)?\.prismic\.io").unwrap();
}

/// Endpoint and access token of the content repository
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub endpoint: Url,
    pub access_token: String,
}

impl SourceConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup(ENDPOINT_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(Error::ConfigurationMissing(ENDPOINT_VAR))?;
        let access_token = lookup(ACCESS_TOKEN_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(Error::ConfigurationMissing(ACCESS_TOKEN_VAR))?;

        let endpoint = Url::parse(endpoint.trim())
            .map_err(|e| Error::InvalidConfiguration(format!("{}: {}", ENDPOINT_VAR, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::InvalidConfiguration(format!(
                "{} must be an http(s) URL",
                ENDPOINT_VAR
            )));
        }

        Ok(Self {
            endpoint,
            access_token: access_token.trim().to_string(),
        })
    }

    /// Repository id, as used by the preview toolbar script
    pub fn repository_name(&self) -> Option<String> {
        repository_name(self.endpoint.as_str())
    }
}

/// Extract the repository id from a `*.prismic.io` endpoint
pub fn repository_name(endpoint: &str) -> Option<String> {
    REPOSITORY_RE
        .captures(endpoint)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Optional secret used to sign preview cookies
pub fn preview_secret() -> Option<String> {
    std::env::var(PREVIEW_SECRET_VAR)
        .ok()
        .filter(|v| !v.is_empty())
}
