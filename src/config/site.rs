//! Site configuration (_config.yml)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::Result;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub language: String,

    // Date format (strftime, localized with `language`)
    pub date_format: String,
    pub edit_format: String,

    // Listing
    pub per_page: usize,

    // Regeneration intervals, in seconds
    pub listing_revalidate: u64,
    pub post_revalidate: u64,

    /// Number of posts built ahead of the first request
    pub static_paths: usize,

    // Directory
    pub public_dir: String,

    #[serde(default)]
    pub comments: CommentsConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            language: "pt_BR".to_string(),

            date_format: "%d %b %Y".to_string(),
            edit_format: "%d %b %Y, às %H:%M".to_string(),

            per_page: 2,

            listing_revalidate: 60 * 30,
            post_revalidate: 60 * 60 * 24,

            static_paths: 1,

            public_dir: "public".to_string(),

            comments: CommentsConfig::default(),
            preview: PreviewConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content).map_err(|e| {
            crate::Error::InvalidConfiguration(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Ok(config)
    }

    /// How long the rendered post listing stays fresh
    pub fn listing_ttl(&self) -> Duration {
        Duration::from_secs(self.listing_revalidate)
    }

    /// How long a rendered post page stays fresh
    pub fn post_ttl(&self) -> Duration {
        Duration::from_secs(self.post_revalidate)
    }
}

/// Comment widget (utterances) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentsConfig {
    pub enable: bool,
    pub repo: String,
    pub issue_term: String,
    pub theme: String,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            enable: true,
            repo: "monteiro-alexandre/ignite-reactjs-spacetraveling".to_string(),
            issue_term: "pathname".to_string(),
            theme: "github-dark".to_string(),
        }
    }
}

/// Preview session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub cookie_name: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            cookie_name: "spacetraveling_preview".to_string(),
        }
    }
}
