//! spacetraveling: a blog frontend rendered from a headless CMS
//!
//! Posts live in a Prismic repository. Pages are rendered with embedded Tera
//! templates and served with stale-while-revalidate regeneration, or written
//! out as a static site.

pub mod cache;
pub mod commands;
pub mod comments;
pub mod config;
pub mod content;
pub mod error;
pub mod generator;
pub mod listing;
pub mod resolver;
pub mod server;
pub mod source;
pub mod templates;

pub use error::{Error, Result};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use source::{MemorySource, PrismicClient, SharedSource};

/// The main blog application
#[derive(Clone)]
pub struct Blog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
}

impl Blog {
    /// Create a new instance from a directory, reading `_config.yml` when present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        let public_dir = base_dir.join(&config.public_dir);

        Ok(Self {
            config,
            base_dir,
            public_dir,
        })
    }

    /// Open the content source: a fixture file when given, the remote repository otherwise
    pub fn open_source(&self, fixtures: Option<&Path>) -> Result<SharedSource> {
        match fixtures {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.base_dir.join(path)
                };
                Ok(Arc::new(MemorySource::from_file(path)?))
            }
            None => {
                let source = config::SourceConfig::from_env()?;
                tracing::info!("Using content repository at {}", source.endpoint);
                Ok(Arc::new(PrismicClient::new(&source)?))
            }
        }
    }

    /// Render the site into the public directory
    pub async fn generate(&self, fixtures: Option<&Path>) -> anyhow::Result<usize> {
        commands::generate::run(self, fixtures).await
    }

    /// Clean the public directory
    pub fn clean(&self) -> anyhow::Result<()> {
        commands::clean::run(self)
    }
}
