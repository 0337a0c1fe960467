//! Configuration module

mod env;
mod site;

pub use env::{preview_secret, repository_name, SourceConfig};
pub use site::CommentsConfig;
pub use site::PreviewConfig;
pub use site::SiteConfig;
