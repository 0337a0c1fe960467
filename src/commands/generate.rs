//! Generate static files

use anyhow::Result;
use std::path::Path;

use crate::generator::Generator;
use crate::Blog;

/// Render every page of the site into the public directory
pub async fn run(blog: &Blog, fixtures: Option<&Path>) -> Result<usize> {
    let start = std::time::Instant::now();

    let source = blog.open_source(fixtures)?;
    let generator = Generator::new(&blog.config, source)?;
    let count = generator.write_site(&blog.public_dir).await?;

    let duration = start.elapsed();
    tracing::info!(
        "Generated {} posts into {:?} in {:.2}s",
        count,
        blog.public_dir,
        duration.as_secs_f64()
    );

    Ok(count)
}
