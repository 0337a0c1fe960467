//! List posts

use anyhow::Result;
use std::path::Path;

use crate::content::DateFormatter;
use crate::listing::ListingController;
use crate::Blog;

/// Walk the listing to its end and print every post
pub async fn run(blog: &Blog, fixtures: Option<&Path>) -> Result<()> {
    let source = blog.open_source(fixtures)?;
    let dates = DateFormatter::new(&blog.config.language, &blog.config.date_format)?;

    let controller = ListingController::start(source, blog.config.per_page).await?;
    let posts = controller.load_all().await?;

    println!("Posts ({}):", posts.len());
    for post in posts {
        println!(
            "  {} - {} by {} [{}]",
            dates
                .display(post.first_publication_date.as_ref())
                .unwrap_or_else(|| "unpublished".to_string()),
            post.title,
            post.author,
            post.uid
        );
    }

    Ok(())
}
