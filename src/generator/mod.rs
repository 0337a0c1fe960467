//! Generator module - renders pages from repository content using built-in Tera templates

use std::fs;
use std::path::Path;

use tera::Context;

use crate::comments::{CommentSlot, CommentWidget};
use crate::config::SiteConfig;
use crate::content::DateFormatter;
use crate::listing::{first_page, ListingController, ListingPage};
use crate::resolver::{DetailState, PostResolver, ResolvedPost};
use crate::source::SharedSource;
use crate::templates::{SiteData, TemplateRenderer};
use crate::Result;

/// Page renderer over a content source
pub struct Generator {
    config: SiteConfig,
    source: SharedSource,
    resolver: PostResolver,
    renderer: TemplateRenderer,
    comments: Option<CommentWidget>,
    site: SiteData,
}

impl Generator {
    /// Create a new generator
    pub fn new(config: &SiteConfig, source: SharedSource) -> Result<Self> {
        let renderer = TemplateRenderer::new(config)?;
        let site = SiteData::new(config, source.repository_name());

        Ok(Self {
            config: config.clone(),
            resolver: PostResolver::new(source.clone()),
            source,
            renderer,
            comments: CommentWidget::new(&config.comments),
            site,
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn source(&self) -> &SharedSource {
        &self.source
    }

    pub fn dates(&self) -> &DateFormatter {
        self.renderer.dates()
    }

    /// Create a base context with common variables
    fn base_context(&self, preview: bool) -> Context {
        let mut context = Context::new();
        context.insert("site", &self.site);
        context.insert("preview", &preview);
        context
    }

    /// Fetch the newest posts and render the home page
    pub async fn render_index(&self) -> Result<String> {
        let page = first_page(&self.source, self.config.per_page).await?;
        self.render_listing(&page)
    }

    /// Render the home page for an already fetched first page
    pub fn render_listing(&self, page: &ListingPage) -> Result<String> {
        let mut context = self.base_context(false);
        context.insert("posts", &page.items);
        context.insert("next_page", &page.next_cursor);
        self.renderer.render("index.html", &context)
    }

    pub async fn resolve_post(&self, slug: &str, preview_ref: Option<&str>) -> Result<ResolvedPost> {
        self.resolver.resolve(slug, preview_ref).await
    }

    /// Resolve and render one post page
    pub async fn render_post(&self, slug: &str, preview_ref: Option<&str>) -> Result<String> {
        let resolved = self.resolve_post(slug, preview_ref).await?;
        self.render_resolved(&resolved)
    }

    pub fn render_resolved(&self, resolved: &ResolvedPost) -> Result<String> {
        let state = DetailState::Resolving.resolve(resolved.clone());
        let preview = matches!(state, DetailState::PreviewActive(..));

        let mut slot = CommentSlot::new(self.comments.clone());
        slot.mount(&resolved.post.uid);

        let mut context = self.base_context(preview);
        context.insert("post", &resolved.post);
        context.insert("prev", &resolved.prev);
        context.insert("next", &resolved.next);
        context.insert("read_time", &resolved.read_time);
        context.insert("edited", &resolved.post.was_edited());
        context.insert("comments", slot.render());
        self.renderer.render("post.html", &context)
    }

    /// Render the error page
    pub fn render_not_found(&self, status: u16, message: &str, preview: bool) -> Result<String> {
        let mut context = self.base_context(preview);
        context.insert("status", &status);
        context.insert("message", message);
        self.renderer.render("not_found.html", &context)
    }

    /// Write the home page, every post page and the error page under `public_dir`
    ///
    /// Returns the number of post pages written.
    pub async fn write_site(&self, public_dir: &Path) -> Result<usize> {
        fs::create_dir_all(public_dir)?;

        let page = first_page(&self.source, self.config.per_page).await?;
        write_page(&public_dir.join("index.html"), &self.render_listing(&page)?)?;

        let controller = ListingController::new(self.source.clone(), page);
        let posts = controller.load_all().await?;
        tracing::info!("Found {} posts", posts.len());

        let mut written = 0;
        for summary in &posts {
            if !is_path_segment(&summary.uid) {
                tracing::warn!("Skipping post with unusable uid {:?}", summary.uid);
                continue;
            }
            let html = self.render_post(&summary.uid, None).await?;
            let output_path = public_dir.join("post").join(&summary.uid).join("index.html");
            write_page(&output_path, &html)?;
            written += 1;
        }

        let not_found = self.render_not_found(404, "Esta página não existe.", false)?;
        write_page(&public_dir.join("404.html"), &not_found)?;

        Ok(written)
    }
}

/// A uid must name exactly one directory below `post/`
fn is_path_segment(uid: &str) -> bool {
    !uid.is_empty() && uid != "." && uid != ".." && !uid.contains(['/', '\\'])
}

fn write_page(output_path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, html)?;
    tracing::debug!("Generated: {:?}", output_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{fixture_post, Fixtures, MemorySource};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn generator(fixtures: Fixtures) -> Generator {
        Generator::new(&SiteConfig::default(), Arc::new(MemorySource::new(fixtures))).unwrap()
    }

    fn published(count: u32) -> Fixtures {
        Fixtures {
            documents: (1..=count)
                .map(|day| fixture_post(&format!("post-{}", day), day))
                .collect(),
            previews: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_render_index() {
        let html = generator(published(3)).render_index().await.unwrap();
        assert!(html.contains(r#"href="/post/post-3""#));
        assert!(html.contains(r#"href="/post/post-2""#));
        assert!(!html.contains(r#"href="/post/post-1""#));
        assert!(html.contains("Carregar mais posts"));
        assert!(html.contains("<time>03 mar 2021</time>"));
    }

    #[tokio::test]
    async fn test_render_post() {
        let html = generator(published(3)).render_post("post-2", None).await.unwrap();
        assert!(html.contains("<h1>Title post-2</h1>"));
        assert!(html.contains("<li>1 min</li>"));
        assert!(html.contains("<p>Hello there</p>"));
        assert!(html.contains("Post anterior"));
        assert!(html.contains("Próximo post"));
        assert!(html.contains(r#"data-post="post-2""#));
        assert!(!html.contains("editado em"));
        assert!(!html.contains("Sair do modo Preview"));
    }

    #[tokio::test]
    async fn test_edited_post_shows_edit_date() {
        let mut doc = fixture_post("edited", 1);
        doc.last_publication_date = Some(Utc.with_ymd_and_hms(2021, 3, 5, 19, 25, 0).unwrap());
        let fixtures = Fixtures {
            documents: vec![doc],
            previews: HashMap::new(),
        };

        let html = generator(fixtures).render_post("edited", None).await.unwrap();
        assert!(html.contains("* editado em 05 mar 2021, às 19:25"));
    }

    #[tokio::test]
    async fn test_preview_post_has_exit_link() {
        let mut fixtures = published(1);
        let mut draft = fixture_post("post-1", 1);
        draft.data["title"] = serde_json::json!("Draft title");
        fixtures.previews.insert("ref-1".to_string(), vec![draft]);

        let html = generator(fixtures).render_post("post-1", Some("ref-1")).await.unwrap();
        assert!(html.contains("Draft title"));
        assert!(html.contains(r#"href="/api/exit-preview""#));
    }

    #[tokio::test]
    async fn test_write_site() {
        let dir = tempfile::tempdir().unwrap();
        let count = generator(published(3)).write_site(dir.path()).await.unwrap();

        assert_eq!(count, 3);
        assert!(dir.path().join("index.html").exists());
        assert!(dir.path().join("404.html").exists());
        for uid in ["post-1", "post-2", "post-3"] {
            assert!(dir.path().join("post").join(uid).join("index.html").exists());
        }
    }

    #[tokio::test]
    async fn test_write_site_skips_unsafe_uids() {
        let root = tempfile::tempdir().unwrap();
        let public_dir = root.path().join("public");
        let mut fixtures = published(1);
        fixtures.documents.push(fixture_post("../../escaped", 2));
        fixtures.documents.push(fixture_post("..", 3));

        let count = generator(fixtures).write_site(&public_dir).await.unwrap();

        assert_eq!(count, 1);
        assert!(public_dir.join("post").join("post-1").join("index.html").exists());
        assert!(!root.path().join("escaped").exists());
        let index = fs::read_to_string(public_dir.join("index.html")).unwrap();
        assert!(index.contains("Carregar mais posts"));
    }

    #[test]
    fn test_is_path_segment() {
        assert!(is_path_segment("como-utilizar-hooks"));
        for uid in ["", ".", "..", "a/b", "a\\b", "../x"] {
            assert!(!is_path_segment(uid), "{:?}", uid);
        }
    }
}
