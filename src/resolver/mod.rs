//! Post detail resolution
//!
//! Turns a slug into a render-ready post: the document itself, its body
//! transformed block by block, a read-time estimate and links to the
//! chronologically adjacent posts.

use serde::Serialize;
use std::sync::Arc;

use crate::content::{
    estimate_read_time, ContentBlock, HtmlRichText, PostDetail, PostFields, RichTextTransformer,
    SiblingRef,
};
use crate::source::{
    Direction, Ordering, Predicate, QueryOptions, RawDocument, SharedSource, POST_TYPE,
};
use crate::Result;

/// Everything a post page needs
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPost {
    pub post: PostDetail,
    /// Older neighbour
    pub prev: SiblingRef,
    /// Newer neighbour
    pub next: SiblingRef,
    /// Estimated minutes
    pub read_time: usize,
    /// Resolved against a draft revision
    pub preview: bool,
}

/// Lifecycle of a detail page
///
/// Once a post has been resolved the page never goes back to resolving.
#[derive(Debug, Clone, Default)]
pub enum DetailState {
    #[default]
    Resolving,
    Ready(ResolvedPost),
    PreviewActive(ResolvedPost),
}

impl DetailState {
    pub fn resolve(self, post: ResolvedPost) -> Self {
        match self {
            Self::Resolving if post.preview => Self::PreviewActive(post),
            Self::Resolving => Self::Ready(post),
            resolved => resolved,
        }
    }

    pub fn post(&self) -> Option<&ResolvedPost> {
        match self {
            Self::Resolving => None,
            Self::Ready(post) | Self::PreviewActive(post) => Some(post),
        }
    }

    pub fn is_resolving(&self) -> bool {
        matches!(self, Self::Resolving)
    }
}

/// Map a document to its route
pub fn link_resolver(doc: &RawDocument) -> String {
    match (doc.doc_type.as_str(), doc.uid.as_deref()) {
        (POST_TYPE, Some(uid)) => format!("/post/{}", uid),
        _ => "/".to_string(),
    }
}

pub struct PostResolver {
    source: SharedSource,
    transformer: Arc<dyn RichTextTransformer>,
}

impl PostResolver {
    pub fn new(source: SharedSource) -> Self {
        Self::with_transformer(source, Arc::new(HtmlRichText))
    }

    pub fn with_transformer(source: SharedSource, transformer: Arc<dyn RichTextTransformer>) -> Self {
        Self {
            source,
            transformer,
        }
    }

    /// Resolve the post at `slug`, reading a draft revision when `preview_ref` is set
    pub async fn resolve(&self, slug: &str, preview_ref: Option<&str>) -> Result<ResolvedPost> {
        let doc = self.source.get_by_uid(POST_TYPE, slug, preview_ref).await?;
        let fields = PostFields::from_document(&doc)?;

        let (prev, next) = tokio::try_join!(
            self.sibling(&doc.id, Direction::Desc, preview_ref),
            self.sibling(&doc.id, Direction::Asc, preview_ref),
        )?;

        let mut texts = Vec::with_capacity(fields.content.len() * 2);
        let mut content = Vec::with_capacity(fields.content.len());
        for block in &fields.content {
            texts.push(block.heading.clone());

            let rendered = block.nodes().and_then(|nodes| {
                let html = self.transformer.as_html(&nodes)?;
                Ok((html, self.transformer.as_text(&nodes)))
            });
            let body = match rendered {
                Ok((html, text)) => {
                    texts.push(text);
                    html
                }
                Err(e) => {
                    tracing::warn!("Block `{}` of post `{}` not rendered: {}", block.heading, slug, e);
                    String::new()
                }
            };
            content.push(ContentBlock {
                heading: block.heading.clone(),
                body,
            });
        }
        let read_time = estimate_read_time(texts.iter().map(String::as_str));

        let post = PostDetail {
            uid: doc.uid.clone().unwrap_or_else(|| slug.to_string()),
            first_publication_date: doc.first_publication_date,
            last_publication_date: doc.last_publication_date,
            title: fields.title,
            subtitle: fields.subtitle,
            author: fields.author,
            banner_url: fields.banner.url,
            content,
        };

        tracing::debug!("Resolved post `{}` ({} blocks, {} min)", slug, post.content.len(), read_time);

        Ok(ResolvedPost {
            post,
            prev,
            next,
            read_time,
            preview: preview_ref.is_some(),
        })
    }

    /// The post published right before (`Desc`) or after (`Asc`) document `id`
    async fn sibling(&self, id: &str, direction: Direction, preview_ref: Option<&str>) -> Result<SiblingRef> {
        let options = QueryOptions::default()
            .fetch(["posts.title"])
            .page_size(1)
            .after(id)
            .order_by(Ordering::by_publication(direction))
            .preview_ref(preview_ref);
        let response = self
            .source
            .query(&[Predicate::document_type(POST_TYPE)], &options)
            .await?;

        let Some(doc) = response.results.first().filter(|_| response.results_size > 0) else {
            return Ok(SiblingRef::none());
        };
        let title = PostFields::from_document(doc)?.title;
        Ok(SiblingRef {
            exists: true,
            uid: doc.uid.clone().unwrap_or_else(|| doc.id.clone()),
            title,
        })
    }
}
