//! Content source adapter
//!
//! A thin client contract over the headless content repository. Queries go
//! straight to the network; caching is the caller's business, and errors are
//! surfaced unchanged without retries.

pub mod date;
mod memory;
mod prismic;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;

pub use memory::{Fixtures, MemorySource};
pub use prismic::PrismicClient;

#[cfg(test)]
pub(crate) use memory::tests::post as fixture_post;

use crate::{Error, Result};

/// Document type holding blog posts
pub const POST_TYPE: &str = "posts";

/// Shared handle to whichever source backs the site
pub type SharedSource = Arc<dyn ContentSource>;

/// A document as returned by the content API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default, with = "date")]
    pub first_publication_date: Option<DateTime<Utc>>,
    #[serde(default, with = "date")]
    pub last_publication_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Opaque continuation token of a paginated query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// An empty `next_page` means there is nothing left to fetch
    ///
    /// Cursors end up in public pages, so the access token the API echoes
    /// back is dropped; the client adds it again when following one.
    pub fn from_next_page(next_page: Option<&str>) -> Option<Self> {
        next_page
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Self::new(strip_access_token(v)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Query parameter carrying the repository credential
pub(crate) const ACCESS_TOKEN: &str = "access_token";

/// Remove the access token from an http(s) URL; anything else is returned as is
pub(crate) fn strip_access_token(raw: &str) -> String {
    let mut url = match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        _ => return raw.to_string(),
    };
    if !url.query_pairs().any(|(k, _)| k == ACCESS_TOKEN) {
        return raw.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != ACCESS_TOKEN)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    url.to_string()
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An equality filter, rendered as `[at(path, "value")]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub path: String,
    pub value: String,
}

impl Predicate {
    pub fn at(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn document_type(doc_type: &str) -> Self {
        Self::at("document.type", doc_type)
    }

    pub fn document_id(id: &str) -> Self {
        Self::at("document.id", id)
    }

    pub fn uid(doc_type: &str, uid: &str) -> Self {
        Self::at(format!("my.{}.uid", doc_type), uid)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[at({}, \"{}\")]",
            self.path,
            self.value.replace('\\', "\\\\").replace('"', "\\\"")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

/// A sort directive such as `document.first_publication_date desc`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ordering {
    pub field: String,
    pub direction: Direction,
}

impl Ordering {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    pub fn by_publication(direction: Direction) -> Self {
        Self {
            field: "document.first_publication_date".to_string(),
            direction,
        }
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Asc => f.write_str(&self.field),
            Direction::Desc => write!(f, "{} desc", self.field),
        }
    }
}

/// Largest page the API serves
pub const MAX_PAGE_SIZE: usize = 100;

/// Query modifiers: projection, page size, anchor and ordering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Fields to return, as `type.field`; empty means everything
    pub fetch: Vec<String>,
    pub page_size: usize,
    /// Only return documents positioned after this document id
    pub after: Option<String>,
    pub orderings: Vec<Ordering>,
    /// Revision to read against; the published master revision when absent
    pub preview_ref: Option<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            fetch: Vec::new(),
            page_size: 20,
            after: None,
            orderings: Vec::new(),
            preview_ref: None,
        }
    }
}

impl QueryOptions {
    pub fn fetch<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetch = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Clamped to what the API accepts
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn after(mut self, id: impl Into<String>) -> Self {
        self.after = Some(id.into());
        self
    }

    pub fn order_by(mut self, ordering: Ordering) -> Self {
        self.orderings.push(ordering);
        self
    }

    pub fn preview_ref(mut self, reference: Option<&str>) -> Self {
        self.preview_ref = reference.map(str::to_string);
        self
    }
}

/// One page of query results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub results_per_page: usize,
    #[serde(default)]
    pub results_size: usize,
    #[serde(default)]
    pub total_results_size: usize,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub prev_page: Option<String>,
    #[serde(default)]
    pub results: Vec<RawDocument>,
}

impl QueryResponse {
    pub fn next_cursor(&self) -> Option<Cursor> {
        Cursor::from_next_page(self.next_page.as_deref())
    }
}

/// Read access to the content repository
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Run a filtered, ordered, paginated query
    async fn query(&self, predicates: &[Predicate], options: &QueryOptions)
        -> Result<QueryResponse>;

    /// Fetch the page a continuation cursor points at
    async fn fetch_cursor(&self, cursor: &Cursor) -> Result<QueryResponse>;

    /// Repository id used by the preview toolbar, when there is one
    fn repository_name(&self) -> Option<String> {
        None
    }

    /// Read one document of `doc_type` by its uid
    async fn get_by_uid(
        &self,
        doc_type: &str,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<RawDocument> {
        let options = QueryOptions::default()
            .page_size(1)
            .preview_ref(preview_ref);
        let predicates = [Predicate::document_type(doc_type), Predicate::uid(doc_type, uid)];
        self.query(&predicates, &options)
            .await?
            .results
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("{} `{}`", doc_type, uid)))
    }

    /// Read one document by its id
    async fn get_by_id(&self, id: &str, preview_ref: Option<&str>) -> Result<RawDocument> {
        let options = QueryOptions::default()
            .page_size(1)
            .preview_ref(preview_ref);
        self.query(&[Predicate::document_id(id)], &options)
            .await?
            .results
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("document `{}`", id)))
    }
}
