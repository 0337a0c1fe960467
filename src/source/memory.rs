//! In-memory content source backed by a fixture set
//!
//! Serves the same query contract as the remote API from a list of published
//! documents plus per-ref draft revisions. Used for offline runs
//! (`--fixtures`) and as the source behind the test suites.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use super::{
    ContentSource, Cursor, Direction, Predicate, QueryOptions, QueryResponse, RawDocument,
    MAX_PAGE_SIZE,
};
use crate::{Error, Result};

const CURSOR_PREFIX: &str = "memory:";

/// On-disk fixture format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixtures {
    /// Published documents
    #[serde(default)]
    pub documents: Vec<RawDocument>,
    /// Draft revisions keyed by preview ref
    #[serde(default)]
    pub previews: HashMap<String, Vec<RawDocument>>,
}

/// A query replayable from a cursor
#[derive(Debug, Serialize, Deserialize)]
struct MemoryCursor {
    predicates: Vec<Predicate>,
    options: QueryOptions,
    page: usize,
}

impl MemoryCursor {
    /// Cursors come back from clients, so their numbers are untrusted
    fn validate(self, raw: &str) -> Result<Self> {
        let page_ok = self.page >= 1 && u32::try_from(self.page).is_ok();
        let size_ok = (1..=MAX_PAGE_SIZE).contains(&self.options.page_size);
        if !(page_ok && size_ok) {
            return Err(Error::InvalidCursor(format!(
                "page {} of size {} out of range in {}",
                self.page, self.options.page_size, raw
            )));
        }
        Ok(self)
    }
}

pub struct MemorySource {
    fixtures: Fixtures,
    unavailable: AtomicBool,
}

impl MemorySource {
    pub fn new(fixtures: Fixtures) -> Self {
        Self {
            fixtures,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Published documents only
    pub fn with_documents(documents: Vec<RawDocument>) -> Self {
        Self::new(Fixtures {
            documents,
            previews: HashMap::new(),
        })
    }

    /// Load fixtures from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let fixtures: Fixtures = serde_json::from_str(&content)?;
        tracing::info!(
            "Loaded {} fixture documents from {:?}",
            fixtures.documents.len(),
            path.as_ref()
        );
        Ok(Self::new(fixtures))
    }

    /// Simulate a transport outage for every following call
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(Error::SourceUnavailable("connection refused".to_string()));
        }
        Ok(())
    }

    /// Documents visible under the given revision
    fn revision(&self, preview_ref: Option<&str>) -> Result<Vec<RawDocument>> {
        let mut documents = self.fixtures.documents.clone();

        if let Some(reference) = preview_ref {
            let drafts = self
                .fixtures
                .previews
                .get(reference)
                .ok_or_else(|| Error::SourceRejected {
                    status: 404,
                    message: format!("ref `{}` not found", reference),
                })?;

            for draft in drafts {
                match documents.iter_mut().find(|d| d.id == draft.id) {
                    Some(existing) => *existing = draft.clone(),
                    None => documents.push(draft.clone()),
                }
            }
        }

        Ok(documents)
    }

    fn run(&self, predicates: &[Predicate], options: &QueryOptions, page: usize) -> Result<QueryResponse> {
        let mut matched: Vec<RawDocument> = self
            .revision(options.preview_ref.as_deref())?
            .into_iter()
            .filter(|doc| predicates.iter().all(|p| satisfies(doc, p)))
            .collect();

        // Stable sort, applied last ordering first
        for ordering in options.orderings.iter().rev() {
            matched.sort_by(|a, b| {
                let ord = sort_key(a, &ordering.field).cmp(&sort_key(b, &ordering.field));
                match ordering.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(after) = &options.after {
            if let Some(pos) = matched.iter().position(|d| &d.id == after) {
                matched.drain(..=pos);
            }
        }

        let page_size = options.page_size.max(1);
        let total = matched.len();
        let total_pages = total.div_ceil(page_size);
        let results: Vec<RawDocument> = matched
            .into_iter()
            .skip(page.saturating_sub(1).saturating_mul(page_size))
            .take(page_size)
            .map(|doc| project(doc, &options.fetch))
            .collect();

        let cursor_for = |page: usize| -> Result<String> {
            let cursor = MemoryCursor {
                predicates: predicates.to_vec(),
                options: options.clone(),
                page,
            };
            Ok(format!("{}{}", CURSOR_PREFIX, serde_json::to_string(&cursor)?))
        };

        let next_page = if page < total_pages {
            Some(cursor_for(page + 1)?)
        } else {
            None
        };
        let prev_page = if page > 1 {
            Some(cursor_for(page - 1)?)
        } else {
            None
        };

        Ok(QueryResponse {
            page: page as u32,
            results_per_page: page_size,
            results_size: results.len(),
            total_results_size: total,
            total_pages: total_pages as u32,
            next_page,
            prev_page,
            results,
        })
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn query(
        &self,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<QueryResponse> {
        self.check_available()?;
        self.run(predicates, options, 1)
    }

    async fn fetch_cursor(&self, cursor: &Cursor) -> Result<QueryResponse> {
        self.check_available()?;
        let raw = cursor
            .as_str()
            .strip_prefix(CURSOR_PREFIX)
            .ok_or_else(|| Error::InvalidCursor(cursor.to_string()))?;
        let cursor = serde_json::from_str::<MemoryCursor>(raw)
            .map_err(|e| Error::InvalidCursor(e.to_string()))?
            .validate(raw)?;
        self.run(&cursor.predicates, &cursor.options, cursor.page)
    }
}

fn satisfies(doc: &RawDocument, predicate: &Predicate) -> bool {
    match predicate.path.as_str() {
        "document.type" => doc.doc_type == predicate.value,
        "document.id" => doc.id == predicate.value,
        path => match path.strip_prefix("my.").and_then(|p| p.split_once('.')) {
            Some((doc_type, "uid")) => {
                doc.doc_type == doc_type && doc.uid.as_deref() == Some(predicate.value.as_str())
            }
            Some((doc_type, field)) => {
                doc.doc_type == doc_type
                    && doc.data.get(field).and_then(|v| v.as_str()) == Some(predicate.value.as_str())
            }
            None => false,
        },
    }
}

fn sort_key(doc: &RawDocument, field: &str) -> String {
    match field {
        "document.first_publication_date" => doc
            .first_publication_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_default(),
        "document.last_publication_date" => doc
            .last_publication_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_default(),
        "document.id" => doc.id.clone(),
        other => other
            .strip_prefix("my.")
            .and_then(|p| p.split_once('.'))
            .and_then(|(_, name)| doc.data.get(name))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    }
}

/// Keep only the requested `type.field` entries of `data`
fn project(mut doc: RawDocument, fetch: &[String]) -> RawDocument {
    if fetch.is_empty() {
        return doc;
    }

    if let Some(data) = doc.data.as_object_mut() {
        let keep: Vec<&str> = fetch
            .iter()
            .filter_map(|f| f.split_once('.'))
            .filter(|(doc_type, _)| *doc_type == doc.doc_type)
            .map(|(_, field)| field)
            .collect();
        data.retain(|key, _| keep.contains(&key.as_str()));
    }

    doc
}
