//! Paginated post listing
//!
//! The first page is produced when the index is (re)generated. Further pages
//! are appended one at a time by following the continuation cursor. All
//! changes to the accumulated list go through [`reduce`], which keeps the list
//! append-only, free of duplicate uids and in the order pages were requested.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::content::{summarize, PostSummary};
use crate::source::{
    Cursor, Direction, Ordering, Predicate, QueryOptions, QueryResponse, SharedSource, POST_TYPE,
};
use crate::Result;

/// Fields needed to render a listing entry
pub const SUMMARY_FIELDS: [&str; 3] = ["posts.title", "posts.subtitle", "posts.author"];

/// One page of formatted summaries plus the cursor to the next one
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingPage {
    pub items: Vec<PostSummary>,
    pub next_cursor: Option<Cursor>,
}

impl ListingPage {
    pub fn from_response(response: &QueryResponse) -> Result<Self> {
        let items = response
            .results
            .iter()
            .map(summarize)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            items,
            next_cursor: response.next_cursor(),
        })
    }
}

/// Fetch the newest `per_page` posts
pub async fn first_page(source: &SharedSource, per_page: usize) -> Result<ListingPage> {
    let options = QueryOptions::default()
        .fetch(SUMMARY_FIELDS)
        .page_size(per_page)
        .order_by(Ordering::by_publication(Direction::Desc));
    let response = source
        .query(&[Predicate::document_type(POST_TYPE)], &options)
        .await?;
    ListingPage::from_response(&response)
}

/// Fetch the page a cursor points at
pub async fn page_at(source: &SharedSource, cursor: &Cursor) -> Result<ListingPage> {
    let response = source.fetch_cursor(cursor).await?;
    ListingPage::from_response(&response)
}

/// Accumulated listing
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingState {
    items: Vec<PostSummary>,
    next_cursor: Option<Cursor>,
    loading: bool,
}

/// Inputs to [`reduce`]
#[derive(Debug, Clone)]
pub enum ListingAction {
    /// A load of the current cursor was issued
    LoadStarted,
    /// The outstanding load returned this page
    PageLoaded(ListingPage),
    /// The outstanding load failed
    LoadFailed,
}

impl ListingState {
    /// Seed the state from the generated first page
    pub fn seed(page: ListingPage) -> Self {
        let pending = Self {
            loading: true,
            ..Self::default()
        };
        reduce(pending, ListingAction::PageLoaded(page))
    }

    pub fn items(&self) -> &[PostSummary] {
        &self.items
    }

    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// A cursor exists and no load is outstanding
    pub fn can_load_more(&self) -> bool {
        self.next_cursor.is_some() && !self.loading
    }
}

/// Apply one action to the listing
pub fn reduce(mut state: ListingState, action: ListingAction) -> ListingState {
    match action {
        ListingAction::LoadStarted => {
            if state.can_load_more() {
                state.loading = true;
            }
        }
        ListingAction::PageLoaded(page) => {
            if !state.loading {
                return state;
            }
            let mut seen: HashSet<String> = state.items.iter().map(|p| p.uid.clone()).collect();
            let offered = page.items.len();
            let before = state.items.len();
            state
                .items
                .extend(page.items.into_iter().filter(|p| seen.insert(p.uid.clone())));
            let dropped = offered - (state.items.len() - before);
            if dropped > 0 {
                tracing::debug!("Dropped {} already listed posts from loaded page", dropped);
            }
            state.next_cursor = page.next_cursor;
            state.loading = false;
        }
        ListingAction::LoadFailed => {
            state.loading = false;
        }
    }
    state
}

/// Outcome of [`ListingController::load_more`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMore {
    /// A page was appended, carrying this many new entries
    Appended(usize),
    /// No cursor left; nothing was requested
    Exhausted,
    /// Another load is still outstanding; nothing was requested
    Busy,
}

/// Drives incremental loads against a source, one at a time
pub struct ListingController {
    source: SharedSource,
    state: Mutex<ListingState>,
}

impl ListingController {
    pub fn new(source: SharedSource, initial: ListingPage) -> Self {
        Self {
            source,
            state: Mutex::new(ListingState::seed(initial)),
        }
    }

    /// Build a controller seeded with the newest posts
    pub async fn start(source: SharedSource, per_page: usize) -> Result<Self> {
        let page = first_page(&source, per_page).await?;
        Ok(Self::new(source, page))
    }

    pub fn snapshot(&self) -> ListingState {
        self.lock().clone()
    }

    /// Fetch the page at the current cursor and append it
    ///
    /// On failure the listing is left as it was and the error is returned.
    pub async fn load_more(&self) -> Result<LoadMore> {
        let cursor = {
            let mut state = self.lock();
            if state.loading {
                return Ok(LoadMore::Busy);
            }
            let Some(cursor) = state.next_cursor.clone() else {
                return Ok(LoadMore::Exhausted);
            };
            *state = reduce(std::mem::take(&mut *state), ListingAction::LoadStarted);
            cursor
        };

        match page_at(&self.source, &cursor).await {
            Ok(page) => {
                let mut state = self.lock();
                let before = state.items.len();
                *state = reduce(std::mem::take(&mut *state), ListingAction::PageLoaded(page));
                let appended = state.items.len() - before;
                tracing::debug!("Loaded {} more posts ({} total)", appended, state.items.len());
                Ok(LoadMore::Appended(appended))
            }
            Err(e) => {
                let mut state = self.lock();
                *state = reduce(std::mem::take(&mut *state), ListingAction::LoadFailed);
                Err(e)
            }
        }
    }

    /// Keep loading until the cursor runs out, returning every entry
    pub async fn load_all(&self) -> Result<Vec<PostSummary>> {
        loop {
            match self.load_more().await? {
                LoadMore::Appended(_) => continue,
                LoadMore::Exhausted | LoadMore::Busy => break,
            }
        }
        Ok(self.snapshot().items)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ListingState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
