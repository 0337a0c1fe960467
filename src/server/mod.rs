//! Blog server with stale-while-revalidate regeneration
//!
//! The home page and post pages are rendered on first request and then
//! served from memory; once stale they keep being served while a single
//! background render replaces them. Preview requests always render fresh.

mod preview;

pub use preview::PreviewSession;

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::cache::RevalidatingCache;
use crate::content::PostSummary;
use crate::generator::Generator;
use crate::listing::{first_page, page_at, SUMMARY_FIELDS};
use crate::resolver::link_resolver;
use crate::source::{Cursor, Direction, Ordering, Predicate, QueryOptions, POST_TYPE};

/// Server state
pub struct AppState {
    generator: Generator,
    listing: Arc<RevalidatingCache<(), String>>,
    posts: Arc<RevalidatingCache<String, String>>,
    preview: PreviewSession,
    public_dir: PathBuf,
}

type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(generator: Generator, preview: PreviewSession, public_dir: PathBuf) -> SharedState {
        let config = generator.config();
        Arc::new(Self {
            listing: RevalidatingCache::new("listing", config.listing_ttl()),
            posts: RevalidatingCache::new("post", config.post_ttl()),
            generator,
            preview,
            public_dir,
        })
    }

    /// Render the error page for `err`, falling back to plain text
    fn error_page(&self, err: crate::Error, preview: bool) -> Response {
        let status = err.status();
        let message = if err.is_not_found() {
            "Esta página não existe.".to_string()
        } else {
            tracing::error!("request failed: {}", err);
            "Não foi possível carregar esta página.".to_string()
        };

        match self
            .generator
            .render_not_found(status.as_u16(), &message, preview)
        {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!("Failed to render error page: {}", e);
                (status, message).into_response()
            }
        }
    }
}

/// Build the application router
pub fn router(state: SharedState) -> Router {
    let static_files = ServeDir::new(&state.public_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/", get(index_handler))
        .route("/post/:slug", get(post_handler))
        .route("/api/posts", get(api_posts_handler))
        .route("/api/preview", get(preview_handler))
        .route("/api/exit-preview", get(exit_preview_handler))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Render the first `static_paths` posts ahead of the first request
pub async fn warm(state: &SharedState) {
    let count = state.generator.config().static_paths;
    if count == 0 {
        return;
    }

    let options = QueryOptions::default()
        .fetch(SUMMARY_FIELDS)
        .page_size(count)
        .order_by(Ordering::by_publication(Direction::Desc));
    let response = match state
        .generator
        .source()
        .query(&[Predicate::document_type(POST_TYPE)], &options)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Skipping pre-build: {}", e);
            return;
        }
    };

    for doc in &response.results {
        let Some(uid) = doc.uid.clone() else {
            continue;
        };
        if let Err(e) = cached_post(state, uid.clone()).await {
            tracing::warn!("Pre-building post `{}` failed: {}", uid, e);
        } else {
            tracing::info!("Pre-built {}", link_resolver(doc));
        }
    }
}

/// Start the server
pub async fn start(state: SharedState, ip: &str, port: u16) -> Result<()> {
    warm(&state).await;

    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}", ip, port);
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn cached_post(state: &SharedState, slug: String) -> crate::Result<Arc<String>> {
    let builder = state.clone();
    let key = slug.clone();
    state
        .posts
        .get_or_build(key, move || async move {
            builder.generator.render_post(&slug, None).await
        })
        .await
}

/// Home page
async fn index_handler(State(state): State<SharedState>) -> Response {
    let builder = state.clone();
    let page = state
        .listing
        .get_or_build((), move || async move { builder.generator.render_index().await })
        .await;

    match page {
        Ok(html) => Html(html.as_str().to_owned()).into_response(),
        Err(e) => state.error_page(e, false),
    }
}

/// Post page; preview sessions bypass the cache
async fn post_handler(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Response {
    let preview_ref = state.preview.read(&headers);

    let page = match preview_ref.as_deref() {
        Some(reference) => state
            .generator
            .render_post(&slug, Some(reference))
            .await
            .map(Arc::new),
        None => cached_post(&state, slug).await,
    };

    match page {
        Ok(html) => Html(html.as_str().to_owned()).into_response(),
        Err(e) => state.error_page(e, preview_ref.is_some()),
    }
}

#[derive(Debug, Deserialize)]
struct ListingQuery {
    cursor: Option<String>,
}

/// Listing entry as served to the load-more script
#[derive(Debug, Serialize)]
struct ApiPost {
    uid: String,
    first_publication_date: Option<DateTime<Utc>>,
    display_date: Option<String>,
    title: String,
    subtitle: String,
    author: String,
}

#[derive(Debug, Serialize)]
struct ApiPage {
    results: Vec<ApiPost>,
    next_page: Option<Cursor>,
}

/// JSON listing page at `cursor`, or the first page without one
async fn api_posts_handler(
    State(state): State<SharedState>,
    Query(query): Query<ListingQuery>,
) -> crate::Result<Json<ApiPage>> {
    let source = state.generator.source();
    let page = match query.cursor.as_deref().and_then(|c| Cursor::from_next_page(Some(c))) {
        Some(cursor) => page_at(source, &cursor).await?,
        None => first_page(source, state.generator.config().per_page).await?,
    };

    let dates = state.generator.dates();
    let results = page
        .items
        .into_iter()
        .map(|summary: PostSummary| ApiPost {
            display_date: dates.display(summary.first_publication_date.as_ref()),
            uid: summary.uid,
            first_publication_date: summary.first_publication_date,
            title: summary.title,
            subtitle: summary.subtitle,
            author: summary.author,
        })
        .collect();

    Ok(Json(ApiPage {
        results,
        next_page: page.next_cursor,
    }))
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    token: Option<String>,
    #[serde(rename = "documentId")]
    document_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct PreviewRejection {
    message: &'static str,
}

fn invalid_token() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(PreviewRejection {
            message: "Invalid token",
        }),
    )
        .into_response()
}

fn redirect(location: &str, cookie: Option<String>) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(value) = location.parse::<HeaderValue>() {
        headers.insert(header::LOCATION, value);
    }
    if let Some(value) = cookie.and_then(|c| c.parse::<HeaderValue>().ok()) {
        headers.insert(header::SET_COOKIE, value);
    }
    (StatusCode::TEMPORARY_REDIRECT, headers).into_response()
}

/// Enter preview mode and redirect to the previewed document
async fn preview_handler(
    State(state): State<SharedState>,
    Query(query): Query<PreviewQuery>,
) -> Response {
    let Some(token) = query.token.filter(|t| !t.trim().is_empty()) else {
        return invalid_token();
    };

    // Every token is checked against the source before a session starts
    let source = state.generator.source();
    let location = match query.document_id.as_deref() {
        Some(id) => source.get_by_id(id, Some(&token)).await.map(|doc| link_resolver(&doc)),
        None => {
            let options = QueryOptions::default().page_size(1).preview_ref(Some(&token));
            source
                .query(&[Predicate::document_type(POST_TYPE)], &options)
                .await
                .map(|_| "/".to_string())
        }
    };
    let location = match location {
        Ok(location) => location,
        Err(e @ (crate::Error::NotFound(..) | crate::Error::SourceRejected { .. })) => {
            tracing::warn!("Preview rejected: {}", e);
            return invalid_token();
        }
        Err(e) => return e.into_response(),
    };

    tracing::info!("Entering preview, redirecting to {}", location);
    let cookie = state.preview.start(&token);
    redirect(&location, Some(cookie.encoded().to_string()))
}

/// Leave preview mode
async fn exit_preview_handler(State(state): State<SharedState>) -> Response {
    tracing::info!("Leaving preview");
    let cookie = state.preview.clear();
    redirect("/", Some(cookie.encoded().to_string()))
}
