//! Prismic REST API v2 client

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::{
    strip_access_token, ContentSource, Cursor, Predicate, QueryOptions, QueryResponse, ACCESS_TOKEN,
};
use crate::config::SourceConfig;
use crate::{Error, Result};

/// API descriptor returned by the endpoint root
#[derive(Debug, Deserialize)]
struct ApiDescriptor {
    #[serde(default)]
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

/// Client for a Prismic repository
pub struct PrismicClient {
    http: reqwest::Client,
    endpoint: Url,
    access_token: String,
}

impl PrismicClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        if config.endpoint.cannot_be_a_base() {
            return Err(Error::InvalidConfiguration(format!(
                "endpoint `{}` cannot carry a path",
                config.endpoint
            )));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::SourceUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// URL of the API descriptor
    fn api_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair(ACCESS_TOKEN, &self.access_token);
        url
    }

    /// Build the `documents/search` URL for a query against `reference`
    fn search_url(&self, reference: &str, predicates: &[Predicate], options: &QueryOptions) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["documents", "search"]);
        }

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("ref", reference);

            if !predicates.is_empty() {
                let q: String = predicates.iter().map(ToString::to_string).collect();
                pairs.append_pair("q", &format!("[{}]", q));
            }

            pairs.append_pair("pageSize", &options.page_size.to_string());

            if let Some(after) = &options.after {
                pairs.append_pair("after", after);
            }

            if !options.orderings.is_empty() {
                let orderings: Vec<String> =
                    options.orderings.iter().map(ToString::to_string).collect();
                pairs.append_pair("orderings", &format!("[{}]", orderings.join(",")));
            }

            if !options.fetch.is_empty() {
                pairs.append_pair("fetch", &options.fetch.join(","));
            }

            pairs.append_pair(ACCESS_TOKEN, &self.access_token);
        }

        url
    }

    /// Validate that a cursor points back at this repository
    fn cursor_url(&self, cursor: &Cursor) -> Result<Url> {
        let mut url = Url::parse(cursor.as_str())
            .map_err(|e| Error::InvalidCursor(format!("{}: {}", cursor, e)))?;

        let same_origin = url.scheme() == self.endpoint.scheme()
            && url.host_str() == self.endpoint.host_str()
            && url.port_or_known_default() == self.endpoint.port_or_known_default();
        if !same_origin {
            return Err(Error::InvalidCursor(cursor.to_string()));
        }

        if !url.query_pairs().any(|(k, _)| k == ACCESS_TOKEN) {
            url.query_pairs_mut()
                .append_pair(ACCESS_TOKEN, &self.access_token);
        }

        Ok(url)
    }

    /// Reference of the currently published revision
    async fn master_ref(&self) -> Result<String> {
        let api: ApiDescriptor = self.get_json(self.api_url()).await?;
        api.refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or_else(|| Error::SourceRejected {
                status: 200,
                message: "API descriptor has no master ref".to_string(),
            })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::debug!("GET {}", redact(&url));

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::SourceUnavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::SourceRejected {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ContentSource for PrismicClient {
    async fn query(
        &self,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<QueryResponse> {
        let reference = match &options.preview_ref {
            Some(reference) => reference.clone(),
            None => self.master_ref().await?,
        };
        let url = self.search_url(&reference, predicates, options);
        self.get_json(url).await
    }

    async fn fetch_cursor(&self, cursor: &Cursor) -> Result<QueryResponse> {
        let url = self.cursor_url(cursor)?;
        self.get_json(url).await
    }

    fn repository_name(&self) -> Option<String> {
        crate::config::repository_name(self.endpoint.as_str())
    }
}

/// Strip the access token before logging a URL
fn redact(url: &Url) -> String {
    strip_access_token(url.as_str())
}
