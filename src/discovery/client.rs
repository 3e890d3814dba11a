//! Search API client
//!
//! `SearchBackend` is the seam between the bucketing walk and the network.
//! `GitHubSearch` is the production implementation over `reqwest`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap};
use tracing::debug;
use crate::Result;
use crate::repository::Repository;
use super::cursor::DiscoveryCursor;

/// One page request against the search endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub language: String,
    pub cursor: DiscoveryCursor,
    pub per_page: usize,
}

impl SearchQuery {
    pub fn new(language: impl Into<String>, cursor: DiscoveryCursor, per_page: usize) -> Self {
        Self {
            language: language.into(),
            cursor,
            per_page,
        }
    }

    /// Query string, most-starred first
    pub fn query_string(&self) -> String {
        format!(
            "q=language:{}+stars:{}&sort=stars&order=desc&per_page={}&page={}",
            self.language,
            self.cursor.star_range(),
            self.per_page,
            self.cursor.page
        )
    }
}

/// Rate-limit state reported by a response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimit {
    /// `retry-after`, in seconds
    pub retry_after: Option<u64>,
    /// `x-ratelimit-remaining`
    pub remaining: Option<u64>,
    /// `x-ratelimit-reset`, unix seconds
    pub reset: Option<u64>,
}

impl RateLimit {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let number = |name: &str| -> Option<u64> {
            headers.get(name)?.to_str().ok()?.trim().parse().ok()
        };
        Self {
            retry_after: number("retry-after"),
            remaining: number("x-ratelimit-remaining"),
            reset: number("x-ratelimit-reset"),
        }
    }

    /// How long to wait before reissuing the same request, if at all.
    ///
    /// An exhausted quota waits until the reset time plus one second.
    pub fn backoff(&self, now: SystemTime) -> Option<Duration> {
        if self.remaining == Some(0) {
            if let Some(reset) = self.reset {
                let now = now.duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0);
                let wait = (reset as f64 - now + 1.0).max(1.0);
                return Some(Duration::from_secs_f64(wait));
            }
        }
        match self.retry_after {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None if self.remaining == Some(0) => Some(Duration::from_secs(1)),
            None => None,
        }
    }
}

/// A search response reduced to what discovery needs
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub status: u16,
    pub rate_limit: RateLimit,
    /// `None` when the body has no usable `items` array
    pub items: Option<Vec<Repository>>,
}

impl SearchResponse {
    /// Whether the request should be retried rather than interpreted
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Source of search result pages
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse>;
}

/// Extract repositories from a response body.
///
/// Malformed items are skipped; a body without an `items` array yields `None`.
pub fn parse_items(body: &str) -> Option<Vec<Repository>> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let items = value.get("items")?.as_array()?;
    let repos: Vec<Repository> = items.iter().filter_map(Repository::from_search_item).collect();
    if repos.len() != items.len() {
        debug!(skipped = items.len() - repos.len(), "Skipped malformed search items");
    }
    Some(repos)
}

/// Bearer-authenticated client for `GET /search/repositories`
pub struct GitHubSearch {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubSearch {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("repomine/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            token: token.into(),
        })
    }

    pub fn url(&self, query: &SearchQuery) -> String {
        format!(
            "{}/search/repositories?{}",
            self.api_url.trim_end_matches('/'),
            query.query_string()
        )
    }
}

#[async_trait]
impl SearchBackend for GitHubSearch {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let url = self.url(query);
        debug!(%url, "Search request");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?;

        let status = response.status().as_u16();
        let rate_limit = RateLimit::from_headers(response.headers());
        let body = response.text().await?;

        Ok(SearchResponse {
            status,
            rate_limit,
            items: parse_items(&body),
        })
    }
}
