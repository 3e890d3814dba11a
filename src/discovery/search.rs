//! Star-bucketed repository discovery
//!
//! Pages through `[min_stars, upper]` windows, inserting every page into the
//! store. A drained window is replaced by a lower one whose ceiling is the
//! lowest star count recorded so far, which keeps each query under the API's
//! page cap. Rate limiting pauses the loop in place and reissues the same
//! request.

use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use crate::{Error, Result};
use crate::repository::Repository;
use crate::storage::{NO_STARS_SEEN, SqliteStore};
use super::client::{SearchBackend, SearchQuery};
use super::cursor::DiscoveryCursor;

/// Tuning for one discovery run
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOptions {
    pub language: String,
    /// Lower star bound of every window
    pub min_stars: i64,
    /// Stop after this many new repositories
    pub max_repos: usize,
    pub per_page: usize,
    /// Pause before querying a freshly shrunk window
    pub window_pause: Duration,
    /// Retries for transport errors and 5xx responses on one page
    pub max_retries: u32,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            language: "c".to_string(),
            min_stars: 500,
            max_repos: 40_000,
            per_page: 100,
            window_pause: Duration::from_secs(5),
            max_retries: 3,
        }
    }
}

/// Counters for a discovery run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverySummary {
    /// Repositories inserted for the first time
    pub found: usize,
    /// Pages that returned items
    pub pages: usize,
    /// Windows drained and replaced
    pub windows: usize,
    /// Requests that had to wait for the rate limit
    pub rate_limited: usize,
}

pub struct Discovery<'a, B: SearchBackend> {
    backend: B,
    store: &'a mut SqliteStore,
    options: DiscoveryOptions,
}

impl<'a, B: SearchBackend> Discovery<'a, B> {
    pub fn new(backend: B, store: &'a mut SqliteStore, options: DiscoveryOptions) -> Self {
        Self { backend, store, options }
    }

    /// Cursor to start from; resumes below what earlier runs already saw
    pub fn starting_cursor(&self) -> Result<DiscoveryCursor> {
        Ok(DiscoveryCursor::new(self.options.min_stars, self.store.min_stars_seen()?))
    }

    /// Run until the quota is met or the star range is used up
    pub async fn run(&mut self) -> Result<DiscoverySummary> {
        let mut cursor = self.starting_cursor()?;
        let mut summary = DiscoverySummary::default();
        info!(
            language = %self.options.language,
            range = %cursor.star_range(),
            max_repos = self.options.max_repos,
            "Starting discovery"
        );

        while summary.found < self.options.max_repos && !cursor.is_exhausted() {
            cursor = self.advance(cursor, &mut summary).await?;
        }

        info!(
            found = summary.found,
            pages = summary.pages,
            windows = summary.windows,
            "Discovery finished"
        );
        Ok(summary)
    }

    /// Fetch the page under `cursor` and return where to go next
    pub async fn advance(
        &mut self,
        cursor: DiscoveryCursor,
        summary: &mut DiscoverySummary,
    ) -> Result<DiscoveryCursor> {
        let remaining = self.options.max_repos.saturating_sub(summary.found).max(1);
        let per_page = self.options.per_page.min(remaining);

        match self.fetch_page(cursor, per_page, summary).await? {
            Some(repos) if !repos.is_empty() => {
                let inserted = self.insert(&repos);
                summary.found += inserted;
                summary.pages += 1;
                info!(page = cursor.page, inserted, found = summary.found, "Found {} repositories", summary.found);
                Ok(cursor.next_page())
            }
            _ => {
                let min_seen = self.store.min_stars_seen()?;
                let next = if min_seen == NO_STARS_SEEN {
                    info!(range = %cursor.star_range(), "No repositories in range");
                    cursor.shrink(cursor.lower_bound)
                } else {
                    cursor.shrink(min_seen)
                };
                summary.windows += 1;
                info!(upper = next.upper_bound, "Window drained, new max stars {}", next.upper_bound);

                if !next.is_exhausted() {
                    tokio::time::sleep(self.options.window_pause).await;
                }
                Ok(next)
            }
        }
    }

    /// Insert a page; a failed batch counts as nothing inserted
    fn insert(&mut self, repos: &[Repository]) -> usize {
        match self.store.insert_repositories(repos) {
            Ok(inserted) => inserted,
            Err(e) => {
                error!("Error in transaction: {}", e);
                0
            }
        }
    }

    /// Issue one page request, waiting out rate limits and retrying
    /// transient failures with the same query.
    async fn fetch_page(
        &self,
        cursor: DiscoveryCursor,
        per_page: usize,
        summary: &mut DiscoverySummary,
    ) -> Result<Option<Vec<Repository>>> {
        let query = SearchQuery::new(self.options.language.clone(), cursor, per_page);
        let mut failures = 0;

        loop {
            let response = match self.backend.search(&query).await {
                Ok(response) => response,
                Err(e) => {
                    failures += 1;
                    if failures > self.options.max_retries {
                        return Err(e);
                    }
                    warn!(attempt = failures, "Search request failed: {}", e);
                    tokio::time::sleep(self.options.window_pause).await;
                    continue;
                }
            };

            if let Some(wait) = response.rate_limit.backoff(SystemTime::now()) {
                summary.rate_limited += 1;
                info!("Rate limiting for {:.2} seconds", wait.as_secs_f64());
                tokio::time::sleep(wait).await;
                continue;
            }

            if response.is_server_error() {
                failures += 1;
                if failures > self.options.max_retries {
                    return Err(Error::Search(format!(
                        "status {} for {}",
                        response.status,
                        query.query_string()
                    )));
                }
                warn!(attempt = failures, status = response.status, "Search server error");
                tokio::time::sleep(self.options.window_pause).await;
                continue;
            }

            return Ok(response.items);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::UNIX_EPOCH;
    use async_trait::async_trait;
    use crate::discovery::client::{RateLimit, SearchResponse};

    #[derive(Clone, Default)]
    struct FakeBackend {
        responses: Arc<Mutex<VecDeque<Result<SearchResponse>>>>,
        requests: Arc<Mutex<Vec<SearchQuery>>>,
    }

    impl FakeBackend {
        fn push(&self, response: Result<SearchResponse>) {
            self.responses.lock().unwrap().push_back(response);
        }

        fn requests(&self) -> Vec<SearchQuery> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchBackend for FakeBackend {
        async fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
            self.requests.lock().unwrap().push(query.clone());
            // An empty script means the window has nothing more to give.
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(drained()))
        }
    }

    fn page(repos: Vec<Repository>) -> SearchResponse {
        SearchResponse {
            status: 200,
            rate_limit: RateLimit { remaining: Some(29), ..Default::default() },
            items: Some(repos),
        }
    }

    fn drained() -> SearchResponse {
        SearchResponse {
            status: 422,
            rate_limit: RateLimit { remaining: Some(29), ..Default::default() },
            items: None,
        }
    }

    fn repo(id: i64, stars: i64) -> Repository {
        Repository::new(id, format!("o/r{}", id), format!("https://example.com/r{}.git", id), stars)
    }

    fn options() -> DiscoveryOptions {
        DiscoveryOptions {
            language: "c".to_string(),
            min_stars: 500,
            max_repos: 100,
            per_page: 2,
            window_pause: Duration::from_secs(5),
            max_retries: 2,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_drained_window_shrinks_to_min_seen() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert_repositories(&[repo(1, 900), repo(2, 742)]).unwrap();

        let backend = FakeBackend::default();
        backend.push(Ok(drained()));
        let mut discovery = Discovery::new(backend.clone(), &mut store, options());

        let cursor = DiscoveryCursor { lower_bound: 500, upper_bound: 1000, page: 4 };
        let mut summary = DiscoverySummary::default();
        let next = discovery.advance(cursor, &mut summary).await.unwrap();

        assert_eq!(next, DiscoveryCursor { lower_bound: 500, upper_bound: 742, page: 1 });
        assert!(next.upper_bound <= cursor.upper_bound);
        assert_eq!(summary.windows, 1);
        assert_eq!(summary.found, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_blocks_then_reissues_same_query() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let reset = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 5;

        let backend = FakeBackend::default();
        backend.push(Ok(SearchResponse {
            status: 403,
            rate_limit: RateLimit { retry_after: None, remaining: Some(0), reset: Some(reset) },
            items: None,
        }));
        backend.push(Ok(page(vec![repo(1, 800), repo(2, 700)])));
        let mut discovery = Discovery::new(backend.clone(), &mut store, options());

        let cursor = DiscoveryCursor::new(500, 1000);
        let mut summary = DiscoverySummary::default();
        let started = tokio::time::Instant::now();
        let next = discovery.advance(cursor, &mut summary).await.unwrap();
        let waited = started.elapsed();

        assert!(waited >= Duration::from_secs(5), "waited {:?}", waited);
        assert!(waited <= Duration::from_secs(7), "waited {:?}", waited);
        assert_eq!(summary.rate_limited, 1);
        assert_eq!(summary.found, 2);
        assert_eq!(next, cursor.next_page());

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
        assert_eq!(requests[0].cursor, cursor);
    }

    #[tokio::test(start_paused = true)]
    async fn test_found_counts_only_new_repositories() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert_repositories(&[repo(1, 900)]).unwrap();

        let backend = FakeBackend::default();
        backend.push(Ok(page(vec![repo(1, 900), repo(2, 800)])));
        let mut discovery = Discovery::new(backend, &mut store, options());

        let mut summary = DiscoverySummary::default();
        discovery.advance(DiscoveryCursor::new(500, 1000), &mut summary).await.unwrap();
        assert_eq!(summary.found, 1);
        assert_eq!(summary.pages, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_walks_windows_until_threshold() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let backend = FakeBackend::default();

        // Window [500, 10000000]: two pages, then drained.
        backend.push(Ok(page(vec![repo(1, 5000), repo(2, 3000)])));
        backend.push(Ok(page(vec![repo(3, 2000), repo(4, 1200)])));
        backend.push(Ok(drained()));
        // Window [500, 1200]: the boundary repo comes back, plus one new.
        backend.push(Ok(page(vec![repo(4, 1200), repo(5, 600)])));
        backend.push(Ok(page(vec![])));
        // Window [500, 600]: only already-seen repos remain.
        backend.push(Ok(page(vec![repo(5, 600)])));
        backend.push(Ok(drained()));
        // Window [500, 599]: nothing at all.
        backend.push(Ok(drained()));
        // Window [500, 598] and onwards: the script is empty, so every
        // window drains and the ceiling steps down to the threshold.

        let mut discovery = Discovery::new(backend.clone(), &mut store, options());
        let summary = discovery.run().await.unwrap();
        drop(discovery);

        assert_eq!(summary.found, 5);
        assert_eq!(store.count_repositories().unwrap(), 5);

        let requests = backend.requests();
        let first = &requests[0].cursor;
        assert_eq!((first.upper_bound, first.page), (NO_STARS_SEEN, 1));
        assert_eq!(requests[3].cursor, DiscoveryCursor { lower_bound: 500, upper_bound: 1200, page: 1 });
        assert_eq!(requests[5].cursor, DiscoveryCursor { lower_bound: 500, upper_bound: 600, page: 1 });
        assert_eq!(requests[7].cursor, DiscoveryCursor { lower_bound: 500, upper_bound: 599, page: 1 });

        for pair in requests.windows(2) {
            assert!(pair[1].cursor.upper_bound <= pair[0].cursor.upper_bound);
        }
        assert!(requests.iter().all(|q| q.cursor.upper_bound > 500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_at_quota() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let backend = FakeBackend::default();
        backend.push(Ok(page(vec![repo(1, 5000), repo(2, 3000)])));
        backend.push(Ok(page(vec![repo(3, 2000)])));

        let mut opts = options();
        opts.max_repos = 3;
        let mut discovery = Discovery::new(backend.clone(), &mut store, opts);
        let summary = discovery.run().await.unwrap();

        assert_eq!(summary.found, 3);
        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].per_page, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_resumes_below_recorded_minimum() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert_repositories(&[repo(1, 5000), repo(2, 1500)]).unwrap();

        let backend = FakeBackend::default();
        let mut opts = options();
        opts.max_repos = 1;
        backend.push(Ok(page(vec![repo(3, 1400)])));

        let mut discovery = Discovery::new(backend.clone(), &mut store, opts);
        assert_eq!(discovery.starting_cursor().unwrap().upper_bound, 1500);
        discovery.run().await.unwrap();

        assert_eq!(backend.requests()[0].cursor.star_range(), "500..1500");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_universe_stops() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let backend = FakeBackend::default();

        let mut discovery = Discovery::new(backend.clone(), &mut store, options());
        let summary = discovery.run().await.unwrap();

        assert_eq!(summary.found, 0);
        assert_eq!(summary.windows, 1);
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_are_retried_in_place() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let backend = FakeBackend::default();
        backend.push(Ok(SearchResponse { status: 502, ..Default::default() }));
        backend.push(Err(Error::Search("connection reset".to_string())));
        backend.push(Ok(page(vec![repo(1, 800)])));

        let mut discovery = Discovery::new(backend.clone(), &mut store, options());
        let cursor = DiscoveryCursor::new(500, 1000);
        let mut summary = DiscoverySummary::default();
        let next = discovery.advance(cursor, &mut summary).await.unwrap();

        assert_eq!(next, cursor.next_page());
        assert_eq!(summary.found, 1);
        let requests = backend.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|q| q.cursor == cursor));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_is_an_error() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let backend = FakeBackend::default();
        for _ in 0..3 {
            backend.push(Ok(SearchResponse { status: 503, ..Default::default() }));
        }

        let mut discovery = Discovery::new(backend, &mut store, options());
        let mut summary = DiscoverySummary::default();
        let result = discovery.advance(DiscoveryCursor::new(500, 1000), &mut summary).await;
        assert!(matches!(result, Err(Error::Search(_))));
    }
}
