//! Repository discovery over a capped, paginated search API

pub mod client;
pub mod cursor;
pub mod search;

pub use client::{GitHubSearch, RateLimit, SearchBackend, SearchQuery, SearchResponse};
pub use cursor::DiscoveryCursor;
pub use search::{Discovery, DiscoveryOptions, DiscoverySummary};
