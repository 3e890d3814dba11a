//! Repository - a discovered candidate for mining
//!
//! Repositories are created on first sighting by discovery and never change
//! afterwards. The search API's `id` is the natural key.

use serde::{Deserialize, Serialize};

/// A repository found by the search API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Stable external identifier assigned by the forge
    pub id: i64,
    /// Full name, e.g. `owner/project`
    pub name: String,
    /// URL passed to `git clone`
    pub clone_url: String,
    /// Star count at the time of discovery
    pub stars: i64,
}

/// The subset of a search item we care about.
#[derive(Debug, Deserialize)]
struct SearchItem {
    id: i64,
    full_name: String,
    clone_url: String,
    stargazers_count: i64,
}

impl Repository {
    /// Create a new repository
    pub fn new(id: i64, name: impl Into<String>, clone_url: impl Into<String>, stars: i64) -> Self {
        Self {
            id,
            name: name.into(),
            clone_url: clone_url.into(),
            stars,
        }
    }

    /// Build a repository from one element of a search response's `items`.
    ///
    /// Returns `None` when a required field is missing or has the wrong type.
    pub fn from_search_item(item: &serde_json::Value) -> Option<Self> {
        let item = SearchItem::deserialize(item).ok()?;
        Some(Self {
            id: item.id,
            name: item.full_name,
            clone_url: item.clone_url,
            stars: item.stargazers_count,
        })
    }
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (#{}, {} stars)", self.name, self.id, self.stars)
    }
}
