//! Discovery cursor - the position of the bucketing walk
//!
//! The search API only serves a bounded number of pages per query. The walk
//! therefore pages through a star window `[lower_bound, upper_bound]` from
//! the most-starred end, and when the window is drained it shrinks the upper
//! bound to the lowest star count recorded so far and starts over at page 1.

/// An immutable position in the discovery walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryCursor {
    /// Minimum star count, fixed for the whole walk
    pub lower_bound: i64,
    /// Current ceiling; only ever decreases
    pub upper_bound: i64,
    /// 1-based page within the current window
    pub page: u32,
}

impl DiscoveryCursor {
    pub fn new(lower_bound: i64, upper_bound: i64) -> Self {
        Self {
            lower_bound,
            upper_bound,
            page: 1,
        }
    }

    /// Same window, following page
    pub fn next_page(self) -> Self {
        Self {
            page: self.page + 1,
            ..self
        }
    }

    /// Start a new, lower window after the current one was drained.
    ///
    /// The ceiling moves to `min_seen` when that is lower; otherwise it drops
    /// by one star so the walk always makes progress.
    pub fn shrink(self, min_seen: i64) -> Self {
        let upper_bound = if min_seen < self.upper_bound {
            min_seen
        } else {
            self.upper_bound - 1
        };
        Self {
            lower_bound: self.lower_bound,
            upper_bound,
            page: 1,
        }
    }

    /// No stars left between the bounds
    pub fn is_exhausted(&self) -> bool {
        self.upper_bound <= self.lower_bound
    }

    /// The `stars:` qualifier for this window
    pub fn star_range(&self) -> String {
        format!("{}..{}", self.lower_bound, self.upper_bound)
    }
}
