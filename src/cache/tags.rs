//! Cache Tags
//!
//! Every cached query result carries a set of tags. Invalidating a tag
//! marks every entry carrying it as stale; the next read refetches.
//!
//! - list result: `List` + `Device(id)` for each id it contains
//! - single-device result: `Device(id)`

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;

/// Label used for targeted invalidation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// The device collection as a whole
    List,
    /// One device, wherever it appears
    Device(String),
}

impl Tag {
    pub fn device(id: impl Into<String>) -> Self {
        Tag::Device(id.into())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::List => write!(f, "Iot:LIST"),
            Tag::Device(id) => write!(f, "Iot:{}", id),
        }
    }
}

/// A cached query result
#[derive(Debug, Clone)]
pub(crate) struct Entry<T> {
    pub data: T,
    pub tags: HashSet<Tag>,
    pub stale: bool,
    pub fetched_at: DateTime<Utc>,
}

impl<T> Entry<T> {
    pub fn new(data: T, tags: HashSet<Tag>) -> Self {
        Self {
            data,
            tags,
            stale: false,
            fetched_at: Utc::now(),
        }
    }

    /// Mark stale if any of `tags` is carried. Returns whether it matched.
    pub fn invalidate(&mut self, tags: &[Tag]) -> bool {
        let hit = tags.iter().any(|t| self.tags.contains(t));
        if hit {
            self.stale = true;
        }
        hit
    }
}
