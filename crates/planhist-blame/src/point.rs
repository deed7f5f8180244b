use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The people responsible for one change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AuthorSet(BTreeSet<String>);

impl AuthorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(author: impl Into<String>) -> Self {
        Self(BTreeSet::from([author.into()]))
    }

    pub fn insert(&mut self, author: impl Into<String>) -> bool {
        self.0.insert(author.into())
    }

    pub fn merge(&mut self, other: &AuthorSet) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn contains(&self, author: &str) -> bool {
        self.0.contains(author)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for AuthorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().collect();
        f.write_str(&names.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for AuthorSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Who made a change and when.
///
/// Points compare, order, and hash by timestamp alone: one version
/// transition has one timestamp, and every change it makes shares a point
/// even when different attributes credit different authors.
#[derive(Clone, Debug, Serialize)]
pub struct BlamePoint {
    timestamp: DateTime<Utc>,
    authors: AuthorSet,
}

impl BlamePoint {
    pub fn new(timestamp: DateTime<Utc>, author: impl Into<String>) -> Self {
        Self {
            timestamp,
            authors: AuthorSet::single(author),
        }
    }

    pub fn with_authors(timestamp: DateTime<Utc>, authors: AuthorSet) -> Self {
        Self { timestamp, authors }
    }

    /// The sentinel preceding all real history; carries the value a node
    /// had before the analyzed window.
    pub fn initial() -> Self {
        Self {
            timestamp: DateTime::<Utc>::MIN_UTC,
            authors: AuthorSet::new(),
        }
    }

    pub fn is_initial(&self) -> bool {
        self.timestamp == DateTime::<Utc>::MIN_UTC
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn authors(&self) -> &AuthorSet {
        &self.authors
    }

    pub fn set_authors(&mut self, authors: AuthorSet) {
        self.authors = authors;
    }
}

impl PartialEq for BlamePoint {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
    }
}

impl Eq for BlamePoint {}

impl PartialOrd for BlamePoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BlamePoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp.cmp(&other.timestamp)
    }
}

impl Hash for BlamePoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.timestamp.hash(state);
    }
}

impl fmt::Display for BlamePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_initial() {
            f.write_str("(before history)")
        } else {
            write!(f, "{} @ {}", self.authors, self.timestamp.format("%Y-%m-%d %H:%M"))
        }
    }
}
