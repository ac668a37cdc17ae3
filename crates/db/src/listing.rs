//! View modes, seeded shuffling, pagination and tag filters.
//!
//! Everything here is synchronous and free of I/O so the repository can
//! push ordering to SQL where possible and fall back to these helpers for
//! the client-side paths (random mode and search).

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::entities::content;

/// How a list of content is ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Newest first.
    #[default]
    Chronological,
    /// Oldest first.
    Oldest,
    /// Lexicographic on `data`.
    Alphabetical,
    /// Stable shuffle keyed by group and page offset.
    Random,
}

impl ViewMode {
    /// Parse a view mode, falling back to [`ViewMode::Chronological`] for
    /// anything unrecognized.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chronological => "chronological",
            Self::Oldest => "oldest",
            Self::Alphabetical => "alphabetical",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chronological" => Ok(Self::Chronological),
            "oldest" => Ok(Self::Oldest),
            "alphabetical" => Ok(Self::Alphabetical),
            "random" => Ok(Self::Random),
            other => Err(format!("unknown view mode: {other}")),
        }
    }
}

/// Seed for the random view: sum of the group id's character codes plus
/// the page offset.
#[must_use]
pub fn random_seed(group_id: &str, offset: u64) -> u64 {
    group_id
        .chars()
        .map(u64::from)
        .fold(offset, u64::wrapping_add)
}

/// Deterministic Fisher-Yates shuffle of `items`.
///
/// Only the given slice is permuted. A page fetched in chronological order
/// and shuffled here is a stable reordering of that page, not a window onto
/// a permutation of the whole list.
pub fn seeded_shuffle<T>(items: &mut [T], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);
}

/// Sort content in place for the non-random view modes.
///
/// Ties on the primary key fall back to `id` so the order is total.
/// [`ViewMode::Random`] leaves the slice untouched; use [`seeded_shuffle`].
pub fn sort_for_view(items: &mut [content::Model], mode: ViewMode) {
    match mode {
        ViewMode::Chronological => items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        }),
        ViewMode::Oldest => items.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        }),
        ViewMode::Alphabetical => items.sort_by(|a, b| {
            a.data
                .cmp(&b.data)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        }),
        ViewMode::Random => {}
    }
}

/// Order a fetched page for `mode`, shuffling for [`ViewMode::Random`].
pub fn order_page(items: &mut [content::Model], mode: ViewMode, group_id: &str, offset: u64) {
    if mode == ViewMode::Random {
        sort_for_view(items, ViewMode::Chronological);
        seeded_shuffle(items, random_seed(group_id, offset));
    } else {
        sort_for_view(items, mode);
    }
}

/// Take the `[offset, offset + limit)` window of `items`.
#[must_use]
pub fn paginate<T>(items: Vec<T>, offset: u64, limit: u64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    items.into_iter().skip(offset).take(limit).collect()
}

/// Include/exclude tag filter.
///
/// An item matches when it carries every include tag and none of the
/// exclude tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl TagFilter {
    /// Create a filter, dropping duplicate ids.
    #[must_use]
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include: dedup(include),
            exclude: dedup(exclude),
        }
    }

    /// Neither include nor exclude tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Only exclude tags. Such a filter yields nothing.
    #[must_use]
    pub fn is_exclude_only(&self) -> bool {
        self.include.is_empty() && !self.exclude.is_empty()
    }

    /// Whether an item carrying `tag_ids` passes the filter.
    #[must_use]
    pub fn matches<S: AsRef<str>>(&self, tag_ids: &[S]) -> bool {
        let present: HashSet<&str> = tag_ids.iter().map(AsRef::as_ref).collect();
        self.include.iter().all(|t| present.contains(t.as_str()))
            && !self.exclude.iter().any(|t| present.contains(t.as_str()))
    }
}

fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}
