//! Hierarchical gameplay tags.
//!
//! A [`Tag`] is a dot-separated path such as `Status.Stunned.Hard`. Queries are
//! hierarchical: an owner carrying `Status.Stunned.Hard` satisfies a query for
//! `Status.Stunned` but not the other way around.
//!
//! Two containers are provided:
//! - [`TagSet`]: a plain ordered set, used for an action's grants and blocks
//! - [`ActiveTags`]: the owner's live, reference-counted container, so two
//!   running actions granting the same tag never clear each other's contribution

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ActionFailure, ErrorSeverity};

/// Separator between tag segments.
pub const TAG_SEPARATOR: char = '.';

/// Errors produced when parsing a tag string.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("tag is empty")]
    Empty,

    #[error("tag `{tag}` has an empty segment")]
    EmptySegment { tag: String },

    #[error("tag `{tag}` contains invalid character {ch:?}")]
    InvalidCharacter { tag: String, ch: char },
}

impl ActionFailure for TagError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "TAG_EMPTY",
            Self::EmptySegment { .. } => "TAG_EMPTY_SEGMENT",
            Self::InvalidCharacter { .. } => "TAG_INVALID_CHARACTER",
        }
    }
}

/// A validated hierarchical label.
///
/// Cloning is cheap (shared string).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct Tag(Arc<str>);

impl Tag {
    /// Parses and validates a tag.
    ///
    /// Segments must be non-empty and consist of ASCII alphanumerics or `_`.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, TagError> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return Err(TagError::Empty);
        }

        for segment in raw.split(TAG_SEPARATOR) {
            if segment.is_empty() {
                return Err(TagError::EmptySegment {
                    tag: raw.to_string(),
                });
            }
            if let Some(ch) = segment
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
            {
                return Err(TagError::InvalidCharacter {
                    tag: raw.to_string(),
                    ch,
                });
            }
        }

        Ok(Self(Arc::from(raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates the path segments, root first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(TAG_SEPARATOR)
    }

    /// Number of segments (`Status.Stunned` has depth 2).
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Returns the parent tag, or `None` for a root tag.
    pub fn parent(&self) -> Option<Tag> {
        self.0
            .rfind(TAG_SEPARATOR)
            .map(|idx| Self(Arc::from(&self.0[..idx])))
    }

    /// Returns true if `self` equals `query` or is one of its descendants.
    pub fn matches(&self, query: &Tag) -> bool {
        let tag = self.as_str();
        let query = query.as_str();
        tag == query
            || (tag.len() > query.len()
                && tag.starts_with(query)
                && tag[query.len()..].starts_with(TAG_SEPARATOR))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.0)
    }
}

impl FromStr for Tag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Tag {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0.to_string()
    }
}

/// An ordered set of tags.
///
/// Ordering is only used to make iteration (and therefore logs, snapshots and
/// replication payloads) identical on every participant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct TagSet {
    tags: BTreeSet<Tag>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses every entry, failing on the first malformed tag.
    pub fn parse<I, S>(raw: I) -> Result<Self, TagError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter().map(Tag::new).collect()
    }

    pub fn insert(&mut self, tag: Tag) -> bool {
        self.tags.insert(tag)
    }

    pub fn remove(&mut self, tag: &Tag) -> bool {
        self.tags.remove(tag)
    }

    /// Exact membership, no hierarchy.
    pub fn contains(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    /// Returns true if any tag in `self` matches any tag in `query`.
    pub fn has_any(&self, query: &TagSet) -> bool {
        self.tags
            .iter()
            .any(|tag| query.iter().any(|q| tag.matches(q)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}

impl Extend<Tag> for TagSet {
    fn extend<I: IntoIterator<Item = Tag>>(&mut self, iter: I) {
        self.tags.extend(iter);
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::collections::btree_set::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{tag}")?;
        }
        f.write_str("}")
    }
}

/// The owner's live tag container.
///
/// Each tag carries a grant count. A tag is present while its count is
/// non-zero. `append`/`remove` are O(size of the argument).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActiveTags {
    counts: BTreeMap<Tag, u32>,
}

impl ActiveTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one grant for every tag in `tags`.
    pub fn append(&mut self, tags: &TagSet) {
        for tag in tags {
            *self.counts.entry(tag.clone()).or_insert(0) += 1;
        }
    }

    /// Removes one grant for every tag in `tags`.
    ///
    /// Removing a tag that is not present is a no-op.
    pub fn remove(&mut self, tags: &TagSet) {
        for tag in tags {
            if let Some(count) = self.counts.get_mut(tag) {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(tag);
                }
            }
        }
    }

    /// Hierarchical membership: true if an active tag equals `query` or
    /// descends from it.
    pub fn has(&self, query: &Tag) -> bool {
        self.counts.keys().any(|tag| tag.matches(query))
    }

    /// Exact membership, no hierarchy.
    pub fn contains(&self, tag: &Tag) -> bool {
        self.counts.contains_key(tag)
    }

    /// Returns true if any active tag matches any tag in `query`.
    pub fn has_any(&self, query: &TagSet) -> bool {
        query.iter().any(|q| self.has(q))
    }

    /// Number of outstanding grants for exactly `tag`.
    pub fn count(&self, tag: &Tag) -> u32 {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.counts.keys()
    }

    /// Distinct active tags, dropping the counts.
    pub fn to_tag_set(&self) -> TagSet {
        self.counts.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
