//! Tag classification and note type resolution.
//!
//! # Responsibility
//! - Partition a note's ordered tag list into Where, When and Reference tags.
//! - Decide whether the note is imported as a task or a reference note.
//!
//! # Invariants
//! - First match wins per category, scanning tags in original order.
//! - A tag matched as Where is never also assigned as When for the same note.
//! - A repeated vocabulary hit after the slot is filled is dropped, never
//!   demoted to a Reference tag.
//! - Tags match case-insensitively; the first-seen spelling is kept.
//! - Classification has no error conditions.

use crate::model::entry::{ClassifiedTags, EntryKind};
use std::collections::BTreeSet;

/// Normalizes one tag value for display: trimmed, `None` when blank.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Case-folded identity of a tag, used for matching and dedup.
pub fn tag_key(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Configured Where/When vocabularies, stored as folded keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagVocabulary {
    where_tags: BTreeSet<String>,
    when_tags: BTreeSet<String>,
}

impl TagVocabulary {
    pub fn new<W, N, S>(where_tags: W, when_tags: N) -> Self
    where
        W: IntoIterator<Item = S>,
        N: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            where_tags: collect_normalized(where_tags),
            when_tags: collect_normalized(when_tags),
        }
    }

    pub fn is_where(&self, tag: &str) -> bool {
        self.where_tags.contains(&tag_key(tag))
    }

    pub fn is_when(&self, tag: &str) -> bool {
        self.when_tags.contains(&tag_key(tag))
    }

    /// Tags listed in both vocabularies. Classification still resolves them
    /// deterministically; callers use this for a config warning.
    pub fn overlapping(&self) -> Vec<String> {
        self.where_tags
            .intersection(&self.when_tags)
            .cloned()
            .collect()
    }
}

fn collect_normalized<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .filter_map(|tag| normalize_tag(tag.as_ref()))
        .map(|tag| tag_key(&tag))
        .collect()
}

/// Partitions `tags` using `vocabulary`.
pub fn classify_tags<S: AsRef<str>>(tags: &[S], vocabulary: &TagVocabulary) -> ClassifiedTags {
    let mut classified = ClassifiedTags::default();
    let mut reference_keys = BTreeSet::new();

    for tag in tags.iter().filter_map(|tag| normalize_tag(tag.as_ref())) {
        let is_where = vocabulary.is_where(&tag);
        let is_when = vocabulary.is_when(&tag);

        if classified.where_tag.is_none() && is_where {
            classified.where_tag = Some(tag);
            continue;
        }
        if classified.when_tag.is_none() && is_when {
            classified.when_tag = Some(tag);
            continue;
        }
        if !is_where && !is_when && reference_keys.insert(tag_key(&tag)) {
            classified.reference_tags.insert(tag);
        }
    }

    classified
}

/// Resolves the entry kind from a classification result.
pub fn resolve_kind(tags: &ClassifiedTags) -> EntryKind {
    if tags.has_context() {
        EntryKind::Task
    } else {
        EntryKind::Note
    }
}
