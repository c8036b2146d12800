//! Entry domain model shared by tasks and reference notes.
//!
//! # Responsibility
//! - Define the canonical record produced from one ENEX note.
//! - Derive the dedup fingerprint used by the entry upsert.
//!
//! # Invariants
//! - `EntryKind::Note` never carries a Where-tag or a When-tag.
//! - `EntryKind::Task` carries at least one of them.
//! - Two entries with equal (title, body_text, case-folded tags) share one
//!   fingerprint.

use crate::classify::tag_key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a persisted entry.
pub type EntryId = Uuid;

const FIELD_SEPARATOR: u8 = 0x1f;
const TAG_SEPARATOR: u8 = 0x1e;

/// What a note becomes after tag classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Actionable item: has a Where-tag and/or a When-tag.
    Task,
    /// Reference material without Where/When context.
    Note,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Note => "note",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "task" => Some(Self::Task),
            "note" => Some(Self::Note),
            _ => None,
        }
    }
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag partition of one note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedTags {
    pub where_tag: Option<String>,
    pub when_tag: Option<String>,
    /// Sorted so that equal sets compare and fingerprint equally.
    pub reference_tags: BTreeSet<String>,
}

impl ClassifiedTags {
    pub fn has_context(&self) -> bool {
        self.where_tag.is_some() || self.when_tag.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_context() && self.reference_tags.is_empty()
    }
}

/// Validation errors for entry invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValidationError {
    /// Notes are defined by the absence of Where/When tags.
    NoteWithContextTag,
    /// Tasks are defined by the presence of a Where or When tag.
    TaskWithoutContextTag,
    /// `updated` precedes `created`.
    UpdatedBeforeCreated,
}

impl Display for EntryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteWithContextTag => write!(f, "note entries cannot carry where/when tags"),
            Self::TaskWithoutContextTag => {
                write!(f, "task entries require a where or when tag")
            }
            Self::UpdatedBeforeCreated => write!(f, "updated timestamp precedes created"),
        }
    }
}

impl Error for EntryValidationError {}

/// One imported note or task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub uuid: EntryId,
    pub kind: EntryKind,
    pub title: String,
    pub body_text: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub reminder: Option<DateTime<Utc>>,
    pub tags: ClassifiedTags,
}

impl Entry {
    /// Creates an entry with a fresh id; `updated` starts equal to `created`.
    pub fn new(
        kind: EntryKind,
        title: impl Into<String>,
        body_text: impl Into<String>,
        tags: ClassifiedTags,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind,
            title: title.into(),
            body_text: body_text.into(),
            created,
            updated: created,
            reminder: None,
            tags,
        }
    }

    pub fn validate(&self) -> Result<(), EntryValidationError> {
        match self.kind {
            EntryKind::Note if self.tags.has_context() => {
                return Err(EntryValidationError::NoteWithContextTag)
            }
            EntryKind::Task if !self.tags.has_context() => {
                return Err(EntryValidationError::TaskWithoutContextTag)
            }
            _ => {}
        }
        if self.updated < self.created {
            return Err(EntryValidationError::UpdatedBeforeCreated);
        }
        Ok(())
    }

    /// Hex MD5 over title, body text and the full tag set.
    ///
    /// Timestamps and the uuid are excluded: re-importing the same export
    /// yields the same fingerprint even though `now()` fallbacks differ.
    /// Tags enter by their case-folded key, matching tag identity in storage.
    pub fn fingerprint(&self) -> String {
        let mut context = md5::Context::new();
        context.consume(self.title.as_bytes());
        context.consume([FIELD_SEPARATOR]);
        context.consume(self.body_text.as_bytes());
        context.consume([FIELD_SEPARATOR]);
        context.consume(tag_key(self.tags.where_tag.as_deref().unwrap_or("")).as_bytes());
        context.consume([FIELD_SEPARATOR]);
        context.consume(tag_key(self.tags.when_tag.as_deref().unwrap_or("")).as_bytes());
        context.consume([FIELD_SEPARATOR]);
        let reference_keys: BTreeSet<String> =
            self.tags.reference_tags.iter().map(|tag| tag_key(tag)).collect();
        for key in &reference_keys {
            context.consume(key.as_bytes());
            context.consume([TAG_SEPARATOR]);
        }
        format!("{:x}", context.compute())
    }
}
