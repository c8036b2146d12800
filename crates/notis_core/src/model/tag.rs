//! Tag model.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Vocabulary a tag was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    /// Context tag from the configured Where vocabulary.
    Where,
    /// Timing tag from the configured When vocabulary.
    When,
    /// Any tag outside both vocabularies.
    Reference,
}

impl TagCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Where => "where",
            Self::When => "when",
            Self::Reference => "reference",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "where" => Some(Self::Where),
            "when" => Some(Self::When),
            "reference" => Some(Self::Reference),
            _ => None,
        }
    }
}

impl Display for TagCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted tag row. `name` is unique within `category`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub category: TagCategory,
}
