//! Attachment (resource) model.

use serde::{Deserialize, Serialize};

/// Decoded attachment ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Lowercase hex MD5 of `data`; unique across the store.
    pub hash: String,
    pub file_name: String,
    pub mime: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Resource {
    /// Builds a resource from decoded bytes, deriving the content hash.
    pub fn from_bytes(
        file_name: impl Into<String>,
        mime: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            hash: content_hash(&data),
            file_name: file_name.into(),
            mime: mime.into(),
            width: None,
            height: None,
            data,
        }
    }
}

/// Returns the lowercase hex MD5 digest used by ENEX `<en-media hash>`.
pub fn content_hash(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}
