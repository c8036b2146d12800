//! Domain model for imported notes, tasks, tags and attachments.
//!
//! # Responsibility
//! - Define the records the import pipeline persists.
//! - Own the dedup identity (`Entry::fingerprint`) shared by repositories.
//!
//! # Invariants
//! - Entries and tags are identified by content, not by import order.
//! - A resource is identified by the MD5 digest of its decoded bytes.

pub mod entry;
pub mod resource;
pub mod tag;
