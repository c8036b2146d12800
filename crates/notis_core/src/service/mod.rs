//! Import use-case services.
//!
//! # Responsibility
//! - Orchestrate reader, normalizer, classifier and repositories into one
//!   import pass.
//! - Keep the CLI decoupled from storage details.

pub mod import_service;
