use std::path::PathBuf;

use crate::model::document::{Document, RewriteOutcome};

/// Error type for a single document read or write
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: String,
        source: std::io::Error,
    },
    #[error("document already exists: {0}")]
    AlreadyExists(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("could not list documents under {path}: {source}")]
    ListError {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The host document store.
///
/// Handles are vault-relative paths with `/` separators.
pub trait DocumentStore {
    /// Every document the store holds, in a stable order
    fn list_documents(&self) -> Result<Vec<String>, StoreError>;

    /// Read a document fresh, with its front matter parsed and inline tags
    /// scanned.
    fn read_document(&self, path: &str) -> Result<Document, StoreError>;

    /// Persist a rewrite of `original`.
    fn write_document(&self, original: &Document, outcome: &RewriteOutcome)
        -> Result<(), StoreError>;

    /// Create a new document; fails if the path is taken.
    fn create_document(&self, path: &str, text: &str) -> Result<(), StoreError>;

    fn exists(&self, path: &str) -> bool;
}
