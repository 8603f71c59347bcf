//! Storage module for persisting mirrored resources
//!
//! This module handles everything that touches the output directory:
//! - The `Resource` model of a fetched artifact
//! - Deterministic URL to local path derivation
//! - Relative path computation between two local paths
//! - The concurrent `ResourceStore` that is the single source of truth for
//!   "has this URL already been fetched"

pub(crate) mod paths;
mod store;

pub use paths::{encode_href, local_path_for, relative_path, MAX_LOCAL_PATH_LEN};
pub use store::ResourceStore;

use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Local path escapes the output directory: {0}")]
    PathEscape(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A fetched artifact and where it lives on disk
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Normalized absolute URL the resource was fetched from (identity key)
    pub source_url: Url,

    /// URL relative references in the content resolve against (the final URL
    /// after redirects; equal to `source_url` otherwise)
    pub base_url: Url,

    /// Path under the output root, derived from `source_url`
    pub local_path: String,

    /// Raw Content-Type header value
    pub content_type: String,

    /// True iff the Content-Type indicates HTML
    pub is_document: bool,

    /// Body bytes
    pub content: Vec<u8>,
}

impl Resource {
    /// Creates a resource, deriving its local path and document flag
    pub fn new(source_url: Url, content: Vec<u8>, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        Self {
            local_path: local_path_for(&source_url),
            is_document: is_html_content_type(&content_type),
            base_url: source_url.clone(),
            source_url,
            content_type,
            content,
        }
    }

    /// The identity key used by the store and the visited set
    pub fn key(&self) -> &str {
        self.source_url.as_str()
    }

    /// Returns a copy of this resource carrying rewritten content
    pub fn with_content(&self, content: Vec<u8>) -> Self {
        Self {
            content,
            ..self.clone()
        }
    }
}

/// Returns true if a Content-Type header value denotes an HTML document
pub fn is_html_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/html")
}
