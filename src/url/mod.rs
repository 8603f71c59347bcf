//! URL handling module for Site-Mirror
//!
//! This module provides root URL validation, link normalization against a
//! document's URL, and crawl-scope matching (root host plus its subdomains).

mod normalize;
mod scope;

// Re-export main functions
pub use normalize::{normalize_link, strip_identity_noise, validate_root_url};
pub use scope::{extract_domain, is_same_or_subdomain, CrawlScope};
