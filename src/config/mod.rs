//! Configuration module for Site-Mirror
//!
//! This module holds the immutable options of a mirror run and handles loading,
//! parsing, and validating the optional TOML configuration file.
//!
//! # Example
//!
//! ```no_run
//! use site_mirror::config::{load_config, MirrorOptions};
//! use std::path::Path;
//!
//! let file = load_config(Path::new("mirror.toml")).unwrap();
//! let options = MirrorOptions::default().merge_file(&file);
//! println!("Mirror will use max depth: {}", options.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{FileConfig, MirrorOptions, MirrorSection};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

pub use validation::validate_options;
