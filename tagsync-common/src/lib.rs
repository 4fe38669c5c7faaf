//! # tagsync Common Library
//!
//! Shared building blocks for the tagsync reconciler:
//! - Error type for configuration and file I/O
//! - Run configuration loading (TOML)
//! - Destination tag catalog loading
//! - Persistent key/value cache backing the memoized lookups

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;

pub use cache::{FileCache, MemoStore};
pub use catalog::TagCatalog;
pub use error::{Error, Result};
