//! Run configuration loading
//!
//! The configuration is a single TOML file:
//!
//! ```toml
//! timeout_ms = 10000
//! id_ranges = [[1000, 1999], [3000, 3050]]
//!
//! [source]
//! host = "https://source.example.org"
//! min_request_interval_ms = 200
//! [source.headers]
//! Cookie = "login=..."
//!
//! [destination]
//! host = "http://judge.local"
//!
//! [files]
//! dest_tags = "dest-tags.json"
//!
//! [cache]
//! checkpoint_every = 50
//! ```
//!
//! Everything except the two sites and `id_ranges` has a default. Relative file
//! paths are resolved against the working directory with [`FileConfig::resolved`].

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default number of processed ids between cache checkpoints
pub const DEFAULT_CHECKPOINT_EVERY: u64 = 50;

/// One judge site
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Base URL including scheme, e.g. `https://judge.example.org`
    pub host: String,
    /// Extra headers sent with every request (cookies, user agent)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Minimum spacing between two requests to this site
    #[serde(default)]
    pub min_request_interval_ms: u64,
}

impl SiteConfig {
    fn validate(&self, label: &str) -> Result<()> {
        if !(self.host.starts_with("http://") || self.host.starts_with("https://")) {
            return Err(Error::Config(format!(
                "{} host must start with http:// or https:// (got {:?})",
                label, self.host
            )));
        }
        Ok(())
    }
}

/// Inclusive destination id range `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IdRange(pub u64, pub u64);

impl IdRange {
    /// Ids in ascending order; empty when `min > max`
    pub fn ids(&self) -> RangeInclusive<u64> {
        self.0..=self.1
    }
}

/// Input and output file locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub dest_tags: PathBuf,
    pub tag_alias: PathBuf,
    pub cache_dest: PathBuf,
    pub cache_search: PathBuf,
    pub cache_source: PathBuf,
    pub sql_output: PathBuf,
    pub missing_output: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            dest_tags: PathBuf::from("dest-tags.json"),
            tag_alias: PathBuf::from("tag-alias.txt"),
            cache_dest: PathBuf::from("cache-dest.json"),
            cache_search: PathBuf::from("cache-search.json"),
            cache_source: PathBuf::from("cache-source.json"),
            sql_output: PathBuf::from("add-tags.sql"),
            missing_output: PathBuf::from("tags-missing.txt"),
        }
    }
}

impl FileConfig {
    /// Copy with every relative path joined onto `base`
    pub fn resolved(&self, base: &Path) -> Self {
        let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { base.join(p) };
        Self {
            dest_tags: join(&self.dest_tags),
            tag_alias: join(&self.tag_alias),
            cache_dest: join(&self.cache_dest),
            cache_search: join(&self.cache_search),
            cache_source: join(&self.cache_source),
            sql_output: join(&self.sql_output),
            missing_output: join(&self.missing_output),
        }
    }
}

/// Cache persistence policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Flush a store right after every successful remote lookup
    pub persist_each_lookup: bool,
    /// Flush all stores after this many processed ids (0 disables)
    pub checkpoint_every: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persist_each_lookup: false,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
        }
    }
}

/// Complete run configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub source: SiteConfig,
    pub destination: SiteConfig,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    pub id_ranges: Vec<IdRange>,
    #[serde(default)]
    pub files: FileConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl RunConfig {
    /// Read, parse and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Shared per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        self.source.validate("source")?;
        self.destination.validate("destination")?;

        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be greater than zero".to_string()));
        }

        if self.id_ranges.is_empty() {
            warn!("No id ranges configured, nothing will be processed");
        }
        for range in &self.id_ranges {
            if range.0 > range.1 {
                warn!(min = range.0, max = range.1, "Id range is empty (min > max)");
            }
        }

        Ok(())
    }
}
