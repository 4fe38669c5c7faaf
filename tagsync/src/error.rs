//! Error types for remote lookups
//!
//! Every variant is recoverable: the reconciler skips the current problem id and
//! moves on. Only configuration loading and final output writing abort a run.

use std::fmt;
use thiserror::Error;

/// Failure of a single remote lookup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Remote reported no such problem, or no search candidate matched
    #[error("{0}")]
    NotFound(String),

    /// Network failure, timeout or non-success HTTP status
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body was not the expected JSON shape
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Pipeline stage a lookup belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DestinationFetch,
    TitleSearch,
    SourceFetch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::DestinationFetch => "destination fetch",
            Stage::TitleSearch => "title search",
            Stage::SourceFetch => "source fetch",
        };
        f.write_str(name)
    }
}

/// Lookup failure tagged with the stage it happened in
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed: {error}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub error: LookupError,
}

impl StageError {
    pub fn new(stage: Stage, error: LookupError) -> Self {
        Self { stage, error }
    }
}
