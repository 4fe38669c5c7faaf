//! tagsync library interface
//!
//! Reconciles problem tags from a source judge site onto a destination judge site.
//! Exposes the reconciliation pipeline for the binary and for integration testing.

pub mod error;
pub mod models;
pub mod output;
pub mod services;

pub use crate::error::{LookupError, Stage, StageError};
pub use crate::models::{CandidateId, ProblemRef, RunResult, SearchCandidate, TagAssociation};
