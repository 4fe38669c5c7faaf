//! Domain types shared by the lookup services and the reconciler

use crate::error::LookupError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Problem as exported by a judge site
///
/// This is the value half of the destination and source cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemRef {
    #[serde(default)]
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Search result id as sent by the remote: a number or a numeric string
///
/// Kept raw until a candidate is chosen, so a garbled id on a candidate that
/// never matches cannot fail the search.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CandidateId {
    Number(u64),
    Text(String),
}

impl CandidateId {
    pub fn parse(&self) -> Result<u64, LookupError> {
        match self {
            CandidateId::Number(id) => Ok(*id),
            CandidateId::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| LookupError::Protocol(format!("invalid candidate id {:?}", text))),
        }
    }
}

impl From<u64> for CandidateId {
    fn from(id: u64) -> Self {
        CandidateId::Number(id)
    }
}

/// One search hit from the source site
///
/// `name` already has its `"<n>. "` display prefix stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub name: String,
    pub id: CandidateId,
}

/// Destination `(problem_id, tag_id)` row to insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TagAssociation {
    pub problem_id: u64,
    pub tag_id: u64,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Ids whose pipeline ran to completion or failure
    pub processed: u64,
    /// Ids matched to a source problem
    pub matched: u64,
    /// Ids skipped because a lookup failed
    pub failed: u64,
    /// Lookups answered from a cache
    pub cache_hits: u64,
    /// Lookups that went to a remote site
    pub remote_calls: u64,
}

impl RunStats {
    pub fn display_string(&self) -> String {
        format!(
            "{} processed, {} matched, {} failed ({} cache hits, {} remote calls)",
            self.processed, self.matched, self.failed, self.cache_hits, self.remote_calls
        )
    }
}

/// Output accumulated by one reconciliation run
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// Pending inserts in accumulation order, repeats included
    pub inserts: Vec<TagAssociation>,
    /// Canonical tag names with no destination catalog entry
    pub missing_tags: BTreeSet<String>,
    pub stats: RunStats,
    /// Run stopped early on an interrupt
    pub interrupted: bool,
}

impl RunResult {
    /// Append an insert to the pending list
    pub fn queue_insert(&mut self, association: TagAssociation) {
        self.inserts.push(association);
    }

    /// Record a tag name missing from the catalog; returns false if already recorded
    pub fn record_missing(&mut self, name: &str) -> bool {
        self.missing_tags.insert(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_insert_keeps_order_and_repeats() {
        let mut result = RunResult::default();
        let pair = TagAssociation { problem_id: 1, tag_id: 2 };

        result.queue_insert(pair);
        result.queue_insert(TagAssociation { problem_id: 2, tag_id: 2 });
        result.queue_insert(pair);
        assert_eq!(
            result.inserts,
            vec![pair, TagAssociation { problem_id: 2, tag_id: 2 }, pair]
        );
    }

    #[test]
    fn test_candidate_id_forms() {
        let ids: Vec<CandidateId> = serde_json::from_str(r#"[42, "43", " 44 ", "x"]"#).unwrap();
        assert_eq!(ids[0].parse(), Ok(42));
        assert_eq!(ids[1].parse(), Ok(43));
        assert_eq!(ids[2].parse(), Ok(44));
        assert!(matches!(ids[3].parse(), Err(LookupError::Protocol(_))));
    }

    #[test]
    fn test_record_missing_is_a_set() {
        let mut result = RunResult::default();
        assert!(result.record_missing("HashTable"));
        assert!(!result.record_missing("HashTable"));
        assert_eq!(result.missing_tags.len(), 1);
    }

    #[test]
    fn test_problem_ref_tolerates_extra_fields() {
        let json = r#"{"title":"Two Sum","tags":["Array"],"time_limit":1000}"#;
        let problem: ProblemRef = serde_json::from_str(json).unwrap();
        assert_eq!(problem.id, 0);
        assert_eq!(problem.tags, vec!["Array".to_string()]);
    }
}
