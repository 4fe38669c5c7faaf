//! Memoized remote lookups
//!
//! [`with_cache`] wraps one remote call with a [`MemoStore`]: a cached key is answered
//! without touching the network, a successful fetch is stored, and a failed fetch is
//! never stored so it is retried next time the key comes up. Keys that reached a
//! saved cache file are never fetched again, including after a restart.

use crate::error::LookupError;
use crate::models::ProblemRef;
use crate::services::judge_client::JudgeApi;
use crate::services::title_matcher::first_match;
use std::future::Future;
use tagsync_common::config::FileConfig;
use tagsync_common::{FileCache, MemoStore};
use tracing::{info, warn};

/// Whether a fetched value is worth caching
pub trait Memoizable {
    fn is_present(&self) -> bool;
}

impl Memoizable for ProblemRef {
    fn is_present(&self) -> bool {
        true
    }
}

/// Problem ids start at 1; 0 means "nothing"
impl Memoizable for u64 {
    fn is_present(&self) -> bool {
        *self != 0
    }
}

/// Where a memoized value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Remote,
}

/// Answer `key` from `store`, or fetch it once and remember the result
///
/// With `persist_on_success` the store is flushed right after a new value is stored;
/// a failed flush is logged and does not fail the lookup.
pub async fn with_cache<S, K, V, F, Fut>(
    store: &mut S,
    key: K,
    persist_on_success: bool,
    fetch: F,
) -> Result<(V, Origin), LookupError>
where
    S: MemoStore<K, V>,
    K: Clone,
    V: Clone + Memoizable,
    F: FnOnce(K) -> Fut,
    Fut: Future<Output = Result<V, LookupError>>,
{
    if let Some(value) = store.get(&key) {
        return Ok((value.clone(), Origin::Cache));
    }

    let value = fetch(key.clone()).await?;
    if value.is_present() {
        store.set(key, value.clone());
        if persist_on_success {
            if let Err(e) = store.save() {
                warn!(error = %e, "Cache flush after lookup failed");
            }
        }
    }

    Ok((value, Origin::Remote))
}

/// Source problem id for a destination title
///
/// Returns the id of the first search candidate that passes the title matcher.
/// Only that candidate's id is parsed.
pub async fn search_problem_by_title<A>(site: &A, title: &str) -> Result<u64, LookupError>
where
    A: JudgeApi + ?Sized,
{
    let candidates = site.search_problems(title).await?;
    let candidate = first_match(title, &candidates).ok_or_else(|| {
        LookupError::NotFound(format!("problem {} not found at {}", title, site.host()))
    })?;
    candidate.id.parse()
}

/// The three stores backing the reconciliation pipeline
#[derive(Debug)]
pub struct LookupCaches {
    /// Destination problem id -> destination problem
    pub dest: FileCache<u64, ProblemRef>,
    /// Destination title -> source problem id
    pub search: FileCache<String, u64>,
    /// Source problem id -> source problem
    pub source: FileCache<u64, ProblemRef>,
}

impl LookupCaches {
    /// Open (and load) the cache files named in `files`
    pub fn open(files: &FileConfig) -> Self {
        Self {
            dest: FileCache::open(&files.cache_dest),
            search: FileCache::open(&files.cache_search),
            source: FileCache::open(&files.cache_source),
        }
    }

    /// Flush all three stores; returns true when every save succeeded
    pub fn save_all(&self) -> bool {
        info!("saving cache");
        let results = [
            ("dest", self.dest.save()),
            ("search", self.search.save()),
            ("source", self.source.save()),
        ];

        let mut ok = true;
        for (name, result) in results {
            if let Err(e) = result {
                warn!(cache = name, error = %e, "Cache save failed, entries since last save are not durable");
                ok = false;
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateId, SearchCandidate};
    use async_trait::async_trait;
    use std::cell::Cell;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// In-memory store counting flushes
    #[derive(Default)]
    struct MemoryStore {
        map: HashMap<u64, u64>,
        saves: Cell<usize>,
    }

    impl MemoStore<u64, u64> for MemoryStore {
        fn has(&self, key: &u64) -> bool {
            self.map.contains_key(key)
        }
        fn get(&self, key: &u64) -> Option<&u64> {
            self.map.get(key)
        }
        fn set(&mut self, key: u64, value: u64) {
            self.map.insert(key, value);
        }
        fn save(&self) -> tagsync_common::Result<()> {
            self.saves.set(self.saves.get() + 1);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_second_lookup_served_from_cache() {
        let mut store = MemoryStore::default();
        let calls = Cell::new(0);

        let fetch = |k: u64| {
            calls.set(calls.get() + 1);
            async move { Ok::<_, LookupError>(k * 10) }
        };
        let first = with_cache(&mut store, 4, false, fetch).await.unwrap();
        let fetch = |k: u64| {
            calls.set(calls.get() + 1);
            async move { Ok::<_, LookupError>(k * 10) }
        };
        let second = with_cache(&mut store, 4, false, fetch).await.unwrap();

        assert_eq!(first, (40, Origin::Remote));
        assert_eq!(second, (40, Origin::Cache));
        assert_eq!(calls.get(), 1);
        assert_eq!(store.saves.get(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mut store = MemoryStore::default();

        let err = with_cache(&mut store, 1u64, true, |_| async {
            Err::<u64, _>(LookupError::Transport("HTTP 502".to_string()))
        })
        .await
        .unwrap_err();

        assert_eq!(err, LookupError::Transport("HTTP 502".to_string()));
        assert!(!store.has(&1));
        assert_eq!(store.saves.get(), 0);

        let retried = with_cache(&mut store, 1u64, true, |_| async { Ok(7u64) }).await.unwrap();
        assert_eq!(retried, (7, Origin::Remote));
        assert!(store.has(&1));
    }

    #[tokio::test]
    async fn test_empty_value_not_cached() {
        let mut store = MemoryStore::default();
        let (value, _) = with_cache(&mut store, 9u64, false, |_| async { Ok(0u64) }).await.unwrap();
        assert_eq!(value, 0);
        assert!(!store.has(&9));
    }

    #[tokio::test]
    async fn test_persist_on_success_flushes() {
        let mut store = MemoryStore::default();
        with_cache(&mut store, 1u64, true, |_| async { Ok(5u64) }).await.unwrap();
        assert_eq!(store.saves.get(), 1);

        // Cache hit: nothing new to persist
        with_cache(&mut store, 1u64, true, |_| async { Ok(6u64) }).await.unwrap();
        assert_eq!(store.saves.get(), 1);
    }

    #[tokio::test]
    async fn test_saved_keys_not_refetched_after_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache-source.json");

        let mut first_run: FileCache<u64, ProblemRef> = FileCache::open(&path);
        for id in [1u64, 2] {
            with_cache(&mut first_run, id, false, |id| async move {
                Ok(ProblemRef {
                    id,
                    title: format!("P{}", id),
                    tags: vec![],
                })
            })
            .await
            .unwrap();
        }
        first_run.save().unwrap();

        let mut second_run: FileCache<u64, ProblemRef> = FileCache::open(&path);
        assert!(second_run.has(&1));
        assert!(second_run.has(&2));
        for id in [1u64, 2] {
            let (problem, origin) = with_cache(&mut second_run, id, false, |_| async {
                Err(LookupError::Transport("network must not be used".to_string()))
            })
            .await
            .unwrap();
            assert_eq!(origin, Origin::Cache);
            assert_eq!(problem.title, format!("P{}", id));
        }
    }

    struct FixedSearch(Vec<SearchCandidate>);

    #[async_trait]
    impl JudgeApi for FixedSearch {
        fn host(&self) -> &str {
            "http://source.test"
        }
        async fn fetch_problem(&self, id: u64) -> Result<ProblemRef, LookupError> {
            Err(LookupError::NotFound(format!("problem {}", id)))
        }
        async fn search_problems(&self, _title: &str) -> Result<Vec<SearchCandidate>, LookupError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_search_by_title_first_match() {
        let site = FixedSearch(vec![
            SearchCandidate { name: "Three Sum".to_string(), id: CandidateId::Number(5) },
            SearchCandidate { name: "Two  Sum".to_string(), id: CandidateId::Number(42) },
            SearchCandidate { name: "Two Sum".to_string(), id: CandidateId::Number(43) },
        ]);
        assert_eq!(search_problem_by_title(&site, "two sum").await, Ok(42));

        let err = search_problem_by_title(&site, "Four Sum").await.unwrap_err();
        assert!(matches!(err, LookupError::NotFound(ref msg) if msg.contains("Four Sum")));
    }

    #[tokio::test]
    async fn test_only_matched_candidate_id_is_parsed() {
        let site = FixedSearch(vec![
            SearchCandidate { name: "Two Sum".to_string(), id: CandidateId::Text("42".to_string()) },
            SearchCandidate { name: "Other".to_string(), id: CandidateId::Text("n/a".to_string()) },
        ]);
        assert_eq!(search_problem_by_title(&site, "Two Sum").await, Ok(42));

        let err = search_problem_by_title(&site, "Other").await.unwrap_err();
        assert_eq!(err, LookupError::Protocol("invalid candidate id \"n/a\"".to_string()));
    }

    #[test]
    fn test_save_all_reports_failure() {
        let dir = TempDir::new().unwrap();
        let files = FileConfig::default().resolved(&dir.path().join("missing"));
        let caches = LookupCaches::open(&files);
        assert!(!caches.save_all());

        let files = FileConfig::default().resolved(dir.path());
        let caches = LookupCaches::open(&files);
        assert!(caches.save_all());
        assert!(files.cache_search.exists());
    }
}
