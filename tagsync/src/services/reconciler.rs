//! Tag reconciliation orchestrator
//!
//! Walks the configured destination id ranges one id at a time and, per id:
//!
//! 1. fetches the destination problem (memoized)
//! 2. searches the source site by the destination title (memoized)
//! 3. fetches the matched source problem (memoized)
//! 4. resolves each source tag through the alias table and queues the catalog
//!    tags the destination problem does not have yet
//!
//! A failed lookup in steps 1-3 skips only that id. Nothing for an id reaches the
//! [`RunResult`] until all three lookups succeeded.
//!
//! # Cancellation
//! The token is checked between ids and raced against the in-flight lookups, so an
//! interrupt abandons the current request instead of waiting for it. Cancelled and
//! completed runs take the same exit path: caches are flushed and the partial
//! result is returned for output.

use crate::error::{LookupError, Stage, StageError};
use crate::models::{ProblemRef, RunResult, TagAssociation};
use crate::services::alias_resolver::AliasTable;
use crate::services::judge_client::JudgeApi;
use crate::services::lookup::{search_problem_by_title, with_cache, LookupCaches, Origin};
use tagsync_common::config::{CacheConfig, IdRange};
use tagsync_common::TagCatalog;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-tag decision for one matched problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagAction {
    /// Canonical tag exists in the catalog and is new on the destination
    Insert { name: String, tag_id: u64 },
    /// Destination problem already carries the tag
    AlreadyPresent { name: String },
    /// Canonical tag has no catalog entry
    Missing { name: String },
}

/// Everything learned about one id, applied to the run result in one step
#[derive(Debug)]
struct ProblemReport {
    destination: ProblemRef,
    source_id: u64,
    source: ProblemRef,
    actions: Vec<TagAction>,
    cache_hits: u64,
    remote_calls: u64,
}

fn count(origin: Origin, hits: &mut u64, remote: &mut u64) {
    match origin {
        Origin::Cache => *hits += 1,
        Origin::Remote => *remote += 1,
    }
}

/// Drives the per-id pipeline over all configured ranges
pub struct Reconciler<D, S> {
    destination: D,
    source: S,
    caches: LookupCaches,
    aliases: AliasTable,
    catalog: TagCatalog,
    policy: CacheConfig,
}

impl<D, S> Reconciler<D, S>
where
    D: JudgeApi,
    S: JudgeApi,
{
    pub fn new(
        destination: D,
        source: S,
        caches: LookupCaches,
        aliases: AliasTable,
        catalog: TagCatalog,
        policy: CacheConfig,
    ) -> Self {
        Self {
            destination,
            source,
            caches,
            aliases,
            catalog,
            policy,
        }
    }

    pub fn caches(&self) -> &LookupCaches {
        &self.caches
    }

    /// Process every id of every range, in order
    ///
    /// Always flushes the caches before returning, whether the run completed or
    /// was cancelled.
    pub async fn run(&mut self, ranges: &[IdRange], cancel: &CancellationToken) -> RunResult {
        let mut result = RunResult::default();

        info!(
            ranges = ranges.len(),
            destination = %self.destination.host(),
            source = %self.source.host(),
            "Starting tag reconciliation"
        );

        'ranges: for range in ranges {
            for pid in range.ids() {
                if cancel.is_cancelled() {
                    result.interrupted = true;
                    break 'ranges;
                }

                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    outcome = self.reconcile_problem(pid) => Some(outcome),
                };

                match outcome {
                    None => {
                        warn!(pid, "Interrupted, abandoning in-flight lookups");
                        result.interrupted = true;
                        break 'ranges;
                    }
                    Some(Ok(report)) => self.apply(pid, report, &mut result),
                    Some(Err(e)) => {
                        log_failure(pid, &e);
                        result.stats.failed += 1;
                    }
                }
                result.stats.processed += 1;

                self.checkpoint(result.stats.processed);
            }
        }

        self.caches.save_all();

        info!(
            interrupted = result.interrupted,
            inserts = result.inserts.len(),
            missing_tags = result.missing_tags.len(),
            "Reconciliation finished: {}",
            result.stats.display_string()
        );

        result
    }

    /// Run lookups 1-3 for `pid` and plan its tags
    async fn reconcile_problem(&mut self, pid: u64) -> Result<ProblemReport, StageError> {
        let persist = self.policy.persist_each_lookup;
        let mut cache_hits = 0;
        let mut remote_calls = 0;

        let destination = &self.destination;
        let (dest_problem, origin) =
            with_cache(&mut self.caches.dest, pid, persist, |id| destination.fetch_problem(id))
                .await
                .map_err(|e| StageError::new(Stage::DestinationFetch, e))?;
        count(origin, &mut cache_hits, &mut remote_calls);

        let source = &self.source;
        let (source_id, origin) = with_cache(
            &mut self.caches.search,
            dest_problem.title.clone(),
            persist,
            |title| async move { search_problem_by_title(source, &title).await },
        )
        .await
        .map_err(|e| StageError::new(Stage::TitleSearch, e))?;
        count(origin, &mut cache_hits, &mut remote_calls);

        let (source_problem, origin) =
            with_cache(&mut self.caches.source, source_id, persist, |id| source.fetch_problem(id))
                .await
                .map_err(|e| StageError::new(Stage::SourceFetch, e))?;
        count(origin, &mut cache_hits, &mut remote_calls);

        let actions = plan_tags(&self.aliases, &self.catalog, &dest_problem, &source_problem);

        Ok(ProblemReport {
            destination: dest_problem,
            source_id,
            source: source_problem,
            actions,
            cache_hits,
            remote_calls,
        })
    }

    fn apply(&self, pid: u64, report: ProblemReport, result: &mut RunResult) {
        info!(
            "#{}. {} => #{}. {}",
            pid, report.destination.title, report.source_id, report.source.title
        );

        result.stats.matched += 1;
        result.stats.cache_hits += report.cache_hits;
        result.stats.remote_calls += report.remote_calls;

        for action in report.actions {
            match action {
                TagAction::Insert { name, tag_id } => {
                    debug!(pid, tag_id, "queue tag {}", name);
                    result.queue_insert(TagAssociation {
                        problem_id: pid,
                        tag_id,
                    });
                }
                TagAction::AlreadyPresent { name } => {
                    info!(pid, "tag {} already exists", name);
                }
                TagAction::Missing { name } => {
                    result.record_missing(&name);
                    warn!(pid, "tag {} not found in tag list", name);
                }
            }
        }
    }

    fn checkpoint(&self, processed: u64) {
        let every = self.policy.checkpoint_every;
        if every > 0 && processed % every == 0 {
            info!(processed, "Checkpoint");
            self.caches.save_all();
        }
    }
}

/// Decide what to do with each source tag of a matched problem
pub fn plan_tags(
    aliases: &AliasTable,
    catalog: &TagCatalog,
    destination: &ProblemRef,
    source: &ProblemRef,
) -> Vec<TagAction> {
    source
        .tags
        .iter()
        .map(|raw| {
            let name = aliases.resolve(raw).to_string();
            match catalog.id_of(&name) {
                Some(_) if destination.tags.contains(&name) => TagAction::AlreadyPresent { name },
                Some(tag_id) => TagAction::Insert { name, tag_id },
                None => TagAction::Missing { name },
            }
        })
        .collect()
}

fn log_failure(pid: u64, e: &StageError) {
    match &e.error {
        LookupError::NotFound(msg) => warn!(pid, stage = %e.stage, "{}", msg),
        other => error!(pid, stage = %e.stage, error = %other, "Problem skipped"),
    }
}
