//! Reconciliation services

pub mod alias_resolver;
pub mod judge_client;
pub mod lookup;
pub mod reconciler;
pub mod title_matcher;

pub use alias_resolver::AliasTable;
pub use judge_client::{HttpJudgeClient, JudgeApi};
pub use lookup::{with_cache, LookupCaches, Memoizable, Origin};
pub use reconciler::Reconciler;
pub use title_matcher::{first_match, titles_match};
