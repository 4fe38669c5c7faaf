//! Run output emission
//!
//! Writes the pending inserts as SQL and the missing tag names as plain text. Both
//! files are written at the end of a completed or interrupted run.

use crate::models::{RunResult, TagAssociation};
use std::collections::BTreeSet;
use std::path::Path;
use tagsync_common::config::FileConfig;
use tagsync_common::Result;
use tracing::info;

/// One `INSERT` statement per association, in accumulation order
pub fn render_sql(inserts: &[TagAssociation]) -> String {
    inserts
        .iter()
        .map(|a| {
            format!(
                "INSERT INTO problem_tag_map (problem_id, tag_id) VALUES ({}, {});",
                a.problem_id, a.tag_id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Missing tag names, one per line
pub fn render_missing(missing: &BTreeSet<String>) -> String {
    missing.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
}

/// Write the SQL and missing-tag files
///
/// With `dry_run` the SQL is logged instead and nothing is written.
pub fn emit(result: &RunResult, files: &FileConfig, dry_run: bool) -> Result<()> {
    let sql = render_sql(&result.inserts);
    let missing = render_missing(&result.missing_tags);

    if dry_run {
        info!(inserts = result.inserts.len(), "Dry run, SQL not written:\n{}", sql);
        info!(missing = result.missing_tags.len(), "Dry run, missing tags:\n{}", missing);
        return Ok(());
    }

    info!("writing sql");
    write_file(&files.sql_output, &sql)?;

    info!("writing missing tags");
    write_file(&files.missing_output, &missing)?;

    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)?;
    info!(path = %path.display(), bytes = content.len(), "Output written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_sql() {
        let sql = render_sql(&[
            TagAssociation { problem_id: 10, tag_id: 3 },
            TagAssociation { problem_id: 11, tag_id: 1 },
        ]);
        assert_eq!(
            sql,
            "INSERT INTO problem_tag_map (problem_id, tag_id) VALUES (10, 3);\n\
             INSERT INTO problem_tag_map (problem_id, tag_id) VALUES (11, 1);"
        );
        assert_eq!(render_sql(&[]), "");
    }

    #[test]
    fn test_emit_writes_both_files() {
        let dir = TempDir::new().unwrap();
        let files = FileConfig::default().resolved(dir.path());

        let mut result = RunResult::default();
        result.queue_insert(TagAssociation { problem_id: 1, tag_id: 2 });
        result.record_missing("Zeta");
        result.record_missing("Alpha");

        emit(&result, &files, false).unwrap();

        let sql = std::fs::read_to_string(&files.sql_output).unwrap();
        assert_eq!(sql, "INSERT INTO problem_tag_map (problem_id, tag_id) VALUES (1, 2);");
        let missing = std::fs::read_to_string(&files.missing_output).unwrap();
        assert_eq!(missing, "Alpha\nZeta");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let files = FileConfig::default().resolved(dir.path());

        emit(&RunResult::default(), &files, true).unwrap();
        assert!(!files.sql_output.exists());
        assert!(!files.missing_output.exists());
    }

    #[test]
    fn test_unwritable_output_is_error() {
        let dir = TempDir::new().unwrap();
        let files = FileConfig::default().resolved(&dir.path().join("absent"));
        assert!(emit(&RunResult::default(), &files, false).is_err());
    }
}
