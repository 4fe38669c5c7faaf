//! Tag alias resolution
//!
//! Translates source-site tag names into the destination vocabulary.
//!
//! # Alias file format
//! One rule per line, `source = dest`:
//! - Blank lines and lines starting with `#` (after leading whitespace) are skipped
//! - Lines without `=`, or with an empty side, are skipped
//! - Only the text up to a second `=` is taken as `dest`
//! - A `source` wrapped in `/.../` is a case-insensitive regex rule
//!
//! Patterns use the `regex` crate syntax. Lookaround (`(?=..)`, `(?!..)`, `(?<=..)`)
//! and backreferences (`\1`) are not supported; a rule using them fails to load
//! with a configuration error instead of being skipped.
//!
//! # Resolution order
//! 1. Exact rules (a repeated source keeps the last rule)
//! 2. Regex rules in file order (first match wins)
//! 3. The input name unchanged

use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use tagsync_common::{Error, Result};

#[derive(Debug, Clone)]
struct PatternRule {
    regex: Regex,
    dest: String,
}

/// Immutable alias table built from alias file text
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    exact: HashMap<String, String>,
    patterns: Vec<PatternRule>,
}

impl AliasTable {
    /// Parse alias file text
    ///
    /// # Errors
    /// `Error::Config` naming the line when a `/pattern/` does not compile.
    pub fn parse(text: &str) -> Result<Self> {
        let mut table = Self::default();

        for (line_no, line) in text.lines().enumerate() {
            if line.trim_start().starts_with('#') {
                continue;
            }

            let mut parts = line.split('=');
            let source = parts.next().unwrap_or_default().trim();
            let dest = match parts.next() {
                Some(dest) => dest.trim(),
                None => continue,
            };
            if source.is_empty() || dest.is_empty() {
                continue;
            }

            match pattern_body(source) {
                Some(body) => {
                    let regex = RegexBuilder::new(body)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| {
                            Error::Config(format!(
                                "tag alias line {}: invalid pattern {}: {}",
                                line_no + 1,
                                source,
                                e
                            ))
                        })?;
                    table.patterns.push(PatternRule {
                        regex,
                        dest: dest.to_string(),
                    });
                }
                None => {
                    table.exact.insert(source.to_string(), dest.to_string());
                }
            }
        }

        tracing::debug!(
            exact = table.exact.len(),
            patterns = table.patterns.len(),
            "Tag alias table built"
        );

        Ok(table)
    }

    /// Canonical name for `name`; unresolved names come back unchanged
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        if let Some(dest) = self.exact.get(name) {
            return dest;
        }
        self.patterns
            .iter()
            .find(|rule| rule.regex.is_match(name))
            .map(|rule| rule.dest.as_str())
            .unwrap_or(name)
    }

    pub fn exact_rules(&self) -> usize {
        self.exact.len()
    }

    pub fn pattern_rules(&self) -> usize {
        self.patterns.len()
    }
}

/// Regex body of a `/.../` source, if it is one
fn pattern_body(source: &str) -> Option<&str> {
    if source.len() >= 2 && source.starts_with('/') && source.ends_with('/') {
        Some(&source[1..source.len() - 1])
    } else {
        None
    }
}
