//! Fuzzy problem title matching
//!
//! Two titles match when, after removing all whitespace and lowercasing, either one
//! contains the other. This tolerates titles truncated or extended on one site
//! ("Two Sum" vs "Two Sum II") and accepts false positives on very short titles.

use crate::models::SearchCandidate;

/// Title with all whitespace removed, lowercased
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether two titles denote the same problem
pub fn titles_match(a: &str, b: &str) -> bool {
    let a = normalize_title(a);
    let b = normalize_title(b);
    a.contains(&b) || b.contains(&a)
}

/// First candidate matching `title`; remote order is the tie-break
pub fn first_match<'a>(title: &str, candidates: &'a [SearchCandidate]) -> Option<&'a SearchCandidate> {
    candidates.iter().find(|c| titles_match(title, &c.name))
}
