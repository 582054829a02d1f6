//! Header analysis across loaded sources
//!
//! Both views are recomputed from scratch whenever the set of loaded sources
//! changes; they hold no state of their own.

use crate::table::TabularSource;
use indexmap::IndexSet;
use std::collections::HashSet;

/// Headers present in every loaded source, in the first source's order.
///
/// Empty when fewer than two sources are loaded, since there is nothing to
/// align against.
pub fn common_headers(sources: &[&TabularSource]) -> Vec<String> {
    let (first, rest) = match sources.split_first() {
        Some(split) if !split.1.is_empty() => split,
        _ => return Vec::new(),
    };

    let others: Vec<HashSet<&str>> = rest
        .iter()
        .map(|s| s.headers().iter().map(String::as_str).collect())
        .collect();

    first
        .headers()
        .iter()
        .filter(|h| others.iter().all(|set| set.contains(h.as_str())))
        .cloned()
        .collect()
}

/// Union of all headers, first-seen order across sources in slot order
pub fn all_headers(sources: &[&TabularSource]) -> Vec<String> {
    let mut seen: IndexSet<&str> = IndexSet::new();
    for source in sources {
        seen.extend(source.headers().iter().map(String::as_str));
    }
    seen.into_iter().map(str::to_string).collect()
}
