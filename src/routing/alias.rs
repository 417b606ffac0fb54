//! Pathname alias table
//!
//! Exact-match substitution applied after normalization, e.g. `/` -> `/index.html`.

use super::normalize::normalize;
use std::collections::HashMap;

/// Immutable alias table keyed by canonical pathname
#[derive(Debug, Clone, Default)]
pub struct Aliases {
    table: HashMap<String, String>,
}

impl Aliases {
    /// Build an alias table, normalizing both sides
    ///
    /// Targets are normalized too, so an alias can never reintroduce
    /// traversal segments.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let table = entries
            .into_iter()
            .map(|(from, to)| (normalize(from.as_ref()), normalize(to.as_ref())))
            .collect();
        Self { table }
    }

    /// Substitute a canonical pathname when it matches an alias exactly
    pub fn apply<'a>(&'a self, pathname: &'a str) -> &'a str {
        self.table.get(pathname).map_or(pathname, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
