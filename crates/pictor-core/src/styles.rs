//! Style table: style ids, localized aliases, and prompt fragments
//!
//! Styles map an identifier (or any of its aliases, in any locale) to a
//! provider-agnostic prompt fragment. Resolution is case-insensitive;
//! `resolve("卡通")` and `resolve("cartoon")` yield the identical entry.

use std::collections::HashMap;

use crate::error::GenerationError;

/// One style with its canonical prompt fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleEntry {
    /// Canonical identifier (e.g. "cartoon")
    pub id: String,
    /// English prompt fragment applied to the request
    pub prompt: String,
    /// Alias strings, any locale
    pub aliases: Vec<String>,
}

/// Read-only style lookup table
pub struct StyleTable {
    entries: Vec<StyleEntry>,
    /// Lowercased id/alias → index into `entries`
    lookup: HashMap<String, usize>,
}

impl StyleTable {
    /// Build the table from (id, fragment) pairs and an id → aliases map.
    ///
    /// Aliases for ids that have no style entry are ignored. A name claimed
    /// by two entries resolves to the earlier one.
    pub fn new(
        styles: Vec<(String, String)>,
        aliases: &HashMap<String, Vec<String>>,
    ) -> Self {
        let mut entries = Vec::with_capacity(styles.len());
        let mut lookup = HashMap::new();
        for (id, prompt) in styles {
            let entry_aliases = aliases.get(&id).cloned().unwrap_or_default();
            let idx = entries.len();
            lookup.entry(id.to_lowercase()).or_insert(idx);
            for alias in &entry_aliases {
                lookup.entry(alias.trim().to_lowercase()).or_insert(idx);
            }
            entries.push(StyleEntry {
                id,
                prompt: prompt.trim().to_string(),
                aliases: entry_aliases,
            });
        }
        Self { entries, lookup }
    }

    /// Resolve a style by id or alias, case-insensitively
    pub fn resolve(&self, name_or_alias: &str) -> Result<&StyleEntry, GenerationError> {
        self.lookup
            .get(&name_or_alias.trim().to_lowercase())
            .map(|&idx| &self.entries[idx])
            .ok_or_else(|| GenerationError::StyleNotFound(name_or_alias.to_string()))
    }

    /// All styles in insertion order
    pub fn list(&self) -> &[StyleEntry] {
        &self.entries
    }
}
