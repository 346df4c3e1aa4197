use crate::document::{DocumentKey, DocumentRecord};
use crate::error::{AgileError, Result};
use crate::registry::DocumentRegistry;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Category,
    Name,
    Summary,
    Agent,
}

impl FieldName {
    pub fn all() -> &'static [FieldName] {
        &[
            FieldName::Category,
            FieldName::Name,
            FieldName::Summary,
            FieldName::Agent,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldName::Category => "category",
            FieldName::Name => "name",
            FieldName::Summary => "summary",
            FieldName::Agent => "agent",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub record: DocumentRecord,
    pub matched_fields: BTreeSet<FieldName>,
}

// ---------------------------------------------------------------------------
// SearchIndex
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    key: DocumentKey,
    /// Case-folded field values, in `FieldName::all()` order.
    folded: [String; 4],
}

/// Derived, rebuildable view over the active records of a
/// [`DocumentRegistry`]. Holds only keys and case-folded copies of the
/// searchable fields; records are resolved through the registry at query time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchIndex {
    entries: Vec<Entry>,
}

impl SearchIndex {
    pub fn build(registry: &DocumentRegistry) -> Self {
        let entries = registry
            .active()
            .map(|r| Entry {
                key: r.key(),
                folded: [
                    r.category.to_lowercase(),
                    r.name.to_lowercase(),
                    r.summary.to_lowercase(),
                    r.agent.to_lowercase(),
                ],
            })
            .collect();
        Self { entries }
    }

    /// Replace the index contents with a fresh scan of `registry`.
    pub fn rebuild(&mut self, registry: &DocumentRegistry) {
        *self = Self::build(registry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive substring search over category, name, summary and
    /// agent. Hits come back in registry insertion order; there is no
    /// scoring. Keys that no longer resolve to an active record are skipped.
    pub fn search(&self, registry: &DocumentRegistry, term: &str) -> Result<Vec<SearchHit>> {
        let term = term.trim();
        if term.is_empty() {
            return Err(AgileError::InvalidSearch);
        }
        let needle = term.to_lowercase();

        let mut hits = Vec::new();
        for entry in &self.entries {
            let matched_fields: BTreeSet<FieldName> = FieldName::all()
                .iter()
                .zip(entry.folded.iter())
                .filter(|(_, value)| value.contains(&needle))
                .map(|(field, _)| *field)
                .collect();
            if matched_fields.is_empty() {
                continue;
            }
            let Ok(record) = registry.get(&entry.key.category, &entry.key.name) else {
                continue;
            };
            if record.is_archived() {
                continue;
            }
            hits.push(SearchHit {
                record: record.clone(),
                matched_fields,
            });
        }
        Ok(hits)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
