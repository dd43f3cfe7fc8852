//! Source config and the in-memory `SourceCollection` every plugin composes
//! to hold its per-source entity lists (spec.md §4.9).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub properties: serde_json::Value,
    /// Absolute path of the YAML file this source was declared in, injected
    /// at parse time; empty for sources created purely through the API.
    #[serde(default)]
    pub origin: String,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub enabled: bool,
    pub labels: HashMap<String, String>,
    pub properties: serde_json::Value,
    pub origin: String,
}

impl From<SourceConfig> for Source {
    fn from(c: SourceConfig) -> Self {
        Self {
            id: c.id,
            name: c.name,
            source_type: c.source_type,
            enabled: c.enabled,
            labels: c.labels,
            properties: c.properties,
            origin: c.origin,
        }
    }
}

/// Per-plugin `map<sourceId, list<Entity>>` guarded by a single
/// reader-writer lock. `Merge` replaces entries for one origin while
/// leaving other origins' entries untouched, so concurrent `Apply` on
/// different sources can proceed in parallel provided callers scope their
/// writes to a single source id (as `Refresh`/`Apply` always do).
pub struct SourceCollection<E> {
    entries: RwLock<HashMap<String, Vec<E>>>,
    sources: RwLock<HashMap<String, Source>>,
}

impl<E: Clone> Default for SourceCollection<E> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            sources: RwLock::new(HashMap::new()),
        }
    }
}

impl<E: Clone> SourceCollection<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_source(&self, source: Source) {
        self.sources.write().insert(source.id.clone(), source);
    }

    #[must_use]
    pub fn get_source(&self, id: &str) -> Option<Source> {
        self.sources.read().get(id).cloned()
    }

    #[must_use]
    pub fn list_sources(&self) -> Vec<Source> {
        self.sources.read().values().cloned().collect()
    }

    /// Removes a source and all entities loaded from it.
    pub fn remove_source(&self, id: &str) {
        self.sources.write().remove(id);
        self.entries.write().remove(id);
    }

    /// Replaces the entity list for `origin` (a source id), returning
    /// `(loaded, removed)` counts for the refresh result.
    pub fn merge(&self, origin: &str, entities: Vec<E>) -> (u64, u64) {
        let mut guard = self.entries.write();
        let previous_len = guard.get(origin).map_or(0, Vec::len);
        let loaded_len = entities.len();
        guard.insert(origin.to_owned(), entities);
        let loaded = loaded_len as u64;
        let removed = previous_len.saturating_sub(loaded_len) as u64;
        (loaded, removed)
    }

    #[must_use]
    pub fn entity_count(&self, origin: &str) -> usize {
        self.entries.read().get(origin).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn total_entity_count(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    /// Snapshot of every entity across every source, for `list`/`get`
    /// handlers. Cloning here keeps the read lock short-lived.
    #[must_use]
    pub fn all(&self) -> Vec<E> {
        self.entries.read().values().flatten().cloned().collect()
    }
}

pub type SharedSourceCollection<E> = Arc<SourceCollection<E>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Entry(u32);

    #[test]
    fn merge_replaces_only_the_given_origin() {
        let col: SourceCollection<Entry> = SourceCollection::new();
        col.merge("a", vec![Entry(1), Entry(2)]);
        col.merge("b", vec![Entry(3)]);
        assert_eq!(col.total_entity_count(), 3);

        let (loaded, removed) = col.merge("a", vec![Entry(4)]);
        assert_eq!(loaded, 1);
        assert_eq!(removed, 1);
        assert_eq!(col.total_entity_count(), 2);
        assert_eq!(col.entity_count("b"), 1);
    }

    #[test]
    fn remove_source_drops_its_entities() {
        let col: SourceCollection<Entry> = SourceCollection::new();
        col.upsert_source(Source {
            id: "a".into(),
            name: "A".into(),
            source_type: "file".into(),
            enabled: true,
            labels: HashMap::new(),
            properties: serde_json::Value::Null,
            origin: String::new(),
        });
        col.merge("a", vec![Entry(1)]);
        col.remove_source("a");
        assert_eq!(col.total_entity_count(), 0);
        assert!(col.get_source("a").is_none());
    }
}
