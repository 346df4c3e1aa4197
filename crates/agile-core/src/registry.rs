use crate::document::{DocumentKey, DocumentRecord, DocumentStatus};
use crate::error::{AgileError, Result};
use crate::paths;
use crate::search::{SearchHit, SearchIndex};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

// ---------------------------------------------------------------------------
// On-disk shape
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    documents: BTreeMap<String, BTreeMap<String, DocumentRecord>>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

// ---------------------------------------------------------------------------
// DocumentRegistry
// ---------------------------------------------------------------------------

/// Authoritative set of generated-artifact metadata keyed by
/// `(category, name)`. Records are never deleted, only archived.
#[derive(Debug, Clone, Default)]
pub struct DocumentRegistry {
    /// Insertion order.
    records: Vec<DocumentRecord>,
    index: HashMap<DocumentKey, usize>,
    next_seq: u64,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Load the registry file. A missing file is an empty registry.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::document_registry_path(root);
        let Some(data) = crate::io::read_optional(&path)? else {
            return Ok(Self::new());
        };
        let file: RegistryFile = serde_json::from_str(&data)?;

        let mut records: Vec<DocumentRecord> = file
            .documents
            .into_iter()
            .flat_map(|(category, by_name)| {
                by_name.into_iter().map(move |(name, mut record)| {
                    record.category = category.clone();
                    record.name = name;
                    record
                })
            })
            .collect();
        records.sort_by_key(|r| r.seq);

        let mut registry = Self::new();
        for record in records {
            registry.next_seq = registry.next_seq.max(record.seq + 1);
            registry.index.insert(record.key(), registry.records.len());
            registry.records.push(record);
        }
        tracing::debug!(documents = registry.records.len(), "loaded document registry");
        Ok(registry)
    }

    /// Overwrite the registry file with this registry's contents.
    pub fn save(&self, root: &Path) -> Result<()> {
        crate::io::with_exclusive_lock(&paths::document_registry_lock_path(root), || {
            self.write_file(root)
        })
    }

    /// Read-modify-write the on-disk registry under the registry lock, so
    /// writers in other processes cannot interleave between load and save.
    pub fn update<T>(
        root: &Path,
        f: impl FnOnce(&mut DocumentRegistry) -> Result<T>,
    ) -> Result<T> {
        crate::io::with_exclusive_lock(&paths::document_registry_lock_path(root), || {
            let mut registry = Self::load(root)?;
            let out = f(&mut registry)?;
            registry.write_file(root)?;
            Ok(out)
        })
    }

    fn write_file(&self, root: &Path) -> Result<()> {
        let mut documents: BTreeMap<String, BTreeMap<String, DocumentRecord>> = BTreeMap::new();
        for record in &self.records {
            documents
                .entry(record.category.clone())
                .or_default()
                .insert(record.name.clone(), record.clone());
        }
        let file = RegistryFile {
            version: 1,
            documents,
        };
        let data = serde_json::to_string_pretty(&file)?;
        crate::io::atomic_write(&paths::document_registry_path(root), data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Insert a record, or overwrite the mutable fields of an existing one.
    ///
    /// `created_at` and the insertion position are fixed by the first upsert;
    /// `updated_at` is refreshed on every call. Upserting an archived key
    /// re-activates it.
    pub fn upsert(&mut self, record: DocumentRecord) -> Result<UpsertOutcome> {
        record.validate()?;
        let now = Utc::now();
        let key = record.key();

        if let Some(&i) = self.index.get(&key) {
            let existing = &mut self.records[i];
            existing.path = record.path;
            existing.summary = record.summary;
            existing.token_counts = record.token_counts;
            existing.agent = record.agent;
            existing.dependencies = record.dependencies;
            existing.status = DocumentStatus::Active;
            existing.archived_at = None;
            existing.updated_at = now.max(existing.created_at);
            tracing::info!(document = %key, "updated document");
            return Ok(UpsertOutcome::Updated);
        }

        let mut record = record;
        record.status = DocumentStatus::Active;
        record.archived_at = None;
        record.created_at = now;
        record.updated_at = now;
        record.seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(key.clone(), self.records.len());
        self.records.push(record);
        tracing::info!(document = %key, "registered document");
        Ok(UpsertOutcome::Created)
    }

    /// Archive a record. It disappears from default listings and search but
    /// stays retrievable through [`get`](Self::get).
    pub fn remove(&mut self, category: &str, name: &str) -> Result<()> {
        let i = self.position(category, name)?;
        let record = &mut self.records[i];
        if !record.is_archived() {
            let now = Utc::now();
            record.status = DocumentStatus::Archived;
            record.archived_at = Some(now);
            record.updated_at = now.max(record.created_at);
            tracing::info!(document = %record.key(), "archived document");
        }
        Ok(())
    }

    /// Take `record` as-is from another copy of the registry. An existing key
    /// keeps its `created_at` and listing position; everything else is
    /// replaced. A new key goes to the end.
    fn merge(&mut self, mut record: DocumentRecord) {
        let key = record.key();
        if let Some(&i) = self.index.get(&key) {
            let existing = &self.records[i];
            record.seq = existing.seq;
            record.created_at = existing.created_at.min(record.created_at);
            self.records[i] = record;
            return;
        }
        record.seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(key, self.records.len());
        self.records.push(record);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Fetch a record, archived or not.
    pub fn get(&self, category: &str, name: &str) -> Result<&DocumentRecord> {
        self.position(category, name).map(|i| &self.records[i])
    }

    /// Active records in `category`, in insertion order. The iterator is lazy
    /// and can be restarted by cloning it. An unknown category yields nothing.
    pub fn list_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a DocumentRecord> + Clone + 'a {
        self.records
            .iter()
            .filter(move |r| r.category == category && !r.is_archived())
    }

    /// Every record in insertion order, archived ones included.
    pub fn iter(&self) -> impl Iterator<Item = &DocumentRecord> + Clone {
        self.records.iter()
    }

    /// Active records in insertion order.
    pub fn active(&self) -> impl Iterator<Item = &DocumentRecord> + Clone {
        self.records.iter().filter(|r| !r.is_archived())
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for r in &self.records {
            if !seen.contains(&r.category.as_str()) {
                seen.push(&r.category);
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, category: &str, name: &str) -> Result<usize> {
        self.index
            .get(&DocumentKey::new(category, name))
            .copied()
            .ok_or_else(|| AgileError::NotFound {
                category: category.to_string(),
                name: name.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// SharedRegistry
// ---------------------------------------------------------------------------

struct Shared {
    registry: DocumentRegistry,
    index: SearchIndex,
    /// Keys mutated through this handle since the last save.
    touched: BTreeSet<DocumentKey>,
}

/// A registry handle that can be passed to several dispatchers. Every call
/// takes a single lock, so concurrent upserts to one key are last-writer-wins.
/// The search index is rebuilt after each mutation.
///
/// [`save`](Self::save) merges only the keys this handle touched into the
/// current file, so handles in other processes that wrote other keys in the
/// meantime keep their records.
#[derive(Clone)]
pub struct SharedRegistry {
    inner: Arc<Mutex<Shared>>,
}

impl SharedRegistry {
    pub fn new(registry: DocumentRegistry) -> Self {
        let index = SearchIndex::build(&registry);
        Self {
            inner: Arc::new(Mutex::new(Shared {
                registry,
                index,
                touched: BTreeSet::new(),
            })),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        Ok(Self::new(DocumentRegistry::load(root)?))
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // Mutations are single-step, so a poisoned lock still guards
        // consistent data.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn upsert(&self, record: DocumentRecord) -> Result<(UpsertOutcome, DocumentRecord)> {
        let mut shared = self.lock();
        let key = record.key();
        let outcome = shared.registry.upsert(record)?;
        let Shared {
            registry,
            index,
            touched,
        } = &mut *shared;
        index.rebuild(registry);
        let stored = registry.get(&key.category, &key.name)?.clone();
        touched.insert(key);
        Ok((outcome, stored))
    }

    pub fn get(&self, category: &str, name: &str) -> Result<DocumentRecord> {
        self.lock().registry.get(category, name).cloned()
    }

    pub fn list_by_category(&self, category: &str) -> Vec<DocumentRecord> {
        self.lock()
            .registry
            .list_by_category(category)
            .cloned()
            .collect()
    }

    pub fn remove(&self, category: &str, name: &str) -> Result<()> {
        let mut shared = self.lock();
        shared.registry.remove(category, name)?;
        let Shared {
            registry,
            index,
            touched,
        } = &mut *shared;
        index.rebuild(registry);
        touched.insert(DocumentKey::new(category, name));
        Ok(())
    }

    pub fn search(&self, term: &str) -> Result<Vec<SearchHit>> {
        let shared = self.lock();
        shared.index.search(&shared.registry, term)
    }

    /// A point-in-time copy of the registry.
    pub fn snapshot(&self) -> DocumentRegistry {
        self.lock().registry.clone()
    }

    /// Write this handle's changes into the registry file.
    ///
    /// Under the registry file lock, the file is reloaded, every touched
    /// record replaces its on-disk counterpart, and the merged result is
    /// written back. The handle then holds the merged registry.
    pub fn save(&self, root: &Path) -> Result<()> {
        let mut shared = self.lock();
        let Shared {
            registry,
            index,
            touched,
        } = &mut *shared;

        let merged = DocumentRegistry::update(root, |on_disk| {
            for record in registry.iter().filter(|r| touched.contains(&r.key())) {
                on_disk.merge(record.clone());
            }
            Ok(on_disk.clone())
        })?;
        tracing::debug!(
            merged = touched.len(),
            documents = merged.len(),
            "saved document registry"
        );

        *registry = merged;
        index.rebuild(registry);
        touched.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rec(category: &str, name: &str) -> DocumentRecord {
        DocumentRecord::new(category, name, format!("{category}/{name}.md"))
    }

    #[test]
    fn upsert_then_get() {
        let mut reg = DocumentRegistry::new();
        let outcome = reg
            .upsert(rec("research", "market").with_summary("first"))
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        let got = reg.get("research", "market").unwrap();
        assert_eq!(got.summary, "first");
        assert_eq!(got.created_at, got.updated_at);
    }

    #[test]
    fn upsert_preserves_created_and_overwrites_mutable_fields() {
        let mut reg = DocumentRegistry::new();
        reg.upsert(rec("docs", "a").with_summary("v1").with_tokens(10, None))
            .unwrap();
        let created = reg.get("docs", "a").unwrap().created_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        let outcome = reg
            .upsert(
                DocumentRecord::new("docs", "a", "docs/a-v2.md")
                    .with_summary("v2")
                    .with_tokens(20, Some(7)),
            )
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        let got = reg.get("docs", "a").unwrap();
        assert_eq!(got.summary, "v2");
        assert_eq!(got.path, "docs/a-v2.md");
        assert_eq!(got.token_counts.markdown, 20);
        assert_eq!(got.token_counts.json, Some(7));
        assert_eq!(got.created_at, created);
        assert!(got.updated_at > created);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn upsert_rejects_malformed() {
        let mut reg = DocumentRegistry::new();
        let err = reg.upsert(DocumentRecord::new("docs", "a", "")).unwrap_err();
        assert!(matches!(err, AgileError::Validation(_)));
        assert!(reg.is_empty());
    }

    #[test]
    fn get_missing_is_not_found() {
        let reg = DocumentRegistry::new();
        assert!(matches!(
            reg.get("docs", "nope"),
            Err(AgileError::NotFound { .. })
        ));
    }

    #[test]
    fn list_by_category_insertion_order_and_restartable() {
        let mut reg = DocumentRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            reg.upsert(rec("docs", name)).unwrap();
        }
        reg.upsert(rec("other", "x")).unwrap();

        let listing = reg.list_by_category("docs");
        let first: Vec<_> = listing.clone().map(|r| r.name.as_str()).collect();
        let second: Vec<_> = listing.map(|r| r.name.as_str()).collect();
        assert_eq!(first, vec!["zeta", "alpha", "mid"]);
        assert_eq!(first, second);
        assert_eq!(reg.list_by_category("unknown").count(), 0);
    }

    #[test]
    fn remove_archives_but_keeps_get() {
        let mut reg = DocumentRegistry::new();
        reg.upsert(rec("docs", "a")).unwrap();
        reg.upsert(rec("docs", "b")).unwrap();
        reg.remove("docs", "a").unwrap();

        let names: Vec<_> = reg.list_by_category("docs").map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["b"]);
        let archived = reg.get("docs", "a").unwrap();
        assert!(archived.is_archived());
        assert!(archived.archived_at.is_some());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn remove_missing_is_not_found() {
        let mut reg = DocumentRegistry::new();
        assert!(matches!(
            reg.remove("docs", "ghost"),
            Err(AgileError::NotFound { .. })
        ));
    }

    #[test]
    fn upsert_reactivates_archived() {
        let mut reg = DocumentRegistry::new();
        reg.upsert(rec("docs", "a")).unwrap();
        reg.remove("docs", "a").unwrap();
        reg.upsert(rec("docs", "a").with_summary("regenerated")).unwrap();
        let got = reg.get("docs", "a").unwrap();
        assert!(!got.is_archived());
        assert!(got.archived_at.is_none());
        assert_eq!(reg.list_by_category("docs").count(), 1);
    }

    #[test]
    fn save_load_preserves_insertion_order() {
        let dir = TempDir::new().unwrap();
        let mut reg = DocumentRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            reg.upsert(rec("docs", name)).unwrap();
        }
        reg.remove("docs", "alpha").unwrap();
        reg.save(dir.path()).unwrap();

        let loaded = DocumentRegistry::load(dir.path()).unwrap();
        let names: Vec<_> = loaded.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert!(loaded.get("docs", "alpha").unwrap().is_archived());

        let mut loaded = loaded;
        loaded.upsert(rec("docs", "new")).unwrap();
        assert_eq!(loaded.get("docs", "new").unwrap().seq, 3);
    }

    #[test]
    fn file_layout_is_category_then_name() {
        let dir = TempDir::new().unwrap();
        let mut reg = DocumentRegistry::new();
        reg.upsert(rec("research", "market")).unwrap();
        reg.save(dir.path()).unwrap();

        let raw = std::fs::read_to_string(paths::document_registry_path(dir.path())).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["documents"]["research"]["market"]["path"], "research/market.md");
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(DocumentRegistry::load(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn shared_registry_concurrent_upserts_last_writer_wins() {
        let shared = SharedRegistry::new(DocumentRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let s = shared.clone();
                std::thread::spawn(move || {
                    s.upsert(rec("docs", "hot").with_summary(format!("writer {i}")))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snap = shared.snapshot();
        assert_eq!(snap.len(), 1);
        assert!(snap.get("docs", "hot").unwrap().summary.starts_with("writer "));
    }

    #[test]
    fn separately_loaded_handles_keep_each_others_keys() {
        let dir = TempDir::new().unwrap();
        DocumentRegistry::new().save(dir.path()).unwrap();

        let a = SharedRegistry::load(dir.path()).unwrap();
        let b = SharedRegistry::load(dir.path()).unwrap();
        a.upsert(rec("docs", "from-a")).unwrap();
        a.save(dir.path()).unwrap();
        b.upsert(rec("research", "from-b")).unwrap();
        b.save(dir.path()).unwrap();

        let reloaded = DocumentRegistry::load(dir.path()).unwrap();
        assert!(reloaded.get("docs", "from-a").is_ok());
        assert!(reloaded.get("research", "from-b").is_ok());
        let names: Vec<_> = reloaded.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["from-a", "from-b"]);
        // The later writer now sees both.
        assert_eq!(b.snapshot().len(), 2);
    }

    #[test]
    fn separately_loaded_handles_same_key_last_writer_wins() {
        let dir = TempDir::new().unwrap();
        let mut seed = DocumentRegistry::new();
        seed.upsert(rec("docs", "shared").with_summary("seed")).unwrap();
        seed.save(dir.path()).unwrap();
        let created = seed.get("docs", "shared").unwrap().created_at;

        let a = SharedRegistry::load(dir.path()).unwrap();
        let b = SharedRegistry::load(dir.path()).unwrap();
        a.upsert(rec("docs", "shared").with_summary("from a")).unwrap();
        b.upsert(rec("docs", "shared").with_summary("from b")).unwrap();
        a.save(dir.path()).unwrap();
        b.save(dir.path()).unwrap();

        let got = DocumentRegistry::load(dir.path()).unwrap();
        assert_eq!(got.len(), 1);
        let record = got.get("docs", "shared").unwrap();
        assert_eq!(record.summary, "from b");
        assert_eq!(record.created_at, created);
    }

    #[test]
    fn stale_handle_does_not_undo_archive_of_untouched_key() {
        let dir = TempDir::new().unwrap();
        let mut seed = DocumentRegistry::new();
        seed.upsert(rec("docs", "old")).unwrap();
        seed.save(dir.path()).unwrap();

        let stale = SharedRegistry::load(dir.path()).unwrap();
        DocumentRegistry::update(dir.path(), |r| r.remove("docs", "old")).unwrap();
        stale.upsert(rec("docs", "new")).unwrap();
        stale.save(dir.path()).unwrap();

        let got = DocumentRegistry::load(dir.path()).unwrap();
        assert!(got.get("docs", "old").unwrap().is_archived());
        assert!(!got.get("docs", "new").unwrap().is_archived());
    }

    #[test]
    fn concurrent_handles_on_threads_all_persist() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let root = root.clone();
                std::thread::spawn(move || {
                    let own = SharedRegistry::load(&root).unwrap();
                    own.upsert(rec("docs", &format!("doc-{i}"))).unwrap();
                    own.save(&root).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let got = DocumentRegistry::load(&root).unwrap();
        assert_eq!(got.len(), 8);
        for i in 0..8 {
            assert!(got.get("docs", &format!("doc-{i}")).is_ok());
        }
    }

    #[test]
    fn update_failure_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let mut seed = DocumentRegistry::new();
        seed.upsert(rec("docs", "a")).unwrap();
        seed.save(dir.path()).unwrap();
        let before = std::fs::read_to_string(paths::document_registry_path(dir.path())).unwrap();

        let err = DocumentRegistry::update(dir.path(), |r| r.remove("docs", "ghost")).unwrap_err();
        assert!(matches!(err, AgileError::NotFound { .. }));
        let after = std::fs::read_to_string(paths::document_registry_path(dir.path())).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn shared_registry_search_tracks_mutations() {
        let shared = SharedRegistry::new(DocumentRegistry::new());
        shared
            .upsert(rec("docs", "auth_flow").with_summary("login"))
            .unwrap();
        assert_eq!(shared.search("auth").unwrap().len(), 1);
        shared.remove("docs", "auth_flow").unwrap();
        assert!(shared.search("auth").unwrap().is_empty());
        assert!(shared.get("docs", "auth_flow").unwrap().is_archived());
    }
}
