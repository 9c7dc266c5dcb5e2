//! Offline cache manager: structured knowledge cache plus connectivity status

use crate::error::{HelpError, Result};
use crate::index::CacheStore;
use crate::knowledge::{KnowledgeSource, KnowledgeStore};
use crate::matcher::normalize_text;
use crate::storage::{load_json, save_json, ScalarStore};
use crate::types::{now_ms, CacheStats, HelpEntry, HelpSection};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub const OFFLINE_STATUS_KEY: &str = "help-offline-status";

fn default_online() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineStatus {
    #[serde(default = "default_online")]
    pub is_online: bool,
    #[serde(default)]
    pub last_sync: Option<i64>,
    #[serde(default)]
    pub pending_sync: bool,
    /// Fingerprint of the knowledge currently in the cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl Default for OfflineStatus {
    fn default() -> Self {
        Self {
            is_online: true,
            last_sync: None,
            pending_sync: false,
            fingerprint: None,
        }
    }
}

/// Partial update for `OfflineStatus`; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct StatusPatch {
    pub is_online: Option<bool>,
    pub last_sync: Option<Option<i64>>,
    pub pending_sync: Option<bool>,
    pub fingerprint: Option<Option<String>>,
}

impl StatusPatch {
    fn apply(self, status: &mut OfflineStatus) {
        if let Some(v) = self.is_online {
            status.is_online = v;
        }
        if let Some(v) = self.last_sync {
            status.last_sync = v;
        }
        if let Some(v) = self.pending_sync {
            status.pending_sync = v;
        }
        if let Some(v) = self.fingerprint {
            status.fingerprint = v;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

enum StoreState {
    Closed,
    Open(CacheStore),
    Failed,
}

/// Owns the structured cache and the offline status record
pub struct OfflineCacheManager {
    db_path: Option<PathBuf>,
    state: StoreState,
    scalar: Arc<dyn ScalarStore>,
}

impl OfflineCacheManager {
    /// Manager backed by a SQLite file, opened lazily
    pub fn new(db_path: PathBuf, scalar: Arc<dyn ScalarStore>) -> Self {
        Self {
            db_path: Some(db_path),
            state: StoreState::Closed,
            scalar,
        }
    }

    /// Manager backed by an in-memory database (for testing)
    pub fn in_memory(scalar: Arc<dyn ScalarStore>) -> Self {
        Self {
            db_path: None,
            state: StoreState::Closed,
            scalar,
        }
    }

    /// Open the structured store. A failure is logged once; afterwards every
    /// cache operation is a no-op.
    pub fn init(&mut self) -> Result<()> {
        match self.state {
            StoreState::Open(_) => return Ok(()),
            StoreState::Failed => {
                return Err(HelpError::StoreInitFailure("cache store previously failed to open".to_string()))
            }
            StoreState::Closed => {}
        }

        let opened = match &self.db_path {
            Some(path) => CacheStore::open(path),
            None => CacheStore::in_memory(),
        };

        match opened {
            Ok(store) => {
                debug!("Offline cache opened");
                self.state = StoreState::Open(store);
                Ok(())
            }
            Err(e) => {
                let err = HelpError::StoreInitFailure(e.to_string());
                error!("{}; offline cache disabled", err);
                self.state = StoreState::Failed;
                Err(err)
            }
        }
    }

    fn store(&mut self) -> Option<&mut CacheStore> {
        if matches!(self.state, StoreState::Closed) {
            let _ = self.init();
        }
        match &mut self.state {
            StoreState::Open(store) => Some(store),
            _ => None,
        }
    }

    fn read<T: Default>(&mut self, what: &str, f: impl FnOnce(&CacheStore) -> rusqlite::Result<T>) -> T {
        let Some(store) = self.store() else {
            return T::default();
        };
        match f(store) {
            Ok(value) => value,
            Err(e) => {
                warn!("Offline read of {} failed: {}", what, e);
                T::default()
            }
        }
    }

    fn unavailable() -> HelpError {
        HelpError::StoreUnavailable("offline cache is not open".to_string())
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Logs and swallows a write failure, returning the default
    fn degrade<T: Default>(what: &str, outcome: Result<T>) -> T {
        outcome.unwrap_or_else(|e| {
            warn!("Offline write of {} failed: {}", what, e);
            T::default()
        })
    }

    fn store_entries(&mut self, entries: &[HelpEntry]) -> Result<usize> {
        let store = self.store().ok_or_else(Self::unavailable)?;
        let count = store.replace_entries(entries)?;
        info!("Cached {} help entries for offline use", count);

        self.update_status(StatusPatch {
            last_sync: Some(Some(now_ms())),
            ..Default::default()
        });
        Ok(count)
    }

    fn store_sections(&mut self, sections: &[HelpSection]) -> Result<usize> {
        let store = self.store().ok_or_else(Self::unavailable)?;
        let count = store.replace_sections(sections)?;
        info!("Cached {} help sections for offline use", count);
        Ok(count)
    }

    /// Replace the cached entries and stamp `lastSync`. Returns how many
    /// were cached, 0 when the cache is unavailable.
    pub fn cache_entries(&mut self, entries: &[HelpEntry]) -> usize {
        let outcome = self.store_entries(entries);
        Self::degrade("entries", outcome)
    }

    pub fn cache_sections(&mut self, sections: &[HelpSection]) -> usize {
        let outcome = self.store_sections(sections);
        Self::degrade("sections", outcome)
    }

    fn cache_store(&mut self, knowledge: &KnowledgeStore) -> Result<()> {
        self.store_entries(knowledge.entries())?;
        self.store_sections(knowledge.sections())?;
        self.update_status(StatusPatch {
            fingerprint: Some(Some(knowledge.fingerprint())),
            ..Default::default()
        });
        Ok(())
    }

    /// Init and cache a whole knowledge store. Failures are logged only.
    pub fn preload(&mut self, knowledge: &KnowledgeStore) {
        if self.init().is_err() {
            return;
        }
        match self.cache_store(knowledge) {
            Ok(()) => info!("Help system ready for offline use"),
            Err(e) => error!("Failed to preload offline data: {}", e),
        }
    }

    fn clear_store(&mut self) -> Result<()> {
        let store = self.store().ok_or_else(Self::unavailable)?;
        store.clear()?;
        info!("Offline cache cleared");

        self.update_status(StatusPatch {
            last_sync: Some(None),
            fingerprint: Some(None),
            ..Default::default()
        });
        Ok(())
    }

    /// Drop all cached data and reset `lastSync`. Returns false when the
    /// cache could not be cleared.
    pub fn clear_cache(&mut self) -> bool {
        let outcome = self.clear_store().map(|()| true);
        Self::degrade("clear", outcome)
    }

    // -------------------------------------------------------------------------
    // Reads (never fail)
    // -------------------------------------------------------------------------

    pub fn get_entries(&mut self) -> Vec<HelpEntry> {
        self.read("entries", |s| s.all_entries())
    }

    pub fn get_entries_by_section(&mut self, section: &str) -> Vec<HelpEntry> {
        self.read("section entries", |s| s.entries_by_section(section))
    }

    pub fn get_entries_by_keyword(&mut self, keyword: &str) -> Vec<HelpEntry> {
        self.read("keyword entries", |s| s.entries_by_keyword(keyword))
    }

    pub fn get_sections(&mut self) -> Vec<HelpSection> {
        self.read("sections", |s| s.all_sections())
    }

    pub fn get_section(&mut self, id: &str) -> Option<HelpSection> {
        self.read("section", |s| s.get_section(id))
    }

    /// Substring search over cached entries. Entries matching in the
    /// question come before those matching only in answer or aliases.
    pub fn search(&mut self, query: &str, section: Option<&str>) -> Vec<HelpEntry> {
        let needle = normalize_text(query);
        if needle.is_empty() {
            return Vec::new();
        }

        let entries = match section {
            Some(section) => self.get_entries_by_section(section),
            None => self.get_entries(),
        };

        let (mut in_question, in_body): (Vec<HelpEntry>, Vec<HelpEntry>) = entries
            .into_iter()
            .filter(|entry| {
                let text = normalize_text(&format!(
                    "{} {} {}",
                    entry.question,
                    entry.answer,
                    entry.aliases.join(" ")
                ));
                text.contains(&needle)
            })
            .partition(|entry| normalize_text(&entry.question).contains(&needle));

        debug!(
            "Offline search '{}': {} question hits, {} other hits",
            query,
            in_question.len(),
            in_body.len()
        );
        in_question.extend(in_body);
        in_question
    }

    /// Cached keywords with how many entries carry each
    pub fn keyword_counts(&mut self) -> Vec<(String, usize)> {
        self.read("keyword counts", |s| s.keyword_counts())
    }

    pub fn cache_stats(&mut self) -> CacheStats {
        let entries_count = self.read("entry count", |s| s.count_entries());
        let sections_count = self.read("section count", |s| s.count_sections());
        let status = self.get_status();

        CacheStats {
            entries_count,
            sections_count,
            last_sync: status.last_sync,
            is_online: status.is_online,
        }
    }

    // -------------------------------------------------------------------------
    // Status
    // -------------------------------------------------------------------------

    pub fn get_status(&self) -> OfflineStatus {
        load_json(self.scalar.as_ref(), OFFLINE_STATUS_KEY).unwrap_or_default()
    }

    pub fn is_online(&self) -> bool {
        self.get_status().is_online
    }

    /// Merge a patch into the stored status and return the result
    pub fn update_status(&self, patch: StatusPatch) -> OfflineStatus {
        let mut status = self.get_status();
        patch.apply(&mut status);
        if let Err(e) = save_json(self.scalar.as_ref(), OFFLINE_STATUS_KEY, &status) {
            warn!("Could not persist offline status: {}", e);
        }
        status
    }

    /// React to a connectivity transition from the host
    pub fn handle_connectivity(&mut self, event: ConnectivityEvent, source: Option<&dyn KnowledgeSource>) {
        match event {
            ConnectivityEvent::Online => {
                info!("Back online");
                self.update_status(StatusPatch {
                    is_online: Some(true),
                    ..Default::default()
                });
                // failure is already logged and recorded in the status
                let _ = self.sync_when_online(source);
            }
            ConnectivityEvent::Offline => {
                info!("Offline; help will use cached data");
                self.update_status(StatusPatch {
                    is_online: Some(false),
                    ..Default::default()
                });
            }
        }
    }

    /// Resync after reconnecting. With a source whose fingerprint differs
    /// from the cached one, the cache is replaced. Returns whether it was.
    pub fn sync_when_online(&mut self, source: Option<&dyn KnowledgeSource>) -> Result<bool> {
        if !self.is_online() {
            info!("Still offline; skipping sync");
            return Ok(false);
        }

        self.update_status(StatusPatch {
            pending_sync: Some(true),
            ..Default::default()
        });

        let outcome = match source {
            Some(source) => self.resync_from(source),
            None => Ok(false),
        };

        match outcome {
            Ok(recached) => {
                self.update_status(StatusPatch {
                    last_sync: Some(Some(now_ms())),
                    pending_sync: Some(false),
                    ..Default::default()
                });
                info!("Help data synced");
                Ok(recached)
            }
            Err(e) => {
                let err = HelpError::SyncFailure(e.to_string());
                error!("{}", err);
                self.update_status(StatusPatch {
                    pending_sync: Some(false),
                    ..Default::default()
                });
                Err(err)
            }
        }
    }

    fn resync_from(&mut self, source: &dyn KnowledgeSource) -> Result<bool> {
        let knowledge = source.fetch()?;
        let fingerprint = knowledge.fingerprint();

        if self.get_status().fingerprint.as_deref() == Some(fingerprint.as_str()) {
            debug!("Knowledge unchanged ({}); cache kept", fingerprint);
            return Ok(false);
        }

        self.cache_store(&knowledge)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::tests::sample_store;
    use crate::knowledge::FileKnowledgeSource;
    use crate::storage::MemoryScalarStore;
    use tempfile::TempDir;

    fn manager() -> (OfflineCacheManager, MemoryScalarStore) {
        let scalar = MemoryScalarStore::new();
        (OfflineCacheManager::in_memory(Arc::new(scalar.clone())), scalar)
    }

    #[test]
    fn test_reads_lazily_init() {
        let (mut offline, _) = manager();
        assert!(offline.get_entries().is_empty());
        assert!(matches!(offline.state, StoreState::Open(_)));
    }

    #[test]
    fn test_cache_then_read_back() {
        let (mut offline, _) = manager();
        let knowledge = sample_store();

        assert_eq!(offline.cache_entries(&[HelpEntry::new("old", "Pregunta vieja", "x")]), 1);
        assert_eq!(offline.cache_entries(knowledge.entries()), 4);

        assert_eq!(offline.get_entries(), knowledge.entries().to_vec());
        assert!(offline.get_status().last_sync.is_some());
    }

    #[test]
    fn test_offline_search_from_cache() {
        let (mut offline, _) = manager();
        offline.preload(&sample_store());

        offline.handle_connectivity(ConnectivityEvent::Offline, None);
        assert!(!offline.is_online());

        let results = offline.search("producto", None);
        assert_eq!(results.len(), 3);

        assert!(offline.search("asiento", Some("products")).is_empty());
        assert!(offline.search("   ", None).is_empty());
    }

    #[test]
    fn test_offline_search_ranks_question_hits_first() {
        let (mut offline, _) = manager();
        offline.cache_entries(&[
            HelpEntry::new("a", "Como imprimo?", "Puedes exportar a PDF antes."),
            HelpEntry::new("b", "Como exporto reportes?", "Usa el menu."),
        ]);

        let ids: Vec<String> = offline.search("Exportar", None).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a"]);

        let ids: Vec<String> = offline.search("export", None).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_failed_init_degrades() {
        let dir = TempDir::new().unwrap();
        let scalar: Arc<dyn ScalarStore> = Arc::new(MemoryScalarStore::new());
        let mut offline = OfflineCacheManager::new(dir.path().join("missing/deeper/cache.db"), scalar);

        assert!(matches!(offline.init(), Err(HelpError::StoreInitFailure(_))));
        assert!(offline.get_entries().is_empty());
        assert!(offline.search("producto", None).is_empty());
        assert_eq!(offline.cache_entries(sample_store().entries()), 0);
        assert_eq!(offline.cache_sections(sample_store().sections()), 0);
        assert!(!offline.clear_cache());
        assert_eq!(offline.cache_stats().entries_count, 0);
        assert_eq!(offline.get_status().last_sync, None);
    }

    #[test]
    fn test_status_patch_and_malformed_status() {
        let (offline, scalar) = manager();
        scalar.set(OFFLINE_STATUS_KEY, "garbage").unwrap();
        assert_eq!(offline.get_status(), OfflineStatus::default());

        let status = offline.update_status(StatusPatch {
            pending_sync: Some(true),
            ..Default::default()
        });
        assert!(status.pending_sync);
        assert!(status.is_online);
        assert!(offline.get_status().pending_sync);
    }

    #[test]
    fn test_sync_skips_unchanged_knowledge() {
        let (mut offline, _) = manager();
        let knowledge = sample_store();
        offline.preload(&knowledge);

        assert!(!offline.sync_when_online(Some(&knowledge)).unwrap());

        let mut sections = knowledge.sections().to_vec();
        sections[1].entries.clear();
        let changed = KnowledgeStore::from_sections(sections).unwrap();
        assert!(offline.sync_when_online(Some(&changed)).unwrap());
        assert_eq!(offline.get_entries().len(), 3);

        let status = offline.get_status();
        assert!(!status.pending_sync);
        assert_eq!(status.fingerprint, Some(changed.fingerprint()));
    }

    #[test]
    fn test_sync_without_source_stamps_last_sync() {
        let (mut offline, _) = manager();
        assert!(!offline.sync_when_online(None).unwrap());
        assert!(offline.get_status().last_sync.is_some());
    }

    #[test]
    fn test_sync_failure_resets_pending() {
        let (mut offline, _) = manager();
        let source = FileKnowledgeSource::new(PathBuf::from("/nonexistent/help.yaml"));

        let err = offline.sync_when_online(Some(&source)).unwrap_err();
        assert!(matches!(err, HelpError::SyncFailure(_)));
        assert!(!offline.get_status().pending_sync);
    }

    #[test]
    fn test_sync_skipped_while_offline() {
        let (mut offline, _) = manager();
        offline.handle_connectivity(ConnectivityEvent::Offline, None);
        assert!(!offline.sync_when_online(Some(&sample_store())).unwrap());
        assert!(offline.get_entries().is_empty());
    }

    #[test]
    fn test_back_online_resyncs() {
        let (mut offline, _) = manager();
        offline.handle_connectivity(ConnectivityEvent::Offline, None);
        offline.handle_connectivity(ConnectivityEvent::Online, Some(&sample_store()));

        assert!(offline.is_online());
        assert_eq!(offline.get_entries().len(), 4);
    }

    #[test]
    fn test_clear_cache_resets_last_sync() {
        let (mut offline, _) = manager();
        offline.preload(&sample_store());
        assert_eq!(offline.cache_stats().sections_count, 2);

        assert!(offline.clear_cache());
        let stats = offline.cache_stats();
        assert_eq!(stats.entries_count, 0);
        assert_eq!(stats.last_sync, None);
        assert_eq!(offline.get_status().fingerprint, None);
    }

    #[test]
    fn test_keyword_and_section_reads() {
        let (mut offline, _) = manager();
        offline.preload(&sample_store());

        assert_eq!(offline.get_entries_by_keyword("foto").len(), 1);
        assert!(offline.keyword_counts().contains(&("producto".to_string(), 3)));
        assert_eq!(offline.get_entries_by_section("accounting").len(), 1);
        assert_eq!(offline.get_section("products").unwrap().label, "Productos");
        assert!(offline.get_section("nope").is_none());
    }
}
