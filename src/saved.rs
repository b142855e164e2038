use std::collections::HashMap;
use tracing::{debug, warn};

use crate::db::KeyValueStore;
use crate::models::SavedJobInfo;

pub const STORAGE_KEY: &str = "career-hunter-saved-jobs";

/// Jobs the user has exported and flagged as saved.
///
/// The whole set is loaded once on open and written back in full after
/// every mutation. Storage failures are logged and otherwise ignored, so
/// the store keeps working for the current session even when the backing
/// store is unavailable.
pub struct SavedJobs {
    store: Box<dyn KeyValueStore>,
    jobs: HashMap<String, SavedJobInfo>,
}

impl SavedJobs {
    pub fn open(store: Box<dyn KeyValueStore>) -> Self {
        let jobs = match load(store.as_ref()) {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("Failed to load saved jobs, starting empty: {:#}", e);
                HashMap::new()
            }
        };
        debug!(count = jobs.len(), "loaded saved jobs");
        Self { store, jobs }
    }

    /// Insert or replace the entry for `job_id` with a fresh timestamp.
    pub fn save_job(&mut self, job_id: &str, file_name: &str) {
        self.jobs.insert(
            job_id.to_string(),
            SavedJobInfo {
                job_id: job_id.to_string(),
                file_name: file_name.to_string(),
                saved_at: chrono::Utc::now().timestamp_millis(),
            },
        );
        self.persist();
    }

    pub fn unsave_job(&mut self, job_id: &str) {
        self.jobs.remove(job_id);
        self.persist();
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.persist();
    }

    pub fn is_job_saved(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn saved_job_info(&self, job_id: &str) -> Option<&SavedJobInfo> {
        self.jobs.get(job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn list(&self) -> Vec<&SavedJobInfo> {
        let mut all: Vec<&SavedJobInfo> = self.jobs.values().collect();
        all.sort_by(|a, b| a.saved_at.cmp(&b.saved_at).then_with(|| a.job_id.cmp(&b.job_id)));
        all
    }

    fn persist(&self) {
        let snapshot: Vec<&SavedJobInfo> = self.list();
        let result = serde_json::to_string(&snapshot)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.store.set(STORAGE_KEY, &json));
        if let Err(e) = result {
            warn!("Failed to persist saved jobs: {:#}", e);
        }
    }
}

fn load(store: &dyn KeyValueStore) -> anyhow::Result<HashMap<String, SavedJobInfo>> {
    let Some(raw) = store.get(STORAGE_KEY)? else {
        return Ok(HashMap::new());
    };
    let parsed: Vec<SavedJobInfo> = serde_json::from_str(&raw)?;
    Ok(parsed
        .into_iter()
        .map(|info| (info.job_id.clone(), info))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shared in-memory map so a test can inspect what was written.
    #[derive(Clone, Default)]
    struct CountingStore {
        data: Rc<RefCell<HashMap<String, String>>>,
        writes: Rc<RefCell<usize>>,
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            Ok(self.data.borrow().get(key).cloned())
        }
        fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            *self.writes.borrow_mut() += 1;
            self.data.borrow_mut().insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Err(anyhow!("disk on fire"))
        }
        fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow!("disk on fire"))
        }
    }

    #[test]
    fn test_save_then_unsave() {
        let mut saved = SavedJobs::open(Box::new(CountingStore::default()));
        saved.save_job("job_1", "job_Tech_Corp_1.csv");
        assert!(saved.is_job_saved("job_1"));
        assert_eq!(
            saved.saved_job_info("job_1").map(|i| i.file_name.as_str()),
            Some("job_Tech_Corp_1.csv")
        );

        saved.unsave_job("job_1");
        assert!(!saved.is_job_saved("job_1"));
        assert!(saved.saved_job_info("job_1").is_none());
    }

    #[test]
    fn test_unsave_unknown_is_noop() {
        let mut saved = SavedJobs::open(Box::new(CountingStore::default()));
        saved.save_job("job_1", "a.csv");
        saved.unsave_job("never-saved");
        assert_eq!(saved.len(), 1);
        assert!(saved.is_job_saved("job_1"));
    }

    #[test]
    fn test_save_is_upsert() {
        let mut saved = SavedJobs::open(Box::new(CountingStore::default()));
        saved.save_job("job_1", "first.csv");
        saved.save_job("job_1", "second.csv");
        assert_eq!(saved.len(), 1);
        assert_eq!(saved.saved_job_info("job_1").unwrap().file_name, "second.csv");
    }

    #[test]
    fn test_every_mutation_rewrites_full_set() {
        let store = CountingStore::default();
        let mut saved = SavedJobs::open(Box::new(store.clone()));
        saved.save_job("a", "a.csv");
        saved.save_job("b", "b.csv");
        saved.unsave_job("a");
        assert_eq!(*store.writes.borrow(), 3);

        let raw = store.get(STORAGE_KEY).unwrap().unwrap();
        let persisted: Vec<SavedJobInfo> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].job_id, "b");
    }

    #[test]
    fn test_reload_from_store() {
        let store = CountingStore::default();
        {
            let mut saved = SavedJobs::open(Box::new(store.clone()));
            saved.save_job("job_1", "a.csv");
            saved.save_job("job_2", "b.csv");
        }
        let saved = SavedJobs::open(Box::new(store));
        assert_eq!(saved.len(), 2);
        assert!(saved.is_job_saved("job_2"));
    }

    #[test]
    fn test_corrupt_value_starts_empty() {
        let store = CountingStore::default();
        store.set(STORAGE_KEY, "{not json").unwrap();
        let saved = SavedJobs::open(Box::new(store));
        assert!(saved.is_empty());
    }

    #[test]
    fn test_broken_store_degrades_to_session_only() {
        let mut saved = SavedJobs::open(Box::new(BrokenStore));
        saved.save_job("job_1", "a.csv");
        assert!(saved.is_job_saved("job_1"));
        saved.unsave_job("job_1");
        assert!(!saved.is_job_saved("job_1"));
    }

    #[test]
    fn test_sqlite_backing() {
        let mut saved = SavedJobs::open(Box::new(Database::open_in_memory().unwrap()));
        saved.save_job("job_1", "a.csv");
        saved.clear();
        assert!(saved.is_empty());
    }
}
