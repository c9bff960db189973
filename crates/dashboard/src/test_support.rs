use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use kb_common::entry::{CaptureRequest, Entry, EntryId, SavedEntry};
use kb_common::error::{StatusCode, StoreError};
use kb_common::store::EntryStore;
use tokio::sync::oneshot;

pub(crate) fn entry(id: EntryId, category: Option<&str>) -> Entry {
    Entry {
        id,
        content: format!("content {id}"),
        page_url: format!("https://site{id}.com/page"),
        page_title: format!("Page {id}"),
        timestamp: "2024-05-01T09:30:00".to_string(),
        category: category.map(str::to_string),
        score: None,
    }
}

pub(crate) fn scored(id: EntryId, score: f64) -> Entry {
    Entry {
        score: Some(score),
        ..entry(id, None)
    }
}

/// In-memory backend with canned answers.
///
/// `gate(key)` makes the search for query `key` (or the summary of content `key`)
/// wait until the returned sender fires. Call counters are bumped before the wait.
#[derive(Default)]
pub(crate) struct ScriptedStore {
    entries: Vec<Entry>,
    search_results: Mutex<HashMap<String, Vec<Entry>>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    fail_list: AtomicBool,
    fail_search: AtomicBool,
    fail_summarize: AtomicBool,
    search_calls: AtomicUsize,
    summarize_calls: AtomicUsize,
}

impl ScriptedStore {
    pub(crate) fn with_entries(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    pub(crate) fn script_search(&self, query: &str, results: Vec<Entry>) {
        self.search_results
            .lock()
            .unwrap()
            .insert(query.to_string(), results);
    }

    pub(crate) fn gate(&self, key: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(key.to_string(), rx);
        tx
    }

    pub(crate) fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_search(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_summarize(&self, fail: bool) {
        self.fail_summarize.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    async fn wait_gate(&self, key: &str) {
        let gate = self.gates.lock().unwrap().remove(key);
        if let Some(rx) = gate {
            let _ = rx.await;
        }
    }
}

fn backend_down() -> StoreError {
    StoreError::Upstream {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: "backend down".to_string(),
    }
}

#[async_trait]
impl EntryStore for ScriptedStore {
    async fn list_entries(&self) -> Result<Vec<Entry>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(backend_down());
        }
        Ok(self.entries.clone())
    }

    async fn search_entries(&self, query: &str) -> Result<Vec<Entry>, StoreError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate(query).await;
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(backend_down());
        }
        let results = self.search_results.lock().unwrap().get(query).cloned();
        Ok(results.unwrap_or_default())
    }

    async fn save_entry(&self, _request: &CaptureRequest) -> Result<SavedEntry, StoreError> {
        Err(StoreError::Validation("read-only store".to_string()))
    }

    async fn summarize(&self, content: &str) -> Result<String, StoreError> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate(content).await;
        if self.fail_summarize.load(Ordering::SeqCst) {
            return Err(backend_down());
        }
        Ok(format!("summary of {content}"))
    }
}
