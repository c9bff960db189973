use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use kb_common::entry::{CaptureRequest, Entry, SavedEntry};
use kb_common::error::{StatusCode, StoreError};
use kb_common::store::EntryStore;

/// Store that records saves and hands out sequential ids.
#[derive(Default)]
pub struct RecordingStore {
    saved: Mutex<Vec<CaptureRequest>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail.store(true, Ordering::SeqCst);
        store
    }

    pub fn saved(&self) -> Vec<CaptureRequest> {
        self.saved.lock().unwrap().clone()
    }

    pub fn save_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntryStore for RecordingStore {
    async fn list_entries(&self) -> Result<Vec<Entry>, StoreError> {
        Ok(Vec::new())
    }

    async fn search_entries(&self, _query: &str) -> Result<Vec<Entry>, StoreError> {
        Ok(Vec::new())
    }

    async fn save_entry(&self, request: &CaptureRequest) -> Result<SavedEntry, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Upstream {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "backend down".to_string(),
            });
        }
        let mut saved = self.saved.lock().unwrap();
        saved.push(request.clone());
        Ok(SavedEntry {
            id: saved.len() as i64,
            status: Some("success".to_string()),
        })
    }

    async fn summarize(&self, _content: &str) -> Result<String, StoreError> {
        Ok(String::new())
    }
}
