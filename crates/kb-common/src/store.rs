/// The backend contract the capture bridge and the dashboard depend on.
///
/// `EntryStoreClient` implements it over HTTP. Anything else that can list, search,
/// save and summarize entries can stand in for it.
use async_trait::async_trait;

use crate::entry::{CaptureRequest, Entry, SavedEntry};
use crate::error::StoreError;

#[async_trait]
pub trait EntryStore: Send + Sync {
    /// All entries, in backend order.
    async fn list_entries(&self) -> Result<Vec<Entry>, StoreError>;

    /// Entries ranked by descending relevance, each carrying a `score`.
    /// `query` must not be blank.
    async fn search_entries(&self, query: &str) -> Result<Vec<Entry>, StoreError>;

    /// Persist a capture. Never retried.
    async fn save_entry(&self, request: &CaptureRequest) -> Result<SavedEntry, StoreError>;

    /// Generate a summary for `content`.
    async fn summarize(&self, content: &str) -> Result<String, StoreError>;
}
