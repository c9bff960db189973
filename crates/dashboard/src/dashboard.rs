/// Async controller around [`ViewState`].
///
/// Each operation takes the state lock only to run a synchronous transition. The
/// lock is released before any backend call and re-taken to apply the result, so a
/// slow search or summary never blocks category clicks. After every transition the
/// new [`ViewSnapshot`] is published on a `watch` channel for observers.
use std::sync::Arc;

use kb_common::entry::EntryId;
use kb_common::store::EntryStore;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::view_state::{SearchStart, ViewSnapshot, ViewState};

/// What became of a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The query was blank and the search was cleared instead.
    Cleared,
    /// Results were applied; carries the number of hits.
    Applied(usize),
    /// A later action replaced the displayed list before the results arrived.
    Superseded,
}

/// State plus its observers. Shared with in-flight summary slots so they can
/// settle themselves when their request is cancelled.
struct ViewCell {
    state: RwLock<ViewState>,
    updates: watch::Sender<Arc<ViewSnapshot>>,
}

impl ViewCell {
    fn publish(&self, state: &ViewState) {
        self.updates.send_replace(Arc::new(state.snapshot()));
    }
}

/// Owns one entry's in-flight summary slot. Dropped before `settle` (the
/// request future was cancelled), it frees the slot so the entry can be
/// summarized again.
struct SummarySlot {
    cell: Arc<ViewCell>,
    id: EntryId,
    settled: bool,
}

impl SummarySlot {
    /// Record the outcome. Returns the cached summary, if any.
    async fn settle(mut self, summary: Option<String>) -> Option<String> {
        let mut state = self.cell.state.write().await;
        self.settled = true;
        state.finish_summarize(self.id, summary);
        self.cell.publish(&state);
        state.summary(self.id).map(str::to_string)
    }
}

impl Drop for SummarySlot {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let id = self.id;
        debug!(id, "summary request cancelled");
        if let Ok(mut state) = self.cell.state.try_write() {
            state.finish_summarize(id, None);
            self.cell.publish(&state);
            return;
        }
        // Lock is busy; free the slot once it is not.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let cell = Arc::clone(&self.cell);
            runtime.spawn(async move {
                let mut state = cell.state.write().await;
                state.finish_summarize(id, None);
                cell.publish(&state);
            });
        }
    }
}

pub struct Dashboard<S> {
    store: Arc<S>,
    cell: Arc<ViewCell>,
}

impl<S: EntryStore> Dashboard<S> {
    pub fn new(store: Arc<S>) -> Self {
        let state = ViewState::new();
        let (updates, _) = watch::channel(Arc::new(state.snapshot()));
        Self {
            store,
            cell: Arc::new(ViewCell {
                state: RwLock::new(state),
                updates,
            }),
        }
    }

    /// Receive a snapshot after every transition.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ViewSnapshot>> {
        self.cell.updates.subscribe()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<ViewSnapshot> {
        self.cell.updates.borrow().clone()
    }

    /// Fetch every entry and reset to browsing "All Entries". On failure the
    /// previous state is kept.
    pub async fn load(&self) -> Result<(), AppError> {
        let entries = self.store.list_entries().await.inspect_err(|e| {
            warn!(error = %e, "failed to load entries");
        })?;
        info!(count = entries.len(), "entries loaded");

        let mut state = self.cell.state.write().await;
        state.apply_loaded(entries);
        self.cell.publish(&state);
        Ok(())
    }

    pub async fn select_category(&self, category: &str) -> Result<(), AppError> {
        let mut state = self.cell.state.write().await;
        state.select_category(category)?;
        debug!(category, shown = state.displayed().len(), "category selected");
        self.cell.publish(&state);
        Ok(())
    }

    /// Run a semantic search across all entries. A blank query clears.
    ///
    /// On a backend failure the displayed list is left as it was.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome, AppError> {
        let ticket = {
            let mut state = self.cell.state.write().await;
            match state.begin_search(query) {
                SearchStart::Cleared => {
                    self.cell.publish(&state);
                    return Ok(SearchOutcome::Cleared);
                }
                SearchStart::Fetch(ticket) => ticket,
            }
        };

        let results = self
            .store
            .search_entries(&ticket.query)
            .await
            .inspect_err(|e| {
                warn!(query = %ticket.query, error = %e, "search failed");
            })?;

        let hits = results.len();
        let mut state = self.cell.state.write().await;
        if !state.apply_search(&ticket, results) {
            debug!(query = %ticket.query, "search result superseded");
            return Ok(SearchOutcome::Superseded);
        }
        info!(query = %ticket.query, hits, "search applied");
        self.cell.publish(&state);
        Ok(SearchOutcome::Applied(hits))
    }

    pub async fn clear_search(&self) {
        let mut state = self.cell.state.write().await;
        state.clear_search();
        self.cell.publish(&state);
    }

    /// Summary for `id`, requesting one from the backend if none is cached.
    ///
    /// Returns `Ok(None)` when a request for the same id is already in flight.
    /// A failed or cancelled request leaves nothing cached, so a later call can
    /// retry.
    pub async fn summarize(&self, id: EntryId, content: &str) -> Result<Option<String>, AppError> {
        let slot = {
            let mut state = self.cell.state.write().await;
            if let Some(summary) = state.summary(id) {
                return Ok(Some(summary.to_string()));
            }
            if !state.begin_summarize(id) {
                debug!(id, "summary already in flight");
                return Ok(None);
            }
            self.cell.publish(&state);
            SummarySlot {
                cell: Arc::clone(&self.cell),
                id,
                settled: false,
            }
        };

        match self.store.summarize(content).await {
            Ok(summary) => Ok(slot.settle(Some(summary)).await),
            Err(e) => {
                warn!(id, error = %e, "summarize failed");
                slot.settle(None).await;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::test_support::{entry, scored, ScriptedStore};
    use crate::view_state::{Mode, Phase, ALL_ENTRIES};

    use super::*;

    fn seeded() -> Arc<ScriptedStore> {
        Arc::new(ScriptedStore::with_entries(vec![
            entry(1, Some("Tech")),
            entry(2, Some("Science")),
            entry(3, Some("Tech")),
        ]))
    }

    async fn loaded(store: Arc<ScriptedStore>) -> Arc<Dashboard<ScriptedStore>> {
        let dashboard = Arc::new(Dashboard::new(store));
        dashboard.load().await.unwrap();
        dashboard
    }

    fn shown(dashboard: &Dashboard<ScriptedStore>) -> Vec<EntryId> {
        dashboard.snapshot().entries.iter().map(|e| e.entry.id).collect()
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn load_publishes_browse_snapshot() {
        let dashboard = Dashboard::new(seeded());
        let mut updates = dashboard.subscribe();
        assert_eq!(updates.borrow().phase, Phase::Loading);

        dashboard.load().await.unwrap();
        assert!(updates.has_changed().unwrap());
        let snapshot = updates.borrow_and_update().clone();
        assert_eq!(snapshot.phase, Phase::Browsing);
        assert_eq!(snapshot.categories, vec![ALL_ENTRIES, "Tech", "Science"]);
        assert_eq!(snapshot.entries.len(), 3);
    }

    #[tokio::test]
    async fn failed_load_leaves_state_empty() {
        let store = seeded();
        store.fail_list(true);
        let dashboard = Dashboard::new(store);

        let err = dashboard.load().await.unwrap_err();
        assert!(matches!(err, AppError::Store(ref e) if e.is_network()));
        let snapshot = dashboard.snapshot();
        assert_eq!(snapshot.phase, Phase::Loading);
        assert!(snapshot.entries.is_empty());
        assert_eq!(snapshot.total_entries, 0);
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_entries() {
        let store = seeded();
        let dashboard = loaded(store.clone()).await;
        store.fail_list(true);
        assert!(dashboard.load().await.is_err());
        assert_eq!(shown(&dashboard), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn select_category_filters() {
        let dashboard = loaded(seeded()).await;
        dashboard.select_category("Tech").await.unwrap();
        assert_eq!(shown(&dashboard), vec![1, 3]);

        let err = dashboard.select_category("Nope").await.unwrap_err();
        assert!(matches!(err, AppError::View(_)));
        assert_eq!(shown(&dashboard), vec![1, 3]);
    }

    #[tokio::test]
    async fn blank_search_makes_no_request() {
        let store = seeded();
        let dashboard = loaded(store.clone()).await;
        dashboard.select_category("Science").await.unwrap();

        let outcome = dashboard.search("  ").await.unwrap();
        assert_eq!(outcome, SearchOutcome::Cleared);
        assert_eq!(store.search_calls(), 0);
        assert_eq!(shown(&dashboard), vec![2]);
    }

    #[tokio::test]
    async fn search_shows_ranked_results_then_clear_restores() {
        let store = seeded();
        store.script_search("rust", vec![scored(3, 0.9), scored(2, 0.4)]);
        let dashboard = loaded(store.clone()).await;
        dashboard.select_category("Tech").await.unwrap();

        let outcome = dashboard.search("rust").await.unwrap();
        assert_eq!(outcome, SearchOutcome::Applied(2));
        let snapshot = dashboard.snapshot();
        assert_eq!(snapshot.mode, Mode::Search);
        assert_eq!(snapshot.chart.series[0].y, vec![0.9, 0.4]);
        assert_eq!(shown(&dashboard), vec![3, 2]);

        dashboard.clear_search().await;
        assert_eq!(dashboard.snapshot().mode, Mode::Browse);
        assert_eq!(shown(&dashboard), vec![1, 3]);
    }

    #[tokio::test]
    async fn failed_search_keeps_displayed() {
        let store = seeded();
        store.fail_search(true);
        let dashboard = loaded(store.clone()).await;
        dashboard.select_category("Tech").await.unwrap();

        assert!(dashboard.search("anything").await.is_err());
        assert_eq!(dashboard.snapshot().mode, Mode::Browse);
        assert_eq!(shown(&dashboard), vec![1, 3]);
    }

    #[tokio::test]
    async fn category_click_beats_in_flight_search() {
        let store = seeded();
        store.script_search("slow", vec![scored(2, 0.9)]);
        let release = store.gate("slow");
        let dashboard = loaded(store.clone()).await;

        let pending = tokio::spawn({
            let dashboard = dashboard.clone();
            async move { dashboard.search("slow").await }
        });
        wait_until(|| store.search_calls() == 1).await;

        dashboard.select_category("Tech").await.unwrap();
        release.send(()).unwrap();

        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome, SearchOutcome::Superseded);
        assert_eq!(dashboard.snapshot().mode, Mode::Browse);
        assert_eq!(shown(&dashboard), vec![1, 3]);
    }

    #[tokio::test]
    async fn summarize_requests_at_most_once() {
        let store = seeded();
        let release = store.gate("content 1");
        let dashboard = loaded(store.clone()).await;

        let first = tokio::spawn({
            let dashboard = dashboard.clone();
            async move { dashboard.summarize(1, "content 1").await }
        });
        wait_until(|| store.summarize_calls() == 1).await;

        assert!(dashboard.snapshot().entries[0].summarizing);
        assert_eq!(dashboard.summarize(1, "content 1").await.unwrap(), None);

        release.send(()).unwrap();
        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.as_deref(), Some("summary of content 1"));

        let again = dashboard.summarize(1, "content 1").await.unwrap();
        assert_eq!(again, summary);
        assert_eq!(store.summarize_calls(), 1);

        let snapshot = dashboard.snapshot();
        assert!(!snapshot.entries[0].summarizing);
        assert_eq!(snapshot.entries[0].summary, summary);
    }

    #[tokio::test]
    async fn cancelled_summary_can_be_requested_again() {
        let store = seeded();
        let _held = store.gate("content 1");
        let dashboard = loaded(store.clone()).await;

        let pending = tokio::spawn({
            let dashboard = dashboard.clone();
            async move { dashboard.summarize(1, "content 1").await }
        });
        wait_until(|| store.summarize_calls() == 1).await;
        assert!(dashboard.snapshot().entries[0].summarizing);

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());
        assert!(!dashboard.snapshot().entries[0].summarizing);

        let summary = dashboard.summarize(1, "content 1").await.unwrap();
        assert_eq!(summary.as_deref(), Some("summary of content 1"));
        assert_eq!(store.summarize_calls(), 2);
    }

    #[tokio::test]
    async fn failed_summary_is_not_cached() {
        let store = seeded();
        store.fail_summarize(true);
        let dashboard = loaded(store.clone()).await;

        assert!(dashboard.summarize(2, "content 2").await.is_err());
        assert_eq!(dashboard.snapshot().entries[1].summary, None);

        store.fail_summarize(false);
        let summary = dashboard.summarize(2, "content 2").await.unwrap();
        assert_eq!(summary.as_deref(), Some("summary of content 2"));
        assert_eq!(store.summarize_calls(), 2);
    }
}
