/// The dashboard's view state machine.
///
/// Holds the loaded entries, the derived category set, the displayed sequence and
/// the summary cache, and applies the transitions (load, category, search, clear,
/// summarize) as plain synchronous functions. Network calls happen outside: a
/// transition that needs one hands back a ticket, and the result is applied with
/// that ticket once it arrives.
///
/// Every action that replaces `displayed` bumps a generation counter. A search
/// result is applied only if its ticket carries the current generation, so a slow
/// search can never overwrite a later category click, clear, or search.
use std::collections::{HashMap, HashSet};

use kb_common::entry::{Entry, EntryId};
use serde::Serialize;

use crate::chart::{self, Chart};
use crate::error::ViewError;

/// Synthetic category that shows every entry. Always first in the category list.
pub const ALL_ENTRIES: &str = "All Entries";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Loading,
    Browsing,
    Searching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Browse,
    Search,
}

/// Outstanding search request. Only the newest ticket can be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStart {
    /// Blank query: treated as a clear, already applied.
    Cleared,
    /// Issue this search and hand the result back to `apply_search`.
    Fetch(SearchTicket),
}

#[derive(Debug)]
pub struct ViewState {
    all_entries: Vec<Entry>,
    categories: Vec<String>,
    active_category: String,
    displayed: Vec<Entry>,
    phase: Phase,
    loaded: bool,
    generation: u64,
    summaries: HashMap<EntryId, String>,
    summaries_in_flight: HashSet<EntryId>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            all_entries: Vec::new(),
            categories: vec![ALL_ENTRIES.to_string()],
            active_category: ALL_ENTRIES.to_string(),
            displayed: Vec::new(),
            phase: Phase::Loading,
            loaded: false,
            generation: 0,
            summaries: HashMap::new(),
            summaries_in_flight: HashSet::new(),
        }
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Transitions ---

    /// Seed browse state from a successful list fetch.
    pub fn apply_loaded(&mut self, entries: Vec<Entry>) {
        self.categories = derive_categories(&entries);
        self.active_category = ALL_ENTRIES.to_string();
        self.displayed = entries.clone();
        self.all_entries = entries;
        self.phase = Phase::Browsing;
        self.loaded = true;
        self.generation += 1;
    }

    /// Show one category (or everything). Discards any search results.
    pub fn select_category(&mut self, category: &str) -> Result<(), ViewError> {
        if !self.loaded {
            return Err(ViewError::NotLoaded);
        }
        if !self.categories.iter().any(|c| c == category) {
            return Err(ViewError::UnknownCategory(category.to_string()));
        }
        self.active_category = category.to_string();
        self.displayed = filter_by_category(&self.all_entries, category);
        self.phase = Phase::Browsing;
        self.generation += 1;
        Ok(())
    }

    /// Start a search. A blank query clears instead and needs no request.
    pub fn begin_search(&mut self, query: &str) -> SearchStart {
        let query = query.trim();
        if query.is_empty() {
            self.clear_search();
            return SearchStart::Cleared;
        }
        self.generation += 1;
        SearchStart::Fetch(SearchTicket {
            generation: self.generation,
            query: query.to_string(),
        })
    }

    /// Apply search results. Returns `false` (and changes nothing) when the ticket
    /// has been superseded by a later action.
    pub fn apply_search(&mut self, ticket: &SearchTicket, results: Vec<Entry>) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        self.displayed = results;
        self.phase = Phase::Searching;
        true
    }

    /// Return to the active category's entries.
    pub fn clear_search(&mut self) {
        self.displayed = filter_by_category(&self.all_entries, &self.active_category);
        self.phase = if self.loaded {
            Phase::Browsing
        } else {
            Phase::Loading
        };
        self.generation += 1;
    }

    /// Claim the right to request a summary for `id`. `false` if one is cached or
    /// already being fetched.
    pub fn begin_summarize(&mut self, id: EntryId) -> bool {
        if self.summaries.contains_key(&id) || self.summaries_in_flight.contains(&id) {
            return false;
        }
        self.summaries_in_flight.insert(id);
        true
    }

    /// Settle a summary request. Failures leave the slot empty for a retry; an
    /// existing summary is never overwritten.
    pub fn finish_summarize(&mut self, id: EntryId, summary: Option<String>) {
        self.summaries_in_flight.remove(&id);
        if let Some(summary) = summary {
            self.summaries.entry(id).or_insert(summary);
        }
    }

    // --- Reads ---

    pub fn all_entries(&self) -> &[Entry] {
        &self.all_entries
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn active_category(&self) -> &str {
        &self.active_category
    }

    pub fn displayed(&self) -> &[Entry] {
        &self.displayed
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> Mode {
        match self.phase {
            Phase::Searching => Mode::Search,
            Phase::Loading | Phase::Browsing => Mode::Browse,
        }
    }

    pub fn summary(&self, id: EntryId) -> Option<&str> {
        self.summaries.get(&id).map(String::as_str)
    }

    pub fn chart(&self) -> Chart {
        chart::project(&self.displayed, self.mode())
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            phase: self.phase,
            mode: self.mode(),
            active_category: self.active_category.clone(),
            categories: self.categories.clone(),
            total_entries: self.all_entries.len(),
            entries: self
                .displayed
                .iter()
                .map(|entry| DisplayedEntry {
                    summary: self.summaries.get(&entry.id).cloned(),
                    summarizing: self.summaries_in_flight.contains(&entry.id),
                    entry: entry.clone(),
                })
                .collect(),
            chart: self.chart(),
        }
    }
}

/// Everything a UI needs to render one frame of the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub phase: Phase,
    pub mode: Mode,
    pub active_category: String,
    pub categories: Vec<String>,
    pub total_entries: usize,
    pub entries: Vec<DisplayedEntry>,
    pub chart: Chart,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisplayedEntry {
    #[serde(flatten)]
    pub entry: Entry,
    pub summary: Option<String>,
    pub summarizing: bool,
}

/// `ALL_ENTRIES` followed by each distinct category label in first-seen order.
pub fn derive_categories(entries: &[Entry]) -> Vec<String> {
    let mut categories = vec![ALL_ENTRIES.to_string()];
    for entry in entries {
        let label = entry.category_label();
        if !categories.iter().any(|c| c == label) {
            categories.push(label.to_string());
        }
    }
    categories
}

fn filter_by_category(entries: &[Entry], category: &str) -> Vec<Entry> {
    if category == ALL_ENTRIES {
        return entries.to_vec();
    }
    entries
        .iter()
        .filter(|e| e.category_label() == category)
        .cloned()
        .collect()
}
