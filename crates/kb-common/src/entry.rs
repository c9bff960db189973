use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Category label used for entries the backend returned without one.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Backend-assigned primary key.
pub type EntryId = i64;

/// A captured highlight or image reference, as returned by the backend.
///
/// Entries are read-only on the client. Optional fields stay optional here;
/// defaults are substituted where they are consumed (category filtering, charts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    /// Selected text, or the image source URL for image captures.
    pub content: String,
    pub page_url: String,
    pub page_title: String,
    /// ISO-8601 capture instant exactly as the backend sent it.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Relevance, present only on search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Entry {
    /// The category this entry is filed under, with absent categories mapped to
    /// [`UNCATEGORIZED`].
    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or(UNCATEGORIZED)
    }
}

/// Payload for `POST /save_entry`. Built once per capture gesture and dropped
/// after the backend answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub content: String,
    pub page_url: String,
    pub page_title: String,
    pub timestamp: String,
}

impl CaptureRequest {
    /// Build a request stamped with the current instant.
    pub fn now(content: String, page_url: String, page_title: String) -> Self {
        Self {
            content,
            page_url,
            page_title,
            timestamp: iso_timestamp_now(),
        }
    }
}

/// Response of a successful save. The backend may add fields beyond `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEntry {
    pub id: EntryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

/// Current UTC instant in the `2024-05-01T09:30:00.123Z` shape browsers emit.
pub fn iso_timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
