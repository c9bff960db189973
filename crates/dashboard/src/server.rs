/// JSON API over a [`Dashboard`].
///
/// Every mutating route answers with the snapshot that resulted, so a front end
/// can render straight from the response or from a later `GET /api/state`.
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use kb_common::entry::EntryId;
use kb_common::store::EntryStore;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chart::Chart;
use crate::dashboard::Dashboard;
use crate::error::AppError;
use crate::view_state::ViewSnapshot;

type Shared<S> = State<Arc<Dashboard<S>>>;

pub fn create_router<S: EntryStore + 'static>(dashboard: Arc<Dashboard<S>>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/state", get(handle_state::<S>))
        .route("/api/chart", get(handle_chart::<S>))
        .route("/api/load", post(handle_load::<S>))
        .route("/api/category", post(handle_category::<S>))
        .route("/api/search", post(handle_search::<S>))
        .route("/api/search/clear", post(handle_clear_search::<S>))
        .route("/api/summarize", post(handle_summarize::<S>))
        .with_state(dashboard)
}

#[derive(Debug, Deserialize)]
struct CategoryRequest {
    category: String,
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
}

#[derive(Debug, Deserialize)]
struct SummarizeBody {
    id: EntryId,
    content: String,
}

#[derive(Debug, Serialize)]
struct SummarizeReply {
    id: EntryId,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::View(_) => StatusCode::BAD_REQUEST,
            AppError::Store(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            AppError::Store(e) if e.is_network() => StatusCode::BAD_GATEWAY,
            AppError::Store(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_state<S: EntryStore>(State(dashboard): Shared<S>) -> Json<ViewSnapshot> {
    Json(ViewSnapshot::clone(&dashboard.snapshot()))
}

async fn handle_chart<S: EntryStore>(State(dashboard): Shared<S>) -> Json<Chart> {
    Json(dashboard.snapshot().chart.clone())
}

async fn handle_load<S: EntryStore>(
    State(dashboard): Shared<S>,
) -> Result<Json<ViewSnapshot>, AppError> {
    dashboard.load().await?;
    Ok(Json(ViewSnapshot::clone(&dashboard.snapshot())))
}

async fn handle_category<S: EntryStore>(
    State(dashboard): Shared<S>,
    Json(body): Json<CategoryRequest>,
) -> Result<Json<ViewSnapshot>, AppError> {
    dashboard.select_category(&body.category).await?;
    Ok(Json(ViewSnapshot::clone(&dashboard.snapshot())))
}

async fn handle_search<S: EntryStore>(
    State(dashboard): Shared<S>,
    Json(body): Json<SearchRequest>,
) -> Result<Json<ViewSnapshot>, AppError> {
    dashboard.search(&body.query).await?;
    Ok(Json(ViewSnapshot::clone(&dashboard.snapshot())))
}

async fn handle_clear_search<S: EntryStore>(State(dashboard): Shared<S>) -> Json<ViewSnapshot> {
    dashboard.clear_search().await;
    Json(ViewSnapshot::clone(&dashboard.snapshot()))
}

async fn handle_summarize<S: EntryStore>(
    State(dashboard): Shared<S>,
    Json(body): Json<SummarizeBody>,
) -> Result<Json<SummarizeReply>, AppError> {
    let summary = dashboard.summarize(body.id, &body.content).await?;
    Ok(Json(SummarizeReply {
        id: body.id,
        summary,
    }))
}
