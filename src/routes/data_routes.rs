use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use brk_reader::{
    EventSource, LiveEventsProvider, LiveTracesProvider, NevEventsProvider, NsxTracesProvider,
    TraceSource,
};

use crate::routes::ws_handler::handle_ws_stream;
use crate::state::app_state::{AppState, ReaderEntry, ReaderInfo};

#[derive(Deserialize, Debug)]
pub struct OpenRequest {
    /// "traces" | "events" | "live-traces" | "live-events"
    pub kind: String,
    /// File path for the file-backed kinds.
    pub path: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct OpenResponse {
    pub id: String,
    pub kind: String,
    pub source: String,
    pub channels: Option<Vec<String>>,
    pub sampling_rate: Option<f64>,
    pub recording_length_ms: Option<i64>,
    pub event_count: Option<usize>,
}

#[derive(Serialize)]
pub struct ReaderSummary {
    pub id: String,
    pub kind: String,
    pub source: String,
}

#[derive(Deserialize)]
pub struct WindowQuery {
    pub start: i64,
    pub end: i64,
    #[serde(default)]
    pub hint: i64,
}

#[derive(Serialize)]
pub struct EventPayload {
    pub timestamp: u32,
    pub label: String,
}

/// =======================
/// ROUTER
/// =======================

pub fn data_routes(state: AppState) -> Router {
    Router::new()
        .route("/open", post(open_reader))
        .route("/readers", get(list_readers))
        .route("/traces/{id}/window", get(trace_window))
        .route("/events/{id}/range", get(event_range))
        .route("/stream/{id}", get(ws_stream))
        .route("/live/{id}/paging/{action}", post(set_paging))
        .with_state(state)
}

/// =======================
/// HANDLERS
/// =======================

async fn open_reader(
    State(state): State<AppState>,
    Json(request): Json<OpenRequest>,
) -> Response {
    debug!("Opening reader: kind={}, path={:?}", request.kind, request.path);
    let config = crate::utils::conf_helper::get_cached_config();

    let (entry, source) = match request.kind.as_str() {
        "traces" => {
            let Some(path) = request.path else {
                return StatusCode::BAD_REQUEST.into_response();
            };
            match NsxTracesProvider::open(&path) {
                Ok(p) => (ReaderEntry::Traces(Arc::new(p)), path),
                Err(e) => {
                    error!("Failed to open NSx file {}: {}", path, e);
                    return StatusCode::UNPROCESSABLE_ENTITY.into_response();
                }
            }
        }
        "events" => {
            let Some(path) = request.path else {
                return StatusCode::BAD_REQUEST.into_response();
            };
            match NevEventsProvider::load(&path) {
                Ok(p) => (ReaderEntry::Events(Arc::new(p)), path),
                Err(e) => {
                    error!("Failed to load NEV file {}: {}", path, e);
                    return StatusCode::UNPROCESSABLE_ENTITY.into_response();
                }
            }
        }
        "live-traces" => {
            // Channel set arrives later through the hardware link.
            let provider = LiveTracesProvider::new(
                config.live_sampling_rate,
                config.live_tick_resolution,
                config.live_buffer_secs,
                Vec::new(),
            );
            (
                ReaderEntry::LiveTraces(Arc::new(provider)),
                "live".to_string(),
            )
        }
        "live-events" => {
            let provider =
                LiveEventsProvider::new(config.live_tick_resolution, config.live_buffer_secs);
            (
                ReaderEntry::LiveEvents(Arc::new(provider)),
                "live".to_string(),
            )
        }
        other => {
            error!("Unknown reader kind: {}", other);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let id = Uuid::new_v4().to_string();
    info!("Register reader {} ({}) for {}", id, entry.kind_name(), source);

    let response = OpenResponse {
        id: id.clone(),
        kind: entry.kind_name().to_string(),
        source: source.clone(),
        channels: entry.trace_source().map(|t| t.labels()),
        sampling_rate: entry.trace_source().map(|t| t.sampling_rate()),
        recording_length_ms: entry.trace_source().map(|t| t.recording_length_ms()),
        event_count: entry
            .event_source()
            .map(|e| e.kind_counts().iter().sum::<u64>() as usize),
    };

    state
        .readers
        .write()
        .await
        .insert(id, ReaderInfo { entry, source });

    Json(response).into_response()
}

async fn list_readers(State(state): State<AppState>) -> impl IntoResponse {
    let readers = state.readers.read().await;

    let mut out: Vec<ReaderSummary> = readers
        .iter()
        .map(|(id, info)| ReaderSummary {
            id: id.clone(),
            kind: info.entry.kind_name().to_string(),
            source: info.source.clone(),
        })
        .collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));

    Json(out)
}

async fn trace_window(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Response {
    let entry = {
        let readers = state.readers.read().await;
        readers.get(&id).map(|info| info.entry.clone())
    };

    let Some(entry) = entry else {
        error!("Reader not found: {}", id);
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(traces) = entry.trace_source() else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match traces.fetch(query.start, query.end, query.hint) {
        Ok(window) => Json(window).into_response(),
        Err(e) => {
            // The provider stays usable; the caller may retry.
            error!("Window fetch [{}, {}) failed: {}", query.start, query.end, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn event_range(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Response {
    let entry = {
        let readers = state.readers.read().await;
        readers.get(&id).map(|info| info.entry.clone())
    };

    let Some(entry) = entry else {
        error!("Reader not found: {}", id);
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(events) = entry.event_source() else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let payload: Vec<EventPayload> = events
        .events_in_range(query.start, query.end)
        .into_iter()
        .map(|(timestamp, kind)| EventPayload {
            timestamp,
            label: kind.to_string(),
        })
        .collect();

    Json(payload).into_response()
}

async fn ws_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<WindowQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let entry = {
        let readers = state.readers.read().await;
        readers.get(&id).map(|info| info.entry.clone())
    };

    let Some(entry) = entry else {
        error!("Reader not found: {}", id);
        return StatusCode::NOT_FOUND.into_response();
    };

    ws.on_upgrade(move |socket| handle_ws_stream(socket, entry, query.start, query.end))
}

async fn set_paging(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
) -> Response {
    let entry = {
        let readers = state.readers.read().await;
        readers.get(&id).map(|info| info.entry.clone())
    };

    let Some(entry) = entry else {
        error!("Reader not found: {}", id);
        return StatusCode::NOT_FOUND.into_response();
    };

    match action.as_str() {
        "started" => entry.set_paging(true),
        "stopped" => entry.set_paging(false),
        other => {
            error!("Unknown paging action: {}", other);
            return StatusCode::BAD_REQUEST.into_response();
        }
    }

    info!("Paging {} for reader {}", action, id);
    StatusCode::OK.into_response()
}
