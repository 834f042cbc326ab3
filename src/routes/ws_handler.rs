use axum::extract::ws::{Message, WebSocket};
use serde::Serialize;
use tracing::{error, info, warn};

use brk_reader::{EventSource, TraceSource};

use crate::state::app_state::ReaderEntry;

#[derive(Serialize)]
struct TracePayload {
    time_ms: f64,
    values: Vec<f32>,
    seq: u64,
    end_flag: bool,
}

#[derive(Serialize)]
struct EventStreamPayload {
    timestamp: u32,
    label: String,
    seq: u64,
    end_flag: bool,
}

/// Streams one fetched window sample-by-sample (or event-by-event) over
/// the socket, ending with an end-flag payload.
pub async fn handle_ws_stream(mut socket: WebSocket, entry: ReaderEntry, start: i64, end: i64) {
    info!("ws stream started: [{}, {}) ms", start, end);

    if let Some(traces) = entry.trace_source() {
        let window = match traces.fetch(start, end, 0) {
            Ok(window) => window,
            Err(e) => {
                error!("ws fetch failed: {}", e);
                return;
            }
        };

        let step_ms = 1000.0 / traces.sampling_rate();
        let mut seq: u64 = 0;
        for sample in 0..window.sample_count {
            let values = (0..window.channel_count)
                .map(|channel| window.value(sample, channel))
                .collect();
            let payload = TracePayload {
                time_ms: start as f64 + sample as f64 * step_ms,
                values,
                seq,
                end_flag: false,
            };
            if !send_json(&mut socket, &payload).await {
                return;
            }
            seq += 1;
        }

        let end_payload = TracePayload {
            time_ms: 0.0,
            values: Vec::new(),
            seq,
            end_flag: true,
        };
        let _ = send_json(&mut socket, &end_payload).await;
    } else if let Some(events) = entry.event_source() {
        let mut seq: u64 = 0;
        for (timestamp, kind) in events.events_in_range(start, end) {
            let payload = EventStreamPayload {
                timestamp,
                label: kind.to_string(),
                seq,
                end_flag: false,
            };
            if !send_json(&mut socket, &payload).await {
                return;
            }
            seq += 1;
        }

        let end_payload = EventStreamPayload {
            timestamp: 0,
            label: String::new(),
            seq,
            end_flag: true,
        };
        let _ = send_json(&mut socket, &end_payload).await;
    }

    info!("ws stream finished");
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, payload: &T) -> bool {
    let json = match serde_json::to_string(payload) {
        Ok(j) => j,
        Err(e) => {
            error!("json serialize error: {}", e);
            return false;
        }
    };

    if let Err(e) = socket.send(Message::Text(json.into())).await {
        warn!("ws send failed: {}", e);
        return false;
    }
    true
}
