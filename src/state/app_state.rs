use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use brk_reader::{
    EventSource, LiveEventsProvider, LiveTracesProvider, NevEventsProvider, NsxTracesProvider,
    TraceSource,
};

/// One opened data source, file-backed or live.
#[derive(Clone)]
pub enum ReaderEntry {
    Traces(Arc<NsxTracesProvider>),
    Events(Arc<NevEventsProvider>),
    LiveTraces(Arc<LiveTracesProvider>),
    LiveEvents(Arc<LiveEventsProvider>),
}

impl ReaderEntry {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ReaderEntry::Traces(_) => "traces",
            ReaderEntry::Events(_) => "events",
            ReaderEntry::LiveTraces(_) => "live-traces",
            ReaderEntry::LiveEvents(_) => "live-events",
        }
    }

    pub fn trace_source(&self) -> Option<&dyn TraceSource> {
        match self {
            ReaderEntry::Traces(p) => Some(p.as_ref()),
            ReaderEntry::LiveTraces(p) => Some(p.as_ref()),
            _ => None,
        }
    }

    pub fn event_source(&self) -> Option<&dyn EventSource> {
        match self {
            ReaderEntry::Events(p) => Some(p.as_ref()),
            ReaderEntry::LiveEvents(p) => Some(p.as_ref()),
            _ => None,
        }
    }

    /// Forwards a paging transition to whichever provider kind this is.
    pub fn set_paging(&self, started: bool) {
        match (self.trace_source(), self.event_source()) {
            (Some(t), _) if started => t.paging_started(),
            (Some(t), _) => t.paging_stopped(),
            (_, Some(e)) if started => e.paging_started(),
            (_, Some(e)) => e.paging_stopped(),
            _ => {}
        }
    }
}

#[derive(Clone)]
pub struct ReaderInfo {
    pub entry: ReaderEntry,
    /// File path or live source description.
    pub source: String,
}

#[derive(Clone)]
pub struct AppState {
    // Maps reader id -> entry
    pub readers: Arc<RwLock<HashMap<String, ReaderInfo>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            readers: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
