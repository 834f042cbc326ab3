// Uniform query interface shared by file-backed and live providers

use crate::core::error::Result;
use crate::core::format::{EventKind, SampleWindow, EVENT_KIND_SLOTS};

/// Time-windowed access to continuous traces. Times are milliseconds from
/// the recording origin; windows are half-open `[start, end)`.
pub trait TraceSource {
    fn channel_count(&self) -> usize;

    fn sampling_rate(&self) -> f64;

    /// Total recording length in milliseconds, as far as it is known.
    fn recording_length_ms(&self) -> i64;

    fn labels(&self) -> Vec<String>;

    /// Number of samples a `fetch` over the same window returns per
    /// channel. A `start_index_hint` of 0 means "compute it from
    /// `start_ms`".
    fn sample_count(&self, start_ms: i64, end_ms: i64, start_index_hint: i64) -> i64;

    /// Retrieves the window converted to microvolts. A failed fetch
    /// leaves the provider usable for subsequent calls.
    fn fetch(&self, start_ms: i64, end_ms: i64, start_index_hint: i64) -> Result<SampleWindow>;

    /// Paging resumed. File-backed sources ignore this.
    fn paging_started(&self) {}

    /// Paging paused. File-backed sources ignore this.
    fn paging_stopped(&self) {}
}

/// Time-windowed access to classified events.
pub trait EventSource {
    /// Events with `start_ms <= t < end_ms`, time-ordered.
    fn events_in_range(&self, start_ms: i64, end_ms: i64) -> Vec<(u32, EventKind)>;

    /// Occurrence count per category slot.
    fn kind_counts(&self) -> [u64; EVENT_KIND_SLOTS];

    fn max_time_ms(&self) -> i64;

    fn paging_started(&self) {}

    fn paging_stopped(&self) {}
}
