// Live event provider fed by digital/serial input packets.

use std::sync::Mutex;

use crate::core::constants::REASON_SERIAL_BIT;
use crate::core::format::{EventKind, EVENT_KIND_SLOTS};
use crate::core::provider::EventSource;
use crate::core::units::{ms_to_ticks, ticks_to_ms};
use crate::live::buffer::LiveBuffer;

pub struct LiveEventsProvider {
    buffer: LiveBuffer<EventKind>,
    counts: Mutex<[u64; EVENT_KIND_SLOTS]>,
    tick_resolution: u32,
}

impl LiveEventsProvider {
    /// Capacity assumes, like the original acquisition buffers, up to one
    /// event per clock tick over the retention window.
    pub fn new(tick_resolution: u32, retention_secs: u32) -> Self {
        let capacity = tick_resolution as usize * retention_secs as usize;
        Self {
            buffer: LiveBuffer::new(capacity),
            counts: Mutex::new([0; EVENT_KIND_SLOTS]),
            tick_resolution,
        }
    }

    /// Ingestion path for digital/serial input packets.
    pub fn process_digital(&self, tick: u32, reason: u8, _input: u16) {
        let kind = if reason & REASON_SERIAL_BIT != 0 {
            EventKind::SerialData
        } else {
            EventKind::DigitalData
        };
        self.buffer.push(tick, kind);
        self.counts.lock().unwrap()[kind.slot()] += 1;
    }

    pub fn is_paused(&self) -> bool {
        self.buffer.is_paused()
    }
}

impl EventSource for LiveEventsProvider {
    fn events_in_range(&self, start_ms: i64, end_ms: i64) -> Vec<(u32, EventKind)> {
        let start_tick = ms_to_ticks(start_ms.max(0), self.tick_resolution);
        let end_tick = ms_to_ticks(end_ms.max(0), self.tick_resolution);
        self.buffer.range(start_tick, end_tick)
    }

    fn kind_counts(&self) -> [u64; EVENT_KIND_SLOTS] {
        *self.counts.lock().unwrap()
    }

    fn max_time_ms(&self) -> i64 {
        self.buffer
            .latest_tick()
            .map(|t| ticks_to_ms(t as u64, self.tick_resolution))
            .unwrap_or(0)
    }

    fn paging_started(&self) {
        self.buffer.resume();
    }

    fn paging_stopped(&self) {
        self.buffer.pause();
    }
}
