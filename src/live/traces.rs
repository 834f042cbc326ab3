// Live trace provider fed by the hardware link.
//
// Presents the same time-windowed query interface as the file-backed
// provider, reading from the view side of a live/view double buffer so a
// paused consumer keeps a stable snapshot while samples keep arriving.

use std::sync::Mutex;

use tracing::{info, warn};

use crate::core::error::Result;
use crate::core::format::SampleWindow;
use crate::core::provider::TraceSource;
use crate::core::units::{ms_to_ticks, ticks_to_ms, TimeBase};
use crate::live::buffer::LiveBuffer;
use crate::live::link::LiveChannelConfig;

pub struct LiveTracesProvider {
    /// One entry per tick: the samples of every channel in the group.
    buffer: LiveBuffer<Vec<i16>>,
    channels: Mutex<Vec<LiveChannelConfig>>,
    time_base: TimeBase,
    /// Resolution of the tick clock stamped onto incoming packets.
    tick_resolution: u32,
    retention_secs: u32,
}

impl LiveTracesProvider {
    /// Allocates the double buffer for `retention_secs` seconds of data
    /// at the group's sampling rate. Regions are never resized afterwards
    /// except through an explicit reconfiguration.
    pub fn new(
        sampling_rate: f64,
        tick_resolution: u32,
        retention_secs: u32,
        channels: Vec<LiveChannelConfig>,
    ) -> Self {
        let capacity = (sampling_rate * retention_secs as f64) as usize;
        Self {
            buffer: LiveBuffer::new(capacity),
            channels: Mutex::new(channels),
            time_base: TimeBase::new(sampling_rate),
            tick_resolution,
            retention_secs,
        }
    }

    /// Ingestion path: one tick's samples for all channels of the group.
    pub fn process_samples(&self, tick: u32, samples: Vec<i16>) {
        let expected = self.channels.lock().unwrap().len();
        if samples.len() != expected {
            warn!(
                "dropping sample group of {} values, group has {} channels",
                samples.len(),
                expected
            );
            return;
        }
        self.buffer.push(tick, samples);
    }

    /// Channel-set change notification. A different channel count drops
    /// all buffered data; an equal-sized update only swaps scales.
    pub fn process_config(&self, new_channels: Vec<LiveChannelConfig>) {
        let mut channels = self.channels.lock().unwrap();
        if new_channels.len() != channels.len() {
            info!(
                "live group resized from {} to {} channels, clearing buffers",
                channels.len(),
                new_channels.len()
            );
            let capacity = (self.time_base.sampling_rate() * self.retention_secs as f64) as usize;
            self.buffer.reset(capacity);
        }
        *channels = new_channels;
    }

    /// Number of tick entries currently buffered.
    pub fn buffered_entries(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_paused(&self) -> bool {
        self.buffer.is_paused()
    }
}

impl TraceSource for LiveTracesProvider {
    fn channel_count(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    fn sampling_rate(&self) -> f64 {
        self.time_base.sampling_rate()
    }

    fn recording_length_ms(&self) -> i64 {
        self.buffer
            .latest_tick()
            .map(|t| ticks_to_ms(t as u64, self.tick_resolution))
            .unwrap_or(0)
    }

    fn labels(&self) -> Vec<String> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.label.clone())
            .collect()
    }

    fn sample_count(&self, start_ms: i64, end_ms: i64, start_index_hint: i64) -> i64 {
        let start_index = if start_index_hint == 0 {
            self.time_base.index_at_ms(start_ms)
        } else {
            start_index_hint
        };
        self.time_base.index_at_ms(end_ms) - start_index
    }

    /// Serves the window from the active region snapshot. Data older than
    /// the retained capacity yields a truncated or empty window.
    fn fetch(&self, start_ms: i64, end_ms: i64, _start_index_hint: i64) -> Result<SampleWindow> {
        let start_tick = ms_to_ticks(start_ms.max(0), self.tick_resolution);
        let end_tick = ms_to_ticks(end_ms.max(0), self.tick_resolution);

        let scales: Vec<_> = {
            let channels = self.channels.lock().unwrap();
            channels.iter().map(|c| c.scale).collect()
        };
        let channel_count = scales.len();

        let entries = self.buffer.range(start_tick, end_tick);
        let mut samples = Vec::with_capacity(entries.len() * channel_count);
        let mut sample_count = 0;
        for (_, raw) in &entries {
            // Entries written before a reconfiguration have the old
            // shape; the reset should have removed them.
            if raw.len() != channel_count {
                continue;
            }
            for (channel, &value) in raw.iter().enumerate() {
                samples.push(scales[channel].convert(value));
            }
            sample_count += 1;
        }

        Ok(SampleWindow::new(channel_count, sample_count, samples))
    }

    fn paging_started(&self) {
        self.buffer.resume();
    }

    fn paging_stopped(&self) {
        self.buffer.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::{AnalogUnit, ChannelScale};

    const TICK_RES: u32 = 30_000;

    fn channels(n: usize) -> Vec<LiveChannelConfig> {
        (0..n)
            .map(|i| LiveChannelConfig {
                label: format!("live{}", i),
                scale: ChannelScale::new(-8192, 8191, -5000, 5000, AnalogUnit::MicroVolt).unwrap(),
            })
            .collect()
    }

    fn provider() -> LiveTracesProvider {
        LiveTracesProvider::new(1000.0, TICK_RES, 2, channels(2))
    }

    /// Ticks of the global clock at a millisecond boundary.
    fn ticks(ms: u32) -> u32 {
        ms * (TICK_RES / 1000)
    }

    #[test]
    fn fetch_returns_converted_window() {
        let p = provider();
        p.process_samples(ticks(1), vec![0, 8191]);
        p.process_samples(ticks(2), vec![-8192, 0]);

        let window = p.fetch(0, 10, 0).unwrap();
        assert_eq!(window.sample_count, 2);
        assert_eq!(window.channel_count, 2);
        assert!((window.value(0, 1) - 5000.0).abs() < 1.0);
        assert!((window.value(1, 0) - -5000.0).abs() < 1.0);
    }

    #[test]
    fn pause_hides_new_samples_until_resume() {
        let p = provider();
        p.process_samples(ticks(1), vec![1, 1]);

        p.paging_stopped();
        assert!(p.is_paused());
        p.process_samples(ticks(2), vec![2, 2]);
        p.process_samples(ticks(3), vec![3, 3]);
        p.process_samples(ticks(4), vec![4, 4]);

        assert_eq!(p.fetch(0, 10, 0).unwrap().sample_count, 1);

        p.paging_started();
        assert!(!p.is_paused());
        assert_eq!(p.fetch(0, 10, 0).unwrap().sample_count, 4);
    }

    #[test]
    fn mismatched_sample_groups_are_dropped() {
        let p = provider();
        p.process_samples(ticks(1), vec![1, 2, 3]);
        assert_eq!(p.buffered_entries(), 0);
    }

    #[test]
    fn reconfiguration_clears_buffered_data() {
        let p = provider();
        p.process_samples(ticks(1), vec![1, 2]);
        assert_eq!(p.buffered_entries(), 1);

        p.process_config(channels(3));
        assert_eq!(p.channel_count(), 3);
        assert_eq!(p.buffered_entries(), 0);

        p.process_samples(ticks(2), vec![1, 2, 3]);
        assert_eq!(p.fetch(0, 10, 0).unwrap().channel_count, 3);
    }

    #[test]
    fn same_size_config_update_keeps_data() {
        let p = provider();
        p.process_samples(ticks(1), vec![1, 2]);
        p.process_config(channels(2));
        assert_eq!(p.buffered_entries(), 1);
    }

    #[test]
    fn recording_length_tracks_latest_tick() {
        let p = provider();
        assert_eq!(p.recording_length_ms(), 0);
        p.process_samples(ticks(25), vec![0, 0]);
        assert_eq!(p.recording_length_ms(), 25);
    }

    #[test]
    fn nominal_count_uses_the_sampling_rate() {
        let p = provider();
        assert_eq!(p.sample_count(0, 100, 0), 100);
        assert_eq!(p.sample_count(0, 100, 40), 60);
    }
}
