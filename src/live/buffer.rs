// Synchronized live/view double buffer for asynchronously arriving data.
//
// The ingestion path writes the `live` region only; consumers read the
// `view` region, which either tracks `live` directly (paging running) or
// holds a frozen copy of it (paging stopped). One mutex guards every
// structural operation; regions are pre-sized so the lock is never held
// across an allocation in the steady state.

use std::sync::Mutex;

/// Fixed-capacity ring of (tick, value) entries. On overflow the oldest
/// entries are overwritten.
#[derive(Debug, Clone)]
struct Region<T> {
    ticks: Vec<u32>,
    values: Vec<T>,
    capacity: usize,
    /// Total entries ever written; the ring slot is `written % capacity`.
    written: usize,
}

impl<T: Clone> Region<T> {
    fn new(capacity: usize) -> Self {
        Self {
            ticks: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            capacity,
            written: 0,
        }
    }

    fn push(&mut self, tick: u32, value: T) {
        if self.ticks.len() < self.capacity {
            self.ticks.push(tick);
            self.values.push(value);
        } else {
            let slot = self.written % self.capacity;
            self.ticks[slot] = tick;
            self.values[slot] = value;
        }
        self.written += 1;
    }

    /// Copies another region's contents into this one, reusing the
    /// existing allocations.
    fn copy_from(&mut self, other: &Region<T>) {
        self.ticks.clone_from(&other.ticks);
        self.values.clone_from(&other.values);
        self.capacity = other.capacity;
        self.written = other.written;
    }

    /// Entries in chronological order, oldest retained first.
    fn iter_ordered(&self) -> impl Iterator<Item = (u32, &T)> {
        let len = self.ticks.len();
        let start = if self.written > self.capacity {
            self.written % self.capacity
        } else {
            0
        };
        (0..len).map(move |i| {
            let slot = (start + i) % len.max(1);
            (self.ticks[slot], &self.values[slot])
        })
    }

    fn latest_tick(&self) -> Option<u32> {
        if self.ticks.is_empty() {
            return None;
        }
        let slot = (self.written - 1) % self.capacity;
        Some(self.ticks[slot])
    }
}

struct Inner<T> {
    live: Region<T>,
    view: Region<T>,
    /// When set, reads are served from the frozen `view` copy.
    decoupled: bool,
}

pub struct LiveBuffer<T> {
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> LiveBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        // A zero capacity would make the ring arithmetic divide by zero.
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                live: Region::new(capacity),
                view: Region::new(capacity),
                decoupled: false,
            }),
        }
    }

    /// Appends one entry to the live region. Never blocks beyond the
    /// brief lock acquisition.
    pub fn push(&self, tick: u32, value: T) {
        let mut inner = self.inner.lock().unwrap();
        inner.live.push(tick, value);
    }

    /// Freezes the visible snapshot: the view region becomes a copy of
    /// the live region and stops tracking it.
    pub fn pause(&self) {
        let mut inner = self.inner.lock().unwrap();
        let Inner { live, view, decoupled } = &mut *inner;
        view.copy_from(live);
        *decoupled = true;
    }

    /// Recouples the view to the live region; reads observe growth again.
    pub fn resume(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.decoupled = false;
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().unwrap().decoupled
    }

    /// Entries with `start_tick <= tick < end_tick` from the active
    /// region, in chronological order. Windows older than the retained
    /// capacity come back truncated or empty, never as an error.
    pub fn range(&self, start_tick: u64, end_tick: u64) -> Vec<(u32, T)> {
        let inner = self.inner.lock().unwrap();
        let region = if inner.decoupled {
            &inner.view
        } else {
            &inner.live
        };
        region
            .iter_ordered()
            .filter(|(tick, _)| (*tick as u64) >= start_tick && ((*tick as u64) < end_tick))
            .map(|(tick, value)| (tick, value.clone()))
            .collect()
    }

    /// Most recent tick of the active region.
    pub fn latest_tick(&self) -> Option<u32> {
        let inner = self.inner.lock().unwrap();
        let region = if inner.decoupled {
            &inner.view
        } else {
            &inner.live
        };
        region.latest_tick()
    }

    /// Drops all entries and reallocates both regions, e.g. after a
    /// channel-set change. In-flight readers see the new empty shape.
    pub fn reset(&self, capacity: usize) {
        let capacity = capacity.max(1);
        let mut inner = self.inner.lock().unwrap();
        inner.live = Region::new(capacity);
        inner.view = Region::new(capacity);
        inner.decoupled = false;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().live.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_track_live_while_running() {
        let buffer = LiveBuffer::new(8);
        buffer.push(1, 10i16);
        buffer.push(2, 20);
        assert_eq!(buffer.range(0, 100), vec![(1, 10), (2, 20)]);
    }

    #[test]
    fn pause_freezes_snapshot_until_resume() {
        let buffer = LiveBuffer::new(8);
        buffer.push(1, 10i16);

        buffer.pause();
        buffer.push(2, 20);
        buffer.push(3, 30);
        buffer.push(4, 40);

        // The three pushes after pause are invisible.
        assert_eq!(buffer.range(0, 100), vec![(1, 10)]);

        buffer.resume();
        assert_eq!(
            buffer.range(0, 100),
            vec![(1, 10), (2, 20), (3, 30), (4, 40)]
        );
    }

    #[test]
    fn overflow_overwrites_oldest() {
        let buffer = LiveBuffer::new(3);
        for tick in 1..=5u32 {
            buffer.push(tick, tick as i16);
        }
        // Ticks 1 and 2 have aged out.
        assert_eq!(buffer.range(0, 100), vec![(3, 3), (4, 4), (5, 5)]);
        // Querying the aged window is not an error, just empty.
        assert_eq!(buffer.range(0, 3), vec![]);
        assert_eq!(buffer.latest_tick(), Some(5));
    }

    #[test]
    fn range_bounds_are_half_open() {
        let buffer = LiveBuffer::new(8);
        for tick in [10u32, 20, 30] {
            buffer.push(tick, tick as i16);
        }
        assert_eq!(buffer.range(10, 30), vec![(10, 10), (20, 20)]);
    }

    #[test]
    fn reset_clears_both_regions() {
        let buffer = LiveBuffer::new(4);
        buffer.push(1, vec![1i16, 2]);
        buffer.pause();
        buffer.reset(6);
        assert!(buffer.is_empty());
        assert!(!buffer.is_paused());
        assert_eq!(buffer.range(0, 100), vec![]);
    }

    #[test]
    fn pause_after_overflow_keeps_order() {
        let buffer = LiveBuffer::new(3);
        for tick in 1..=4u32 {
            buffer.push(tick, tick as i16);
        }
        buffer.pause();
        buffer.push(5, 5);
        assert_eq!(buffer.range(0, 100), vec![(2, 2), (3, 3), (4, 4)]);
        buffer.resume();
        assert_eq!(buffer.range(0, 100), vec![(3, 3), (4, 4), (5, 5)]);
    }
}
