// NEV event-file provider.
//
// The whole file is parsed into a time-ordered index at load; range
// queries never touch the file again. A single structurally bad package
// aborts the load and no index is exposed.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, error};

use crate::core::codec;
use crate::core::constants::*;
use crate::core::error::{BrkError, Result};
use crate::core::format::{EventKind, NevBasicHeader, NevExtension, EVENT_KIND_SLOTS};
use crate::core::provider::EventSource;
use crate::core::units::{ms_to_ticks, ticks_to_ms};

pub struct NevEventsProvider {
    header: NevBasicHeader,
    extensions: Vec<NevExtension>,
    /// Tick timestamps, parallel to `kinds`, non-decreasing.
    timestamps: Vec<u32>,
    kinds: Vec<EventKind>,
    counts: [u64; EVENT_KIND_SLOTS],
    skipped: u64,
}

impl NevEventsProvider {
    /// Loads and classifies every package of a NEV 2.2 file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let header = codec::read_nev_basic_header(&mut file)?;

        if &header.file_type != NEV_MAGIC {
            return Err(BrkError::InvalidMagic {
                expected: NEV_MAGIC.to_vec(),
                got: header.file_type.to_vec(),
            });
        }

        let package_size = header.data_package_size as u64;
        // The largest payload head read below is the video sync record.
        let minimum = (NEV_DATA_HEADER_SIZE + VIDEO_SYNC_DATA_SIZE) as u64;
        if package_size < minimum {
            return Err(BrkError::CorruptFile(format!(
                "data package size {} below minimum {}",
                package_size, minimum
            )));
        }

        // Trailing bytes short of a full package are ignored, matching
        // what the acquisition tooling writes and accepts.
        let data_bytes = file_len.saturating_sub(header.header_size as u64);
        let declared = data_bytes / package_size;

        let mut extensions = Vec::with_capacity(header.extension_count as usize);
        for _ in 0..header.extension_count {
            let raw = codec::read_nev_extension_header(&mut file)?;
            extensions.push(codec::interpret_nev_extension(&raw));
        }

        let mut timestamps = Vec::with_capacity(declared as usize);
        let mut kinds = Vec::with_capacity(declared as usize);
        let mut counts = [0u64; EVENT_KIND_SLOTS];
        let mut skipped = 0u64;

        while timestamps.len() as u64 + skipped < declared {
            let data_header = codec::read_nev_data_header(&mut file)?;

            if data_header.timestamp == CONTINUATION_TIMESTAMP {
                error!("continuation packages are not supported");
                return Err(BrkError::CorruptFile(
                    "continuation package encountered".to_string(),
                ));
            }

            // Bytes of the payload interpreted per category; the rest of
            // the package is padding and skipped unconditionally.
            let (kind, consumed) = match data_header.id {
                PKG_DIGITAL_SERIAL => {
                    let data = codec::read_digital_serial_data(&mut file)?;
                    let kind = if data.reason & REASON_SERIAL_BIT != 0 {
                        EventKind::SerialData
                    } else {
                        EventKind::DigitalData
                    };
                    (kind, DIGITAL_SERIAL_DATA_SIZE)
                }
                PKG_CONFIGURATION => {
                    let data = codec::read_configuration_data(&mut file)?;
                    let kind = match data.change_type {
                        0 => EventKind::ConfigNormal,
                        1 => EventKind::ConfigCritical,
                        _ => EventKind::ConfigUndefined,
                    };
                    (kind, CONFIGURATION_DATA_SIZE)
                }
                PKG_BUTTON => {
                    let data = codec::read_button_data(&mut file)?;
                    let kind = match data.trigger {
                        1 => EventKind::ButtonPress,
                        2 => EventKind::ButtonReset,
                        _ => EventKind::ButtonUndefined,
                    };
                    (kind, BUTTON_DATA_SIZE)
                }
                PKG_TRACKING => {
                    let data = codec::read_tracking_header(&mut file)?;
                    (
                        EventKind::Tracking {
                            parent_id: data.parent_id,
                            node_id: data.node_id,
                        },
                        TRACKING_HEADER_SIZE,
                    )
                }
                PKG_VIDEO_SYNC => {
                    let data = codec::read_video_sync_data(&mut file)?;
                    (
                        EventKind::VideoSync {
                            source_id: data.source_id,
                        },
                        VIDEO_SYNC_DATA_SIZE,
                    )
                }
                PKG_COMMENT => {
                    let _ = codec::read_comment_header(&mut file)?;
                    (EventKind::Comment, COMMENT_HEADER_SIZE)
                }
                id if (PKG_SPIKE_MIN..=PKG_SPIKE_MAX).contains(&id) => {
                    // Spike packages belong to the cluster subsystem.
                    let padding = package_size - NEV_DATA_HEADER_SIZE as u64;
                    file.seek(SeekFrom::Current(padding as i64))?;
                    skipped += 1;
                    continue;
                }
                id => {
                    error!("unknown package id: {:#06x}", id);
                    return Err(BrkError::CorruptFile(format!(
                        "unknown package id {:#06x}",
                        id
                    )));
                }
            };

            let padding = package_size - (NEV_DATA_HEADER_SIZE + consumed) as u64;
            file.seek(SeekFrom::Current(padding as i64))?;

            timestamps.push(data_header.timestamp);
            counts[kind.slot()] += 1;
            kinds.push(kind);
        }

        if timestamps.len() as u64 + skipped != declared {
            return Err(BrkError::CorruptFile(format!(
                "decoded {} + skipped {} packages, header declares {}",
                timestamps.len(),
                skipped,
                declared
            )));
        }

        debug!(
            "loaded NEV file {:?}: {} events, {} spike packages skipped",
            path,
            timestamps.len(),
            skipped
        );

        Ok(Self {
            header,
            extensions,
            timestamps,
            kinds,
            counts,
            skipped,
        })
    }

    pub fn header(&self) -> &NevBasicHeader {
        &self.header
    }

    pub fn extensions(&self) -> &[NevExtension] {
        &self.extensions
    }

    pub fn event_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn skipped_count(&self) -> u64 {
        self.skipped
    }

    pub fn min_timestamp(&self) -> Option<u32> {
        self.timestamps.first().copied()
    }

    pub fn max_timestamp(&self) -> Option<u32> {
        self.timestamps.last().copied()
    }
}

impl EventSource for NevEventsProvider {
    fn events_in_range(&self, start_ms: i64, end_ms: i64) -> Vec<(u32, EventKind)> {
        let resolution = self.header.global_time_resolution;
        let start_tick = ms_to_ticks(start_ms.max(0), resolution);
        let end_tick = ms_to_ticks(end_ms.max(0), resolution);

        // Timestamps are non-decreasing, so ordered search finds the
        // bounds; start is inclusive, end exclusive.
        let lo = self
            .timestamps
            .partition_point(|&t| (t as u64) < start_tick);
        let hi = self.timestamps.partition_point(|&t| (t as u64) < end_tick);

        self.timestamps[lo..hi]
            .iter()
            .copied()
            .zip(self.kinds[lo..hi].iter().copied())
            .collect()
    }

    fn kind_counts(&self) -> [u64; EVENT_KIND_SLOTS] {
        self.counts
    }

    fn max_time_ms(&self) -> i64 {
        self.max_timestamp()
            .map(|t| ticks_to_ms(t as u64, self.header.global_time_resolution))
            .unwrap_or(0)
    }
}
