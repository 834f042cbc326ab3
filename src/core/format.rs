// Decoded record structures for the NSx / NEV formats

use chrono::NaiveDate;
use serde::Serialize;

use crate::core::constants::*;

/// Turns a NUL-padded fixed-size field into a displayable string.
pub fn fixed_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Windows SYSTEMTIME as written by the acquisition software.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemTime {
    pub year: i16,
    pub month: i16,
    pub day_of_week: i16,
    pub day: i16,
    pub hour: i16,
    pub minute: i16,
    pub second: i16,
    pub milliseconds: i16,
}

impl SystemTime {
    /// Recording origin as a calendar timestamp, if the fields form one.
    pub fn to_naive(&self) -> Option<chrono::NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?
            .and_hms_milli_opt(
                self.hour as u32,
                self.minute as u32,
                self.second as u32,
                self.milliseconds as u32,
            )
    }
}

/// NSx continuous file basic header.
#[derive(Debug, Clone, PartialEq)]
pub struct NsxBasicHeader {
    pub file_type: [u8; 8],
    pub file_spec: u16,
    pub header_size: u32,
    pub label: [u8; 16],
    pub comment: [u8; 256],
    /// Samples are recorded once every `sampling_period` base ticks.
    pub sampling_period: u32,
    /// Base clock resolution in ticks per second.
    pub time_resolution: u32,
    pub time_origin: SystemTime,
    pub channel_count: u32,
}

impl NsxBasicHeader {
    pub fn label_str(&self) -> String {
        fixed_str(&self.label)
    }

    pub fn comment_str(&self) -> String {
        fixed_str(&self.comment)
    }
}

/// NSx per-channel header ("CC" record).
#[derive(Debug, Clone, PartialEq)]
pub struct NsxChannelHeader {
    pub channel_type: [u8; 2],
    pub id: u16,
    pub label: [u8; 16],
    pub bank: u8,
    pub pin: u8,
    pub min_digital_value: i16,
    pub max_digital_value: i16,
    pub min_analog_value: i16,
    pub max_analog_value: i16,
    pub unit: [u8; 16],
    pub filter: FilterParams,
}

impl NsxChannelHeader {
    pub fn label_str(&self) -> String {
        fixed_str(&self.label)
    }

    pub fn unit_str(&self) -> String {
        fixed_str(&self.unit)
    }
}

/// High/low cutoff description shared by NSx channels and NEUEVFLT extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterParams {
    pub highpass_corner: u32,
    pub highpass_order: u32,
    pub highpass_type: u16,
    pub lowpass_corner: u32,
    pub lowpass_order: u32,
    pub lowpass_type: u16,
}

/// NSx data block header. Spec 2.2 writes one per contiguous block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NsxDataHeader {
    pub flag: u8,
    pub timestamp: u32,
    /// Sample count of the block, per channel.
    pub length: u32,
}

/// NEV event file basic header.
#[derive(Debug, Clone, PartialEq)]
pub struct NevBasicHeader {
    pub file_type: [u8; 8],
    pub file_spec: u16,
    pub flags: u16,
    pub header_size: u32,
    pub data_package_size: u32,
    /// Ticks per second of the global event clock.
    pub global_time_resolution: u32,
    /// Ticks per second of the waveform sampling clock.
    pub waveform_time_resolution: u32,
    pub time_origin: SystemTime,
    pub application: [u8; 32],
    pub comment: [u8; 256],
    pub extension_count: u32,
}

impl NevBasicHeader {
    pub fn application_str(&self) -> String {
        fixed_str(&self.application)
    }

    pub fn comment_str(&self) -> String {
        fixed_str(&self.comment)
    }
}

/// Raw NEV extension header: 8-byte tag plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NevExtensionHeader {
    pub tag: [u8; 8],
    pub data: [u8; NEV_EXTENSION_DATA_SIZE],
}

/// Typed view of a NEV extension header. Unrecognized tags are retained
/// uninterpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum NevExtension {
    NeuralWaveform(NeuralWaveformExt),
    NeuralLabel(NeuralLabelExt),
    NeuralFilter(NeuralFilterExt),
    DigitalLabel(DigitalLabelExt),
    VideoSync(VideoSyncExt),
    TrackableObject(TrackableObjectExt),
    Unknown(NevExtensionHeader),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeuralWaveformExt {
    pub electrode_id: u16,
    pub bank: u8,
    pub pin: u8,
    /// Digitization factor in nV per LSB step.
    pub factor: u16,
    pub energy_threshold: u16,
    pub high_threshold: i16,
    pub low_threshold: i16,
    pub sorted_units: u8,
    pub bytes_per_sample: u8,
    pub samples_per_waveform: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeuralLabelExt {
    pub electrode_id: u16,
    pub label: [u8; 16],
}

impl NeuralLabelExt {
    pub fn label_str(&self) -> String {
        fixed_str(&self.label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeuralFilterExt {
    pub electrode_id: u16,
    pub filter: FilterParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitalLabelExt {
    pub label: [u8; 16],
    /// 0 = serial, 1 = parallel.
    pub mode: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoSyncExt {
    pub source_id: u16,
    pub name: [u8; 16],
    pub frame_rate: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackableObjectExt {
    pub object_type: u16,
    pub object_id: u16,
    pub point_count: u16,
    pub name: [u8; 16],
}

/// NEV data package header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NevDataHeader {
    pub timestamp: u32,
    pub id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitalSerialData {
    /// Bit 0 = digital change, bit 7 = serial.
    pub reason: u8,
    pub input: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigurationData {
    /// 0 = normal, 1 = critical.
    pub change_type: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonData {
    /// 0 = undefined, 1 = press, 2 = reset.
    pub trigger: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingHeader {
    pub parent_id: u16,
    pub node_id: u16,
    pub node_count: u16,
    pub point_count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSyncData {
    pub file_number: u16,
    pub frame_number: u32,
    pub elapsed_time: u32,
    pub source_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentHeader {
    /// 0 = ANSI, 1 = UTF-16.
    pub char_set: u8,
    pub color: u32,
}

/// Closed set of event categories a NEV package reduces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum EventKind {
    SerialData,
    DigitalData,
    ConfigNormal,
    ConfigCritical,
    ConfigUndefined,
    ButtonPress,
    ButtonReset,
    ButtonUndefined,
    Tracking { parent_id: u16, node_id: u16 },
    VideoSync { source_id: u32 },
    Comment,
}

/// Number of counter slots (tracking/video-sync ids share one slot each).
pub const EVENT_KIND_SLOTS: usize = 11;

impl EventKind {
    /// Counter slot of this category. Ids carried by tracking and
    /// video-sync events are not part of the key.
    pub fn slot(&self) -> usize {
        match self {
            EventKind::SerialData => 0,
            EventKind::DigitalData => 1,
            EventKind::ConfigNormal => 2,
            EventKind::ConfigCritical => 3,
            EventKind::ConfigUndefined => 4,
            EventKind::ButtonPress => 5,
            EventKind::ButtonReset => 6,
            EventKind::ButtonUndefined => 7,
            EventKind::Tracking { .. } => 8,
            EventKind::VideoSync { .. } => 9,
            EventKind::Comment => 10,
        }
    }

    pub fn slot_name(slot: usize) -> &'static str {
        match slot {
            0 => "serial data",
            1 => "digital data",
            2 => "config change normal",
            3 => "config change critical",
            4 => "config change undefined",
            5 => "button press",
            6 => "button reset",
            7 => "button undefined",
            8 => "tracking",
            9 => "video sync",
            10 => "comment",
            _ => "unknown",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Tracking { parent_id, node_id } => {
                write!(f, "tracking (p: {} n: {})", parent_id, node_id)
            }
            EventKind::VideoSync { source_id } => write!(f, "video sync (s: {})", source_id),
            other => f.write_str(EventKind::slot_name(other.slot())),
        }
    }
}

/// A rectangular channel x time slice of converted samples, produced fresh
/// per request. Row-major by sample: all channels of sample 0, then all
/// channels of sample 1, and so on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleWindow {
    pub channel_count: usize,
    pub sample_count: usize,
    /// Converted values in microvolts.
    pub samples: Vec<f32>,
}

impl SampleWindow {
    pub fn empty(channel_count: usize) -> Self {
        Self {
            channel_count,
            sample_count: 0,
            samples: Vec::new(),
        }
    }

    pub fn new(channel_count: usize, sample_count: usize, samples: Vec<f32>) -> Self {
        debug_assert_eq!(samples.len(), channel_count * sample_count);
        Self {
            channel_count,
            sample_count,
            samples,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    pub fn value(&self, sample: usize, channel: usize) -> f32 {
        self.samples[sample * self.channel_count + channel]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_str_stops_at_nul() {
        let mut field = [0u8; 16];
        field[..5].copy_from_slice(b"hippo");
        assert_eq!(fixed_str(&field), "hippo");
        assert_eq!(fixed_str(&[0u8; 4]), "");
    }

    #[test]
    fn system_time_to_calendar() {
        let origin = SystemTime {
            year: 2015,
            month: 6,
            day_of_week: 2,
            day: 16,
            hour: 13,
            minute: 37,
            second: 42,
            milliseconds: 250,
        };
        let naive = origin.to_naive().unwrap();
        assert_eq!(naive.to_string(), "2015-06-16 13:37:42.250");

        let bogus = SystemTime {
            month: 13,
            ..origin
        };
        assert!(bogus.to_naive().is_none());
    }

    #[test]
    fn event_labels_match_the_original_wording() {
        assert_eq!(EventKind::SerialData.to_string(), "serial data");
        assert_eq!(EventKind::ConfigCritical.to_string(), "config change critical");
        assert_eq!(
            EventKind::Tracking {
                parent_id: 3,
                node_id: 7
            }
            .to_string(),
            "tracking (p: 3 n: 7)"
        );
        assert_eq!(
            EventKind::VideoSync { source_id: 5 }.to_string(),
            "video sync (s: 5)"
        );
    }

    #[test]
    fn slots_cover_every_kind_once() {
        let kinds = [
            EventKind::SerialData,
            EventKind::DigitalData,
            EventKind::ConfigNormal,
            EventKind::ConfigCritical,
            EventKind::ConfigUndefined,
            EventKind::ButtonPress,
            EventKind::ButtonReset,
            EventKind::ButtonUndefined,
            EventKind::Tracking {
                parent_id: 0,
                node_id: 0,
            },
            EventKind::VideoSync { source_id: 0 },
            EventKind::Comment,
        ];
        let mut seen = [false; EVENT_KIND_SLOTS];
        for kind in kinds {
            assert!(!seen[kind.slot()], "duplicate slot for {:?}", kind);
            seen[kind.slot()] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn window_indexing_is_sample_major() {
        let window = SampleWindow::new(2, 3, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(window.value(0, 1), 1.0);
        assert_eq!(window.value(2, 0), 4.0);
        assert!(!window.is_empty());
        assert!(SampleWindow::empty(4).is_empty());
    }
}
