// NSx continuous-signal provider.
//
// Headers are decoded once at open; sample windows are served straight
// from storage on every request, nothing is cached across fetches.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::codec;
use crate::core::constants::*;
use crate::core::error::{BrkError, Result};
use crate::core::format::{NsxBasicHeader, NsxChannelHeader, NsxDataHeader, SampleWindow};
use crate::core::provider::TraceSource;
use crate::core::units::{ChannelScale, TimeBase};

pub struct NsxTracesProvider {
    path: PathBuf,
    header: NsxBasicHeader,
    channels: Vec<NsxChannelHeader>,
    scales: Vec<ChannelScale>,
    time_base: TimeBase,
    data_header: NsxDataHeader,
    /// Byte offset where the first (and only) data block's samples begin.
    data_start: u64,
    length_ms: i64,
}

impl NsxTracesProvider {
    /// Opens an NSx 2.2 file and decodes its headers. Any failure discards
    /// all partial state; no provider is handed out on error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();

        let header = codec::read_nsx_basic_header(&mut file)?;

        if &header.file_type == NSX_LEGACY_MAGIC {
            return Err(BrkError::UnsupportedLayout(
                "legacy NEURALSG files carry no channel headers".to_string(),
            ));
        }
        if &header.file_type != NSX_MAGIC {
            return Err(BrkError::InvalidMagic {
                expected: NSX_MAGIC.to_vec(),
                got: header.file_type.to_vec(),
            });
        }
        if header.channel_count == 0 {
            return Err(BrkError::CorruptFile("channel count is zero".to_string()));
        }
        if header.sampling_period == 0 {
            return Err(BrkError::CorruptFile("sampling period is zero".to_string()));
        }

        let channel_count = header.channel_count as usize;
        let mut channels = Vec::with_capacity(channel_count);
        let mut scales = Vec::with_capacity(channel_count);
        for _ in 0..channel_count {
            let channel = codec::read_nsx_channel_header(&mut file)?;
            if &channel.channel_type != NSX_CHANNEL_TYPE {
                return Err(BrkError::CorruptFile(format!(
                    "unexpected channel header type {:?}",
                    channel.channel_type
                )));
            }
            scales.push(ChannelScale::from_channel_header(&channel)?);
            channels.push(channel);
        }

        let data_header = codec::read_nsx_data_header(&mut file)?;
        let data_start = file.stream_position()?;

        // A second data block would follow the first one's samples. Paged
        // storage is not supported, so fail fast instead of misreading it.
        let block_bytes = data_header.length as u64 * channel_count as u64 * SAMPLE_SIZE as u64;
        if file_len > data_start + block_bytes {
            return Err(BrkError::UnsupportedLayout(format!(
                "{} trailing bytes after first data block",
                file_len - data_start - block_bytes
            )));
        }

        let time_base = TimeBase::from_nsx(header.time_resolution, header.sampling_period);
        let length_ms = time_base.ms_at_index(data_header.length as i64);

        debug!(
            "opened NSx file {:?}: {} channels at {} Hz, {} ms",
            path,
            channel_count,
            time_base.sampling_rate(),
            length_ms
        );
        if let Some(origin) = header.time_origin.to_naive() {
            debug!("recording started at {}", origin);
        }

        Ok(Self {
            path,
            header,
            channels,
            scales,
            time_base,
            data_header,
            data_start,
            length_ms,
        })
    }

    pub fn header(&self) -> &NsxBasicHeader {
        &self.header
    }

    pub fn channel_headers(&self) -> &[NsxChannelHeader] {
        &self.channels
    }

    /// Declared sample count of the data block, per channel.
    pub fn total_samples(&self) -> u64 {
        self.data_header.length as u64
    }

    fn window_indices(&self, start_ms: i64, end_ms: i64, start_index_hint: i64) -> (i64, i64) {
        // A non-positive hint means it was not supplied. Times before the
        // recording origin clamp to index 0 so indices stay non-negative.
        let start_index = if start_index_hint <= 0 {
            self.time_base.index_at_ms(start_ms.max(0))
        } else {
            start_index_hint
        };
        // The sample at end_index itself is never returned.
        let end_index = self.time_base.index_at_ms(end_ms.max(0));
        (start_index, end_index)
    }
}

impl TraceSource for NsxTracesProvider {
    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn sampling_rate(&self) -> f64 {
        self.time_base.sampling_rate()
    }

    fn recording_length_ms(&self) -> i64 {
        self.length_ms
    }

    fn labels(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.label_str()).collect()
    }

    fn sample_count(&self, start_ms: i64, end_ms: i64, start_index_hint: i64) -> i64 {
        let (start_index, end_index) = self.window_indices(start_ms, end_ms, start_index_hint);
        end_index - start_index
    }

    fn fetch(&self, start_ms: i64, end_ms: i64, start_index_hint: i64) -> Result<SampleWindow> {
        let channel_count = self.channels.len();
        let (start_index, end_index) = self.window_indices(start_ms, end_ms, start_index_hint);
        let window_len = end_index - start_index;
        if window_len <= 0 {
            return Ok(SampleWindow::empty(channel_count));
        }
        let window_len = window_len as usize;

        let mut file = File::open(&self.path).map_err(|e| {
            warn!("cannot reopen {:?}: {}", self.path, e);
            BrkError::Io(e)
        })?;

        let offset = start_index as u64 * channel_count as u64 * SAMPLE_SIZE as u64;
        file.seek(SeekFrom::Start(self.data_start + offset))?;

        let mut raw = vec![0u8; window_len * channel_count * SAMPLE_SIZE];
        codec::read_exact_buf(&mut file, &mut raw).map_err(|e| {
            warn!(
                "short window read in {:?} at sample {}: {}",
                self.path, start_index, e
            );
            e
        })?;

        // Samples are channel-interleaved on disk, which is already the
        // sample-major output order.
        let mut samples = Vec::with_capacity(window_len * channel_count);
        for (i, pair) in raw.chunks_exact(SAMPLE_SIZE).enumerate() {
            let value = i16::from_le_bytes([pair[0], pair[1]]);
            samples.push(self.scales[i % channel_count].convert(value));
        }

        Ok(SampleWindow::new(channel_count, window_len, samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::format::{FilterParams, SystemTime};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn channel_header(id: u16, unit: &[u8]) -> NsxChannelHeader {
        let mut unit_field = [0u8; 16];
        unit_field[..unit.len()].copy_from_slice(unit);
        let mut label = [0u8; 16];
        let text = format!("chan{}", id);
        label[..text.len()].copy_from_slice(text.as_bytes());
        NsxChannelHeader {
            channel_type: *NSX_CHANNEL_TYPE,
            id,
            label,
            bank: 1,
            pin: id as u8,
            min_digital_value: -8192,
            max_digital_value: 8191,
            min_analog_value: -5000,
            max_analog_value: 5000,
            unit: unit_field,
            filter: FilterParams::default(),
        }
    }

    /// Writes a two-channel 10 kHz NSx file with the given interleaved
    /// raw samples.
    fn write_nsx(samples_per_channel: u32, raw: &[i16], unit: &[u8]) -> NamedTempFile {
        let channels = 2u32;
        let header = NsxBasicHeader {
            file_type: *NSX_MAGIC,
            file_spec: 0x0202,
            header_size: (NSX_BASIC_HEADER_SIZE + 2 * NSX_CHANNEL_HEADER_SIZE) as u32,
            label: [0u8; 16],
            comment: [0u8; 256],
            sampling_period: 3,
            time_resolution: 30_000,
            time_origin: SystemTime::default(),
            channel_count: channels,
        };

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&codec::encode_nsx_basic_header(&header))
            .unwrap();
        for id in 0..channels {
            file.write_all(&codec::encode_nsx_channel_header(&channel_header(
                id as u16, unit,
            )))
            .unwrap();
        }
        file.write_all(&codec::encode_nsx_data_header(&NsxDataHeader {
            flag: 1,
            timestamp: 0,
            length: samples_per_channel,
        }))
        .unwrap();
        for value in raw {
            file.write_all(&value.to_le_bytes()).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn ramp(samples_per_channel: usize) -> Vec<i16> {
        (0..samples_per_channel * 2).map(|i| i as i16).collect()
    }

    #[test]
    fn hundred_ms_at_ten_khz_is_thousand_samples() {
        let raw = ramp(2000);
        let file = write_nsx(2000, &raw, b"uV");
        let provider = NsxTracesProvider::open(file.path()).unwrap();

        assert_eq!(provider.sampling_rate(), 10_000.0);
        assert_eq!(provider.channel_count(), 2);
        assert_eq!(provider.recording_length_ms(), 200);

        assert_eq!(provider.sample_count(0, 100, 0), 1000);
        let window = provider.fetch(0, 100, 0).unwrap();
        assert_eq!(window.sample_count, 1000);
        assert_eq!(window.channel_count, 2);
        assert_eq!(window.samples.len(), 2000);
    }

    #[test]
    fn sample_count_matches_fetch_across_windows() {
        let raw = ramp(2000);
        let file = write_nsx(2000, &raw, b"uV");
        let provider = NsxTracesProvider::open(file.path()).unwrap();

        for (t0, t1) in [(0, 1), (0, 200), (13, 57), (199, 200), (50, 50)] {
            let count = provider.sample_count(t0, t1, 0);
            let window = provider.fetch(t0, t1, 0).unwrap();
            assert_eq!(count.max(0) as usize, window.sample_count, "[{t0}, {t1})");
        }
    }

    #[test]
    fn start_index_hint_overrides_start_time() {
        let raw = ramp(2000);
        let file = write_nsx(2000, &raw, b"uV");
        let provider = NsxTracesProvider::open(file.path()).unwrap();

        // Hint of 500 with a nonsense start time: window is [500, 1000).
        let window = provider.fetch(999, 100, 500).unwrap();
        assert_eq!(window.sample_count, 500);
        let direct = provider.fetch(50, 100, 0).unwrap();
        assert_eq!(window, direct);
    }

    #[test]
    fn negative_and_reversed_windows_never_panic() {
        let raw = ramp(2000);
        let file = write_nsx(2000, &raw, b"uV");
        let provider = NsxTracesProvider::open(file.path()).unwrap();

        // Times before the origin clamp to index 0.
        let window = provider.fetch(-10, 10, 0).unwrap();
        assert_eq!(window.sample_count, 100);
        assert_eq!(window, provider.fetch(0, 10, 0).unwrap());
        assert_eq!(provider.sample_count(-10, 10, 0), 100);

        // Fully-negative and reversed windows are empty, not errors.
        assert!(provider.fetch(-20, -10, 0).unwrap().is_empty());
        assert!(provider.fetch(100, 50, 0).unwrap().is_empty());

        // A negative hint counts as unsupplied.
        let hinted = provider.fetch(0, 10, -5).unwrap();
        assert_eq!(hinted.sample_count, 100);
    }

    #[test]
    fn conversion_reaches_output() {
        // Raw full-scale values map onto the analog range ends.
        let mut raw = vec![0i16; 20];
        raw[0] = -8192;
        raw[1] = 8191;
        let file = write_nsx(10, &raw, b"uV");
        let provider = NsxTracesProvider::open(file.path()).unwrap();

        let window = provider.fetch(0, 1, 0).unwrap();
        assert!((window.value(0, 0) - -5000.0).abs() < 1.0);
        assert!((window.value(0, 1) - 5000.0).abs() < 1.0);
    }

    #[test]
    fn millivolt_unit_scales_to_microvolts() {
        let raw = vec![8191i16; 20];
        let file = write_nsx(10, &raw, b"mV");
        let provider = NsxTracesProvider::open(file.path()).unwrap();

        let window = provider.fetch(0, 1, 0).unwrap();
        assert!((window.value(0, 0) - 5_000_000.0).abs() < 1000.0);
    }

    #[test]
    fn unknown_unit_fails_open() {
        let raw = ramp(4);
        let file = write_nsx(4, &raw, b"V");
        assert!(matches!(
            NsxTracesProvider::open(file.path()),
            Err(BrkError::UnknownUnit(_))
        ));
    }

    #[test]
    fn trailing_bytes_mean_unsupported_layout() {
        let raw = ramp(4);
        let mut file = write_nsx(4, &raw, b"uV");
        // Anything after the declared block would be a second block.
        file.write_all(&[0u8; 16]).unwrap();
        file.flush().unwrap();
        assert!(matches!(
            NsxTracesProvider::open(file.path()),
            Err(BrkError::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn short_window_read_leaves_provider_usable() {
        // Declared block length exceeds the bytes actually present.
        let raw = ramp(100);
        let file = write_nsx(2000, &raw, b"uV");
        let provider = NsxTracesProvider::open(file.path()).unwrap();

        let err = provider.fetch(0, 100, 0).unwrap_err();
        assert!(matches!(err, BrkError::ShortRead { .. }));

        // A window inside the available data still works.
        let window = provider.fetch(0, 5, 0).unwrap();
        assert_eq!(window.sample_count, 50);
    }

    /// Rewrites a fixture file with `bytes[range]` replaced.
    fn patched(file: &NamedTempFile, offset: usize, replacement: &[u8]) -> NamedTempFile {
        let mut bytes = std::fs::read(file.path()).unwrap();
        bytes[offset..offset + replacement.len()].copy_from_slice(replacement);
        let mut out = NamedTempFile::new().unwrap();
        out.write_all(&bytes).unwrap();
        out.flush().unwrap();
        out
    }

    #[test]
    fn legacy_magic_is_rejected() {
        let raw = ramp(4);
        let file = write_nsx(4, &raw, b"uV");
        let legacy = patched(&file, 0, NSX_LEGACY_MAGIC);
        assert!(matches!(
            NsxTracesProvider::open(legacy.path()),
            Err(BrkError::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn zero_channel_count_is_rejected() {
        let raw = ramp(4);
        let file = write_nsx(4, &raw, b"uV");
        // channel_count is the last basic-header field.
        let corrupt = patched(&file, NSX_BASIC_HEADER_SIZE - 4, &0u32.to_le_bytes());
        assert!(matches!(
            NsxTracesProvider::open(corrupt.path()),
            Err(BrkError::CorruptFile(_))
        ));
    }

    #[test]
    fn zero_sampling_period_is_rejected() {
        let raw = ramp(4);
        let file = write_nsx(4, &raw, b"uV");
        // sampling_period follows the magic, spec, size, label and comment.
        let period_offset = 8 + 2 + 4 + 16 + 256;
        let corrupt = patched(&file, period_offset, &0u32.to_le_bytes());
        assert!(matches!(
            NsxTracesProvider::open(corrupt.path()),
            Err(BrkError::CorruptFile(_))
        ));
    }

    #[test]
    fn labels_come_from_channel_headers() {
        let raw = ramp(4);
        let file = write_nsx(4, &raw, b"uV");
        let provider = NsxTracesProvider::open(file.path()).unwrap();
        assert_eq!(provider.labels(), vec!["chan0", "chan1"]);
    }
}
