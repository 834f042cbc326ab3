// Packed little-endian record codec for the NSx / NEV layouts.
//
// Decoding is purely structural: a record either reads in full or fails
// with `ShortRead`. Semantic checks (magic values, ranges, ids) belong to
// the providers.

use std::io::Read;

use crate::core::constants::*;
use crate::core::error::{BrkError, Result};
use crate::core::format::*;

/// Sequential field reader over an exactly-sized record buffer.
struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.bytes())
    }

    fn i16(&mut self) -> i16 {
        i16::from_le_bytes(self.bytes())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.bytes())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.bytes())
    }

    fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

/// Record writer, the encode-side mirror of `Fields`.
struct Packer {
    out: Vec<u8>,
}

impl Packer {
    fn new(size: usize) -> Self {
        Self {
            out: Vec::with_capacity(size),
        }
    }

    fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.out.extend_from_slice(v);
        self
    }

    fn u8(&mut self, v: u8) -> &mut Self {
        self.out.push(v);
        self
    }

    fn u16(&mut self, v: u16) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    fn i16(&mut self, v: i16) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    fn u32(&mut self, v: u32) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    fn f32(&mut self, v: f32) -> &mut Self {
        self.bytes(&v.to_le_bytes())
    }

    fn pad(&mut self, n: usize) -> &mut Self {
        self.out.resize(self.out.len() + n, 0);
        self
    }

    fn finish(self, size: usize) -> Vec<u8> {
        debug_assert_eq!(self.out.len(), size);
        self.out
    }
}

/// Reads exactly `buf.len()` bytes or fails with `ShortRead` carrying the
/// byte counts (EOF included).
pub fn read_exact_buf(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    let mut got = 0;
    while got < buf.len() {
        let n = reader.read(&mut buf[got..])?;
        if n == 0 {
            return Err(BrkError::ShortRead {
                expected: buf.len(),
                got,
            });
        }
        got += n;
    }
    Ok(())
}

fn read_record<const N: usize>(reader: &mut impl Read) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    read_exact_buf(reader, &mut buf)?;
    Ok(buf)
}

fn decode_system_time(f: &mut Fields) -> SystemTime {
    SystemTime {
        year: f.i16(),
        month: f.i16(),
        day_of_week: f.i16(),
        day: f.i16(),
        hour: f.i16(),
        minute: f.i16(),
        second: f.i16(),
        milliseconds: f.i16(),
    }
}

fn encode_system_time(p: &mut Packer, t: &SystemTime) {
    p.i16(t.year)
        .i16(t.month)
        .i16(t.day_of_week)
        .i16(t.day)
        .i16(t.hour)
        .i16(t.minute)
        .i16(t.second)
        .i16(t.milliseconds);
}

fn decode_filter_params(f: &mut Fields) -> FilterParams {
    FilterParams {
        highpass_corner: f.u32(),
        highpass_order: f.u32(),
        highpass_type: f.u16(),
        lowpass_corner: f.u32(),
        lowpass_order: f.u32(),
        lowpass_type: f.u16(),
    }
}

fn encode_filter_params(p: &mut Packer, fp: &FilterParams) {
    p.u32(fp.highpass_corner)
        .u32(fp.highpass_order)
        .u16(fp.highpass_type)
        .u32(fp.lowpass_corner)
        .u32(fp.lowpass_order)
        .u16(fp.lowpass_type);
}

pub fn decode_nsx_basic_header(buf: &[u8; NSX_BASIC_HEADER_SIZE]) -> NsxBasicHeader {
    let mut f = Fields::new(buf);
    NsxBasicHeader {
        file_type: f.bytes(),
        file_spec: f.u16(),
        header_size: f.u32(),
        label: f.bytes(),
        comment: f.bytes(),
        sampling_period: f.u32(),
        time_resolution: f.u32(),
        time_origin: decode_system_time(&mut f),
        channel_count: f.u32(),
    }
}

pub fn encode_nsx_basic_header(h: &NsxBasicHeader) -> Vec<u8> {
    let mut p = Packer::new(NSX_BASIC_HEADER_SIZE);
    p.bytes(&h.file_type)
        .u16(h.file_spec)
        .u32(h.header_size)
        .bytes(&h.label)
        .bytes(&h.comment)
        .u32(h.sampling_period)
        .u32(h.time_resolution);
    encode_system_time(&mut p, &h.time_origin);
    p.u32(h.channel_count);
    p.finish(NSX_BASIC_HEADER_SIZE)
}

pub fn read_nsx_basic_header(reader: &mut impl Read) -> Result<NsxBasicHeader> {
    Ok(decode_nsx_basic_header(&read_record(reader)?))
}

pub fn decode_nsx_channel_header(buf: &[u8; NSX_CHANNEL_HEADER_SIZE]) -> NsxChannelHeader {
    let mut f = Fields::new(buf);
    NsxChannelHeader {
        channel_type: f.bytes(),
        id: f.u16(),
        label: f.bytes(),
        bank: f.u8(),
        pin: f.u8(),
        min_digital_value: f.i16(),
        max_digital_value: f.i16(),
        min_analog_value: f.i16(),
        max_analog_value: f.i16(),
        unit: f.bytes(),
        filter: decode_filter_params(&mut f),
    }
}

pub fn encode_nsx_channel_header(h: &NsxChannelHeader) -> Vec<u8> {
    let mut p = Packer::new(NSX_CHANNEL_HEADER_SIZE);
    p.bytes(&h.channel_type)
        .u16(h.id)
        .bytes(&h.label)
        .u8(h.bank)
        .u8(h.pin)
        .i16(h.min_digital_value)
        .i16(h.max_digital_value)
        .i16(h.min_analog_value)
        .i16(h.max_analog_value)
        .bytes(&h.unit);
    encode_filter_params(&mut p, &h.filter);
    p.finish(NSX_CHANNEL_HEADER_SIZE)
}

pub fn read_nsx_channel_header(reader: &mut impl Read) -> Result<NsxChannelHeader> {
    Ok(decode_nsx_channel_header(&read_record(reader)?))
}

pub fn decode_nsx_data_header(buf: &[u8; NSX_DATA_HEADER_SIZE]) -> NsxDataHeader {
    let mut f = Fields::new(buf);
    NsxDataHeader {
        flag: f.u8(),
        timestamp: f.u32(),
        length: f.u32(),
    }
}

pub fn encode_nsx_data_header(h: &NsxDataHeader) -> Vec<u8> {
    let mut p = Packer::new(NSX_DATA_HEADER_SIZE);
    p.u8(h.flag).u32(h.timestamp).u32(h.length);
    p.finish(NSX_DATA_HEADER_SIZE)
}

pub fn read_nsx_data_header(reader: &mut impl Read) -> Result<NsxDataHeader> {
    Ok(decode_nsx_data_header(&read_record(reader)?))
}

pub fn decode_nev_basic_header(buf: &[u8; NEV_BASIC_HEADER_SIZE]) -> NevBasicHeader {
    let mut f = Fields::new(buf);
    NevBasicHeader {
        file_type: f.bytes(),
        file_spec: f.u16(),
        flags: f.u16(),
        header_size: f.u32(),
        data_package_size: f.u32(),
        global_time_resolution: f.u32(),
        waveform_time_resolution: f.u32(),
        time_origin: decode_system_time(&mut f),
        application: f.bytes(),
        comment: f.bytes(),
        extension_count: f.u32(),
    }
}

pub fn encode_nev_basic_header(h: &NevBasicHeader) -> Vec<u8> {
    let mut p = Packer::new(NEV_BASIC_HEADER_SIZE);
    p.bytes(&h.file_type)
        .u16(h.file_spec)
        .u16(h.flags)
        .u32(h.header_size)
        .u32(h.data_package_size)
        .u32(h.global_time_resolution)
        .u32(h.waveform_time_resolution);
    encode_system_time(&mut p, &h.time_origin);
    p.bytes(&h.application).bytes(&h.comment).u32(h.extension_count);
    p.finish(NEV_BASIC_HEADER_SIZE)
}

pub fn read_nev_basic_header(reader: &mut impl Read) -> Result<NevBasicHeader> {
    Ok(decode_nev_basic_header(&read_record(reader)?))
}

pub fn decode_nev_extension_header(buf: &[u8; NEV_EXTENSION_HEADER_SIZE]) -> NevExtensionHeader {
    let mut f = Fields::new(buf);
    NevExtensionHeader {
        tag: f.bytes(),
        data: f.bytes(),
    }
}

pub fn encode_nev_extension_header(h: &NevExtensionHeader) -> Vec<u8> {
    let mut p = Packer::new(NEV_EXTENSION_HEADER_SIZE);
    p.bytes(&h.tag).bytes(&h.data);
    p.finish(NEV_EXTENSION_HEADER_SIZE)
}

pub fn read_nev_extension_header(reader: &mut impl Read) -> Result<NevExtensionHeader> {
    Ok(decode_nev_extension_header(&read_record(reader)?))
}

/// Interprets a raw extension header by tag. Unrecognized tags are kept
/// as-is so the information survives a rewrite.
pub fn interpret_nev_extension(raw: &NevExtensionHeader) -> NevExtension {
    let mut f = Fields::new(&raw.data);
    match &raw.tag {
        t if t == EXT_NEURAL_WAVEFORM => NevExtension::NeuralWaveform(NeuralWaveformExt {
            electrode_id: f.u16(),
            bank: f.u8(),
            pin: f.u8(),
            factor: f.u16(),
            energy_threshold: f.u16(),
            high_threshold: f.i16(),
            low_threshold: f.i16(),
            sorted_units: f.u8(),
            bytes_per_sample: f.u8(),
            samples_per_waveform: f.u16(),
        }),
        t if t == EXT_NEURAL_LABEL => NevExtension::NeuralLabel(NeuralLabelExt {
            electrode_id: f.u16(),
            label: f.bytes(),
        }),
        t if t == EXT_NEURAL_FILTER => NevExtension::NeuralFilter(NeuralFilterExt {
            electrode_id: f.u16(),
            filter: decode_filter_params(&mut f),
        }),
        t if t == EXT_DIGITAL_LABEL => NevExtension::DigitalLabel(DigitalLabelExt {
            label: f.bytes(),
            mode: f.u8(),
        }),
        t if t == EXT_VIDEO_SYNC => NevExtension::VideoSync(VideoSyncExt {
            source_id: f.u16(),
            name: f.bytes(),
            frame_rate: f.f32(),
        }),
        t if t == EXT_TRACKABLE_OBJECT => NevExtension::TrackableObject(TrackableObjectExt {
            object_type: f.u16(),
            object_id: f.u16(),
            point_count: f.u16(),
            name: f.bytes(),
        }),
        _ => NevExtension::Unknown(raw.clone()),
    }
}

pub fn decode_nev_data_header(buf: &[u8; NEV_DATA_HEADER_SIZE]) -> NevDataHeader {
    let mut f = Fields::new(buf);
    NevDataHeader {
        timestamp: f.u32(),
        id: f.u16(),
    }
}

pub fn encode_nev_data_header(h: &NevDataHeader) -> Vec<u8> {
    let mut p = Packer::new(NEV_DATA_HEADER_SIZE);
    p.u32(h.timestamp).u16(h.id);
    p.finish(NEV_DATA_HEADER_SIZE)
}

pub fn read_nev_data_header(reader: &mut impl Read) -> Result<NevDataHeader> {
    Ok(decode_nev_data_header(&read_record(reader)?))
}

pub fn decode_digital_serial_data(buf: &[u8; DIGITAL_SERIAL_DATA_SIZE]) -> DigitalSerialData {
    let mut f = Fields::new(buf);
    let reason = f.u8();
    f.skip(1); // reserved
    DigitalSerialData {
        reason,
        input: f.u16(),
    }
}

pub fn encode_digital_serial_data(d: &DigitalSerialData) -> Vec<u8> {
    let mut p = Packer::new(DIGITAL_SERIAL_DATA_SIZE);
    p.u8(d.reason).pad(1).u16(d.input);
    p.finish(DIGITAL_SERIAL_DATA_SIZE)
}

pub fn read_digital_serial_data(reader: &mut impl Read) -> Result<DigitalSerialData> {
    Ok(decode_digital_serial_data(&read_record(reader)?))
}

pub fn decode_configuration_data(buf: &[u8; CONFIGURATION_DATA_SIZE]) -> ConfigurationData {
    let mut f = Fields::new(buf);
    ConfigurationData {
        change_type: f.u16(),
    }
}

pub fn encode_configuration_data(d: &ConfigurationData) -> Vec<u8> {
    let mut p = Packer::new(CONFIGURATION_DATA_SIZE);
    p.u16(d.change_type);
    p.finish(CONFIGURATION_DATA_SIZE)
}

pub fn read_configuration_data(reader: &mut impl Read) -> Result<ConfigurationData> {
    Ok(decode_configuration_data(&read_record(reader)?))
}

pub fn decode_button_data(buf: &[u8; BUTTON_DATA_SIZE]) -> ButtonData {
    let mut f = Fields::new(buf);
    ButtonData { trigger: f.u16() }
}

pub fn encode_button_data(d: &ButtonData) -> Vec<u8> {
    let mut p = Packer::new(BUTTON_DATA_SIZE);
    p.u16(d.trigger);
    p.finish(BUTTON_DATA_SIZE)
}

pub fn read_button_data(reader: &mut impl Read) -> Result<ButtonData> {
    Ok(decode_button_data(&read_record(reader)?))
}

pub fn decode_tracking_header(buf: &[u8; TRACKING_HEADER_SIZE]) -> TrackingHeader {
    let mut f = Fields::new(buf);
    TrackingHeader {
        parent_id: f.u16(),
        node_id: f.u16(),
        node_count: f.u16(),
        point_count: f.u16(),
    }
}

pub fn encode_tracking_header(d: &TrackingHeader) -> Vec<u8> {
    let mut p = Packer::new(TRACKING_HEADER_SIZE);
    p.u16(d.parent_id)
        .u16(d.node_id)
        .u16(d.node_count)
        .u16(d.point_count);
    p.finish(TRACKING_HEADER_SIZE)
}

pub fn read_tracking_header(reader: &mut impl Read) -> Result<TrackingHeader> {
    Ok(decode_tracking_header(&read_record(reader)?))
}

pub fn decode_video_sync_data(buf: &[u8; VIDEO_SYNC_DATA_SIZE]) -> VideoSyncData {
    let mut f = Fields::new(buf);
    VideoSyncData {
        file_number: f.u16(),
        frame_number: f.u32(),
        elapsed_time: f.u32(),
        source_id: f.u32(),
    }
}

pub fn encode_video_sync_data(d: &VideoSyncData) -> Vec<u8> {
    let mut p = Packer::new(VIDEO_SYNC_DATA_SIZE);
    p.u16(d.file_number)
        .u32(d.frame_number)
        .u32(d.elapsed_time)
        .u32(d.source_id);
    p.finish(VIDEO_SYNC_DATA_SIZE)
}

pub fn read_video_sync_data(reader: &mut impl Read) -> Result<VideoSyncData> {
    Ok(decode_video_sync_data(&read_record(reader)?))
}

pub fn decode_comment_header(buf: &[u8; COMMENT_HEADER_SIZE]) -> CommentHeader {
    let mut f = Fields::new(buf);
    let char_set = f.u8();
    f.skip(1); // reserved
    CommentHeader {
        char_set,
        color: f.u32(),
    }
}

pub fn encode_comment_header(d: &CommentHeader) -> Vec<u8> {
    let mut p = Packer::new(COMMENT_HEADER_SIZE);
    p.u8(d.char_set).pad(1).u32(d.color);
    p.finish(COMMENT_HEADER_SIZE)
}

pub fn read_comment_header(reader: &mut impl Read) -> Result<CommentHeader> {
    Ok(decode_comment_header(&read_record(reader)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_time() -> SystemTime {
        SystemTime {
            year: 2015,
            month: 6,
            day_of_week: 2,
            day: 16,
            hour: 13,
            minute: 37,
            second: 42,
            milliseconds: 250,
        }
    }

    #[test]
    fn nsx_basic_header_round_trip() {
        let mut label = [0u8; 16];
        label[..4].copy_from_slice(b"hip1");
        let header = NsxBasicHeader {
            file_type: *NSX_MAGIC,
            file_spec: 0x0202,
            header_size: 446,
            label,
            comment: [0u8; 256],
            sampling_period: 3,
            time_resolution: 30_000,
            time_origin: sample_time(),
            channel_count: 2,
        };

        let bytes = encode_nsx_basic_header(&header);
        assert_eq!(bytes.len(), NSX_BASIC_HEADER_SIZE);

        let decoded = read_nsx_basic_header(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.label_str(), "hip1");
    }

    #[test]
    fn nsx_channel_header_round_trip() {
        let mut unit = [0u8; 16];
        unit[..2].copy_from_slice(b"mV");
        let header = NsxChannelHeader {
            channel_type: *NSX_CHANNEL_TYPE,
            id: 7,
            label: [0u8; 16],
            bank: 1,
            pin: 3,
            min_digital_value: -8192,
            max_digital_value: 8191,
            min_analog_value: -5000,
            max_analog_value: 5000,
            unit,
            filter: FilterParams {
                highpass_corner: 300_000,
                highpass_order: 1,
                highpass_type: 1,
                lowpass_corner: 7_500_000,
                lowpass_order: 3,
                lowpass_type: 1,
            },
        };

        let bytes = encode_nsx_channel_header(&header);
        assert_eq!(bytes.len(), NSX_CHANNEL_HEADER_SIZE);
        assert_eq!(
            read_nsx_channel_header(&mut Cursor::new(bytes)).unwrap(),
            header
        );
    }

    #[test]
    fn nev_basic_header_round_trip() {
        let header = NevBasicHeader {
            file_type: *NEV_MAGIC,
            file_spec: 0x0202,
            flags: 1,
            header_size: 336 + 2 * 32,
            data_package_size: 104,
            global_time_resolution: 30_000,
            waveform_time_resolution: 30_000,
            time_origin: sample_time(),
            application: [0u8; 32],
            comment: [0u8; 256],
            extension_count: 2,
        };

        let bytes = encode_nev_basic_header(&header);
        assert_eq!(bytes.len(), NEV_BASIC_HEADER_SIZE);
        assert_eq!(
            read_nev_basic_header(&mut Cursor::new(bytes)).unwrap(),
            header
        );
    }

    #[test]
    fn nev_extension_interpretation() {
        let mut data = [0u8; NEV_EXTENSION_DATA_SIZE];
        data[..2].copy_from_slice(&42u16.to_le_bytes());
        data[2..7].copy_from_slice(b"tetr1");
        let raw = NevExtensionHeader {
            tag: *EXT_NEURAL_LABEL,
            data,
        };

        match interpret_nev_extension(&raw) {
            NevExtension::NeuralLabel(ext) => {
                assert_eq!(ext.electrode_id, 42);
                assert_eq!(ext.label_str(), "tetr1");
            }
            other => panic!("expected neural label, got {:?}", other),
        }

        let unknown = NevExtensionHeader {
            tag: *b"FUTUREXT",
            data,
        };
        assert_eq!(
            interpret_nev_extension(&unknown),
            NevExtension::Unknown(unknown.clone())
        );
    }

    #[test]
    fn payload_round_trips() {
        let digital = DigitalSerialData {
            reason: REASON_SERIAL_BIT,
            input: 0xBEEF,
        };
        let bytes = encode_digital_serial_data(&digital);
        assert_eq!(
            read_digital_serial_data(&mut Cursor::new(bytes)).unwrap(),
            digital
        );

        let tracking = TrackingHeader {
            parent_id: 3,
            node_id: 7,
            node_count: 2,
            point_count: 4,
        };
        let bytes = encode_tracking_header(&tracking);
        assert_eq!(
            read_tracking_header(&mut Cursor::new(bytes)).unwrap(),
            tracking
        );

        let sync = VideoSyncData {
            file_number: 1,
            frame_number: 2400,
            elapsed_time: 80_000,
            source_id: 5,
        };
        let bytes = encode_video_sync_data(&sync);
        assert_eq!(read_video_sync_data(&mut Cursor::new(bytes)).unwrap(), sync);

        let comment = CommentHeader {
            char_set: 0,
            color: 0xFF00FF00,
        };
        let bytes = encode_comment_header(&comment);
        assert_eq!(
            read_comment_header(&mut Cursor::new(bytes)).unwrap(),
            comment
        );
    }

    #[test]
    fn short_read_reports_byte_counts() {
        let bytes = vec![0u8; NEV_DATA_HEADER_SIZE - 2];
        let err = read_nev_data_header(&mut Cursor::new(bytes)).unwrap_err();
        match err {
            BrkError::ShortRead { expected, got } => {
                assert_eq!(expected, NEV_DATA_HEADER_SIZE);
                assert_eq!(got, NEV_DATA_HEADER_SIZE - 2);
            }
            other => panic!("expected short read, got {:?}", other),
        }
    }
}
