// Format constants for Blackrock NSx / NEV (file spec 2.2)

/// NSx continuous file magic ("Neural Continuous Data").
pub const NSX_MAGIC: &[u8; 8] = b"NEURALCD";
/// Legacy NSx magic. The old layout has no per-channel headers, so it is
/// rejected with `UnsupportedLayout` instead of being misread.
pub const NSX_LEGACY_MAGIC: &[u8; 8] = b"NEURALSG";
/// NEV event file magic.
pub const NEV_MAGIC: &[u8; 8] = b"NEURALEV";

/// Channel header type tag ("Continuous Channels").
pub const NSX_CHANNEL_TYPE: &[u8; 2] = b"CC";

// NEV extension header tags (exact 8-byte ASCII)
pub const EXT_ARRAY_NAME: &[u8; 8] = b"ARRAYNME";
pub const EXT_EXTRA_COMMENT: &[u8; 8] = b"ECOMMENT";
pub const EXT_CONTINUED_COMMENT: &[u8; 8] = b"CCOMMENT";
pub const EXT_MAP_FILE: &[u8; 8] = b"MAPFILE\0";
pub const EXT_NEURAL_WAVEFORM: &[u8; 8] = b"NEUEVWAV";
pub const EXT_NEURAL_LABEL: &[u8; 8] = b"NEUEVLBL";
pub const EXT_NEURAL_FILTER: &[u8; 8] = b"NEUEVFLT";
pub const EXT_DIGITAL_LABEL: &[u8; 8] = b"DIGLABEL";
pub const EXT_VIDEO_SYNC: &[u8; 8] = b"VIDEOSYN";
pub const EXT_TRACKABLE_OBJECT: &[u8; 8] = b"TRACKOBJ";

// NEV data package ids
pub const PKG_DIGITAL_SERIAL: u16 = 0x0000;
/// Spike packages (handled by the cluster subsystem, skipped here).
pub const PKG_SPIKE_MIN: u16 = 0x0001;
pub const PKG_SPIKE_MAX: u16 = 0x0800;
pub const PKG_CONFIGURATION: u16 = 0xFFFB;
pub const PKG_BUTTON: u16 = 0xFFFC;
pub const PKG_TRACKING: u16 = 0xFFFD;
pub const PKG_VIDEO_SYNC: u16 = 0xFFFE;
pub const PKG_COMMENT: u16 = 0xFFFF;

/// Timestamp sentinel marking a continuation package (unsupported).
pub const CONTINUATION_TIMESTAMP: u32 = 0xFFFF_FFFF;

/// Digital/serial reason bit selecting serial input.
pub const REASON_SERIAL_BIT: u8 = 1 << 7;

// Record sizes (packed, little-endian, no padding)

/// Windows SYSTEMTIME: 8 x i16.
pub const SYSTEM_TIME_SIZE: usize = 16;

/// NSx basic header: magic(8) spec(u16) header_size(u32) label(16)
/// comment(256) period(u32) resolution(u32) origin(16) channels(u32).
pub const NSX_BASIC_HEADER_SIZE: usize = 8 + 2 + 4 + 16 + 256 + 4 + 4 + SYSTEM_TIME_SIZE + 4; // 314

/// NSx channel header: type(2) id(u16) label(16) bank(u8) pin(u8)
/// dmin/dmax/amin/amax(4 x i16) unit(16) filter(2 x (u32+u32+u16)).
pub const NSX_CHANNEL_HEADER_SIZE: usize = 2 + 2 + 16 + 1 + 1 + 8 + 16 + 20; // 66

/// NSx data block header: flag(u8) timestamp(u32) length(u32).
pub const NSX_DATA_HEADER_SIZE: usize = 1 + 4 + 4; // 9

/// NEV basic header: magic(8) spec(u16) flags(u16) header_size(u32)
/// package_size(u32) global_res(u32) waveform_res(u32) origin(16)
/// application(32) comment(256) extension_count(u32).
pub const NEV_BASIC_HEADER_SIZE: usize =
    8 + 2 + 2 + 4 + 4 + 4 + 4 + SYSTEM_TIME_SIZE + 32 + 256 + 4; // 336

/// NEV extension header: tag(8) + opaque payload(24).
pub const NEV_EXTENSION_HEADER_SIZE: usize = 8 + 24; // 32
pub const NEV_EXTENSION_DATA_SIZE: usize = 24;

/// NEV data package header: timestamp(u32) id(u16).
pub const NEV_DATA_HEADER_SIZE: usize = 4 + 2; // 6

// NEV payload heads (the remainder of each package is padding)
pub const DIGITAL_SERIAL_DATA_SIZE: usize = 4;
pub const CONFIGURATION_DATA_SIZE: usize = 2;
pub const BUTTON_DATA_SIZE: usize = 2;
pub const TRACKING_HEADER_SIZE: usize = 8;
pub const VIDEO_SYNC_DATA_SIZE: usize = 14;
pub const COMMENT_HEADER_SIZE: usize = 6;

/// Raw sample width of NSx continuous data.
pub const SAMPLE_SIZE: usize = std::mem::size_of::<i16>();

/// Resolution of the acquisition system (bits per sample).
pub const NSX_RESOLUTION: u16 = 16;
