// Blackrock NSx / NEV Rust Reader
// Main library entry point

pub mod core;
pub mod live;

// Re-export main types
pub use crate::core::error::{BrkError, Result};
pub use crate::core::events::NevEventsProvider;
pub use crate::core::format::{EventKind, SampleWindow};
pub use crate::core::provider::{EventSource, TraceSource};
pub use crate::core::traces::NsxTracesProvider;
pub use crate::live::buffer::LiveBuffer;
pub use crate::live::events::LiveEventsProvider;
pub use crate::live::link::{LinkPacket, LiveChannelConfig, LiveLink, PacketSink, SpikeSink};
pub use crate::live::traces::LiveTracesProvider;
