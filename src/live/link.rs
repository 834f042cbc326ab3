// Push interface of the acquisition hardware link.
//
// The transport itself is an external collaborator; this module only
// models the packets it delivers and routes them to the live providers.

use std::sync::Arc;

use tracing::debug;

use crate::core::units::ChannelScale;
use crate::live::events::LiveEventsProvider;
use crate::live::traces::LiveTracesProvider;

/// One channel of a live sampling group.
#[derive(Debug, Clone)]
pub struct LiveChannelConfig {
    pub label: String,
    pub scale: ChannelScale,
}

/// A packet pushed by the hardware link.
#[derive(Debug, Clone)]
pub enum LinkPacket {
    /// One tick's worth of samples for every channel of the group.
    SampleGroup { tick: u32, samples: Vec<i16> },
    /// Spike detection; forwarded untouched to the cluster subsystem.
    Spike {
        tick: u32,
        channel: u16,
        unit_class: u8,
    },
    /// Digital or serial input change.
    DigitalInput { tick: u32, reason: u8, input: u16 },
    /// Channel-set change of the sampling group.
    GroupConfig { channels: Vec<LiveChannelConfig> },
}

/// Receiver for push-delivered packets.
pub trait PacketSink: Send + Sync {
    fn deliver(&self, packet: LinkPacket);
}

/// Consumer of spike packets (the cluster subsystem, external to this
/// crate).
pub trait SpikeSink: Send + Sync {
    fn spike(&self, tick: u32, channel: u16, unit_class: u8);
}

/// Classifies incoming packets and fans them out to the live providers.
pub struct LiveLink {
    traces: Arc<LiveTracesProvider>,
    events: Arc<LiveEventsProvider>,
    spikes: Option<Arc<dyn SpikeSink>>,
}

impl LiveLink {
    pub fn new(
        traces: Arc<LiveTracesProvider>,
        events: Arc<LiveEventsProvider>,
        spikes: Option<Arc<dyn SpikeSink>>,
    ) -> Self {
        Self {
            traces,
            events,
            spikes,
        }
    }
}

impl PacketSink for LiveLink {
    fn deliver(&self, packet: LinkPacket) {
        match packet {
            LinkPacket::SampleGroup { tick, samples } => {
                self.traces.process_samples(tick, samples);
            }
            LinkPacket::Spike {
                tick,
                channel,
                unit_class,
            } => {
                if let Some(sink) = &self.spikes {
                    sink.spike(tick, channel, unit_class);
                }
            }
            LinkPacket::DigitalInput { tick, reason, input } => {
                self.events.process_digital(tick, reason, input);
            }
            LinkPacket::GroupConfig { channels } => {
                debug!("group reconfiguration: {} channels", channels.len());
                self.traces.process_config(channels);
            }
        }
    }
}
