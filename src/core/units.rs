// Physical unit conversion and time/sample-index mapping

use crate::core::error::{BrkError, Result};
use crate::core::format::NsxChannelHeader;

/// Analog units an NSx channel may declare. Anything else in the unit
/// field is a decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogUnit {
    MicroVolt,
    MilliVolt,
}

impl AnalogUnit {
    pub fn parse(unit: &str) -> Result<Self> {
        match unit {
            "uV" | "\u{00B5}V" => Ok(AnalogUnit::MicroVolt),
            "mV" => Ok(AnalogUnit::MilliVolt),
            other => Err(BrkError::UnknownUnit(other.to_string())),
        }
    }

    /// Multiplier into microvolts.
    pub fn correction(&self) -> f64 {
        match self {
            AnalogUnit::MicroVolt => 1.0,
            AnalogUnit::MilliVolt => 1000.0,
        }
    }
}

/// Affine raw-to-microvolt map for one channel, derived from its declared
/// digital and analog ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelScale {
    min_digital: f64,
    range_digital: f64,
    min_analog: f64,
    range_analog: f64,
    correction: f64,
}

impl ChannelScale {
    pub fn new(
        min_digital: i16,
        max_digital: i16,
        min_analog: i16,
        max_analog: i16,
        unit: AnalogUnit,
    ) -> Result<Self> {
        if max_digital <= min_digital {
            return Err(BrkError::CorruptFile(format!(
                "degenerate digital range [{}, {}]",
                min_digital, max_digital
            )));
        }
        if max_analog <= min_analog {
            return Err(BrkError::CorruptFile(format!(
                "degenerate analog range [{}, {}]",
                min_analog, max_analog
            )));
        }
        Ok(Self {
            min_digital: min_digital as f64,
            range_digital: (max_digital as i32 - min_digital as i32) as f64,
            min_analog: min_analog as f64,
            range_analog: (max_analog as i32 - min_analog as i32) as f64,
            correction: unit.correction(),
        })
    }

    pub fn from_channel_header(header: &NsxChannelHeader) -> Result<Self> {
        let unit = AnalogUnit::parse(&header.unit_str())?;
        Self::new(
            header.min_digital_value,
            header.max_digital_value,
            header.min_analog_value,
            header.max_analog_value,
            unit,
        )
    }

    /// Converts one raw sample to microvolts.
    pub fn convert(&self, raw: i16) -> f32 {
        ((((raw as f64 - self.min_digital) / self.range_digital) * self.range_analog
            + self.min_analog)
            * self.correction) as f32
    }
}

/// Millisecond/sample-index/tick translation at a fixed sampling rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeBase {
    sampling_rate: f64,
}

impl TimeBase {
    pub fn new(sampling_rate: f64) -> Self {
        Self { sampling_rate }
    }

    /// Sampling rate derived from an NSx header: base ticks per second
    /// divided by the sampling period.
    pub fn from_nsx(time_resolution: u32, sampling_period: u32) -> Self {
        Self::new(time_resolution as f64 / sampling_period as f64)
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Sample index of a millisecond time, floor-rounded. Both the count
    /// and the fetch path use this so windows stay consistent.
    pub fn index_at_ms(&self, ms: i64) -> i64 {
        (self.sampling_rate * ms as f64 / 1000.0) as i64
    }

    /// Length in milliseconds of `samples` samples.
    pub fn ms_at_index(&self, samples: i64) -> i64 {
        (1000.0 * samples as f64 / self.sampling_rate) as i64
    }
}

/// Converts milliseconds to clock ticks at `resolution` ticks per second.
pub fn ms_to_ticks(ms: i64, resolution: u32) -> u64 {
    (ms as f64 * resolution as f64 / 1000.0) as u64
}

/// Converts clock ticks back to milliseconds.
pub fn ticks_to_ms(ticks: u64, resolution: u32) -> i64 {
    (ticks as f64 * 1000.0 / resolution as f64) as i64
}
