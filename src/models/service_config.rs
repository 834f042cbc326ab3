use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub id: String,
    pub version: String,
    pub description: String,
    pub file_formats: Vec<String>,
    /// Seconds of live data each double-buffer region retains.
    pub live_buffer_secs: u32,
    /// Sampling rate of the live group this service subscribes to.
    pub live_sampling_rate: f64,
    /// Tick resolution of the acquisition clock.
    pub live_tick_resolution: u32,
    pub connection: Connection,
    pub configuration: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Connection {
    pub ip: String,
    pub port: u16,
}
