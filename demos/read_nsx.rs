// Example usage of the NSx / NEV readers

use brk_reader::{EventSource, NevEventsProvider, NsxTracesProvider, Result, TraceSource};
use tracing::{info, Level};
use tracing_subscriber;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let mut args = std::env::args().skip(1);
    let nsx_path = args.next().unwrap_or_else(|| "data/recording.ns5".to_string());
    let nev_path = args.next();

    // Open a continuous-signal file
    let traces = NsxTracesProvider::open(&nsx_path)?;

    info!("Opened {}", nsx_path);
    info!("  Label: {}", traces.header().label_str());
    info!("  Channels: {}", traces.channel_count());
    info!("  Sampling rate: {} Hz", traces.sampling_rate());
    info!(
        "  Samples per channel: {} ({}-bit)",
        traces.total_samples(),
        brk_reader::core::constants::NSX_RESOLUTION
    );
    info!("  Recording length: {} ms", traces.recording_length_ms());
    for channel in traces.channel_headers() {
        info!("  Channel {}: {}", channel.id, channel.label_str());
    }

    // Fetch the first second, converted to microvolts
    let end = traces.recording_length_ms().min(1000);
    let expected = traces.sample_count(0, end, 0);
    let window = traces.fetch(0, end, 0)?;
    info!(
        "Fetched [0, {}) ms: {} samples x {} channels (expected {})",
        end, window.sample_count, window.channel_count, expected
    );
    if !window.is_empty() {
        info!("First sample, channel 0: {} uV", window.value(0, 0));
    }

    // Optionally load an event file next to it
    if let Some(nev_path) = nev_path {
        let events = NevEventsProvider::load(&nev_path)?;
        info!(
            "Loaded {} ({}): {} events, {} spike packages skipped, {} extension headers",
            nev_path,
            events.header().application_str(),
            events.event_count(),
            events.skipped_count(),
            events.extensions().len()
        );

        for (slot, count) in events.kind_counts().iter().enumerate() {
            if *count > 0 {
                info!("  {}: {}", brk_reader::EventKind::slot_name(slot), count);
            }
        }

        let recent = events.events_in_range(0, events.max_time_ms() + 1);
        if let Some((timestamp, kind)) = recent.first() {
            info!("First event at tick {}: {}", timestamp, kind);
        }
    }

    Ok(())
}
