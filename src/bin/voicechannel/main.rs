//! voicechannel host entrypoint.
//!
//! Binds the `sound` channel tree under `--channel-root` and serves it over
//! stdin/stdout as JSON lines until stdin closes.
//!
//! # Architecture
//!
//! - Reader thread: parses stdin lines into commands
//! - Writer thread: serializes events to stdout
//! - Capture loop: reads frames from the microphone (or a replay file)
//! - Session loop (main thread): dispatches commands and queued stream events

use anyhow::{Context, Result};
use voicechannel::audio::{list_devices, CpalSource, FrameSource, ReplaySource};
use voicechannel::channel::DeliveryQueue;
use voicechannel::config::AppConfig;
use voicechannel::sound::{self, SoundConfig, VoiceAnalyzer};
use voicechannel::{ipc, telemetry};

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    telemetry::init_tracing(&config)?;

    if config.list_input_devices {
        print_input_devices();
        return Ok(());
    }

    let source = select_source(&config)?;
    tracing::info!(
        source = %source.name(),
        root = %config.channel_root,
        threshold = config.amplitude_threshold,
        "voicechannel starting"
    );

    let queue = DeliveryQueue::bounded(config.delivery_capacity);
    let analyzer = VoiceAnalyzer::new(source, &SoundConfig::from(&config), queue.deliverer());
    let root = sound::root_channel(&analyzer).context("failed to build channel tree")?;

    let result = ipc::run_stdio_session(root, &config.channel_root, &queue);
    analyzer.terminate();
    result
}

fn select_source(config: &AppConfig) -> Result<Box<dyn FrameSource>> {
    if let Some(replay) = ReplaySource::from_config(config)? {
        return Ok(Box::new(replay));
    }
    Ok(Box::new(CpalSource::from_config(config)))
}

fn print_input_devices() {
    let devices = list_devices().unwrap_or_else(|err| {
        eprintln!("Failed to list audio input devices: {err:#}");
        Vec::new()
    });

    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Available audio input devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
}
