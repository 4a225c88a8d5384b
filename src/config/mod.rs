//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_CHANNEL_ROOT, DEFAULT_DELIVERY_CAPACITY, DEFAULT_FRAME_MS, DEFAULT_MAX_TAKE_MS,
    DEFAULT_READ_TIMEOUT_MS, DEFAULT_REPLAY_SAMPLE_RATE, DEFAULT_THRESHOLD,
};

/// CLI options for the voicechannel host. Commands arrive on stdin and events
/// leave on stdout, one JSON object per line.
#[derive(Debug, Parser, Clone)]
#[command(about = "Microphone capture and voice activity channels over JSON lines", author, version)]
pub struct AppConfig {
    /// Root path the channel tree is bound under
    #[arg(long = "channel-root", default_value = DEFAULT_CHANNEL_ROOT)]
    pub channel_root: String,

    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Replay a raw PCM16LE mono file instead of opening a microphone
    #[arg(long = "replay-pcm", value_name = "PATH")]
    pub replay_pcm: Option<PathBuf>,

    /// Sample rate of the replayed file (Hz)
    #[arg(long = "replay-sample-rate", default_value_t = DEFAULT_REPLAY_SAMPLE_RATE)]
    pub replay_sample_rate: u32,

    /// Pace replayed frames at wall-clock speed
    #[arg(long = "replay-realtime", default_value_t = false)]
    pub replay_realtime: bool,

    /// Capture frame size (milliseconds)
    #[arg(long = "frame-ms", default_value_t = DEFAULT_FRAME_MS)]
    pub frame_ms: u64,

    /// Mean amplitude score above which a frame counts as speech
    #[arg(long = "amplitude-threshold", default_value_t = DEFAULT_THRESHOLD)]
    pub amplitude_threshold: u32,

    /// Events buffered between the capture thread and the output
    #[arg(long = "delivery-capacity", default_value_t = DEFAULT_DELIVERY_CAPACITY)]
    pub delivery_capacity: usize,

    /// Longest take published on the recording stream (milliseconds, 0 disables)
    #[arg(long = "max-take-ms", default_value_t = DEFAULT_MAX_TAKE_MS)]
    pub max_take_ms: u64,

    /// How long a single microphone read may wait for audio (milliseconds)
    #[arg(long = "read-timeout-ms", default_value_t = DEFAULT_READ_TIMEOUT_MS)]
    pub read_timeout_ms: u64,

    /// Maximum log level
    #[arg(long = "log-level", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Write JSON logs to this file instead of stderr
    #[arg(long = "log-file", env = "VOICECHANNEL_LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Disable all logging (overrides --log-file)
    #[arg(long = "no-logs", env = "VOICECHANNEL_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
