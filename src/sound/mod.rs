//! The `sound` channel: microphone control and voice-activity streams.
//!
//! Layout under the root path:
//!
//! ```text
//! <root>/sound            request endpoint: record(bool), status()
//! <root>/sound/speaking   stream of speaking edges (bool)
//! <root>/sound/recording  stream of finished takes (base64 PCM)
//! ```

mod analyzer;
mod handlers;
mod publisher;

pub use analyzer::VoiceAnalyzer;
pub use handlers::{RecordHandler, RecordingHandler, SpeakingHandler, StatusHandler};
pub use publisher::take_event;

use crate::audio::VadConfig;
use crate::channel::{ChannelError, ChannelNode};
use crate::config::AppConfig;
use std::sync::Arc;

pub const SOUND_CHANNEL: &str = "sound";
pub const METHOD_RECORD: &str = "record";
pub const METHOD_STATUS: &str = "status";
pub const EVENT_SPEAKING: &str = "speaking";
pub const EVENT_RECORDING: &str = "recording";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundConfig {
    pub vad: VadConfig,
    /// Longest take kept for the `recording` stream; 0 disables it.
    pub max_take_ms: u64,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            vad: VadConfig::default(),
            max_take_ms: crate::config::DEFAULT_MAX_TAKE_MS,
        }
    }
}

impl From<&AppConfig> for SoundConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            vad: VadConfig::from(cfg),
            max_take_ms: cfg.max_take_ms,
        }
    }
}

/// Build the `sound` channel node around a shared analyzer.
pub fn sound_channel(analyzer: &Arc<VoiceAnalyzer>) -> Result<ChannelNode, ChannelError> {
    let mut node = ChannelNode::new();
    node.set_request_handler(METHOD_RECORD, RecordHandler::new(analyzer.clone()))?
        .set_request_handler(METHOD_STATUS, StatusHandler::new(analyzer.clone()))?
        .set_stream_handler(EVENT_SPEAKING, SpeakingHandler::new(analyzer.clone()))?
        .set_stream_handler(EVENT_RECORDING, RecordingHandler::new(analyzer.clone()))?;
    Ok(node)
}

/// The application root: a node holding the `sound` sub channel.
pub fn root_channel(analyzer: &Arc<VoiceAnalyzer>) -> Result<ChannelNode, ChannelError> {
    let mut root = ChannelNode::new();
    root.set_sub_channel(SOUND_CHANNEL, sound_channel(analyzer)?)?;
    Ok(root)
}
