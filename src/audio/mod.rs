//! Audio capture and voice activity detection (VAD) pipeline.
//!
//! A [`CaptureSession`] drives a [`FrameSource`] (microphone via CPAL, or a
//! replayed PCM file) on a background loop and fans every PCM16LE mono frame
//! out to its [`FrameConsumer`]s. [`VoiceActivityDetector`] turns frames into
//! speaking/silence edges.

mod capture;
mod dispatch;
mod frame;
mod recorder;
mod replay;
mod source;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;
mod vad;

pub use capture::{CaptureMetrics, CaptureSession, FrameConsumer, SessionState, StartOutcome};
pub use frame::AudioFrame;
pub use recorder::{list_devices, CpalSource};
pub use replay::ReplaySource;
pub use source::{frame_bytes_for, FrameSource, ReadError, SourceError};
pub use vad::{
    frame_amplitude, sample_score, VadConfig, VoiceActivityDetector, DEFAULT_AMPLITUDE_THRESHOLD,
    MAX_AMPLITUDE_SCORE,
};
