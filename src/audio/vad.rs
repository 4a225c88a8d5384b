//! Voice Activity Detection (VAD) for speaking/silence classification.
//!
//! Scores each PCM16LE frame by mean sample magnitude and reports only the
//! frames where the speaking state flips.

use crate::config::AppConfig;

use super::AudioFrame;

/// Default amplitude above which a frame counts as speech.
pub const DEFAULT_AMPLITUDE_THRESHOLD: u32 = 1000;

/// Largest score a single sample can reach: `(128 << 8) + 128`.
pub const MAX_AMPLITUDE_SCORE: u32 = 32_896;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VadConfig {
    pub amplitude_threshold: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            amplitude_threshold: DEFAULT_AMPLITUDE_THRESHOLD,
        }
    }
}

impl From<&AppConfig> for VadConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            amplitude_threshold: cfg.amplitude_threshold,
        }
    }
}

/// Magnitude proxy for one little-endian sample.
///
/// Both bytes are read as signed and their absolute values recombined, so this
/// is not the true sample value; it only has to rank loudness.
pub fn sample_score(low: u8, high: u8) -> u32 {
    let high = u32::from((high as i8).unsigned_abs());
    let low = u32::from((low as i8).unsigned_abs());
    (high << 8) + low
}

/// Mean [`sample_score`] over the frame, or `None` if it holds no complete sample.
pub fn frame_amplitude(frame: &AudioFrame<'_>) -> Option<f64> {
    let count = frame.sample_count();
    if count == 0 {
        return None;
    }
    let total: u64 = frame
        .sample_pairs()
        .map(|(low, high)| u64::from(sample_score(low, high)))
        .sum();
    Some(total as f64 / count as f64)
}

/// Edge-triggered speaking detector.
///
/// A single threshold with no hysteresis: amplitudes hovering around it will
/// flip the state frame to frame.
#[derive(Debug, Clone)]
pub struct VoiceActivityDetector {
    threshold: f64,
    previous: bool,
}

impl VoiceActivityDetector {
    pub fn new(cfg: &VadConfig) -> Self {
        Self {
            threshold: f64::from(cfg.amplitude_threshold),
            previous: false,
        }
    }

    /// Classify a frame without touching the edge state. Frames without a
    /// complete sample are silence.
    pub fn is_speaking(&self, frame: &AudioFrame<'_>) -> bool {
        frame_amplitude(frame).is_some_and(|amplitude| amplitude > self.threshold)
    }

    /// Classify `frame` and return the new state only if it differs from the
    /// previous frame's.
    pub fn process_frame(&mut self, frame: &AudioFrame<'_>) -> Option<bool> {
        let speaking = self.is_speaking(frame);
        if speaking == self.previous {
            return None;
        }
        self.previous = speaking;
        Some(speaking)
    }

    /// Most recent classification.
    pub fn current(&self) -> bool {
        self.previous
    }

    /// Back to not-speaking, so the next speaking frame always reports.
    pub fn reset(&mut self) {
        self.previous = false;
    }
}

impl Default for VoiceActivityDetector {
    fn default() -> Self {
        Self::new(&VadConfig::default())
    }
}
