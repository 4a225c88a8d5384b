use super::defaults::{
    MAX_DELIVERY_CAPACITY, MAX_DEVICE_NAME_LEN, MAX_FRAME_MS, MAX_READ_TIMEOUT_MS,
    MAX_SAMPLE_RATE, MAX_TAKE_HARD_LIMIT_MS, MAX_THRESHOLD, MIN_DELIVERY_CAPACITY, MIN_FRAME_MS,
    MIN_READ_TIMEOUT_MS, MIN_SAMPLE_RATE,
};
use super::AppConfig;
use anyhow::{bail, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize the channel root.
    pub fn validate(&mut self) -> Result<()> {
        self.channel_root = self.channel_root.trim().to_string();
        validate_channel_root(&self.channel_root)?;

        if let Some(device) = &self.input_device {
            if device.trim().is_empty()
                || device.len() > MAX_DEVICE_NAME_LEN
                || device.chars().any(char::is_control)
            {
                bail!(
                    "--input-device must be 1..={MAX_DEVICE_NAME_LEN} characters with no control characters"
                );
            }
        }

        if let Some(path) = &self.replay_pcm {
            if !path.is_file() {
                bail!("--replay-pcm file '{}' does not exist", path.display());
            }
        }
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.replay_sample_rate) {
            bail!(
                "--replay-sample-rate must be between {MIN_SAMPLE_RATE} and {MAX_SAMPLE_RATE} Hz, got {}",
                self.replay_sample_rate
            );
        }
        if !(MIN_FRAME_MS..=MAX_FRAME_MS).contains(&self.frame_ms) {
            bail!(
                "--frame-ms must be between {MIN_FRAME_MS} and {MAX_FRAME_MS}, got {}",
                self.frame_ms
            );
        }
        if !(1..=MAX_THRESHOLD).contains(&self.amplitude_threshold) {
            bail!(
                "--amplitude-threshold must be between 1 and {MAX_THRESHOLD}, got {}",
                self.amplitude_threshold
            );
        }
        if !(MIN_DELIVERY_CAPACITY..=MAX_DELIVERY_CAPACITY).contains(&self.delivery_capacity) {
            bail!(
                "--delivery-capacity must be between {MIN_DELIVERY_CAPACITY} and {MAX_DELIVERY_CAPACITY}, got {}",
                self.delivery_capacity
            );
        }
        if self.max_take_ms > MAX_TAKE_HARD_LIMIT_MS {
            bail!(
                "--max-take-ms must be at most {MAX_TAKE_HARD_LIMIT_MS} (0 disables), got {}",
                self.max_take_ms
            );
        }
        if !(MIN_READ_TIMEOUT_MS..=MAX_READ_TIMEOUT_MS).contains(&self.read_timeout_ms) {
            bail!(
                "--read-timeout-ms must be between {MIN_READ_TIMEOUT_MS} and {MAX_READ_TIMEOUT_MS}, got {}",
                self.read_timeout_ms
            );
        }

        Ok(())
    }
}

/// A slash-joined path prefix: non-empty segments, no leading or trailing `/`.
pub(super) fn validate_channel_root(root: &str) -> Result<()> {
    if root.is_empty() {
        bail!("--channel-root must not be empty");
    }
    if root.starts_with('/') || root.ends_with('/') {
        bail!("--channel-root must not start or end with '/', got '{root}'");
    }
    if root.split('/').any(|segment| segment.trim().is_empty()) {
        bail!("--channel-root must not contain empty segments, got '{root}'");
    }
    if root.chars().any(char::is_control) {
        bail!("--channel-root must not contain control characters");
    }
    Ok(())
}
