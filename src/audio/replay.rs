//! File-backed frame source for machines without a microphone.
//!
//! Serves a raw PCM16LE mono buffer in fixed frames. Once the data runs out
//! it keeps producing silent frames, one per frame period, so the session
//! behaves like a quiet room.

use super::source::{frame_bytes_for, FrameSource, ReadError, SourceError};
use crate::config::AppConfig;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::{Duration, Instant};

pub struct ReplaySource {
    pcm: Vec<u8>,
    sample_rate: u32,
    frame_bytes: usize,
    frame_period: Duration,
    realtime: bool,
    position: usize,
    started: bool,
    released: bool,
    next_deadline: Option<Instant>,
    label: String,
}

impl ReplaySource {
    pub fn from_pcm(pcm: Vec<u8>, sample_rate: u32, frame_ms: u64) -> Self {
        Self {
            pcm,
            sample_rate,
            frame_bytes: frame_bytes_for(sample_rate, frame_ms),
            frame_period: Duration::from_millis(frame_ms),
            realtime: false,
            position: 0,
            started: false,
            released: false,
            next_deadline: None,
            label: "replay".to_string(),
        }
    }

    pub fn from_file(path: &Path, sample_rate: u32, frame_ms: u64) -> Result<Self> {
        let pcm = std::fs::read(path)
            .with_context(|| format!("failed to read PCM file {}", path.display()))?;
        let mut source = Self::from_pcm(pcm, sample_rate, frame_ms);
        source.label = format!("replay:{}", path.display());
        Ok(source)
    }

    /// Build from `--replay-pcm` and friends; `None` when no file was given.
    pub fn from_config(cfg: &AppConfig) -> Result<Option<Self>> {
        let Some(path) = cfg.replay_pcm.as_deref() else {
            return Ok(None);
        };
        let source = Self::from_file(path, cfg.replay_sample_rate, cfg.frame_ms)?
            .with_realtime(cfg.replay_realtime);
        Ok(Some(source))
    }

    /// Pace reads at one frame per frame period instead of as fast as asked.
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// True once every byte of the file has been served.
    pub fn exhausted(&self) -> bool {
        self.position >= self.pcm.len()
    }

    /// Sleeps out the frame period when replaying in real time, and always
    /// once the file is exhausted so trailing silence does not spin.
    fn pace(&mut self) {
        if !self.realtime && !self.exhausted() {
            return;
        }
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now);
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        self.next_deadline = Some(deadline.max(now) + self.frame_period);
    }
}

impl FrameSource for ReplaySource {
    fn start(&mut self) -> Result<(), SourceError> {
        if self.released {
            return Err(SourceError::Released);
        }
        if self.started {
            return Err(SourceError::Busy);
        }
        self.started = true;
        self.next_deadline = None;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        if !self.started {
            return Err(ReadError::InvalidOperation);
        }
        self.pace();
        let len = self.frame_bytes.min(buf.len());
        let available = self.pcm.len().saturating_sub(self.position).min(len);
        buf[..available].copy_from_slice(&self.pcm[self.position..self.position + available]);
        buf[available..len].fill(0);
        self.position += available;
        Ok(len)
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        self.started = false;
        Ok(())
    }

    fn release(&mut self) {
        self.started = false;
        self.released = true;
    }

    fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> String {
        self.label.clone()
    }
}
