//! Frame consumers that turn capture output into stream events.
//!
//! Both run their per-frame work on the capture thread and hand the resulting
//! event to the delivery context through a [`Deliverer`]; they never touch a
//! sink directly.

use crate::audio::{AudioFrame, FrameConsumer, VadConfig, VoiceActivityDetector};
use crate::channel::{Deliverer, DeliveryError, SubscriptionSlot};
use base64::Engine;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Runs the detector and keeps the `speaking` subscriber in step with it.
///
/// `told` is the last state handed to the delivery queue for the current
/// subscriber. Every frame, and every start and stop, posts the detector's
/// state when it differs, so a post dropped on a full queue is retried until
/// it lands, even across a stop and the next start.
pub(crate) struct SpeakingPublisher {
    vad: VoiceActivityDetector,
    slot: Arc<SubscriptionSlot>,
    deliverer: Deliverer,
    /// Set by the stream handler when a subscriber joins.
    joined: Arc<AtomicBool>,
    told: bool,
}

impl SpeakingPublisher {
    pub(crate) fn new(
        cfg: &VadConfig,
        slot: Arc<SubscriptionSlot>,
        deliverer: Deliverer,
        joined: Arc<AtomicBool>,
    ) -> Self {
        Self {
            vad: VoiceActivityDetector::new(cfg),
            slot,
            deliverer,
            joined,
            told: false,
        }
    }

    /// False when nobody listens. A fresh subscriber has been told nothing.
    fn has_subscriber(&mut self) -> bool {
        if self.joined.swap(false, Ordering::AcqRel) || !self.slot.is_active() {
            self.told = false;
        }
        self.slot.is_active()
    }

    fn sync(&mut self, speaking: bool) {
        if !self.has_subscriber() || speaking == self.told {
            return;
        }
        let slot = self.slot.clone();
        match self.deliverer.post(move || {
            slot.emit(Value::Bool(speaking));
        }) {
            Ok(()) => self.told = speaking,
            Err(DeliveryError::Full) => {
                tracing::debug!(speaking, "delivery queue full; will resend speaking state");
            }
            Err(DeliveryError::Closed) => self.told = speaking,
        }
    }
}

impl FrameConsumer for SpeakingPublisher {
    /// Settles a `false` that could not be posted at the previous stop.
    fn on_start(&mut self, _sample_rate: u32) {
        self.vad.reset();
        self.sync(false);
    }

    fn on_frame(&mut self, frame: &AudioFrame<'_>) {
        if let Some(speaking) = self.vad.process_frame(frame) {
            tracing::trace!(speaking, "speaking state changed");
        }
        self.sync(self.vad.current());
    }

    /// A subscriber that last saw `true` is told the capture went quiet.
    fn on_stop(&mut self, _sample_rate: u32) {
        self.vad.reset();
        self.sync(false);
    }

    fn name(&self) -> &'static str {
        "speaking"
    }
}

/// Keeps the raw PCM of one recording and publishes it on stop.
pub(crate) struct TakeAccumulator {
    max_take_ms: u64,
    max_bytes: usize,
    buffer: Vec<u8>,
    truncated: bool,
    slot: Arc<SubscriptionSlot>,
    deliverer: Deliverer,
}

impl TakeAccumulator {
    pub(crate) fn new(max_take_ms: u64, slot: Arc<SubscriptionSlot>, deliverer: Deliverer) -> Self {
        Self {
            max_take_ms,
            max_bytes: 0,
            buffer: Vec::new(),
            truncated: false,
            slot,
            deliverer,
        }
    }
}

/// Stream event carrying a whole take.
pub fn take_event(pcm: &[u8], sample_rate: u32) -> Value {
    json!({
        "encoding": "pcm_s16le",
        "sample_rate": sample_rate,
        "bytes": pcm.len(),
        "data": base64::engine::general_purpose::STANDARD.encode(pcm),
    })
}

impl FrameConsumer for TakeAccumulator {
    fn on_start(&mut self, sample_rate: u32) {
        self.buffer.clear();
        self.truncated = false;
        let samples = u64::from(sample_rate) * self.max_take_ms / 1000;
        self.max_bytes = usize::try_from(samples * 2).unwrap_or(usize::MAX);
    }

    fn on_frame(&mut self, frame: &AudioFrame<'_>) {
        let room = self.max_bytes.saturating_sub(self.buffer.len());
        let bytes = frame.bytes();
        if bytes.len() > room && !self.truncated {
            self.truncated = true;
            tracing::warn!(max_take_ms = self.max_take_ms, "take limit reached; dropping further audio");
        }
        self.buffer.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    fn on_stop(&mut self, sample_rate: u32) {
        let take = std::mem::take(&mut self.buffer);
        if take.is_empty() {
            return;
        }
        tracing::debug!(bytes = take.len(), sample_rate, "publishing take");
        let slot = self.slot.clone();
        let posted = self.deliverer.post(move || {
            slot.emit(take_event(&take, sample_rate));
        });
        if let Err(err) = posted {
            tracing::warn!(error = %err, "take dropped");
        }
    }

    fn name(&self) -> &'static str {
        "take"
    }
}
