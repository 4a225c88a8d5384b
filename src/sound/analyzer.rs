use super::publisher::{SpeakingPublisher, TakeAccumulator};
use super::{SoundConfig, EVENT_RECORDING, EVENT_SPEAKING};
use crate::audio::{CaptureMetrics, CaptureSession, FrameSource, SessionState, StartOutcome};
use crate::channel::{Deliverer, EventSink, SubscriptionSlot};
use crate::lock_or_recover;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One capture session plus the subscription slots fed from it.
///
/// Shared by every handler of the sound channel. Any of them may tear it
/// down; [`VoiceAnalyzer::terminate`] only acts the first time.
pub struct VoiceAnalyzer {
    session: Mutex<CaptureSession>,
    terminated: AtomicBool,
    speaking: Arc<SubscriptionSlot>,
    recording: Arc<SubscriptionSlot>,
    speaking_joined: Arc<AtomicBool>,
}

impl VoiceAnalyzer {
    pub fn new(source: Box<dyn FrameSource>, cfg: &SoundConfig, deliverer: Deliverer) -> Arc<Self> {
        let speaking = Arc::new(SubscriptionSlot::new(EVENT_SPEAKING));
        let recording = Arc::new(SubscriptionSlot::new(EVENT_RECORDING));
        let speaking_joined = Arc::new(AtomicBool::new(false));

        let mut session = CaptureSession::new(source).with_consumer(Box::new(SpeakingPublisher::new(
            &cfg.vad,
            speaking.clone(),
            deliverer.clone(),
            speaking_joined.clone(),
        )));
        if cfg.max_take_ms > 0 {
            session.add_consumer(Box::new(TakeAccumulator::new(
                cfg.max_take_ms,
                recording.clone(),
                deliverer,
            )));
        }

        Arc::new(Self {
            session: Mutex::new(session),
            terminated: AtomicBool::new(false),
            speaking,
            recording,
            speaking_joined,
        })
    }

    pub fn start(&self) -> StartOutcome {
        lock_or_recover(&self.session, "capture session").start()
    }

    pub fn stop(&self) -> Option<CaptureMetrics> {
        lock_or_recover(&self.session, "capture session").stop()
    }

    pub fn state(&self) -> SessionState {
        lock_or_recover(&self.session, "capture session").state()
    }

    pub fn last_metrics(&self) -> Option<CaptureMetrics> {
        lock_or_recover(&self.session, "capture session")
            .last_metrics()
            .cloned()
    }

    /// Stop and release the source for good. Later calls do nothing.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        lock_or_recover(&self.session, "capture session").terminate();
    }

    #[cfg(test)]
    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub(crate) fn subscribe_speaking(&self, sink: Box<dyn EventSink>) {
        self.speaking.replace(sink);
        self.speaking_joined.store(true, Ordering::Release);
    }

    pub(crate) fn speaking_slot(&self) -> &SubscriptionSlot {
        &self.speaking
    }

    pub(crate) fn recording_slot(&self) -> &SubscriptionSlot {
        &self.recording
    }
}
