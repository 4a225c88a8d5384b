//! Test doubles for the capture pipeline.

use super::capture::FrameConsumer;
use super::source::{FrameSource, ReadError, SourceError};
use super::AudioFrame;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const SCRIPT_POLL: Duration = Duration::from_millis(5);

/// Lifecycle calls observed by a [`ScriptedSource`].
#[derive(Debug, Default)]
pub(crate) struct SourceCalls {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub releases: AtomicUsize,
    pub reads: AtomicUsize,
}

impl SourceCalls {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// Source whose reads come from a test-controlled script. With nothing
/// queued, `read` reports `TimedOut` after a short poll.
pub(crate) struct ScriptedSource {
    frames: Receiver<Result<Vec<u8>, ReadError>>,
    frame_bytes: usize,
    calls: Arc<SourceCalls>,
    start_error: Arc<Mutex<Option<SourceError>>>,
}

/// Test-side handle of a [`ScriptedSource`].
#[derive(Clone)]
pub(crate) struct Script {
    sender: Sender<Result<Vec<u8>, ReadError>>,
    pub calls: Arc<SourceCalls>,
    start_error: Arc<Mutex<Option<SourceError>>>,
}

impl ScriptedSource {
    pub fn new(frame_bytes: usize) -> (Self, Script) {
        let (sender, frames) = unbounded();
        let calls = Arc::new(SourceCalls::default());
        let start_error = Arc::new(Mutex::new(None));
        (
            Self {
                frames,
                frame_bytes,
                calls: calls.clone(),
                start_error: start_error.clone(),
            },
            Script {
                sender,
                calls,
                start_error,
            },
        )
    }
}

impl Script {
    pub fn frame(&self, bytes: &[u8]) {
        let _ = self.sender.send(Ok(bytes.to_vec()));
    }

    pub fn read_error(&self, err: ReadError) {
        let _ = self.sender.send(Err(err));
    }

    pub fn fail_next_start(&self, err: SourceError) {
        *self.start_error.lock().unwrap() = Some(err);
    }

    /// Spin until `reads` reads have happened or `timeout` passes.
    pub fn wait_for_reads(&self, reads: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.calls.reads() >= reads)
    }
}

impl FrameSource for ScriptedSource {
    fn start(&mut self) -> Result<(), SourceError> {
        if let Some(err) = self.start_error.lock().unwrap().take() {
            return Err(err);
        }
        self.calls.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        match self.frames.recv_timeout(SCRIPT_POLL) {
            Ok(Ok(frame)) => {
                self.calls.reads.fetch_add(1, Ordering::SeqCst);
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(len)
            }
            Ok(Err(err)) => {
                self.calls.reads.fetch_add(1, Ordering::SeqCst);
                Err(err)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(SCRIPT_POLL);
                Err(ReadError::TimedOut)
            }
        }
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        self.calls.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        self.calls.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}

/// Poll `condition` every millisecond until it holds or `timeout` passes.
pub(crate) fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Consumer that records what it saw.
#[derive(Clone, Default)]
pub(crate) struct CollectingConsumer {
    pub frames: Arc<Mutex<Vec<Vec<u8>>>>,
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
}

impl CollectingConsumer {
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap().clone()
    }
}

impl FrameConsumer for CollectingConsumer {
    fn on_start(&mut self, _sample_rate: u32) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_frame(&mut self, frame: &AudioFrame<'_>) {
        self.frames.lock().unwrap().push(frame.bytes().to_vec());
    }

    fn on_stop(&mut self, _sample_rate: u32) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "collecting"
    }
}
