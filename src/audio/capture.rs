//! Capture session state machine.
//!
//! Owns a [`FrameSource`] and the frame consumers, runs the capture loop on a
//! dedicated thread while recording, and hands both back when the loop exits.
//! Stopping is an explicit sequence: raise the cancel flag, the loop sees it
//! after its current read, the thread exits and returns the source, then the
//! source is stopped (and on terminate, released).

use super::source::{FrameSource, SourceError};
use super::AudioFrame;
use crossbeam_channel::bounded;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Receives every frame the capture loop reads, in read order, on the capture thread.
pub trait FrameConsumer: Send {
    /// Called on the control thread once the source is open, just before the
    /// loop starts.
    fn on_start(&mut self, _sample_rate: u32) {}

    fn on_frame(&mut self, frame: &AudioFrame<'_>);

    /// Called on the control thread after the loop has exited.
    fn on_stop(&mut self, _sample_rate: u32) {}

    fn name(&self) -> &'static str {
        "consumer"
    }
}

/// Counters for one capture run, reported when it stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureMetrics {
    pub frames_processed: u64,
    pub bytes_processed: u64,
    pub read_errors: u64,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    /// The source was released; the session can never record again.
    Terminated,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a call to [`CaptureSession::start`] actually did. The request was
/// always accepted; only `Started` means frames are flowing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRecording,
    /// The device could not be opened; the session stays idle and may be retried.
    Unavailable(SourceError),
    Terminated,
}

struct Pipeline {
    source: Box<dyn FrameSource>,
    consumers: Vec<Box<dyn FrameConsumer>>,
}

struct CaptureLoop {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<Option<(Pipeline, CaptureMetrics)>>,
}

enum State {
    Idle(Pipeline),
    Recording(CaptureLoop),
    Terminated,
}

/// Idle/Recording state machine around one frame source.
pub struct CaptureSession {
    state: State,
    last_metrics: Option<CaptureMetrics>,
}

impl CaptureSession {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            state: State::Idle(Pipeline {
                source,
                consumers: Vec::new(),
            }),
            last_metrics: None,
        }
    }

    /// Attach a consumer. Only possible while idle; returns false otherwise.
    pub fn add_consumer(&mut self, consumer: Box<dyn FrameConsumer>) -> bool {
        if let State::Idle(pipeline) = &mut self.state {
            tracing::debug!(consumer = consumer.name(), "frame consumer attached");
            pipeline.consumers.push(consumer);
            return true;
        }
        tracing::warn!(
            consumer = consumer.name(),
            state = %self.state(),
            "cannot attach consumer unless idle"
        );
        false
    }

    pub fn with_consumer(mut self, consumer: Box<dyn FrameConsumer>) -> Self {
        self.add_consumer(consumer);
        self
    }

    pub fn state(&self) -> SessionState {
        match self.state {
            State::Idle(_) => SessionState::Idle,
            State::Recording(_) => SessionState::Recording,
            State::Terminated => SessionState::Terminated,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_recording(&self) -> bool {
        matches!(self.state, State::Recording(_))
    }

    /// Metrics of the most recently stopped run.
    pub fn last_metrics(&self) -> Option<&CaptureMetrics> {
        self.last_metrics.as_ref()
    }

    /// Open the source and spawn the capture loop.
    pub fn start(&mut self) -> StartOutcome {
        let mut pipeline = match std::mem::replace(&mut self.state, State::Terminated) {
            State::Idle(pipeline) => pipeline,
            State::Recording(capture) => {
                self.state = State::Recording(capture);
                tracing::debug!("already recording; start ignored");
                return StartOutcome::AlreadyRecording;
            }
            State::Terminated => {
                tracing::warn!("capture session terminated; start ignored");
                return StartOutcome::Terminated;
            }
        };

        tracing::debug!(source = %pipeline.source.name(), "trying to start recording");
        if let Err(err) = pipeline.source.start() {
            tracing::warn!(error = %err, "cannot start recording");
            self.state = State::Idle(pipeline);
            return StartOutcome::Unavailable(err);
        }

        let sample_rate = pipeline.source.sample_rate();
        for consumer in pipeline.consumers.iter_mut() {
            consumer.on_start(sample_rate);
        }

        match spawn_capture_loop(pipeline) {
            Ok(capture) => {
                self.state = State::Recording(capture);
                tracing::info!("recording started");
                StartOutcome::Started
            }
            Err((mut pipeline, err)) => {
                tracing::warn!(error = %err, "failed to spawn capture loop");
                if let Err(err) = pipeline.source.stop() {
                    tracing::debug!(error = %err, "source stop after failed spawn");
                }
                self.state = State::Idle(pipeline);
                StartOutcome::Unavailable(SourceError::Device(err.to_string()))
            }
        }
    }

    /// Cancel the loop, wait for it to exit, and stop the source. A no-op
    /// unless recording.
    pub fn stop(&mut self) -> Option<CaptureMetrics> {
        let capture = match std::mem::replace(&mut self.state, State::Terminated) {
            State::Recording(capture) => capture,
            other => {
                tracing::debug!(state = %state_label(&other), "not recording; stop ignored");
                self.state = other;
                return None;
            }
        };

        capture.cancel.store(true, Ordering::Release);
        let (mut pipeline, metrics) = match capture.handle.join() {
            Ok(Some(parts)) => parts,
            Ok(None) | Err(_) => {
                tracing::error!("capture loop lost its source; session terminated");
                return None;
            }
        };

        if let Err(err) = pipeline.source.stop() {
            tracing::debug!(error = %err, "source stop failed");
        }
        let sample_rate = pipeline.source.sample_rate();
        for consumer in pipeline.consumers.iter_mut() {
            consumer.on_stop(sample_rate);
        }

        tracing::info!(
            frames = metrics.frames_processed,
            bytes = metrics.bytes_processed,
            read_errors = metrics.read_errors,
            elapsed_ms = metrics.elapsed_ms,
            "recording stopped"
        );
        self.state = State::Idle(pipeline);
        self.last_metrics = Some(metrics.clone());
        Some(metrics)
    }

    /// Stop, then release the source permanently. Safe to call more than once.
    pub fn terminate(&mut self) {
        self.stop();
        match std::mem::replace(&mut self.state, State::Terminated) {
            State::Idle(mut pipeline) => {
                pipeline.source.release();
                tracing::info!(source = %pipeline.source.name(), "capture session terminated");
            }
            State::Recording(_) | State::Terminated => {}
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn state_label(state: &State) -> &'static str {
    match state {
        State::Idle(_) => SessionState::Idle.label(),
        State::Recording(_) => SessionState::Recording.label(),
        State::Terminated => SessionState::Terminated.label(),
    }
}

/// Spawn the loop thread. The pipeline is only handed over once the thread
/// exists, so a failed spawn gives it back.
fn spawn_capture_loop(pipeline: Pipeline) -> Result<CaptureLoop, (Pipeline, std::io::Error)> {
    let cancel = Arc::new(AtomicBool::new(false));
    let loop_cancel = cancel.clone();
    let (handoff_tx, handoff_rx) = bounded::<Pipeline>(1);

    let spawned = thread::Builder::new()
        .name("capture-loop".to_string())
        .spawn(move || {
            let pipeline = handoff_rx.recv().ok()?;
            Some(run_capture_loop(pipeline, &loop_cancel))
        });

    let handle = match spawned {
        Ok(handle) => handle,
        Err(err) => return Err((pipeline, err)),
    };
    if let Err(returned) = handoff_tx.send(pipeline) {
        let _ = handle.join();
        return Err((
            returned.into_inner(),
            std::io::Error::other("capture thread exited before start"),
        ));
    }
    Ok(CaptureLoop { cancel, handle })
}

fn run_capture_loop(mut pipeline: Pipeline, cancel: &AtomicBool) -> (Pipeline, CaptureMetrics) {
    let started = Instant::now();
    let mut metrics = CaptureMetrics::default();
    let mut buf = vec![0u8; pipeline.source.frame_bytes().max(2)];

    while !cancel.load(Ordering::Acquire) {
        match pipeline.source.read(&mut buf) {
            Ok(len) => {
                let frame = AudioFrame::new(&buf, len);
                for consumer in pipeline.consumers.iter_mut() {
                    consumer.on_frame(&frame);
                }
                metrics.frames_processed += 1;
                metrics.bytes_processed += frame.len() as u64;
            }
            Err(err) => {
                metrics.read_errors += 1;
                tracing::trace!(error = %err, "transient read error; retrying");
            }
        }
    }

    metrics.elapsed_ms = started.elapsed().as_millis() as u64;
    (pipeline, metrics)
}
