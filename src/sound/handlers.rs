use super::analyzer::VoiceAnalyzer;
use super::METHOD_RECORD;
use crate::channel::{EventSink, Reply, RequestHandler, StreamHandler};
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;

/// `record(bool)`: start or stop capture. Success means the toggle was
/// accepted, not that the device opened; poll `status` for that.
pub struct RecordHandler {
    analyzer: Arc<VoiceAnalyzer>,
}

impl RecordHandler {
    pub fn new(analyzer: Arc<VoiceAnalyzer>) -> Self {
        Self { analyzer }
    }
}

impl RequestHandler for RecordHandler {
    fn handle(&mut self, args: &Value, reply: Reply) -> Result<()> {
        let Some(record) = args.as_bool() else {
            reply.error(METHOD_RECORD, "missing argument", None);
            return Ok(());
        };
        if record {
            let outcome = self.analyzer.start();
            tracing::debug!(?outcome, "record requested");
        } else {
            self.analyzer.stop();
        }
        reply.success(Value::Null);
        Ok(())
    }

    fn dispose(&mut self) {
        self.analyzer.terminate();
    }
}

/// `status()`: current capture state.
pub struct StatusHandler {
    analyzer: Arc<VoiceAnalyzer>,
}

impl StatusHandler {
    pub fn new(analyzer: Arc<VoiceAnalyzer>) -> Self {
        Self { analyzer }
    }
}

impl RequestHandler for StatusHandler {
    fn handle(&mut self, _args: &Value, reply: Reply) -> Result<()> {
        let mut status = json!({ "state": self.analyzer.state().label() });
        if let Some(metrics) = self.analyzer.last_metrics() {
            status["last_take"] = json!({
                "frames": metrics.frames_processed,
                "bytes": metrics.bytes_processed,
                "read_errors": metrics.read_errors,
                "elapsed_ms": metrics.elapsed_ms,
            });
        }
        reply.success(status);
        Ok(())
    }
}

/// `speaking` stream: one boolean per voice-activity edge.
pub struct SpeakingHandler {
    analyzer: Arc<VoiceAnalyzer>,
}

impl SpeakingHandler {
    pub fn new(analyzer: Arc<VoiceAnalyzer>) -> Self {
        Self { analyzer }
    }
}

impl StreamHandler for SpeakingHandler {
    fn handle(&mut self, _args: &Value, sink: Option<Box<dyn EventSink>>) -> Result<()> {
        match sink {
            Some(sink) => self.analyzer.subscribe_speaking(sink),
            None => {
                self.analyzer.speaking_slot().clear();
            }
        }
        Ok(())
    }

    fn dispose(&mut self) {
        self.analyzer.speaking_slot().close();
        self.analyzer.terminate();
    }
}

/// `recording` stream: the raw PCM of each take, published when it stops.
pub struct RecordingHandler {
    analyzer: Arc<VoiceAnalyzer>,
}

impl RecordingHandler {
    pub fn new(analyzer: Arc<VoiceAnalyzer>) -> Self {
        Self { analyzer }
    }
}

impl StreamHandler for RecordingHandler {
    fn handle(&mut self, _args: &Value, sink: Option<Box<dyn EventSink>>) -> Result<()> {
        match sink {
            Some(sink) => {
                self.analyzer.recording_slot().replace(sink);
            }
            None => {
                self.analyzer.recording_slot().clear();
            }
        }
        Ok(())
    }

    fn dispose(&mut self) {
        self.analyzer.recording_slot().close();
        self.analyzer.terminate();
    }
}
