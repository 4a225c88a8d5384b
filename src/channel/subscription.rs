use super::handler::EventSink;
use crate::lock_or_recover;
use serde_json::Value;
use std::sync::Mutex;

/// Single-subscriber slot behind a stream handler.
///
/// `replace` installs a sink and drops any previous one; `clear` removes it
/// silently and `close` ends it with an end-of-stream.
/// If forwarding an event fails, the failure is reported once on that sink as
/// an error with the slot's code and the subscription is dropped.
pub struct SubscriptionSlot {
    code: String,
    sink: Mutex<Option<Box<dyn EventSink>>>,
}

impl SubscriptionSlot {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            sink: Mutex::new(None),
        }
    }

    /// Install `sink`. Returns true if a previous subscriber was replaced.
    pub fn replace(&self, sink: Box<dyn EventSink>) -> bool {
        let previous = lock_or_recover(&self.sink, &self.code).replace(sink);
        if previous.is_some() {
            tracing::debug!(code = %self.code, "subscription replaced");
        }
        previous.is_some()
    }

    /// Drop the current subscriber, if any. Returns true if one was removed.
    pub fn clear(&self) -> bool {
        lock_or_recover(&self.sink, &self.code).take().is_some()
    }

    /// End the current subscription from this side: the subscriber gets an
    /// end-of-stream. Returns true if one was closed.
    pub fn close(&self) -> bool {
        let sink = lock_or_recover(&self.sink, &self.code).take();
        match sink {
            Some(mut sink) => {
                tracing::debug!(code = %self.code, "closing subscription");
                sink.end_of_stream();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        lock_or_recover(&self.sink, &self.code).is_some()
    }

    /// Forward `event` to the current subscriber. Returns false when nobody is
    /// subscribed or the delivery failed.
    pub fn emit(&self, event: Value) -> bool {
        let mut slot = lock_or_recover(&self.sink, &self.code);
        let Some(sink) = slot.as_mut() else {
            return false;
        };
        match sink.success(event) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(code = %self.code, error = %err, "dropping subscriber after failed delivery");
                sink.error(&self.code, &err.to_string(), None);
                *slot = None;
                false
            }
        }
    }
}
