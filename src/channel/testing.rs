//! Test doubles shared by the channel, sound and ipc tests.

use super::{Binder, ChannelError, EventSink, RequestEndpoint, Response, SinkError, StreamEndpoint};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SinkEvent {
    Event(Value),
    Error { code: String, message: String },
    EndOfStream,
}

/// Sink that records everything it receives. Optionally starts rejecting
/// events after `accept` successful deliveries.
#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    pub(crate) events: Arc<Mutex<Vec<SinkEvent>>>,
    accept: Option<usize>,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn rejecting_after(accept: usize) -> Self {
        Self {
            events: Arc::default(),
            accept: Some(accept),
        }
    }

    pub(crate) fn boxed(&self) -> Box<dyn EventSink> {
        Box::new(self.clone())
    }

    pub(crate) fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn values(&self) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Event(value) => Some(value),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn success(&mut self, event: Value) -> Result<(), SinkError> {
        let mut events = self.events.lock().unwrap();
        if let Some(accept) = self.accept {
            let delivered = events
                .iter()
                .filter(|e| matches!(e, SinkEvent::Event(_)))
                .count();
            if delivered >= accept {
                return Err(SinkError::Rejected("subscriber gone".to_string()));
            }
        }
        events.push(SinkEvent::Event(event));
        Ok(())
    }

    fn error(&mut self, code: &str, message: &str, _details: Option<Value>) {
        self.events.lock().unwrap().push(SinkEvent::Error {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    fn end_of_stream(&mut self) {
        self.events.lock().unwrap().push(SinkEvent::EndOfStream);
    }
}

/// Binder that just keeps the endpoints, keyed by path.
#[derive(Default)]
pub(crate) struct MapBinder {
    pub(crate) requests: BTreeMap<String, RequestEndpoint>,
    pub(crate) streams: BTreeMap<String, StreamEndpoint>,
}

impl Binder for MapBinder {
    fn bind_request(&mut self, endpoint: RequestEndpoint) -> Result<(), ChannelError> {
        let path = endpoint.path().to_string();
        if self.requests.contains_key(&path) {
            return Err(ChannelError::PathInUse(path));
        }
        self.requests.insert(path, endpoint);
        Ok(())
    }

    fn bind_stream(&mut self, endpoint: StreamEndpoint) -> Result<(), ChannelError> {
        let path = endpoint.path().to_string();
        if self.streams.contains_key(&path) {
            return Err(ChannelError::PathInUse(path));
        }
        self.streams.insert(path, endpoint);
        Ok(())
    }
}

impl MapBinder {
    /// Call `method` on the request endpoint at `path` and return the response.
    pub(crate) fn call(&self, path: &str, method: &str, args: Value) -> Option<Response> {
        let endpoint = self.requests.get(path)?;
        let captured = Arc::new(Mutex::new(None));
        let slot = captured.clone();
        endpoint.dispatch(method, &args, super::Reply::new(path, move |response| {
            *slot.lock().unwrap() = Some(response);
        }));
        let response = captured.lock().unwrap().take();
        response
    }
}
