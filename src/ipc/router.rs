//! Routes parsed commands to the endpoints bound by `ChannelNode::setup`.

use super::protocol::{IpcCommand, IpcEvent};
use crate::channel::{
    Binder, ChannelError, EventSink, Reply, RequestEndpoint, SinkError, StreamEndpoint,
};
use crossbeam_channel::Sender;
use serde_json::Value;
use std::collections::BTreeMap;

pub const UNKNOWN_CHANNEL: &str = "unknown_channel";

/// Boundary-side binder: owns every endpoint and the active listens.
pub struct Router {
    requests: BTreeMap<String, RequestEndpoint>,
    streams: BTreeMap<String, StreamEndpoint>,
    listening: BTreeMap<String, Value>,
    events: Sender<IpcEvent>,
}

impl Router {
    pub fn new(events: Sender<IpcEvent>) -> Self {
        Self {
            requests: BTreeMap::new(),
            streams: BTreeMap::new(),
            listening: BTreeMap::new(),
            events,
        }
    }

    pub fn handle(&mut self, command: IpcCommand) {
        match command {
            IpcCommand::Call {
                id,
                channel,
                method,
                args,
            } => self.call(id, &channel, &method, &args),
            IpcCommand::Listen { channel, args } => self.listen(&channel, args),
            IpcCommand::Cancel { channel, args } => self.cancel(&channel, &args),
            IpcCommand::ListChannels => self.emit_channels(),
        }
    }

    pub fn call(&self, id: u64, channel: &str, method: &str, args: &Value) {
        let Some(endpoint) = self.requests.get(channel) else {
            tracing::debug!(channel, method, "call on unbound channel");
            self.emit(IpcEvent::NotImplemented { id });
            return;
        };
        let events = self.events.clone();
        let reply = Reply::new(channel, move |response| {
            let _ = events.send(IpcEvent::from_response(id, response));
        });
        endpoint.dispatch(method, args, reply);
    }

    pub fn listen(&mut self, channel: &str, args: Value) {
        let Some(endpoint) = self.streams.get(channel) else {
            tracing::debug!(channel, "listen on unbound channel");
            self.emit(IpcEvent::StreamError {
                channel: channel.to_string(),
                code: UNKNOWN_CHANNEL.to_string(),
                message: format!("no stream channel named {channel}"),
                details: None,
            });
            return;
        };
        let sink = ChannelSink {
            channel: channel.to_string(),
            events: self.events.clone(),
        };
        endpoint.listen(&args, Box::new(sink));
        self.listening.insert(channel.to_string(), args);
    }

    pub fn cancel(&mut self, channel: &str, args: &Value) {
        let Some(endpoint) = self.streams.get(channel) else {
            self.emit(IpcEvent::StreamError {
                channel: channel.to_string(),
                code: UNKNOWN_CHANNEL.to_string(),
                message: format!("no stream channel named {channel}"),
                details: None,
            });
            return;
        };
        self.listening.remove(channel);
        endpoint.cancel(args);
    }

    /// Channels with a live listen, in path order.
    pub fn listening(&self) -> impl Iterator<Item = &str> {
        self.listening.keys().map(String::as_str)
    }

    pub fn channels_event(&self) -> IpcEvent {
        IpcEvent::Channels {
            version: env!("CARGO_PKG_VERSION").to_string(),
            requests: self.requests.keys().cloned().collect(),
            streams: self.streams.keys().cloned().collect(),
        }
    }

    pub fn emit_channels(&self) {
        self.emit(self.channels_event());
    }

    /// Transport teardown: cancel every active listen with its original args.
    pub fn shutdown(&mut self) {
        let listening = std::mem::take(&mut self.listening);
        for (channel, args) in listening {
            if let Some(endpoint) = self.streams.get(&channel) {
                tracing::debug!(%channel, "cancelling listen at shutdown");
                endpoint.cancel(&args);
            }
        }
    }

    fn emit(&self, event: IpcEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("event writer gone; dropping event");
        }
    }
}

impl Binder for Router {
    fn bind_request(&mut self, endpoint: RequestEndpoint) -> Result<(), ChannelError> {
        let path = endpoint.path().to_string();
        if self.requests.contains_key(&path) {
            return Err(ChannelError::PathInUse(path));
        }
        tracing::debug!(%path, methods = ?endpoint.methods().collect::<Vec<_>>(), "request channel bound");
        self.requests.insert(path, endpoint);
        Ok(())
    }

    fn bind_stream(&mut self, endpoint: StreamEndpoint) -> Result<(), ChannelError> {
        let path = endpoint.path().to_string();
        if self.streams.contains_key(&path) {
            return Err(ChannelError::PathInUse(path));
        }
        tracing::debug!(%path, "stream channel bound");
        self.streams.insert(path, endpoint);
        Ok(())
    }
}

/// Forwards one subscription's events to the writer.
struct ChannelSink {
    channel: String,
    events: Sender<IpcEvent>,
}

impl EventSink for ChannelSink {
    fn success(&mut self, event: Value) -> Result<(), SinkError> {
        self.events
            .send(IpcEvent::Stream {
                channel: self.channel.clone(),
                data: event,
            })
            .map_err(|_| SinkError::Closed)
    }

    fn error(&mut self, code: &str, message: &str, details: Option<Value>) {
        let _ = self.events.send(IpcEvent::StreamError {
            channel: self.channel.clone(),
            code: code.to_string(),
            message: message.to_string(),
            details,
        });
    }

    fn end_of_stream(&mut self) {
        let _ = self.events.send(IpcEvent::EndOfStream {
            channel: self.channel.clone(),
        });
    }
}
