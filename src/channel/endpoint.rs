//! Endpoints produced by [`ChannelNode::setup`](super::ChannelNode::setup) and
//! the binder contract the boundary adapter implements.

use super::error::{ChannelError, SinkError};
use super::handler::{EventSink, HandlerCell, RequestHandler, StreamHandler};
use super::reply::Reply;
use crate::lock_or_recover;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub(crate) type SharedRequest = Arc<HandlerCell<dyn RequestHandler>>;
pub(crate) type SharedStream = Arc<HandlerCell<dyn StreamHandler>>;

const DISPOSED_MESSAGE: &str = "channel disposed";

/// Receives the endpoints of a channel tree during setup.
///
/// Implemented by the boundary adapter, which later resolves inbound calls and
/// subscriptions by path and forwards them to the matching endpoint.
pub trait Binder {
    fn bind_request(&mut self, endpoint: RequestEndpoint) -> Result<(), ChannelError>;

    fn bind_stream(&mut self, endpoint: StreamEndpoint) -> Result<(), ChannelError>;
}

/// The request endpoint of one node: every request handler of that node,
/// addressed by method name under the node's path.
pub struct RequestEndpoint {
    path: String,
    handlers: BTreeMap<String, SharedRequest>,
}

impl RequestEndpoint {
    pub(crate) fn new(path: String, handlers: BTreeMap<String, SharedRequest>) -> Self {
        Self { path, handlers }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Route one inbound call. Always resolves `reply`, possibly later if the
    /// handler defers it.
    pub fn dispatch(&self, method: &str, args: &Value, reply: Reply) {
        let Some(cell) = self.handlers.get(method) else {
            tracing::debug!(path = %self.path, method, "method not implemented");
            reply.not_implemented();
            return;
        };

        let fallback = reply.fork();
        match cell.with(|handler| handler.handle(args, reply)) {
            Some(Ok(())) => {
                if !fallback.is_resolved() {
                    tracing::trace!(path = %self.path, method, "reply deferred");
                }
            }
            Some(Err(fault)) => {
                let message = format!("{fault:#}");
                tracing::warn!(path = %self.path, method, %message, "request handler fault");
                fallback.error(&self.path, &message, None);
            }
            None => {
                tracing::warn!(path = %self.path, method, "call on disposed handler");
                fallback.error(&self.path, DISPOSED_MESSAGE, None);
            }
        }
    }
}

/// Subscribe/cancel endpoint for a single stream handler.
pub struct StreamEndpoint {
    path: String,
    handler: SharedStream,
}

impl StreamEndpoint {
    pub(crate) fn new(path: String, handler: SharedStream) -> Self {
        Self { path, handler }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Start a subscription. A fault while subscribing is reported on the sink.
    pub fn listen(&self, args: &Value, sink: Box<dyn EventSink>) {
        let (given, mut kept) = SharedSink::split(sink);
        match self.handler.with(|handler| handler.handle(args, Some(Box::new(given)))) {
            Some(Ok(())) => {}
            Some(Err(fault)) => {
                let message = format!("{fault:#}");
                tracing::warn!(path = %self.path, %message, "stream handler fault on listen");
                kept.error(&self.path, &message, None);
            }
            None => {
                tracing::warn!(path = %self.path, "listen on disposed handler");
                kept.error(&self.path, DISPOSED_MESSAGE, None);
            }
        }
    }

    /// Cancel the current subscription (explicit unsubscribe or transport teardown).
    pub fn cancel(&self, args: &Value) {
        match self.handler.with(|handler| handler.handle(args, None)) {
            Some(Ok(())) | None => {}
            Some(Err(fault)) => {
                tracing::warn!(path = %self.path, fault = %format!("{fault:#}"), "stream handler fault on cancel");
            }
        }
    }
}

/// Two handles onto one sink: one moves into the handler, the other stays with
/// the endpoint so a fault raised while subscribing still reaches the caller.
struct SharedSink {
    inner: Arc<Mutex<Box<dyn EventSink>>>,
}

impl SharedSink {
    fn split(sink: Box<dyn EventSink>) -> (SharedSink, SharedSink) {
        let inner = Arc::new(Mutex::new(sink));
        (
            SharedSink {
                inner: inner.clone(),
            },
            SharedSink { inner },
        )
    }
}

impl EventSink for SharedSink {
    fn success(&mut self, event: Value) -> Result<(), SinkError> {
        lock_or_recover(&self.inner, "sink").success(event)
    }

    fn error(&mut self, code: &str, message: &str, details: Option<Value>) {
        lock_or_recover(&self.inner, "sink").error(code, message, details);
    }

    fn end_of_stream(&mut self) {
        lock_or_recover(&self.inner, "sink").end_of_stream();
    }
}
