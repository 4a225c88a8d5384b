//! Handler traits and the shared cells that endpoints dispatch through.

use super::error::SinkError;
use super::reply::Reply;
use crate::lock_or_recover;
use anyhow::Result;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Answers calls on a request channel.
///
/// Returning `Err` is a fault: the dispatcher answers the call with an error
/// whose code is the channel path, unless the handler already resolved it.
pub trait RequestHandler: Send {
    fn handle(&mut self, args: &Value, reply: Reply) -> Result<()>;

    fn dispose(&mut self) {}
}

/// Serves subscriptions on a stream channel.
///
/// `Some(sink)` starts a subscription; `None` cancels it. Cancellation only
/// releases what was tied to the subscription, it is not a dispose.
pub trait StreamHandler: Send {
    fn handle(&mut self, args: &Value, sink: Option<Box<dyn EventSink>>) -> Result<()>;

    fn dispose(&mut self) {}
}

/// Receiving end of a stream subscription, owned by the boundary adapter.
pub trait EventSink: Send {
    fn success(&mut self, event: Value) -> Result<(), SinkError>;

    fn error(&mut self, code: &str, message: &str, details: Option<Value>);

    fn end_of_stream(&mut self);
}

/// Request handler backed by a closure. Disposing it does nothing.
pub struct FnRequestHandler<F>(F);

/// Wrap a closure as a [`RequestHandler`].
pub fn request_fn<F>(handler: F) -> FnRequestHandler<F>
where
    F: FnMut(&Value, Reply) -> Result<()> + Send,
{
    FnRequestHandler(handler)
}

impl<F> RequestHandler for FnRequestHandler<F>
where
    F: FnMut(&Value, Reply) -> Result<()> + Send,
{
    fn handle(&mut self, args: &Value, reply: Reply) -> Result<()> {
        (self.0)(args, reply)
    }
}

/// Stream handler backed by a closure. Disposing it does nothing.
pub struct FnStreamHandler<F>(F);

/// Wrap a closure as a [`StreamHandler`].
pub fn stream_fn<F>(handler: F) -> FnStreamHandler<F>
where
    F: FnMut(&Value, Option<Box<dyn EventSink>>) -> Result<()> + Send,
{
    FnStreamHandler(handler)
}

impl<F> StreamHandler for FnStreamHandler<F>
where
    F: FnMut(&Value, Option<Box<dyn EventSink>>) -> Result<()> + Send,
{
    fn handle(&mut self, args: &Value, sink: Option<Box<dyn EventSink>>) -> Result<()> {
        (self.0)(args, sink)
    }
}

/// A registered handler shared between its node (which disposes it) and the
/// endpoint bound at setup (which dispatches to it).
pub(crate) struct HandlerCell<H: ?Sized> {
    name: String,
    disposed: AtomicBool,
    handler: Mutex<Box<H>>,
}

impl<H: ?Sized> HandlerCell<H> {
    pub(crate) fn new(name: &str, handler: Box<H>) -> Self {
        Self {
            name: name.to_string(),
            disposed: AtomicBool::new(false),
            handler: Mutex::new(handler),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Runs `f` against the handler unless it has been disposed.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut H) -> R) -> Option<R> {
        if self.is_disposed() {
            return None;
        }
        let mut handler = lock_or_recover(&self.handler, &self.name);
        Some(f(&mut handler))
    }

    /// Marks the cell disposed and runs `f` the first time only.
    pub(crate) fn dispose_with(&self, f: impl FnOnce(&mut H)) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            tracing::debug!(handler = %self.name, "handler already disposed");
            return;
        }
        let mut handler = lock_or_recover(&self.handler, &self.name);
        f(&mut handler);
    }
}

impl HandlerCell<dyn RequestHandler> {
    pub(crate) fn dispose(&self) {
        self.dispose_with(|handler| handler.dispose());
    }
}

impl HandlerCell<dyn StreamHandler> {
    pub(crate) fn dispose(&self) {
        self.dispose_with(|handler| handler.dispose());
    }
}
