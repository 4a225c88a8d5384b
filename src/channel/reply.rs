//! One-shot responses for request channels.

use crate::lock_or_recover;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Outcome of a request call as seen by the remote caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(Value),
    Error {
        code: String,
        message: String,
        details: Option<Value>,
    },
    /// The method is unknown on this channel. Not an error.
    NotImplemented,
}

impl Response {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

type Responder = Box<dyn FnOnce(Response) + Send>;

/// State shared by every handle onto one call. Its `Drop` runs once, when the
/// last handle goes away.
struct Pending {
    path: String,
    responder: Mutex<Option<Responder>>,
}

impl Pending {
    fn resolve(&self, response: Response) {
        let responder = lock_or_recover(&self.responder, "reply").take();
        match responder {
            Some(responder) => responder(response),
            None => tracing::debug!(path = %self.path, ?response, "reply already resolved; dropping"),
        }
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        let responder = match self.responder.get_mut() {
            Ok(responder) => responder.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(responder) = responder {
            tracing::warn!(path = %self.path, "request dropped without a response");
            responder(Response::error(
                self.path.clone(),
                "request dropped without a response",
            ));
        }
    }
}

/// Handle used by a request handler to answer a call.
///
/// Every call resolves exactly once: the first of `success`, `error` or
/// `not_implemented` wins and later attempts are logged and ignored. A handler
/// may move the `Reply` into deferred work. If the last handle is dropped
/// unresolved, the caller receives an error scoped to the channel path.
pub struct Reply {
    inner: Arc<Pending>,
}

impl Reply {
    pub fn new(path: &str, responder: impl FnOnce(Response) + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Pending {
                path: path.to_string(),
                responder: Mutex::new(Some(Box::new(responder))),
            }),
        }
    }

    /// Channel path the call was addressed to.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn success(self, result: Value) {
        self.inner.resolve(Response::Success(result));
    }

    pub fn error(self, code: &str, message: &str, details: Option<Value>) {
        self.inner.resolve(Response::Error {
            code: code.to_string(),
            message: message.to_string(),
            details,
        });
    }

    pub fn not_implemented(self) {
        self.inner.resolve(Response::NotImplemented);
    }

    pub fn is_resolved(&self) -> bool {
        lock_or_recover(&self.inner.responder, "reply").is_none()
    }

    /// Second handle onto the same pending response, kept by the dispatcher so a
    /// faulting handler can still be answered.
    pub(crate) fn fork(&self) -> Reply {
        Reply {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn reply_with_channel() -> (Reply, mpsc::Receiver<Response>) {
        let (tx, rx) = mpsc::channel();
        let reply = Reply::new("root/sound", move |response| {
            let _ = tx.send(response);
        });
        (reply, rx)
    }

    #[test]
    fn resolves_once() {
        let (reply, rx) = reply_with_channel();
        let fallback = reply.fork();
        reply.success(Value::Null);
        fallback.error("root/sound", "late", None);
        assert_eq!(rx.try_recv(), Ok(Response::Success(Value::Null)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_reply_answers_with_error() {
        let (reply, rx) = reply_with_channel();
        let fallback = reply.fork();
        drop(reply);
        assert!(rx.try_recv().is_err(), "a live fork keeps the call pending");
        drop(fallback);
        assert_eq!(
            rx.try_recv(),
            Ok(Response::error(
                "root/sound",
                "request dropped without a response"
            ))
        );
    }

    #[test]
    fn handles_dropped_on_two_threads_answer_exactly_once() {
        for _ in 0..200 {
            let (reply, rx) = reply_with_channel();
            let fallback = reply.fork();
            let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));
            let other = barrier.clone();
            let worker = std::thread::spawn(move || {
                other.wait();
                drop(reply);
            });
            barrier.wait();
            drop(fallback);
            worker.join().unwrap();
            assert_eq!(
                rx.try_recv(),
                Ok(Response::error(
                    "root/sound",
                    "request dropped without a response"
                ))
            );
            assert!(rx.try_recv().is_err());
        }
    }
}
