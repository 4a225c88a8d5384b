//! Hand-off from producer threads onto the delivery context.
//!
//! Sinks and subscription slots are only touched on the thread that runs the
//! dispatcher. Producers (the capture loop) post closures into a bounded queue
//! and that thread runs them in order.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub type Task = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery queue is full")]
    Full,
    #[error("delivery context has shut down")]
    Closed,
}

/// Bounded task queue drained by the delivery context.
pub struct DeliveryQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    dropped: Arc<AtomicUsize>,
}

impl DeliveryQueue {
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Producer-side handle.
    pub fn deliverer(&self) -> Deliverer {
        Deliverer {
            sender: self.sender.clone(),
            dropped: self.dropped.clone(),
        }
    }

    /// Receiving side, for callers that multiplex it with other channels.
    pub fn tasks(&self) -> &Receiver<Task> {
        &self.receiver
    }

    /// Run everything already queued. Returns how many tasks ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Tasks rejected because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Cloneable producer handle onto a [`DeliveryQueue`]. Never blocks.
#[derive(Clone)]
pub struct Deliverer {
    sender: Sender<Task>,
    dropped: Arc<AtomicUsize>,
}

impl Deliverer {
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> Result<(), DeliveryError> {
        match self.sender.try_send(Box::new(task)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(DeliveryError::Full)
            }
            Err(TrySendError::Disconnected(_)) => Err(DeliveryError::Closed),
        }
    }
}
