//! Hierarchical request/stream channels.
//!
//! A [`ChannelNode`] tree holds named sub channels, request handlers and stream
//! handlers. [`ChannelNode::setup`] walks the tree and hands one
//! [`RequestEndpoint`] per node with request handlers, and one
//! [`StreamEndpoint`] per stream handler, to a [`Binder`] supplied by the
//! boundary adapter. Paths are built by joining names with `/`.
//!
//! Stream events produced off-thread are marshalled onto the dispatcher's
//! thread through a [`DeliveryQueue`] before they reach a sink.

mod delivery;
mod endpoint;
mod error;
mod handler;
mod node;
mod reply;
mod subscription;

#[cfg(test)]
pub(crate) mod testing;

pub use delivery::{Deliverer, DeliveryError, DeliveryQueue, Task};
pub use endpoint::{Binder, RequestEndpoint, StreamEndpoint};
pub use error::{ChannelError, Namespace, SinkError};
pub use handler::{
    request_fn, stream_fn, EventSink, FnRequestHandler, FnStreamHandler, RequestHandler,
    StreamHandler,
};
pub use node::ChannelNode;
pub use reply::{Reply, Response};
pub use subscription::SubscriptionSlot;
