//! Namespace tree of channels.

use super::endpoint::{Binder, RequestEndpoint, SharedRequest, SharedStream, StreamEndpoint};
use super::error::{ChannelError, Namespace};
use super::handler::{HandlerCell, RequestHandler, StreamHandler};
use std::collections::BTreeMap;
use std::sync::Arc;

enum Entry {
    SubChannel(ChannelNode),
    Request(SharedRequest),
    Stream(SharedStream),
}

impl Entry {
    fn namespace(&self) -> Namespace {
        match self {
            Entry::SubChannel(_) => Namespace::SubChannel,
            Entry::Request(_) => Namespace::Request,
            Entry::Stream(_) => Namespace::Stream,
        }
    }
}

/// A node in the channel namespace tree.
///
/// Sub channels, request handlers and stream handlers share one name map, so a
/// name can never resolve to more than one of them. Register everything, call
/// [`setup`](Self::setup) once to bind the tree, and [`dispose`](Self::dispose)
/// once at teardown.
#[derive(Default)]
pub struct ChannelNode {
    entries: BTreeMap<String, Entry>,
    bound: bool,
}

impl ChannelNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sub_channel(&mut self, name: &str, node: ChannelNode) -> Result<&mut Self, ChannelError> {
        self.insert(name, Entry::SubChannel(node))
    }

    pub fn set_request_handler(
        &mut self,
        name: &str,
        handler: impl RequestHandler + 'static,
    ) -> Result<&mut Self, ChannelError> {
        let handler: Box<dyn RequestHandler> = Box::new(handler);
        self.insert(name, Entry::Request(Arc::new(HandlerCell::new(name, handler))))
    }

    pub fn set_stream_handler(
        &mut self,
        name: &str,
        handler: impl StreamHandler + 'static,
    ) -> Result<&mut Self, ChannelError> {
        let handler: Box<dyn StreamHandler> = Box::new(handler);
        self.insert(name, Entry::Stream(Arc::new(HandlerCell::new(name, handler))))
    }

    /// Which namespace `name` is registered in, if any.
    #[cfg(test)]
    pub(crate) fn lookup(&self, name: &str) -> Option<Namespace> {
        self.entries.get(name).map(Entry::namespace)
    }

    #[cfg(test)]
    pub(crate) fn is_bound(&self) -> bool {
        self.bound
    }

    fn insert(&mut self, name: &str, entry: Entry) -> Result<&mut Self, ChannelError> {
        if self.bound {
            return Err(ChannelError::AlreadyBound);
        }
        if name.is_empty() || name.contains('/') {
            return Err(ChannelError::InvalidName(name.to_string()));
        }
        if let Some(existing) = self.entries.get(name) {
            return Err(ChannelError::NameTaken {
                name: name.to_string(),
                namespace: existing.namespace(),
            });
        }
        self.entries.insert(name.to_string(), entry);
        Ok(self)
    }

    /// Bind this node and every descendant to `binder`.
    ///
    /// Children bind under `path/child`. The node's request handlers share one
    /// request endpoint at `path` (skipped when there are none), and each stream
    /// handler gets its own endpoint at `path/name`.
    pub fn setup(&mut self, path: &str, binder: &mut dyn Binder) -> Result<(), ChannelError> {
        if self.bound {
            return Err(ChannelError::AlreadyBound);
        }

        let mut requests = BTreeMap::new();
        for (name, entry) in self.entries.iter_mut() {
            match entry {
                Entry::SubChannel(child) => child.setup(&format!("{path}/{name}"), binder)?,
                Entry::Request(cell) => {
                    requests.insert(name.clone(), cell.clone());
                }
                Entry::Stream(cell) => {
                    binder.bind_stream(StreamEndpoint::new(format!("{path}/{name}"), cell.clone()))?;
                }
            }
        }
        if !requests.is_empty() {
            binder.bind_request(RequestEndpoint::new(path.to_string(), requests))?;
        }

        self.bound = true;
        tracing::debug!(path, entries = self.entries.len(), "channel bound");
        Ok(())
    }

    /// Dispose sub channels first, then this node's request handlers, then its
    /// stream handlers. Each handler's `dispose` runs at most once.
    pub fn dispose(&mut self) {
        for entry in self.entries.values_mut() {
            if let Entry::SubChannel(child) = entry {
                child.dispose();
            }
        }
        for entry in self.entries.values() {
            if let Entry::Request(cell) = entry {
                cell.dispose();
            }
        }
        for entry in self.entries.values() {
            if let Entry::Stream(cell) = entry {
                cell.dispose();
            }
        }
    }
}

impl std::fmt::Debug for ChannelNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (name, entry) in &self.entries {
            match entry {
                Entry::SubChannel(node) => map.entry(name, node),
                Entry::Request(cell) => map.entry(name, &format_args!("request({})", cell.name())),
                Entry::Stream(cell) => map.entry(name, &format_args!("stream({})", cell.name())),
            };
        }
        map.finish()
    }
}
