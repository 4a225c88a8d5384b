use std::fmt;

/// Which of a node's three namespaces a name lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    SubChannel,
    Request,
    Stream,
}

impl Namespace {
    pub fn label(self) -> &'static str {
        match self {
            Namespace::SubChannel => "sub channel",
            Namespace::Request => "request handler",
            Namespace::Stream => "stream handler",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Wiring faults. These surface while the tree is being assembled or bound and
/// must abort startup; none of them is reachable from request dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("{namespace} with the same name ({name}) exists")]
    NameTaken { name: String, namespace: Namespace },

    #[error("channel name '{0}' is not a valid path segment")]
    InvalidName(String),

    #[error("channel tree is already bound; register handlers before setup")]
    AlreadyBound,

    #[error("endpoint path '{0}' is already bound")]
    PathInUse(String),
}

/// Failure reported by an [`EventSink`](super::EventSink) when an event could not be forwarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("event sink is closed")]
    Closed,

    #[error("event rejected: {0}")]
    Rejected(String),
}
