//! Error types for the debug model

use neodap_graph::GraphError;
use neodap_reactive::ReactiveError;
use thiserror::Error;

/// Failures reported by the transport boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The adapter process went away
    #[error("adapter closed the connection")]
    Closed,

    /// The adapter answered a request with `success: false`
    #[error("{command} failed: {message}")]
    Failed { command: String, message: String },

    /// A protocol message could not be decoded
    #[error("malformed message: {0}")]
    Malformed(String),

    /// An event name this model does not handle
    #[error("unknown event {0:?}")]
    UnknownEvent(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Malformed(err.to_string())
    }
}

/// `dap:` URI syntax errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("missing dap: scheme in {0:?}")]
    MissingScheme(String),

    #[error("empty uri")]
    Empty,

    #[error("empty segment in {0:?}")]
    EmptySegment(String),

    #[error("unknown segment {0:?}")]
    UnknownSegment(String),

    #[error("invalid index in segment {0:?}")]
    InvalidIndex(String),

    #[error("invalid context marker {0:?}")]
    InvalidMarker(String),

    #[error("context markers are only allowed as the first segment")]
    MarkerNotFirst,

    #[error("invalid percent escape in {0:?}")]
    InvalidEscape(String),

    #[error("invalid id {id:?} for {segment}")]
    InvalidId { segment: &'static str, id: String },

    #[error("{segment} does not support indexes")]
    IndexUnsupported { segment: &'static str },

    #[error("{to} cannot follow {from}")]
    InvalidOrder { from: &'static str, to: &'static str },

    #[error("uri still contains a context marker")]
    UnexpandedMarker,
}

/// Errors returned by debugger commands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DebugError {
    #[error("no session with id {0}")]
    UnknownSession(String),

    #[error("a session with id {0} already exists")]
    DuplicateSession(String),

    #[error("no breakpoint with id {0}")]
    UnknownBreakpoint(u64),

    #[error("session {session} has no exception filter {filter}")]
    UnknownExceptionFilter { session: String, filter: String },

    #[error("{uri} has been disposed")]
    Disposed { uri: String },

    #[error("no thread {thread} in session {session}")]
    UnknownThread { session: String, thread: i64 },

    #[error("thread {0} is not stopped")]
    NotStopped(i64),

    #[error("{0} has nothing to expand")]
    NotExpandable(String),

    #[error("{0} has no source reference")]
    NoSourceReference(String),

    #[error("cannot read {path}: {message}")]
    SourceUnavailable { path: String, message: String },

    #[error("unexpected response to {command}")]
    UnexpectedResponse { command: &'static str },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl From<ReactiveError> for DebugError {
    fn from(err: ReactiveError) -> Self {
        match err {
            ReactiveError::Disposed { uri } => DebugError::Disposed { uri },
        }
    }
}

/// Result type using DebugError
pub type Result<T> = std::result::Result<T, DebugError>;
