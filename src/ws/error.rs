#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

/// Broad category of a [`TransportError`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TransportErrorKind {
    /// Socket level I/O failure; `code` carries the OS error number when known
    Io,
    /// TLS handshake or record failure
    Tls,
    /// WebSocket protocol violation, including invalid UTF-8 in a text frame
    Protocol,
    /// The connection was closed, by either side
    Closed,
    /// The operation was cancelled before it completed
    Cancelled,
    /// A message or frame exceeded a configured size limit
    Capacity,
    /// The HTTP upgrade was rejected or malformed
    Http,
    /// The target URL was rejected by the transport
    Url,
    /// Anything the transport could not classify
    Other,
}

/// Error reported by the transport for a connection, receive, send or pong completion.
///
/// This is a plain value so it can be handed to the observer by value and compared in tests.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// Numeric failure code, when the underlying layer provides one
    pub code: Option<i32>,
    pub message: String,
}

impl TransportError {
    #[must_use]
    pub fn new<S: Into<String>>(kind: TransportErrorKind, message: S) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(TransportErrorKind::Cancelled, "operation cancelled")
    }

    #[must_use]
    pub fn closed() -> Self {
        Self::new(TransportErrorKind::Closed, "connection closed")
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} error ({code}): {}", self.kind, self.message),
            None => write!(f, "{} error: {}", self.kind, self.message),
        }
    }
}

impl StdError for TransportError {}

#[cfg(feature = "tungstenite")]
impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        let kind = match &e {
            WsError::ConnectionClosed | WsError::AlreadyClosed => TransportErrorKind::Closed,
            WsError::Io(_) => TransportErrorKind::Io,
            WsError::Tls(_) => TransportErrorKind::Tls,
            WsError::Capacity(_) => TransportErrorKind::Capacity,
            WsError::Protocol(_) | WsError::Utf8(_) => TransportErrorKind::Protocol,
            WsError::Url(_) => TransportErrorKind::Url,
            WsError::Http(_) | WsError::HttpFormat(_) => TransportErrorKind::Http,
            _ => TransportErrorKind::Other,
        };
        let code = match &e {
            WsError::Io(io) => io.raw_os_error(),
            _ => None,
        };

        Self {
            kind,
            code,
            message: e.to_string(),
        }
    }
}

/// Socket error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum SocketError {
    /// The connection was cancelled
    ConnectionCancelled,
    /// The transport reported a failure
    Failure(TransportError),
    /// The URL could not be parsed
    MalformedUrl(url::ParseError),
    /// The client could not be started, e.g. no tokio runtime was available
    FailureToStartConnection,
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionCancelled => write!(f, "WebSocket connection cancelled"),
            Self::Failure(e) => write!(f, "WebSocket transport failure: {e}"),
            Self::MalformedUrl(e) => write!(f, "Malformed WebSocket URL: {e}"),
            Self::FailureToStartConnection => write!(f, "Failed to start WebSocket connection"),
        }
    }
}

impl StdError for SocketError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Failure(e) => Some(e),
            Self::MalformedUrl(e) => Some(e),
            _ => None,
        }
    }
}
