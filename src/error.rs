use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use crate::ws::error::{SocketError, TransportError};

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Error related to invalid input, such as a URL that cannot be parsed
    Validation,
    /// Error related to WebSocket connections
    WebSocket,
    /// The client could not be started, such as when no runtime is available
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

impl From<SocketError> for Error {
    fn from(err: SocketError) -> Self {
        let kind = match err {
            SocketError::MalformedUrl(_) => Kind::Validation,
            SocketError::FailureToStartConnection => Kind::Internal,
            _ => Kind::WebSocket,
        };
        Error::with_source(kind, err)
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        SocketError::Failure(err).into()
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        SocketError::MalformedUrl(e).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_url_is_a_validation_error() {
        let error: Error = url::Url::parse("not a url").unwrap_err().into();

        assert_eq!(error.kind(), Kind::Validation);
        assert!(
            matches!(
                error.downcast_ref::<SocketError>(),
                Some(SocketError::MalformedUrl(_))
            ),
            "expected the parse error to be wrapped as MalformedUrl"
        );
    }

    #[test]
    fn transport_error_is_a_websocket_error() {
        let error: Error = TransportError::cancelled().into();

        assert_eq!(error.kind(), Kind::WebSocket);
        assert!(error.to_string().starts_with("WebSocket: "));
    }

    #[test]
    fn failure_to_start_is_an_internal_error() {
        let error: Error = SocketError::FailureToStartConnection.into();

        assert_eq!(error.kind(), Kind::Internal);
        assert_eq!(
            error.to_string(),
            "Internal: Failed to start WebSocket connection"
        );
    }
}
