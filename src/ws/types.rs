//! Value types shared by the client, the observer contract and the transport boundary.

use super::error::{SocketError, TransportError};

/// Application-level message delivered to, or sent by, the client.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl SocketMessage {
    #[must_use]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::Text(text.into())
    }

    #[must_use]
    pub fn binary<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Self::Binary(bytes.into())
    }

    /// The context tag this message is sent under.
    #[must_use]
    pub const fn context(&self) -> MessageContext {
        match self {
            Self::Text(_) => MessageContext::Text,
            Self::Binary(_) => MessageContext::Binary,
        }
    }
}

/// Labels the logical purpose of an outbound frame so its completion can be routed.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::IntoStaticStr,
)]
pub enum MessageContext {
    #[strum(serialize = "PING")]
    Ping,
    #[strum(serialize = "TEXT")]
    Text,
    #[strum(serialize = "BINARY")]
    Binary,
}

impl MessageContext {
    #[must_use]
    pub fn identifier(self) -> &'static str {
        self.into()
    }

    /// Payload carried by ping frames.
    #[must_use]
    pub fn ping_payload() -> &'static [u8] {
        Self::Ping.identifier().as_bytes()
    }
}

/// WebSocket frame type.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

/// Per-frame protocol metadata attached by the transport.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetadata {
    pub opcode: Opcode,
}

impl FrameMetadata {
    #[must_use]
    pub const fn new(opcode: Opcode) -> Self {
        Self { opcode }
    }
}

impl From<Opcode> for FrameMetadata {
    fn from(opcode: Opcode) -> Self {
        Self::new(opcode)
    }
}

/// A completed receive as reported by the transport.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub payload: Option<Vec<u8>>,
    pub metadata: Option<FrameMetadata>,
}

impl ReceivedFrame {
    #[must_use]
    pub fn new(payload: Option<Vec<u8>>, metadata: Option<FrameMetadata>) -> Self {
        Self { payload, metadata }
    }

    /// Shorthand for a frame with both a payload and an opcode.
    #[must_use]
    pub fn with_opcode<B: Into<Vec<u8>>>(opcode: Opcode, payload: B) -> Self {
        Self::new(Some(payload.into()), Some(opcode.into()))
    }

    /// Translate the frame into what the observer should see.
    ///
    /// Returns `None` for frames that are dropped: no payload, no metadata, a text frame that is
    /// not valid UTF-8, or an opcode the client does not surface.
    #[must_use]
    pub fn decode(self) -> Option<Inbound> {
        let payload = self.payload?;
        let metadata = self.metadata?;

        match metadata.opcode {
            Opcode::Text => String::from_utf8(payload)
                .ok()
                .map(|text| Inbound::Message(SocketMessage::Text(text))),
            Opcode::Binary => Some(Inbound::Message(SocketMessage::Binary(payload))),
            Opcode::Close => Some(Inbound::Closed),
            Opcode::Continuation | Opcode::Ping | Opcode::Pong => None,
        }
    }
}

/// Result of decoding a [`ReceivedFrame`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(SocketMessage),
    /// The peer sent a close frame
    Closed,
}

/// State of a single transport connection.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Created but not started
    #[default]
    Setup,
    /// Handshake in progress
    Preparing,
    /// Connected, frames can flow
    Ready,
    /// The network path is unavailable; the transport would retry on its own
    Waiting(TransportError),
    Failed(TransportError),
    Cancelled,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Connection-level event reported to the observer.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// The peer sent a close frame
    Closed,
    Cancelled,
    Failed(TransportError),
}

impl ConnectionStatus {
    /// The error this status represents, if any. A clean close is not an error.
    #[must_use]
    pub fn into_error(self) -> Option<SocketError> {
        match self {
            Self::Closed => None,
            Self::Cancelled => Some(SocketError::ConnectionCancelled),
            Self::Failed(e) => Some(SocketError::Failure(e)),
        }
    }
}

/// Outcome of a ping round-trip.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingPongStatus {
    PingFailed(TransportError),
    PongFailed(TransportError),
    PongReceived,
}
