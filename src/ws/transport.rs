//! Boundary to the transport that owns the socket.
//!
//! The transport is a black box: it is handed a URL and [`Parameters`], and reports everything that
//! happens to a connection as [`TransportEvent`]s through the [`EventSink`] installed by
//! [`Connection::start`]. The client never sees sockets, TLS sessions or raw frames.

#![expect(
    clippy::module_name_repetitions,
    reason = "Transport types keep their prefix so they read clearly when re-exported"
)]

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use url::Url;

use super::config::Config;
use super::error::TransportError;
use super::types::{
    ConnectionState, FrameMetadata, MessageContext, Opcode, ReceivedFrame, SocketMessage,
};

const SECURE_SCHEME: &str = "wss";

/// Options of the WebSocket protocol layer.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebSocketOptions {
    pub auto_reply_ping: bool,
}

impl WebSocketOptions {
    #[must_use]
    pub const fn new(auto_reply_ping: bool) -> Self {
        Self { auto_reply_ping }
    }
}

impl From<&Config> for WebSocketOptions {
    fn from(config: &Config) -> Self {
        Self::new(config.auto_reply_ping)
    }
}

/// One entry of the application protocol stack, outermost first.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationProtocol {
    WebSocket(WebSocketOptions),
    Tls,
}

#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolStack {
    pub application_protocols: Vec<ApplicationProtocol>,
}

/// Transport profile for one connection attempt.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    pub default_protocol_stack: ProtocolStack,
}

impl Parameters {
    /// Plain TCP profile, no application protocols.
    #[must_use]
    pub fn tcp() -> Self {
        Self::default()
    }

    /// TLS over TCP profile.
    #[must_use]
    pub fn tls() -> Self {
        Self {
            default_protocol_stack: ProtocolStack {
                application_protocols: vec![ApplicationProtocol::Tls],
            },
        }
    }

    /// Profile for `url`: secure for `wss`, plain for everything else, with the WebSocket layer on top.
    #[must_use]
    pub fn for_url(url: &Url, options: WebSocketOptions) -> Self {
        let mut parameters = if url.scheme() == SECURE_SCHEME {
            Self::tls()
        } else {
            Self::tcp()
        };

        parameters
            .default_protocol_stack
            .application_protocols
            .insert(0, ApplicationProtocol::WebSocket(options));

        parameters
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.default_protocol_stack
            .application_protocols
            .contains(&ApplicationProtocol::Tls)
    }

    /// Options of the first WebSocket layer in the stack.
    #[must_use]
    pub fn websocket_options(&self) -> Option<WebSocketOptions> {
        self.default_protocol_stack
            .application_protocols
            .iter()
            .find_map(|protocol| match protocol {
                ApplicationProtocol::WebSocket(options) => Some(*options),
                ApplicationProtocol::Tls => None,
            })
    }
}

/// Create a connection handle for `url`. The handle is not started.
pub fn open_connection<T: Transport>(
    transport: &T,
    url: &Url,
    config: &Config,
) -> Result<T::Connection, TransportError> {
    let parameters = Parameters::for_url(url, config.into());

    #[cfg(feature = "tracing")]
    tracing::debug!(%url, secure = parameters.is_secure(), "Opening WebSocket connection");

    transport.open(url, parameters)
}

/// A complete outbound message, tagged for the transport's framing.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub payload: Vec<u8>,
    pub metadata: FrameMetadata,
    pub context: MessageContext,
    /// Always `true`: messages are handed over whole, never streamed
    pub is_complete: bool,
}

impl OutboundFrame {
    #[must_use]
    pub fn ping() -> Self {
        Self {
            payload: MessageContext::ping_payload().to_vec(),
            metadata: Opcode::Ping.into(),
            context: MessageContext::Ping,
            is_complete: true,
        }
    }
}

impl From<SocketMessage> for OutboundFrame {
    fn from(message: SocketMessage) -> Self {
        let context = message.context();
        let (payload, opcode) = match message {
            SocketMessage::Text(text) => (text.into_bytes(), Opcode::Text),
            SocketMessage::Binary(bytes) => (bytes, Opcode::Binary),
        };

        Self {
            payload,
            metadata: opcode.into(),
            context,
            is_complete: true,
        }
    }
}

/// Identity of one connection handle within a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Everything a transport reports about a started connection.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    StateChanged(ConnectionState),
    /// Completion of one [`Connection::receive_message`] request
    Received(Result<ReceivedFrame, TransportError>),
    /// Completion of one [`Connection::send`]
    SendCompleted {
        context: MessageContext,
        result: Result<(), TransportError>,
    },
    /// Exactly one per ping frame that was sent successfully
    PongReceived(Result<(), TransportError>),
}

/// Ordered channel from a transport connection back to the client that owns it.
///
/// Every event is stamped with the id of the handle the sink was installed on, which lets the
/// client drop completions from handles it has already closed.
#[derive(Debug, Clone)]
pub struct EventSink {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
}

impl EventSink {
    #[must_use]
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>) -> Self {
        Self { id, tx }
    }

    /// A sink with its own channel, for driving a transport without a client.
    #[must_use]
    pub fn channel(
        id: ConnectionId,
    ) -> (Self, mpsc::UnboundedReceiver<(ConnectionId, TransportEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, tx), rx)
    }

    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `false` once the receiving client is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.id, event)).is_ok()
    }
}

/// Factory for connection handles.
pub trait Transport: Send + 'static {
    type Connection: Connection;

    /// Create a handle configured with `parameters`. Nothing touches the network until
    /// [`Connection::start`].
    fn open(&self, url: &Url, parameters: Parameters) -> Result<Self::Connection, TransportError>;
}

/// One transport connection. All completions are reported through the [`EventSink`] given to
/// [`Connection::start`]; none of the methods block.
pub trait Connection: Send + 'static {
    /// Install `events` as the sink for this handle, replacing any previous one, and start
    /// connecting on `runtime`. Starting a handle that is already connecting or connected must
    /// not open a second connection.
    fn start(&mut self, runtime: &Handle, events: EventSink);

    /// Request the next complete message. Completes with one [`TransportEvent::Received`].
    fn receive_message(&mut self);

    /// Send a complete message. Completes with one [`TransportEvent::SendCompleted`], and for
    /// ping frames additionally one [`TransportEvent::PongReceived`] if the send succeeded.
    fn send(&mut self, frame: OutboundFrame);

    /// Tear the connection down. Completions may still arrive afterwards.
    fn cancel(&mut self);
}
