//! Single-connection WebSocket client.
//!
//! # Architecture
//!
//! - [`WebSocket`]: cheap handle that forwards operations to the client's event loop
//! - [`SocketObserver`]: receives connection status, messages, send failures and ping/pong results
//! - [`Transport`] / [`Connection`]: boundary to the socket layer; events come back through an
//!   [`EventSink`]
//! - [`TungsteniteTransport`]: bundled transport over `tokio-tungstenite` (feature `tungstenite`)
//!
//! # Example
//!
//! ```ignore
//! let observer = Arc::new(MyObserver::default());
//! let socket = WebSocket::new("wss://example.com/socket", Config::default())?;
//!
//! socket.set_observer(&observer);
//! socket.start_connection();
//! socket.send(SocketMessage::text("hello"));
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod traits;
pub mod transport;
#[cfg(feature = "tungstenite")]
pub mod tungstenite;
pub mod types;

pub use client::WebSocket;
pub use config::Config;
pub use error::{SocketError, TransportError, TransportErrorKind};
pub use traits::SocketObserver;
pub use transport::{
    Connection, ConnectionId, EventSink, OutboundFrame, Parameters, Transport, TransportEvent,
    open_connection,
};
#[cfg(feature = "tungstenite")]
pub use tungstenite::{TungsteniteConnection, TungsteniteTransport};
pub use types::{
    ConnectionState, ConnectionStatus, FrameMetadata, Inbound, MessageContext, Opcode,
    PingPongStatus, ReceivedFrame, SocketMessage,
};
