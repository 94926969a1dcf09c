//! Observer contract for client events.

use super::error::TransportError;
use super::types::{ConnectionStatus, PingPongStatus, SocketMessage};

/// Receives everything the client observes on its connection.
///
/// The client holds the observer weakly and calls it from its event loop, so implementations
/// should hand work off rather than block. Callbacks stop once the client has processed
/// [`close_connection`](super::WebSocket::close_connection).
///
/// # Example
///
/// ```ignore
/// struct Printer;
///
/// impl SocketObserver for Printer {
///     fn on_connection_status(&self, status: ConnectionStatus) {
///         println!("status: {status:?}");
///     }
///
///     fn on_message(&self, message: Result<SocketMessage, TransportError>) {
///         println!("message: {message:?}");
///     }
///
///     fn on_send_failure(&self, error: TransportError) {
///         println!("send failed: {error}");
///     }
/// }
/// ```
pub trait SocketObserver: Send + Sync + 'static {
    fn on_connection_status(&self, status: ConnectionStatus);

    /// A decoded message, or the error that stopped the receive loop.
    fn on_message(&self, message: Result<SocketMessage, TransportError>);

    fn on_send_failure(&self, error: TransportError);

    fn on_ping_pong_status(&self, _status: PingPongStatus) {}
}
