use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use url::Url;

use super::config::Config;
use super::error::{SocketError, TransportError};
use super::traits::SocketObserver;
use super::transport::{
    Connection as _, ConnectionId, EventSink, OutboundFrame, Transport, TransportEvent,
    open_connection,
};
#[cfg(feature = "tungstenite")]
use super::tungstenite::TungsteniteTransport;
use super::types::{
    ConnectionState, ConnectionStatus, Inbound, MessageContext, PingPongStatus, ReceivedFrame,
    SocketMessage,
};
use crate::Result;

/// Requests from [`WebSocket`] handles to the event loop.
enum Command {
    Observe(Weak<dyn SocketObserver>),
    Start,
    Close,
    Send(SocketMessage),
    Ping,
}

/// Client for a single WebSocket connection.
///
/// Every operation enqueues work for the client's event loop and returns immediately; results
/// are delivered to the registered [`SocketObserver`]. The event loop runs on the runtime from
/// [`Config::runtime`], or the runtime the client was created on, and stops when the last clone
/// of the handle is dropped.
///
/// # Example
///
/// ```rust, no_run
/// use std::sync::Arc;
///
/// use observed_ws::ws::{Config, SocketMessage, WebSocket};
/// # use observed_ws::ws::{ConnectionStatus, SocketObserver, TransportError};
/// # struct Printer;
/// # impl SocketObserver for Printer {
/// #     fn on_connection_status(&self, _: ConnectionStatus) {}
/// #     fn on_message(&self, _: Result<SocketMessage, TransportError>) {}
/// #     fn on_send_failure(&self, _: TransportError) {}
/// # }
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let observer = Arc::new(Printer);
///     let socket = WebSocket::new("wss://echo.websocket.org", Config::default())?;
///
///     socket.set_observer(&observer);
///     socket.start_connection();
///     socket.send(SocketMessage::text("hello"));
///     socket.send_ping();
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct WebSocket {
    url: Url,
    command_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl WebSocket {
    /// Create a client that connects through [`TungsteniteTransport`].
    #[cfg(feature = "tungstenite")]
    pub fn new(url: &str, config: Config) -> Result<Self> {
        Self::with_transport(url, config, TungsteniteTransport::default())
    }

    /// Create a client over a custom [`Transport`].
    ///
    /// Fails with [`SocketError::MalformedUrl`] if `url` does not parse and with
    /// [`SocketError::FailureToStartConnection`] if no runtime is configured or current.
    pub fn with_transport<T: Transport>(url: &str, config: Config, transport: T) -> Result<Self> {
        let url = Url::parse(url)?;
        let runtime = match &config.runtime {
            Some(runtime) => runtime.clone(),
            None => Handle::try_current().map_err(|_e| SocketError::FailureToStartConnection)?,
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Setup);

        let event_loop = EventLoop {
            url: url.clone(),
            config,
            transport,
            runtime: runtime.clone(),
            slot: Slot::Absent,
            next_id: ConnectionId::new(0),
            event_tx,
            state_tx,
            observer: None,
        };

        runtime.spawn(event_loop.run(command_rx, event_rx));

        Ok(Self {
            url,
            command_tx,
            state_rx,
        })
    }

    /// Register the observer, replacing any previous one. Only a weak reference is kept.
    pub fn set_observer<O: SocketObserver>(&self, observer: &Arc<O>) {
        let observer: Weak<O> = Arc::downgrade(observer);
        let observer: Weak<dyn SocketObserver> = observer;
        self.command(Command::Observe(observer));
    }

    /// Open the connection if there is none, or resume one that is not ready yet.
    /// Does nothing while the connection is ready.
    pub fn start_connection(&self) {
        self.command(Command::Start);
    }

    /// Cancel and release the connection. A later [`start_connection`](Self::start_connection)
    /// opens a fresh one.
    pub fn close_connection(&self) {
        self.command(Command::Close);
    }

    /// Send a complete message. Dropped if there is no connection; failures are reported through
    /// [`SocketObserver::on_send_failure`].
    pub fn send(&self, message: SocketMessage) {
        self.command(Command::Send(message));
    }

    /// Send a ping. The outcome is reported through [`SocketObserver::on_ping_pong_status`].
    pub fn send_ping(&self) {
        self.command(Command::Ping);
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    fn command(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            #[cfg(feature = "tracing")]
            tracing::warn!(url = %self.url, "WebSocket event loop has stopped, dropping command");
        }
    }
}

/// Progress of the receive loop for one connection. Once stopped it stays stopped; only a new
/// connection receives again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceiveLoop {
    Idle,
    Armed,
    Stopped,
}

enum Slot<C> {
    Absent,
    Present {
        id: ConnectionId,
        connection: C,
        state: ConnectionState,
        receive: ReceiveLoop,
    },
}

/// Owns the connection and processes commands and transport events one at a time.
struct EventLoop<T: Transport> {
    url: Url,
    config: Config,
    transport: T,
    runtime: Handle,
    slot: Slot<T::Connection>,
    next_id: ConnectionId,
    event_tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
    state_tx: watch::Sender<ConnectionState>,
    observer: Option<Weak<dyn SocketObserver>>,
}

impl<T: Transport> EventLoop<T> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<(ConnectionId, TransportEvent)>,
    ) {
        loop {
            tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle_command(command);
                }

                Some((id, event)) = events.recv() => {
                    self.handle_event(id, event);
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(url = %self.url, "All WebSocket handles dropped, stopping event loop");

        self.release();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Observe(observer) => self.observer = Some(observer),
            Command::Start => self.start_connection(),
            Command::Close => self.close_connection(),
            Command::Send(message) => self.send(OutboundFrame::from(message)),
            Command::Ping => self.send(OutboundFrame::ping()),
        }
    }

    fn start_connection(&mut self) {
        match &mut self.slot {
            Slot::Present {
                state: ConnectionState::Ready,
                ..
            } => {
                #[cfg(feature = "tracing")]
                tracing::trace!(url = %self.url, "Connection already ready, ignoring start");
            }
            Slot::Present { id, connection, .. } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(url = %self.url, ?id, "Restarting pending connection");

                connection.start(&self.runtime, EventSink::new(*id, self.event_tx.clone()));
            }
            Slot::Absent => match open_connection(&self.transport, &self.url, &self.config) {
                Ok(mut connection) => {
                    let id = self.next_id;
                    self.next_id = id.next();

                    connection.start(&self.runtime, EventSink::new(id, self.event_tx.clone()));
                    self.slot = Slot::Present {
                        id,
                        connection,
                        state: ConnectionState::Setup,
                        receive: ReceiveLoop::Idle,
                    };
                    self.state_tx.send_replace(ConnectionState::Setup);
                }
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(url = %self.url, error = %e, "Transport rejected connection");

                    self.notify(|observer| {
                        observer.on_connection_status(ConnectionStatus::Failed(e));
                    });
                }
            },
        }
    }

    fn close_connection(&mut self) {
        if self.release() {
            self.state_tx.send_replace(ConnectionState::Cancelled);
        }
    }

    /// Cancel and drop the current connection. Returns whether there was one.
    fn release(&mut self) -> bool {
        match std::mem::replace(&mut self.slot, Slot::Absent) {
            Slot::Present { mut connection, id, .. } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(url = %self.url, ?id, "Closing connection");
                #[cfg(not(feature = "tracing"))]
                let _ = &id;

                connection.cancel();
                true
            }
            Slot::Absent => false,
        }
    }

    fn handle_event(&mut self, id: ConnectionId, event: TransportEvent) {
        let current = match &self.slot {
            Slot::Present { id: current, .. } => Some(*current),
            Slot::Absent => None,
        };
        if current != Some(id) {
            #[cfg(feature = "tracing")]
            tracing::trace!(?id, ?event, "Dropping event from closed connection");
            return;
        }

        match event {
            TransportEvent::StateChanged(state) => self.on_state_changed(state),
            TransportEvent::Received(result) => self.on_received(result),
            TransportEvent::SendCompleted { context, result } => {
                self.on_send_completed(context, result);
            }
            TransportEvent::PongReceived(result) => self.on_pong(result),
        }
    }

    fn on_state_changed(&mut self, state: ConnectionState) {
        #[cfg(feature = "tracing")]
        tracing::debug!(url = %self.url, ?state, "Connection state changed");

        let mut arm = false;
        if let Slot::Present {
            state: current,
            receive,
            ..
        } = &mut self.slot
        {
            *current = state.clone();
            arm = state.is_ready() && *receive == ReceiveLoop::Idle;
        }
        self.state_tx.send_replace(state.clone());

        match state {
            ConnectionState::Ready if arm => self.receive_next(),
            ConnectionState::Waiting(e) | ConnectionState::Failed(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(url = %self.url, error = %e, "Connection failed");

                self.notify(|observer| {
                    observer.on_connection_status(ConnectionStatus::Failed(e));
                });
                self.release();
            }
            ConnectionState::Cancelled => {
                self.notify(|observer| {
                    observer.on_connection_status(ConnectionStatus::Cancelled);
                });
                self.release();
            }
            _ => {}
        }
    }

    fn receive_next(&mut self) {
        if let Slot::Present {
            connection,
            receive,
            ..
        } = &mut self.slot
        {
            *receive = ReceiveLoop::Armed;
            connection.receive_message();
        }
    }

    fn stop_receiving(&mut self) {
        if let Slot::Present { receive, .. } = &mut self.slot {
            *receive = ReceiveLoop::Stopped;
        }
    }

    fn on_received(&mut self, result: std::result::Result<ReceivedFrame, TransportError>) {
        let armed = matches!(
            self.slot,
            Slot::Present {
                receive: ReceiveLoop::Armed,
                ..
            }
        );
        if !armed {
            #[cfg(feature = "tracing")]
            tracing::trace!("Dropping receive completion with no request outstanding");
            return;
        }

        let frame = match result {
            Ok(frame) => frame,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(url = %self.url, error = %e, "Receive failed, stopping receive loop");

                self.stop_receiving();
                self.notify(|observer| observer.on_message(Err(e)));
                return;
            }
        };

        match frame.decode() {
            Some(Inbound::Message(message)) => {
                self.receive_next();
                self.notify(|observer| observer.on_message(Ok(message)));
            }
            Some(Inbound::Closed) => {
                self.stop_receiving();
                self.notify(|observer| {
                    observer.on_connection_status(ConnectionStatus::Closed);
                });
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Dropping frame without usable payload or metadata");

                self.receive_next();
            }
        }
    }

    fn send(&mut self, frame: OutboundFrame) {
        match &mut self.slot {
            Slot::Present { connection, .. } => connection.send(frame),
            Slot::Absent => {
                #[cfg(feature = "tracing")]
                tracing::trace!(context = %frame.context, "No connection, dropping outbound frame");
            }
        }
    }

    fn on_send_completed(
        &self,
        context: MessageContext,
        result: std::result::Result<(), TransportError>,
    ) {
        let Err(e) = result else {
            return;
        };

        #[cfg(feature = "tracing")]
        tracing::warn!(url = %self.url, %context, error = %e, "Send failed");

        match context {
            MessageContext::Ping => self.notify(|observer| {
                observer.on_ping_pong_status(PingPongStatus::PingFailed(e));
            }),
            MessageContext::Text | MessageContext::Binary => {
                self.notify(|observer| observer.on_send_failure(e));
            }
        }
    }

    fn on_pong(&self, result: std::result::Result<(), TransportError>) {
        let status = match result {
            Ok(()) => PingPongStatus::PongReceived,
            Err(e) => PingPongStatus::PongFailed(e),
        };

        self.notify(|observer| observer.on_ping_pong_status(status));
    }

    fn notify<F: FnOnce(&dyn SocketObserver)>(&self, callback: F) {
        if let Some(observer) = self.observer.as_ref().and_then(Weak::upgrade) {
            callback(observer.as_ref());
        } else {
            #[cfg(feature = "tracing")]
            tracing::trace!("No live observer, dropping event");
        }
    }
}
