//! [`Transport`] over `tokio-tungstenite`.
//!
//! Each started connection is driven by one task that owns the WebSocket stream. The
//! [`TungsteniteConnection`] handle talks to it over a channel, and the task reports back through
//! the [`EventSink`].

#![expect(
    clippy::module_name_repetitions,
    reason = "Types are named after the library they wrap"
)]

use std::collections::VecDeque;
use std::sync::Once;

use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{
    Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config,
};
use url::Url;

use super::error::{TransportError, TransportErrorKind};
use super::transport::{Connection, EventSink, OutboundFrame, Parameters, Transport, TransportEvent};
use super::types::{ConnectionState, Opcode, ReceivedFrame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

static CRYPTO_PROVIDER: Once = Once::new();

/// rustls needs a process-level crypto provider before the first TLS handshake. Installing fails
/// only when the application has already installed its own, which is then used instead.
fn install_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            #[cfg(feature = "tracing")]
            tracing::trace!("Using the crypto provider installed by the application");
        }
    });
}

/// Transport backed by `tokio-tungstenite`, using rustls with the platform's root certificates for
/// `wss` URLs.
///
/// `tungstenite` always answers incoming PING frames, so a `false` `auto_reply_ping` is only
/// logged.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

impl Transport for TungsteniteTransport {
    type Connection = TungsteniteConnection;

    fn open(&self, url: &Url, parameters: Parameters) -> Result<Self::Connection, TransportError> {
        let options = parameters.websocket_options().ok_or_else(|| {
            TransportError::new(
                TransportErrorKind::Other,
                "protocol stack has no WebSocket layer",
            )
        })?;

        if !options.auto_reply_ping {
            #[cfg(feature = "tracing")]
            tracing::debug!(%url, "auto_reply_ping is disabled but tungstenite always replies to pings");
        }

        Ok(TungsteniteConnection {
            url: url.clone(),
            parameters,
            commands: None,
            events: None,
        })
    }
}

/// Requests from the handle to the connection task.
#[derive(Debug)]
enum DriverCommand {
    Receive,
    Send(OutboundFrame),
    Cancel,
}

/// Handle to one `tokio-tungstenite` connection.
#[derive(Debug)]
pub struct TungsteniteConnection {
    url: Url,
    parameters: Parameters,
    commands: Option<mpsc::UnboundedSender<DriverCommand>>,
    events: Option<EventSink>,
}

impl TungsteniteConnection {
    /// Forward `command` to the connection task, or return it if the task is gone.
    fn dispatch(&self, command: DriverCommand) -> Result<(), DriverCommand> {
        match &self.commands {
            Some(commands) => commands.send(command).map_err(|e| e.0),
            None => Err(command),
        }
    }

    fn emit(&self, event: TransportEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

impl Connection for TungsteniteConnection {
    fn start(&mut self, runtime: &Handle, events: EventSink) {
        if self.commands.is_some() {
            #[cfg(feature = "tracing")]
            tracing::trace!(url = %self.url, "Connection already started");
            return;
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let driver = Driver::new(events.clone());
        runtime.spawn(driver.run(self.url.clone(), self.parameters.clone(), command_rx));

        self.commands = Some(command_tx);
        self.events = Some(events);
    }

    fn receive_message(&mut self) {
        if self.dispatch(DriverCommand::Receive).is_err() {
            self.emit(TransportEvent::Received(Err(TransportError::closed())));
        }
    }

    fn send(&mut self, frame: OutboundFrame) {
        if let Err(DriverCommand::Send(frame)) = self.dispatch(DriverCommand::Send(frame)) {
            self.emit(TransportEvent::SendCompleted {
                context: frame.context,
                result: Err(TransportError::closed()),
            });
        }
    }

    fn cancel(&mut self) {
        drop(self.dispatch(DriverCommand::Cancel));
        self.commands = None;
    }
}

/// State owned by the connection task.
struct Driver {
    events: EventSink,
    /// A receive request is waiting for a data frame
    receive_pending: bool,
    /// Pings sent that have not been answered yet, answered in order
    pongs_pending: usize,
    /// Data frames read while no receive was requested
    buffered: VecDeque<ReceivedFrame>,
    close_seen: bool,
}

impl Driver {
    fn new(events: EventSink) -> Self {
        Self {
            events,
            receive_pending: false,
            pongs_pending: 0,
            buffered: VecDeque::new(),
            close_seen: false,
        }
    }

    async fn run(
        mut self,
        url: Url,
        parameters: Parameters,
        mut commands: mpsc::UnboundedReceiver<DriverCommand>,
    ) {
        self.events
            .emit(TransportEvent::StateChanged(ConnectionState::Preparing));

        let connector = if parameters.is_secure() {
            install_crypto_provider();
            None
        } else {
            Some(Connector::Plain)
        };
        let connect = connect_async_tls_with_config(url.as_str(), None, false, connector);
        tokio::pin!(connect);

        let mut backlog = VecDeque::new();
        let mut stream = loop {
            tokio::select! {
                result = &mut connect => match result {
                    Ok((stream, _)) => break stream,
                    Err(e) => {
                        let error = TransportError::from(e);
                        let state = match error.kind {
                            TransportErrorKind::Io => ConnectionState::Waiting(error),
                            _ => ConnectionState::Failed(error),
                        };
                        self.events.emit(TransportEvent::StateChanged(state));
                        self.fail_backlog(backlog);
                        return;
                    }
                },
                command = commands.recv() => match command {
                    Some(DriverCommand::Cancel) | None => {
                        self.events
                            .emit(TransportEvent::StateChanged(ConnectionState::Cancelled));
                        self.fail_backlog(backlog);
                        return;
                    }
                    Some(command) => backlog.push_back(command),
                },
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(%url, "WebSocket handshake complete");

        self.events
            .emit(TransportEvent::StateChanged(ConnectionState::Ready));

        for command in backlog {
            if !self.handle_command(&mut stream, command).await {
                return;
            }
        }

        loop {
            let reading = self.receive_pending || self.pongs_pending > 0;

            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        drop(stream.close(None).await);
                        return;
                    };
                    if !self.handle_command(&mut stream, command).await {
                        return;
                    }
                }

                frame = stream.next(), if reading => match frame {
                    Some(Ok(message)) => self.on_frame(message),
                    Some(Err(e)) => {
                        self.on_read_error(e.into());
                        return;
                    }
                    None => {
                        if !self.close_seen {
                            self.on_read_error(TransportError::closed());
                        }
                        self.fail_pongs(&TransportError::closed());
                        return;
                    }
                },
            }
        }
    }

    /// Returns `false` once the connection is finished.
    async fn handle_command(&mut self, stream: &mut WsStream, command: DriverCommand) -> bool {
        match command {
            DriverCommand::Receive => {
                match self.buffered.pop_front() {
                    Some(frame) => {
                        self.events.emit(TransportEvent::Received(Ok(frame)));
                    }
                    None => self.receive_pending = true,
                }
                true
            }
            DriverCommand::Send(frame) => {
                let context = frame.context;
                let is_ping = frame.metadata.opcode == Opcode::Ping;

                let result = match into_message(frame) {
                    Ok(message) => stream.send(message).await.map_err(TransportError::from),
                    Err(e) => Err(e),
                };
                if is_ping && result.is_ok() {
                    self.pongs_pending += 1;
                }

                self.events
                    .emit(TransportEvent::SendCompleted { context, result });
                true
            }
            DriverCommand::Cancel => {
                drop(stream.close(None).await);
                self.events
                    .emit(TransportEvent::StateChanged(ConnectionState::Cancelled));
                self.fail_pongs(&TransportError::cancelled());
                false
            }
        }
    }

    fn on_frame(&mut self, message: Message) {
        let frame = match message {
            Message::Pong(_) => {
                if self.pongs_pending > 0 {
                    self.pongs_pending -= 1;
                    self.events.emit(TransportEvent::PongReceived(Ok(())));
                }
                return;
            }
            Message::Text(text) => ReceivedFrame::with_opcode(Opcode::Text, text.as_str()),
            Message::Binary(bytes) => ReceivedFrame::with_opcode(Opcode::Binary, bytes.to_vec()),
            Message::Ping(bytes) => ReceivedFrame::with_opcode(Opcode::Ping, bytes.to_vec()),
            Message::Close(_) => {
                self.close_seen = true;
                ReceivedFrame::with_opcode(Opcode::Close, Vec::new())
            }
            Message::Frame(_) => return,
        };

        if self.receive_pending {
            self.receive_pending = false;
            self.events.emit(TransportEvent::Received(Ok(frame)));
        } else {
            self.buffered.push_back(frame);
        }
    }

    fn on_read_error(&mut self, error: TransportError) {
        #[cfg(feature = "tracing")]
        tracing::warn!(%error, "WebSocket read failed");

        self.fail_pongs(&error);
        let event = if self.receive_pending {
            self.receive_pending = false;
            TransportEvent::Received(Err(error))
        } else {
            TransportEvent::StateChanged(ConnectionState::Failed(error))
        };
        self.events.emit(event);
    }

    fn fail_pongs(&mut self, error: &TransportError) {
        for _ in 0..self.pongs_pending {
            self.events
                .emit(TransportEvent::PongReceived(Err(error.clone())));
        }
        self.pongs_pending = 0;
    }

    /// Complete commands that were queued while connecting and will never run.
    fn fail_backlog(&self, backlog: VecDeque<DriverCommand>) {
        for command in backlog {
            match command {
                DriverCommand::Receive => {
                    self.events
                        .emit(TransportEvent::Received(Err(TransportError::closed())));
                }
                DriverCommand::Send(frame) => {
                    self.events.emit(TransportEvent::SendCompleted {
                        context: frame.context,
                        result: Err(TransportError::closed()),
                    });
                }
                DriverCommand::Cancel => {}
            }
        }
    }
}

fn into_message(frame: OutboundFrame) -> Result<Message, TransportError> {
    match frame.metadata.opcode {
        Opcode::Text => String::from_utf8(frame.payload)
            .map(Message::text)
            .map_err(|e| TransportError::new(TransportErrorKind::Protocol, e.to_string())),
        Opcode::Binary => Ok(Message::binary(frame.payload)),
        Opcode::Ping => Ok(Message::Ping(frame.payload.into())),
        Opcode::Pong => Ok(Message::Pong(frame.payload.into())),
        Opcode::Close => Ok(Message::Close(None)),
        Opcode::Continuation => Err(TransportError::new(
            TransportErrorKind::Protocol,
            "continuation frames cannot be sent on their own",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::transport::WebSocketOptions;
    use crate::ws::types::SocketMessage;

    #[test]
    fn text_frame_becomes_text_message() {
        let message = into_message(OutboundFrame::from(SocketMessage::text("hi"))).unwrap();

        assert_eq!(message, Message::text("hi"));
    }

    #[test]
    fn ping_frame_carries_sentinel_payload() {
        let message = into_message(OutboundFrame::ping()).unwrap();

        assert_eq!(message, Message::Ping(b"PING".to_vec().into()));
    }

    #[test]
    fn open_requires_websocket_layer() {
        let url = Url::parse("ws://localhost").unwrap();

        let error = TungsteniteTransport.open(&url, Parameters::tcp()).unwrap_err();
        assert_eq!(error.kind, TransportErrorKind::Other);

        let parameters = Parameters::for_url(&url, WebSocketOptions::new(true));
        assert!(TungsteniteTransport.open(&url, parameters).is_ok());
    }

    #[test]
    fn crypto_provider_is_installed_once() {
        install_crypto_provider();
        install_crypto_provider();

        assert!(rustls::crypto::CryptoProvider::get_default().is_some());
    }

    #[tokio::test]
    async fn unstarted_connection_drops_sends() {
        let url = Url::parse("ws://localhost").unwrap();
        let parameters = Parameters::for_url(&url, WebSocketOptions::new(true));
        let mut connection = TungsteniteTransport.open(&url, parameters).unwrap();

        // No sink installed yet, so there is nobody to report to
        connection.send(OutboundFrame::from(SocketMessage::text("lost")));
        connection.receive_message();
        connection.cancel();
        assert!(connection.events.is_none());
        assert!(connection.commands.is_none());
    }
}
