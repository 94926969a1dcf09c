#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::sync::Arc;
use std::time::Duration;

use observed_ws::ws::transport::Parameters;
use observed_ws::ws::{
    Connection, ConnectionId, ConnectionStatus, EventSink, OutboundFrame, PingPongStatus,
    SocketMessage, SocketObserver, Transport, TransportError, TransportEvent,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(100);

/// Everything the client asks of the scripted transport, in order.
#[derive(Debug)]
pub enum Call {
    Open { url: Url, parameters: Parameters },
    Start { sink: EventSink },
    Receive { id: Option<ConnectionId> },
    Send { id: Option<ConnectionId>, frame: OutboundFrame },
    Cancel { id: Option<ConnectionId> },
}

/// Transport that never touches the network. Every call is reported on the probe, and the test
/// plays the transport's part by emitting events through the sink it was handed on start.
pub struct ScriptedTransport {
    calls: mpsc::UnboundedSender<Call>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> (Self, Probe) {
        let (calls, rx) = mpsc::unbounded_channel();
        (Self { calls }, Probe { calls: rx })
    }
}

impl Transport for ScriptedTransport {
    type Connection = ScriptedConnection;

    fn open(&self, url: &Url, parameters: Parameters) -> Result<Self::Connection, TransportError> {
        drop(self.calls.send(Call::Open {
            url: url.clone(),
            parameters,
        }));

        Ok(ScriptedConnection {
            calls: self.calls.clone(),
            id: None,
        })
    }
}

pub struct ScriptedConnection {
    calls: mpsc::UnboundedSender<Call>,
    /// Id of the sink installed by the last start
    id: Option<ConnectionId>,
}

impl Connection for ScriptedConnection {
    fn start(&mut self, _runtime: &Handle, events: EventSink) {
        self.id = Some(events.id());
        drop(self.calls.send(Call::Start { sink: events }));
    }

    fn receive_message(&mut self) {
        drop(self.calls.send(Call::Receive { id: self.id }));
    }

    fn send(&mut self, frame: OutboundFrame) {
        drop(self.calls.send(Call::Send { id: self.id, frame }));
    }

    fn cancel(&mut self) {
        drop(self.calls.send(Call::Cancel { id: self.id }));
    }
}

/// Test side of [`ScriptedTransport`].
pub struct Probe {
    calls: mpsc::UnboundedReceiver<Call>,
}

impl Probe {
    pub async fn next(&mut self) -> Call {
        timeout(WAIT, self.calls.recv())
            .await
            .expect("timed out waiting for a transport call")
            .expect("transport dropped")
    }

    /// Consume the open and start calls of a fresh connection and return its sink.
    pub async fn expect_opened(&mut self) -> (Parameters, EventSink) {
        let Call::Open { parameters, .. } = self.next().await else {
            panic!("expected open");
        };
        let Call::Start { sink, .. } = self.next().await else {
            panic!("expected start");
        };
        (parameters, sink)
    }

    pub async fn expect_receive(&mut self) {
        let call = self.next().await;
        assert!(matches!(call, Call::Receive { .. }), "expected receive, got {call:?}");
    }

    pub async fn expect_send(&mut self) -> OutboundFrame {
        match self.next().await {
            Call::Send { frame, .. } => frame,
            call => panic!("expected send, got {call:?}"),
        }
    }

    pub async fn expect_cancel(&mut self) {
        let call = self.next().await;
        assert!(matches!(call, Call::Cancel { .. }), "expected cancel, got {call:?}");
    }

    /// Assert that the client makes no further transport call for a short while.
    pub async fn expect_quiet(&mut self) {
        if let Ok(Some(call)) = timeout(QUIET, self.calls.recv()).await {
            panic!("unexpected transport call {call:?}");
        }
    }
}

/// Everything the client reports to its observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Status(ConnectionStatus),
    Message(Result<SocketMessage, TransportError>),
    SendFailure(TransportError),
    PingPong(PingPongStatus),
}

pub struct Recorder {
    tx: mpsc::UnboundedSender<Observed>,
}

impl SocketObserver for Recorder {
    fn on_connection_status(&self, status: ConnectionStatus) {
        drop(self.tx.send(Observed::Status(status)));
    }

    fn on_message(&self, message: Result<SocketMessage, TransportError>) {
        drop(self.tx.send(Observed::Message(message)));
    }

    fn on_send_failure(&self, error: TransportError) {
        drop(self.tx.send(Observed::SendFailure(error)));
    }

    fn on_ping_pong_status(&self, status: PingPongStatus) {
        drop(self.tx.send(Observed::PingPong(status)));
    }
}

pub struct Observations {
    rx: mpsc::UnboundedReceiver<Observed>,
}

impl Observations {
    pub async fn next(&mut self) -> Observed {
        timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for an observer callback")
            .expect("recorder dropped")
    }

    pub async fn expect_quiet(&mut self) {
        if let Ok(Some(observed)) = timeout(QUIET, self.rx.recv()).await {
            panic!("unexpected observer callback {observed:?}");
        }
    }
}

#[must_use]
pub fn recorder() -> (Arc<Recorder>, Observations) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(Recorder { tx }), Observations { rx })
}
