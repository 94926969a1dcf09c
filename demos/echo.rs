//! Connects to an echo server, sends a few messages and a ping, and logs everything the client
//! reports.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info,rustls=off cargo run --example echo --features tracing -- wss://echo.websocket.org
//! ```

use std::sync::Arc;
use std::time::Duration;

use observed_ws::ws::{
    Config, ConnectionStatus, PingPongStatus, SocketMessage, SocketObserver, TransportError,
    WebSocket,
};
use tracing::{error, info, warn};

const DEFAULT_URL: &str = "wss://echo.websocket.org";

struct Logger;

impl SocketObserver for Logger {
    fn on_connection_status(&self, status: ConnectionStatus) {
        match status.into_error() {
            Some(e) => warn!(error = %e, "connection ended"),
            None => info!("server closed the connection"),
        }
    }

    fn on_message(&self, message: Result<SocketMessage, TransportError>) {
        match message {
            Ok(SocketMessage::Text(text)) => info!(%text, "received text"),
            Ok(SocketMessage::Binary(bytes)) => info!(len = bytes.len(), "received binary"),
            Ok(other) => info!(?other, "received message"),
            Err(e) => error!(error = %e, "receive failed"),
        }
    }

    fn on_send_failure(&self, error: TransportError) {
        error!(%error, "send failed");
    }

    fn on_ping_pong_status(&self, status: PingPongStatus) {
        info!(?status, "ping/pong");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let url = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_owned());
    let observer = Arc::new(Logger);
    let socket = WebSocket::new(&url, Config::default())?;

    socket.set_observer(&observer);
    socket.start_connection();

    let mut states = socket.state_receiver();
    tokio::time::timeout(Duration::from_secs(10), states.wait_for(|state| state.is_ready()))
        .await??;
    info!(%url, "connected");

    socket.send(SocketMessage::text("hello"));
    socket.send(SocketMessage::binary(vec![0xde_u8, 0xad, 0xbe, 0xef]));
    socket.send_ping();

    tokio::time::sleep(Duration::from_secs(2)).await;

    socket.close_connection();
    info!(state = ?socket.state(), "closed");

    Ok(())
}
