use bon::Builder;
use tokio::runtime::Handle;

/// Configuration for WebSocket client behavior.
///
/// ```
/// use observed_ws::ws::config::Config;
///
/// let config = Config::builder().auto_reply_ping(false).build();
/// assert!(!config.auto_reply_ping);
/// assert!(Config::default().auto_reply_ping);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Whether the transport answers incoming PING frames on its own
    #[builder(default = true)]
    pub auto_reply_ping: bool,
    /// Runtime the client's event loop and the transport run on.
    /// `None` means the runtime the client is created from.
    pub runtime: Option<Handle>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_reply_ping: true,
            runtime: None,
        }
    }
}
