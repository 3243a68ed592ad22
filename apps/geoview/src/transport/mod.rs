use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod mock;
pub mod websocket;

pub use mock::MockTransport;
pub use websocket::{WebSocketTransport, config::WebSocketConfig};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Notification delivered to the registered close listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Closed { reason: String },
}

/// Duplex text channel to one room.
///
/// A closed transport stays closed; callers start a new session instead of
/// reconnecting.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Queue an envelope for delivery. Fails with `NotConnected` unless open.
    async fn send(&self, envelope: String) -> Result<(), TransportError>;

    /// Next inbound text frame, `None` once the channel is gone.
    async fn recv(&self) -> Option<String>;

    fn is_connected(&self) -> bool;

    /// Register the single listener told about an unexpected close.
    /// A later registration replaces the earlier one.
    fn on_close(&self, listener: mpsc::UnboundedSender<TransportEvent>);

    /// Detach the close listener, flush queued frames and close.
    async fn close(&self);
}
