use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::{Transport, TransportError, TransportEvent};

pub mod config;
use config::WebSocketConfig;

const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

enum Outbound {
    Text(String),
    /// Sent after everything queued before it; acknowledged once the close
    /// frame is written.
    Close(oneshot::Sender<()>),
}

struct ChannelState {
    open: AtomicBool,
    on_close: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
}

impl ChannelState {
    fn mark_closed(&self, reason: &str) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(listener) = self.on_close.lock().take() {
            let _ = listener.send(TransportEvent::Closed {
                reason: reason.to_string(),
            });
        }
    }
}

/// WebSocket implementation of the Transport trait
pub struct WebSocketTransport {
    outbound: mpsc::UnboundedSender<Outbound>,
    inbound: AsyncMutex<mpsc::UnboundedReceiver<String>>,
    state: Arc<ChannelState>,
    ws_task: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketTransport {
    /// Connect to the room channel
    pub async fn connect(config: WebSocketConfig) -> Result<Self, TransportError> {
        let url = config.url.to_string();
        let (ws_stream, _) = tokio::time::timeout(config.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| TransportError::ConnectTimeout(config.connect_timeout))??;
        info!(%url, "room channel connected");

        let (tx_out, rx_out) = mpsc::unbounded_channel::<Outbound>();
        let (tx_in, rx_in) = mpsc::unbounded_channel::<String>();

        let state = Arc::new(ChannelState {
            open: AtomicBool::new(true),
            on_close: Mutex::new(None),
        });
        let task_state = state.clone();
        let ws_task = tokio::spawn(async move {
            handle_websocket(ws_stream, rx_out, tx_in, task_state).await;
        });

        Ok(Self {
            outbound: tx_out,
            inbound: AsyncMutex::new(rx_in),
            state,
            ws_task: Mutex::new(Some(ws_task)),
        })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, envelope: String) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.outbound
            .send(Outbound::Text(envelope))
            .map_err(|_| TransportError::NotConnected)
    }

    async fn recv(&self) -> Option<String> {
        let mut rx = self.inbound.lock().await;
        rx.recv().await
    }

    fn is_connected(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }

    fn on_close(&self, listener: mpsc::UnboundedSender<TransportEvent>) {
        *self.state.on_close.lock() = Some(listener);
    }

    async fn close(&self) {
        // Listener goes first so a deliberate close is never reported as a disconnect
        self.state.on_close.lock().take();
        if self.state.open.swap(false, Ordering::SeqCst) {
            let (done_tx, done_rx) = oneshot::channel();
            if self.outbound.send(Outbound::Close(done_tx)).is_ok()
                && tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, done_rx).await.is_err()
            {
                warn!("room channel close did not flush in time");
            }
        }
        let task = self.ws_task.lock().take();
        if let Some(task) = task {
            task.abort();
        }
        debug!("room channel closed");
    }
}

async fn handle_websocket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx_out: mpsc::UnboundedReceiver<Outbound>,
    tx_in: mpsc::UnboundedSender<String>,
    state: Arc<ChannelState>,
) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let writer_state = state.clone();
    let send_task = tokio::spawn(async move {
        while let Some(item) = rx_out.recv().await {
            match item {
                Outbound::Text(text) => {
                    if let Err(err) = ws_sender.send(Message::Text(text)).await {
                        writer_state.mark_closed(&err.to_string());
                        break;
                    }
                }
                Outbound::Close(done) => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    let _ = done.send(());
                    break;
                }
            }
        }
    });

    let reason = loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                if tx_in.send(text).is_err() {
                    break "inbound receiver dropped".to_string();
                }
            }
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                Ok(text) => {
                    if tx_in.send(text).is_err() {
                        break "inbound receiver dropped".to_string();
                    }
                }
                Err(_) => warn!("dropping non-utf8 binary frame"),
            },
            Some(Ok(Message::Close(frame))) => {
                break frame
                    .map(|f| f.reason.to_string())
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "closed by server".to_string());
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => break err.to_string(),
            None => break "stream ended".to_string(),
        }
    };

    state.mark_closed(&reason);
    send_task.abort();
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(task) = self.ws_task.get_mut().take() {
            task.abort();
        }
    }
}
