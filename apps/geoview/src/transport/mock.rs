use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use super::{Transport, TransportError, TransportEvent};

/// In-memory transport. Records outbound frames and lets callers inject
/// inbound ones.
pub struct MockTransport {
    sent: Mutex<Vec<String>>,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<String>>,
    open: AtomicBool,
    closed_gracefully: AtomicBool,
    on_close: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sent: Mutex::new(Vec::new()),
            inbound_tx: Mutex::new(Some(tx)),
            inbound_rx: AsyncMutex::new(rx),
            open: AtomicBool::new(true),
            closed_gracefully: AtomicBool::new(false),
            on_close: Mutex::new(None),
        }
    }

    pub fn push_inbound(&self, text: impl Into<String>) {
        if let Some(tx) = self.inbound_tx.lock().as_ref() {
            let _ = tx.send(text.into());
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Outbound frames parsed as json; frames that do not parse are skipped.
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    /// Behaves like the server dropping the connection.
    pub fn simulate_disconnect(&self, reason: &str) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inbound_tx.lock().take();
        if let Some(listener) = self.on_close.lock().take() {
            let _ = listener.send(TransportEvent::Closed {
                reason: reason.to_string(),
            });
        }
    }

    pub fn was_closed_gracefully(&self) -> bool {
        self.closed_gracefully.load(Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, envelope: String) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().push(envelope);
        Ok(())
    }

    async fn recv(&self) -> Option<String> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn on_close(&self, listener: mpsc::UnboundedSender<TransportEvent>) {
        *self.on_close.lock() = Some(listener);
    }

    async fn close(&self) {
        self.on_close.lock().take();
        if self.open.swap(false, Ordering::SeqCst) {
            self.closed_gracefully.store(true, Ordering::SeqCst);
        }
        self.inbound_tx.lock().take();
    }
}
