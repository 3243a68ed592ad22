use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use geoview_proto::{Envelope, ProtocolError};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

/// Receives the `parameters` payload of every envelope routed to its task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, parameters: Value) -> Result<()>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, parameters: Value) -> Result<()> {
        (self.0)(parameters).await
    }
}

/// Wraps an async closure as a handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn TaskHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Handled { task: String },
    HandlerFailed { task: String, error: anyhow::Error },
    UnknownTask { task: String },
    Malformed(ProtocolError),
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. })
    }
}

/// Task name to handler registry.
///
/// One handler per task; registering a task again replaces the previous
/// handler, which is how plugins override built-ins.
#[derive(Clone, Default)]
pub struct TaskDispatcher {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn TaskHandler>>>>,
}

impl TaskDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handler that was replaced, if any.
    pub fn register(
        &self,
        task: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> Option<Arc<dyn TaskHandler>> {
        let task = task.into();
        let previous = self.handlers.write().insert(task.clone(), handler);
        if previous.is_some() {
            debug!(%task, "task handler replaced");
        }
        previous
    }

    pub fn handler(&self, task: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.read().get(task).cloned()
    }

    pub fn has_handler(&self, task: &str) -> bool {
        self.handlers.read().contains_key(task)
    }

    pub fn tasks(&self) -> Vec<String> {
        let mut tasks: Vec<_> = self.handlers.read().keys().cloned().collect();
        tasks.sort();
        tasks
    }

    /// Parses and routes one inbound frame. Nothing here is fatal: malformed
    /// frames, unknown tasks and handler errors are logged and reported back.
    pub async fn dispatch(&self, text: &str) -> DispatchOutcome {
        match Envelope::parse(text) {
            Ok(envelope) => self.dispatch_envelope(envelope).await,
            Err(err) => {
                warn!(error = %err, "dropping malformed envelope");
                DispatchOutcome::Malformed(err)
            }
        }
    }

    pub async fn dispatch_envelope(&self, envelope: Envelope) -> DispatchOutcome {
        let Envelope { task, parameters } = envelope;
        // Lock is released before the handler runs so handlers may register tasks
        let Some(handler) = self.handler(&task) else {
            warn!(%task, "no handler registered for task");
            return DispatchOutcome::UnknownTask { task };
        };
        debug!(%task, "dispatching envelope");
        match handler.handle(parameters).await {
            Ok(()) => DispatchOutcome::Handled { task },
            Err(error) => {
                warn!(%task, error = %error, "task handler failed");
                DispatchOutcome::HandlerFailed { task, error }
            }
        }
    }
}
