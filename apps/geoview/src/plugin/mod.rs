//! Version-selected plugins.
//!
//! Descriptors come from the server; installed, module-bearing plugins are
//! imported from a [`ModuleSource`] and initialised one after another in
//! descriptor order.

pub mod builtin;
pub mod hooks;
pub mod loader;
pub mod source;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

pub use hooks::{BadgeTone, EntryBadge, EntryControl, MeshEntryHook, MeshEntryHooks, MeshEntryUi};
pub use loader::{LoadReport, PluginLoader, SkipReason};
pub use source::{ModuleSource, ModuleSpec, StaticModuleSource};

use crate::dispatch::{TaskDispatcher, TaskHandler};
use crate::request::{RequestError, RequestFacade};

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("no module at {path}")]
    ModuleNotFound { path: String },
    #[error("plugin {name} advertises no concrete version")]
    NoVersion { name: String },
    #[error("plugin {name} failed to initialise: {source}")]
    Init {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("plugin listing request failed: {0}")]
    Request(#[from] RequestError),
    #[error("plugin listing is malformed: {0}")]
    Descriptors(#[from] serde_json::Error),
}

/// What a plugin may touch while initialising.
#[derive(Clone)]
pub struct PluginContext {
    pub dispatcher: TaskDispatcher,
    pub requests: RequestFacade,
    pub hooks: MeshEntryHooks,
    /// Reconciler entry point for tasks whose payload is a mesh delta.
    pub mesh_delta: Arc<dyn TaskHandler>,
}

impl PluginContext {
    pub fn register_task(&self, task: &str, handler: Arc<dyn TaskHandler>) {
        self.dispatcher.register(task, handler);
    }

    pub fn add_mesh_entry_hook(&self, hook: Arc<dyn MeshEntryHook>) {
        self.hooks.push(hook);
    }
}

#[async_trait]
pub trait PluginModule: Send + Sync {
    async fn init(&self, ctx: &PluginContext) -> Result<()>;
}
