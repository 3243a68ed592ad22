use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use geoview_proto::{CanvasParameters, MeshDelta, ServerBusy, SessionAssignment, tasks};
use parking_lot::Mutex;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::dispatch::{TaskDispatcher, handler_fn};
use crate::events::{self, ClientEvent, EventReceiver, EventSender};
use crate::plugin::{
    EntryControl, LoadReport, MeshEntryHooks, ModuleSource, PluginContext, PluginLoader,
};
use crate::request::{RequestError, RequestFacade};
use crate::scene::{ReconcileReport, SceneReconciler};
use crate::session::{SessionError, SessionIdentity};
use crate::sync::{SyncLoop, spawn_frame_loop};
use crate::transport::{Transport, TransportError, TransportEvent};
use crate::view::ViewHost;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("invalid server url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub room: String,
    pub http_base: Url,
    pub session_timeout: Duration,
    pub frame_interval: Duration,
}

impl ClientOptions {
    pub fn from_config(config: &Config) -> Result<Self, url::ParseError> {
        Ok(Self {
            room: config.room.clone(),
            http_base: config.http_base()?,
            session_timeout: config.session_timeout,
            frame_interval: config.frame_interval,
        })
    }
}

/// One joined room: transport, dispatcher, scene and sync loop wired
/// together. Lives exactly as long as the connection.
pub struct ViewerClient {
    transport: Arc<dyn Transport>,
    dispatcher: TaskDispatcher,
    session: SessionIdentity,
    requests: RequestFacade,
    reconciler: SceneReconciler,
    sync: Arc<SyncLoop>,
    plugins: LoadReport,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ViewerClient {
    /// Boots a session on an already connected transport:
    /// session identity, then plugins, then the pulled meshes and canvas,
    /// then the frame loop.
    pub async fn start<V>(
        transport: Arc<dyn Transport>,
        view: Arc<Mutex<V>>,
        modules: Arc<dyn ModuleSource>,
        options: ClientOptions,
    ) -> Result<(Self, EventReceiver), ClientError>
    where
        V: ViewHost + 'static,
    {
        let (events_tx, events_rx) = events::channel();
        let session = SessionIdentity::new();
        let dispatcher = TaskDispatcher::new();
        let requests = RequestFacade::new(options.http_base.clone(), &options.room, session.clone())
            .with_events(events_tx.clone());
        let reconciler = SceneReconciler::new(view.clone());
        let sync = Arc::new(SyncLoop::new(view, session.clone()));
        let hooks = MeshEntryHooks::default();
        let mut tasks = Vec::new();

        let (reports_tx, reports_rx) = mpsc::unbounded_channel::<ReconcileReport>();
        tasks.push(spawn_entry_renderer(
            reports_rx,
            reconciler.clone(),
            hooks.clone(),
            events_tx.clone(),
        ));
        let forward_report: Arc<dyn Fn(ReconcileReport) + Send + Sync> =
            Arc::new(move |report| {
                let _ = reports_tx.send(report);
            });
        let mesh_delta = reconciler.delta_handler(Some(forward_report.clone()));

        register_core_tasks(&dispatcher, &session, &sync, &events_tx);
        dispatcher.register(tasks::SYNC_MESHES, mesh_delta.clone());

        let (close_tx, close_rx) = mpsc::unbounded_channel();
        transport.on_close(close_tx);
        tasks.push(spawn_close_watcher(close_rx, events_tx.clone()));
        tasks.push(spawn_inbound_pump(transport.clone(), dispatcher.clone()));

        let mut client = Self {
            transport,
            dispatcher: dispatcher.clone(),
            session: session.clone(),
            requests: requests.clone(),
            reconciler: reconciler.clone(),
            sync: sync.clone(),
            plugins: LoadReport::default(),
            tasks: Mutex::new(tasks),
        };

        let session_id = match session.wait(options.session_timeout).await {
            Ok(id) => id,
            Err(err) => {
                client.abort_tasks();
                return Err(err.into());
            }
        };
        info!(%session_id, room = %options.room, "joined room");

        let descriptors = match PluginLoader::fetch_descriptors(&requests).await {
            Ok(descriptors) => descriptors,
            Err(err) => {
                warn!(error = %err, "plugin listing unavailable, continuing without plugins");
                Vec::new()
            }
        };
        let ctx = PluginContext {
            dispatcher,
            requests: requests.clone(),
            hooks,
            mesh_delta,
        };
        let loader = PluginLoader::new(modules).with_events(events_tx.clone());
        let plugins = loader.load_all(&descriptors, &ctx).await;
        let _ = events_tx.send(ClientEvent::PluginsLoaded {
            loaded: plugins.loaded_names(),
        });

        // Framing the pulled meshes moves the camera, so the authoritative
        // canvas is applied after it and becomes the baseline
        match requests
            .call_json::<MeshDelta>(tasks::PULL_CURRENT_MESHES, json!({}))
            .await
        {
            Ok(delta) => forward_report(reconciler.apply_mesh_delta(&delta, true)),
            Err(err) => warn!(error = %err, "current meshes unavailable"),
        }

        match requests
            .call_json::<CanvasParameters>(tasks::PULL_CANVAS_PARAMETERS, json!({}))
            .await
        {
            Ok(params) => sync.seed(&params),
            Err(err) => warn!(error = %err, "canvas parameters unavailable, camera sync stays idle"),
        }

        let frame_loop = spawn_frame_loop(sync, client.transport.clone(), options.frame_interval);
        client.tasks.lock().push(frame_loop);
        let _ = events_tx.send(ClientEvent::Ready);

        client.plugins = plugins;
        Ok((client, events_rx))
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.get()
    }

    pub fn dispatcher(&self) -> &TaskDispatcher {
        &self.dispatcher
    }

    pub fn requests(&self) -> &RequestFacade {
        &self.requests
    }

    pub fn reconciler(&self) -> &SceneReconciler {
        &self.reconciler
    }

    pub fn sync(&self) -> &Arc<SyncLoop> {
        &self.sync
    }

    pub fn plugins(&self) -> &LoadReport {
        &self.plugins
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Activates a mesh entry control.
    pub async fn activate(&self, control: &EntryControl) -> Result<String, RequestError> {
        self.requests
            .call(&control.task, control.parameters.clone())
            .await
    }

    /// Announces the cursor removal, closes the channel without reporting a
    /// disconnect, and releases every mesh.
    pub async fn shutdown(self) {
        if let Some(removal) = self.sync.cursor_removal() {
            if let Err(err) = self.transport.send(removal).await {
                debug!(error = %err, "cursor removal not sent");
            }
        }
        self.transport.close().await;
        self.abort_tasks();
        let released = self.reconciler.clear();
        info!(meshes = released.len(), "session closed");
    }

    fn abort_tasks(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Drop for ViewerClient {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

fn register_core_tasks(
    dispatcher: &TaskDispatcher,
    session: &SessionIdentity,
    sync: &Arc<SyncLoop>,
    events: &EventSender,
) {
    let (session, events_tx) = (session.clone(), events.clone());
    dispatcher.register(
        tasks::INITIALIZE_SESSION,
        handler_fn(move |parameters| {
            let session = session.clone();
            let events = events_tx.clone();
            async move {
                let assignment: SessionAssignment =
                    serde_json::from_value(parameters).context("initializeSession parameters")?;
                session.assign(&assignment.session_id)?;
                let _ = events.send(ClientEvent::SessionAssigned(assignment.session_id));
                Ok(())
            }
        }),
    );

    let events_tx = events.clone();
    dispatcher.register(
        tasks::IS_SERVER_BUSY,
        handler_fn(move |parameters| {
            let events = events_tx.clone();
            async move {
                let busy: ServerBusy =
                    serde_json::from_value(parameters).context("isServerBusy parameters")?;
                let _ = events.send(ClientEvent::ServerBusy(busy.busy));
                Ok(())
            }
        }),
    );

    let events_tx = events.clone();
    dispatcher.register(
        tasks::FORCE_RELOAD,
        handler_fn(move |_| {
            let events = events_tx.clone();
            async move {
                let _ = events.send(ClientEvent::ReloadRequested);
                Ok(())
            }
        }),
    );

    dispatcher.register(tasks::SYNC_PARAMS, sync.params_handler());
    dispatcher.register(tasks::SYNC_CURSOR, sync.cursor_handler());
}

/// Reads inbound frames and dispatches them one at a time, in arrival order.
fn spawn_inbound_pump(transport: Arc<dyn Transport>, dispatcher: TaskDispatcher) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(text) = transport.recv().await {
            dispatcher.dispatch(&text).await;
        }
        debug!("inbound pump finished");
    })
}

fn spawn_close_watcher(
    mut close_rx: mpsc::UnboundedReceiver<TransportEvent>,
    events: EventSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Some(TransportEvent::Closed { reason }) = close_rx.recv().await {
            warn!(%reason, "room channel lost");
            let _ = events.send(ClientEvent::Disconnected { reason });
        }
    })
}

/// Turns reconcile reports into mesh entry events, running the plugin hooks
/// for every entry that was added or replaced.
fn spawn_entry_renderer(
    mut reports: mpsc::UnboundedReceiver<ReconcileReport>,
    reconciler: SceneReconciler,
    hooks: MeshEntryHooks,
    events: EventSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(report) = reports.recv().await {
            for uuid in report.removed {
                if !reconciler.contains(&uuid) {
                    let _ = events.send(ClientEvent::MeshEntryRemoved { uuid });
                }
            }
            for uuid in report.added.iter().chain(report.updated.iter()) {
                let Some(resource) = reconciler.resource(uuid) else {
                    continue;
                };
                let entry = hooks.render(&resource).await;
                let _ = events.send(ClientEvent::MeshEntryUpdated(entry));
            }
        }
    })
}
