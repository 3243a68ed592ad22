//! Camera and cursor synchronisation.
//!
//! Every frame the live camera is compared against the last synced baseline
//! and only differing fields go out. The baseline starts empty and is seeded
//! from the server's canvas parameters, so nothing is sent before the client
//! knows what the server already has.

pub mod cursors;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use geoview_proto::{CameraSync, CanvasParameters, CursorSync, CursorWire, flat_message, tasks};
use glam::Vec3;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

pub use cursors::{CursorChange, CursorTable};
pub use state::{CameraState, CameraUpdate, CursorState, InteractiveControls};

use crate::dispatch::{TaskHandler, handler_fn};
use crate::session::SessionIdentity;
use crate::transport::Transport;
use state::vec3_wire;

/// Last values known to agree with the server. Never transmitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub target: Vec3,
    pub position: Vec3,
    pub up: Vec3,
    pub zoom: f32,
    pub cursor: Option<CursorState>,
}

impl Baseline {
    fn capture(camera: &CameraState, cursor: Option<CursorState>) -> Self {
        Self {
            target: camera.target,
            position: camera.position,
            up: camera.up,
            zoom: camera.zoom,
            cursor,
        }
    }
}

/// Messages produced by one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutput {
    pub camera: Option<CameraSync>,
    pub cursor: Option<CursorSync>,
}

impl TickOutput {
    pub fn is_empty(&self) -> bool {
        self.camera.is_none() && self.cursor.is_none()
    }

    pub fn messages(&self) -> Result<Vec<String>, serde_json::Error> {
        let mut out = Vec::with_capacity(2);
        if let Some(camera) = &self.camera {
            out.push(flat_message(tasks::SYNC_PARAMS, camera)?);
        }
        if let Some(cursor) = &self.cursor {
            out.push(flat_message(tasks::SYNC_CURSOR, cursor)?);
        }
        Ok(out)
    }
}

#[derive(Default)]
struct SyncState {
    baseline: Option<Baseline>,
    cursors: CursorTable,
}

pub struct SyncLoop {
    controls: Arc<Mutex<dyn InteractiveControls>>,
    session: SessionIdentity,
    // Locked before `controls` whenever both are needed
    state: Mutex<SyncState>,
}

impl SyncLoop {
    pub fn new(controls: Arc<Mutex<dyn InteractiveControls>>, session: SessionIdentity) -> Self {
        Self {
            controls,
            session,
            state: Mutex::new(SyncState::default()),
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.state.lock().baseline.is_some()
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.state.lock().baseline
    }

    pub fn remote_cursors(&self) -> CursorTable {
        self.state.lock().cursors.clone()
    }

    /// Applies the pulled authoritative state and adopts the resulting live
    /// values as the baseline.
    pub fn seed(&self, params: &CanvasParameters) {
        let mut state = self.state.lock();
        let (camera, cursor) = {
            let mut controls = self.controls.lock();
            controls.apply_camera(&CameraUpdate::from(params));
            (controls.camera(), controls.cursor())
        };
        state.baseline = Some(Baseline::capture(&camera, cursor));

        let own = self.session.get();
        for (session_id, cursor) in &params.cursors {
            if own.as_deref() != Some(session_id.as_str()) {
                state.cursors.upsert(session_id, (*cursor).into());
            }
        }
        debug!(remote_cursors = state.cursors.len(), "sync baseline seeded");
    }

    /// One frame: update controls, diff against the baseline, then move the
    /// baseline to the live values whether or not anything was emitted.
    pub fn tick(&self) -> TickOutput {
        let mut state = self.state.lock();
        let (camera, cursor, timestamp) = {
            let mut controls = self.controls.lock();
            controls.update();
            (controls.camera(), controls.cursor(), controls.stroke_timestamp())
        };
        let Some(baseline) = state.baseline.as_mut() else {
            return TickOutput::default();
        };
        let Some(session_id) = self.session.get() else {
            return TickOutput::default();
        };

        let camera_sync = CameraSync {
            session_id: session_id.clone(),
            timestamp,
            target: (camera.target != baseline.target).then(|| vec3_wire(camera.target)),
            pos: (camera.position != baseline.position).then(|| vec3_wire(camera.position)),
            up: (camera.up != baseline.up).then(|| vec3_wire(camera.up)),
            zoom: (camera.zoom != baseline.zoom).then_some(camera.zoom),
        };
        let cursor_sync = match cursor {
            Some(live) if Some(live) != baseline.cursor => Some(CursorSync {
                session_id,
                timestamp,
                remove: false,
                cursor: Some(CursorWire::from(live)),
            }),
            _ => None,
        };

        *baseline = Baseline::capture(&camera, cursor.or(baseline.cursor));

        TickOutput {
            camera: camera_sync.has_changes().then_some(camera_sync),
            cursor: cursor_sync,
        }
    }

    /// Runs a tick and hands its messages to the transport without waiting
    /// on delivery.
    pub async fn tick_and_send(&self, transport: &dyn Transport) -> TickOutput {
        let output = self.tick();
        match output.messages() {
            Ok(messages) => {
                for message in messages {
                    if let Err(err) = transport.send(message).await {
                        debug!(error = %err, "dropping sync message");
                    }
                }
            }
            Err(err) => debug!(error = %err, "failed to encode sync message"),
        }
        output
    }

    /// Applies camera fields pushed by another session. The baseline follows
    /// so the change is not echoed back on the next tick.
    pub fn apply_remote_params(&self, sync: &CameraSync) -> bool {
        if self.session.get().as_deref() == Some(sync.session_id.as_str()) {
            return false;
        }
        let update = CameraUpdate::from(sync);
        if update.is_empty() {
            return false;
        }
        let mut state = self.state.lock();
        let camera = {
            let mut controls = self.controls.lock();
            controls.apply_camera(&update);
            controls.camera()
        };
        if let Some(baseline) = state.baseline.as_mut() {
            if update.target.is_some() {
                baseline.target = camera.target;
            }
            if update.position.is_some() {
                baseline.position = camera.position;
            }
            if update.up.is_some() {
                baseline.up = camera.up;
            }
            if update.zoom.is_some() {
                baseline.zoom = camera.zoom;
            }
        }
        trace!(from = %sync.session_id, "remote camera applied");
        true
    }

    pub fn apply_remote_cursor(&self, sync: &CursorSync) -> CursorChange {
        let own = self.session.get();
        self.state.lock().cursors.apply(own.as_deref(), sync)
    }

    /// Message telling the room this session's cursor is gone.
    pub fn cursor_removal(&self) -> Option<String> {
        let session_id = self.session.get()?;
        let timestamp = self.controls.lock().stroke_timestamp();
        let removal = CursorSync {
            session_id,
            timestamp,
            remove: true,
            cursor: None,
        };
        flat_message(tasks::SYNC_CURSOR, &removal).ok()
    }

    pub fn params_handler(self: &Arc<Self>) -> Arc<dyn TaskHandler> {
        let sync = self.clone();
        handler_fn(move |parameters| {
            let sync = sync.clone();
            async move {
                let params: CameraSync =
                    serde_json::from_value(parameters).context("syncParams parameters")?;
                sync.apply_remote_params(&params);
                Ok(())
            }
        })
    }

    pub fn cursor_handler(self: &Arc<Self>) -> Arc<dyn TaskHandler> {
        let sync = self.clone();
        handler_fn(move |parameters| {
            let sync = sync.clone();
            async move {
                let cursor: CursorSync =
                    serde_json::from_value(parameters).context("syncCursor parameters")?;
                sync.apply_remote_cursor(&cursor);
                Ok(())
            }
        })
    }
}

/// Drives `tick_and_send` at `interval` until the transport closes. Ticks
/// run back to back on one task and never overlap.
pub fn spawn_frame_loop(
    sync: Arc<SyncLoop>,
    transport: Arc<dyn Transport>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !transport.is_connected() {
                debug!("frame loop stopping, transport closed");
                break;
            }
            sync.tick_and_send(transport.as_ref()).await;
        }
    })
}
