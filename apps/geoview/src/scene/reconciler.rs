use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use geoview_proto::{MeshDelta, MeshEdit, MeshPayload};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::mesh::{MeshDecodeError, MeshGeometry};
use super::view::{MeshFace, MeshHandle, SceneView, ViewError};
use crate::dispatch::{TaskHandler, handler_fn};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid mesh entry: {0}")]
    Entry(#[from] serde_json::Error),
    #[error(transparent)]
    Decode(#[from] MeshDecodeError),
    #[error(transparent)]
    View(#[from] ViewError),
}

/// Locally held renderable state for one mesh uuid. The backface twin is
/// always built, attached and released together with the primary.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshResource {
    pub uuid: String,
    pub name: String,
    pub visible: bool,
    pub primary: MeshHandle,
    pub backface: MeshHandle,
    pub vertex_count: usize,
    pub face_count: usize,
}

/// What one delta application changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Uuids that had no resource before this delta.
    pub added: Vec<String>,
    /// Uuids whose resource was replaced.
    pub updated: Vec<String>,
    /// Uuids whose resource is gone after this delta, including replacements
    /// the view refused to build.
    pub removed: Vec<String>,
    pub failed: Vec<(String, String)>,
    /// Whether this delta brought the first content into an empty scene.
    pub framed: bool,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Owns the uuid to mesh resource mapping and applies deltas to it.
#[derive(Clone)]
pub struct SceneReconciler {
    meshes: Arc<Mutex<HashMap<String, MeshResource>>>,
    view: Arc<Mutex<dyn SceneView>>,
}

impl SceneReconciler {
    pub fn new(view: Arc<Mutex<dyn SceneView>>) -> Self {
        Self {
            meshes: Arc::new(Mutex::new(HashMap::new())),
            view,
        }
    }

    /// Applies a delta. Each uuid is handled on its own: the entry is decoded
    /// first and a bad one is reported while the existing resource stays.
    /// Otherwise the existing resource is released, then rebuilt unless the
    /// entry is a removal marker.
    pub fn apply_mesh_delta(&self, delta: &MeshDelta, refresh: bool) -> ReconcileReport {
        let mut meshes = self.meshes.lock();
        let mut view = self.view.lock();
        let was_empty = meshes.is_empty();
        let mut report = ReconcileReport::default();

        for (uuid, edit) in delta.edits() {
            let decoded: Result<Option<(MeshPayload, MeshGeometry)>, ReconcileError> = edit
                .map_err(ReconcileError::from)
                .and_then(|edit| match edit {
                    MeshEdit::Remove => Ok(None),
                    MeshEdit::Upsert(payload) => {
                        let geometry = MeshGeometry::decode(&payload)?;
                        Ok(Some((payload, geometry)))
                    }
                });
            let decoded = match decoded {
                Ok(decoded) => decoded,
                Err(err) => {
                    warn!(%uuid, error = %err, "rejecting mesh entry");
                    report.failed.push((uuid.to_string(), err.to_string()));
                    continue;
                }
            };

            let replaced = match meshes.remove(uuid) {
                Some(old) => {
                    release(&mut *view, &old);
                    true
                }
                None => false,
            };

            let outcome = match decoded {
                None => Ok(None),
                Some((payload, geometry)) => {
                    build(&mut *view, uuid, &payload, &geometry).map(Some)
                }
            };

            match outcome {
                Ok(Some(resource)) => {
                    meshes.insert(uuid.to_string(), resource);
                    if replaced {
                        report.updated.push(uuid.to_string());
                    } else {
                        report.added.push(uuid.to_string());
                    }
                }
                Ok(None) => {
                    if replaced {
                        report.removed.push(uuid.to_string());
                    } else {
                        debug!(%uuid, "removal for unknown mesh");
                    }
                }
                Err(err) => {
                    warn!(%uuid, error = %err, "mesh build failed");
                    if replaced {
                        report.removed.push(uuid.to_string());
                    }
                    report.failed.push((uuid.to_string(), err.to_string()));
                }
            }
        }

        if was_empty && !meshes.is_empty() {
            view.fit_to_frame();
            report.framed = true;
        }
        view.reset_camera(refresh);

        info!(
            added = report.added.len(),
            updated = report.updated.len(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            total = meshes.len(),
            "mesh delta applied"
        );
        report
    }

    /// Parses `parameters` as a mesh delta and applies it with a bounds
    /// refresh. Parameters without a `meshes` field leave the scene alone.
    pub fn apply_parameters(&self, parameters: Value) -> anyhow::Result<ReconcileReport> {
        if parameters.get("meshes").is_none() {
            return Ok(ReconcileReport::default());
        }
        let delta: MeshDelta =
            serde_json::from_value(parameters).context("mesh delta parameters")?;
        Ok(self.apply_mesh_delta(&delta, true))
    }

    /// Handler for every task whose payload is a mesh delta. Reports are
    /// forwarded to `on_report` when given.
    pub fn delta_handler(
        &self,
        on_report: Option<Arc<dyn Fn(ReconcileReport) + Send + Sync>>,
    ) -> Arc<dyn TaskHandler> {
        let reconciler = self.clone();
        handler_fn(move |parameters| {
            let reconciler = reconciler.clone();
            let on_report = on_report.clone();
            async move {
                let report = reconciler.apply_parameters(parameters)?;
                if let Some(on_report) = on_report {
                    on_report(report);
                }
                Ok(())
            }
        })
    }

    /// Releases every resource, used on teardown.
    pub fn clear(&self) -> Vec<String> {
        let mut meshes = self.meshes.lock();
        let mut view = self.view.lock();
        let mut uuids: Vec<String> = meshes.keys().cloned().collect();
        uuids.sort();
        for (_, resource) in meshes.drain() {
            release(&mut *view, &resource);
        }
        uuids
    }

    pub fn len(&self) -> usize {
        self.meshes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.lock().is_empty()
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.meshes.lock().contains_key(uuid)
    }

    pub fn resource(&self, uuid: &str) -> Option<MeshResource> {
        self.meshes.lock().get(uuid).cloned()
    }

    pub fn uuids(&self) -> Vec<String> {
        let mut uuids: Vec<_> = self.meshes.lock().keys().cloned().collect();
        uuids.sort();
        uuids
    }
}

fn release(view: &mut dyn SceneView, resource: &MeshResource) {
    view.remove_from_group(resource.primary);
    view.remove_from_group(resource.backface);
    view.dispose(resource.primary);
    view.dispose(resource.backface);
}

fn build(
    view: &mut dyn SceneView,
    uuid: &str,
    payload: &MeshPayload,
    geometry: &MeshGeometry,
) -> Result<MeshResource, ReconcileError> {
    let name = if payload.name.is_empty() {
        uuid
    } else {
        payload.name.as_str()
    };
    let primary = view.build_mesh(name, geometry, MeshFace::Front, payload.visibility)?;
    let backface = match view.build_mesh(name, geometry, MeshFace::Back, payload.visibility) {
        Ok(handle) => handle,
        Err(err) => {
            view.dispose(primary);
            return Err(err.into());
        }
    };
    view.add_to_group(primary);
    view.add_to_group(backface);
    Ok(MeshResource {
        uuid: uuid.to_string(),
        name: name.to_string(),
        visible: payload.visibility,
        primary,
        backface,
        vertex_count: geometry.vertex_count(),
        face_count: geometry.face_count(),
    })
}
