//! Plugins shipped with the client.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use geoview_proto::{MeshErrorInfo, tasks};
use serde::Deserialize;
use serde_json::json;

use super::hooks::{BadgeTone, EntryBadge, EntryControl, MeshEntryHook, MeshEntryUi};
use super::source::StaticModuleSource;
use super::{PluginContext, PluginModule};
use crate::request::RequestFacade;

/// Routes one task to the reconciler. Used by `undo`, `redo` and
/// `loadPolygonMesh`, whose payloads are plain mesh deltas.
pub struct MeshDeltaTask {
    task: &'static str,
}

impl MeshDeltaTask {
    pub fn new(task: &'static str) -> Self {
        Self { task }
    }
}

#[async_trait]
impl PluginModule for MeshDeltaTask {
    async fn init(&self, ctx: &PluginContext) -> Result<()> {
        ctx.register_task(self.task, ctx.mesh_delta.clone());
        Ok(())
    }
}

/// `toggleMeshVisibility`: the server answers with a mesh delta carrying the
/// new visibility, and every mesh entry gets a toggle button.
pub struct ToggleVisibility;

#[async_trait]
impl PluginModule for ToggleVisibility {
    async fn init(&self, ctx: &PluginContext) -> Result<()> {
        ctx.add_mesh_entry_hook(Arc::new(VisibilityToggleHook));
        ctx.register_task(tasks::TOGGLE_MESH_VISIBILITY, ctx.mesh_delta.clone());
        Ok(())
    }
}

struct VisibilityToggleHook;

#[async_trait]
impl MeshEntryHook for VisibilityToggleHook {
    async fn decorate(&self, entry: &mut MeshEntryUi) -> Result<()> {
        let icon = if entry.visible {
            "visibility"
        } else {
            "visibility_off"
        };
        entry.controls.push(EntryControl {
            id: format!("toggleVisibility_{}", entry.uuid),
            icon: icon.to_string(),
            tooltip: "Toggle visibility".to_string(),
            task: tasks::TOGGLE_MESH_VISIBILITY.to_string(),
            parameters: json!({ "meshes": [entry.uuid] }),
        });
        Ok(())
    }
}

/// `meshErrorInfo`: asks the server whether each mesh is closed and manifold
/// and badges the entry accordingly.
pub struct MeshErrorBadge;

#[async_trait]
impl PluginModule for MeshErrorBadge {
    async fn init(&self, ctx: &PluginContext) -> Result<()> {
        ctx.add_mesh_entry_hook(Arc::new(MeshErrorHook {
            requests: ctx.requests.clone(),
        }));
        Ok(())
    }
}

#[derive(Deserialize)]
struct MeshErrorResponse {
    meshes: HashMap<String, MeshErrorInfo>,
}

struct MeshErrorHook {
    requests: RequestFacade,
}

#[async_trait]
impl MeshEntryHook for MeshErrorHook {
    async fn decorate(&self, entry: &mut MeshEntryUi) -> Result<()> {
        let response: MeshErrorResponse = self
            .requests
            .call_json(tasks::MESH_ERROR_INFO, json!({ "meshes": [entry.uuid] }))
            .await?;
        let info = response
            .meshes
            .get(&entry.uuid)
            .with_context(|| format!("no error info for {}", entry.uuid))?;
        entry.badge = Some(if info.is_clean() {
            EntryBadge {
                icon: "check_circle".to_string(),
                tone: BadgeTone::Ok,
            }
        } else {
            EntryBadge {
                icon: "warning".to_string(),
                tone: BadgeTone::Warning,
            }
        });
        Ok(())
    }
}

/// Source preloaded with every built-in module under its plugin name.
pub fn builtin_source() -> StaticModuleSource {
    let source = StaticModuleSource::new();
    for task in [tasks::UNDO, tasks::REDO, tasks::LOAD_POLYGON_MESH] {
        source.register(task, Arc::new(MeshDeltaTask::new(task)));
    }
    source.register(tasks::TOGGLE_MESH_VISIBILITY, Arc::new(ToggleVisibility));
    source.register(tasks::MESH_ERROR_INFO, Arc::new(MeshErrorBadge));
    source
}
