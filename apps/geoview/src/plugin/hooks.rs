use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::warn;

use crate::scene::MeshResource;

/// Button attached to a mesh entry. Activating it posts `task` with
/// `parameters` through the request façade.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryControl {
    pub id: String,
    pub icon: String,
    pub tooltip: String,
    pub task: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeTone {
    Ok,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryBadge {
    pub icon: String,
    pub tone: BadgeTone,
}

/// UI representation of one mesh, built from its resource and then
/// decorated by every registered hook.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshEntryUi {
    pub uuid: String,
    pub name: String,
    pub visible: bool,
    pub vertex_count: usize,
    pub face_count: usize,
    pub controls: Vec<EntryControl>,
    pub badge: Option<EntryBadge>,
}

impl MeshEntryUi {
    pub fn from_resource(resource: &MeshResource) -> Self {
        Self {
            uuid: resource.uuid.clone(),
            name: resource.name.clone(),
            visible: resource.visible,
            vertex_count: resource.vertex_count,
            face_count: resource.face_count,
            controls: Vec::new(),
            badge: None,
        }
    }
}

#[async_trait]
pub trait MeshEntryHook: Send + Sync {
    async fn decorate(&self, entry: &mut MeshEntryUi) -> Result<()>;
}

/// Ordered hook list shared between plugins and the client.
#[derive(Clone, Default)]
pub struct MeshEntryHooks {
    hooks: Arc<RwLock<Vec<Arc<dyn MeshEntryHook>>>>,
}

impl MeshEntryHooks {
    pub fn push(&self, hook: Arc<dyn MeshEntryHook>) {
        self.hooks.write().push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    /// Runs hooks in registration order. A failing hook is logged and the
    /// entry keeps whatever earlier hooks added.
    pub async fn render(&self, resource: &MeshResource) -> MeshEntryUi {
        let hooks: Vec<_> = self.hooks.read().clone();
        let mut entry = MeshEntryUi::from_resource(resource);
        for hook in hooks {
            if let Err(err) = hook.decorate(&mut entry).await {
                warn!(uuid = %entry.uuid, error = %err, "mesh entry hook failed");
            }
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MeshHandle;

    struct Label(&'static str);

    #[async_trait]
    impl MeshEntryHook for Label {
        async fn decorate(&self, entry: &mut MeshEntryUi) -> Result<()> {
            entry.controls.push(EntryControl {
                id: self.0.to_string(),
                icon: String::new(),
                tooltip: String::new(),
                task: String::new(),
                parameters: Value::Null,
            });
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl MeshEntryHook for Broken {
        async fn decorate(&self, _entry: &mut MeshEntryUi) -> Result<()> {
            anyhow::bail!("no luck")
        }
    }

    #[tokio::test]
    async fn hooks_run_in_order_and_failures_are_skipped() {
        let hooks = MeshEntryHooks::default();
        hooks.push(Arc::new(Label("first")));
        hooks.push(Arc::new(Broken));
        hooks.push(Arc::new(Label("second")));

        let resource = MeshResource {
            uuid: "m1".into(),
            name: "cube".into(),
            visible: true,
            primary: MeshHandle(1),
            backface: MeshHandle(2),
            vertex_count: 8,
            face_count: 12,
        };
        let entry = hooks.render(&resource).await;
        let ids: Vec<_> = entry.controls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["first", "second"]);
        assert_eq!(entry.face_count, 12);
    }
}
