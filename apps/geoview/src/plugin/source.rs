use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{PluginError, PluginModule};

/// Location of one plugin version's module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    pub name: String,
    pub version: String,
    pub path: String,
}

impl ModuleSpec {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            path: format!("plugin/{name}_{version}/module.js"),
        }
    }
}

/// Resolves a module spec to a loadable module.
#[async_trait]
pub trait ModuleSource: Send + Sync {
    async fn import(&self, spec: &ModuleSpec) -> Result<Arc<dyn PluginModule>, PluginError>;
}

/// Modules compiled into the client. A module registered for an exact path
/// wins over one registered for the plugin name.
#[derive(Clone, Default)]
pub struct StaticModuleSource {
    by_path: Arc<RwLock<HashMap<String, Arc<dyn PluginModule>>>>,
    by_name: Arc<RwLock<HashMap<String, Arc<dyn PluginModule>>>>,
}

impl StaticModuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, module: Arc<dyn PluginModule>) {
        self.by_name.write().insert(name.into(), module);
    }

    pub fn register_version(&self, spec: &ModuleSpec, module: Arc<dyn PluginModule>) {
        self.by_path.write().insert(spec.path.clone(), module);
    }
}

#[async_trait]
impl ModuleSource for StaticModuleSource {
    async fn import(&self, spec: &ModuleSpec) -> Result<Arc<dyn PluginModule>, PluginError> {
        if let Some(module) = self.by_path.read().get(&spec.path) {
            return Ok(module.clone());
        }
        self.by_name
            .read()
            .get(&spec.name)
            .cloned()
            .ok_or_else(|| PluginError::ModuleNotFound {
                path: spec.path.clone(),
            })
    }
}
