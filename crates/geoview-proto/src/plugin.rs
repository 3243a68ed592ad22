use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version sentinel resolved against the descriptor's advertised latest.
pub const LATEST_VERSION: &str = "latest";

/// One entry of the `listPlugins` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    /// Empty when the plugin is not installed.
    #[serde(default)]
    pub installed_version: String,
    #[serde(default)]
    pub description: Value,
    #[serde(default)]
    pub optional: bool,
    #[serde(rename = "hasModuleJS", default)]
    pub has_module: bool,
}

impl PluginDescriptor {
    pub fn is_installed(&self) -> bool {
        !self.installed_version.is_empty()
    }

    /// Concrete version to load, `None` if nothing concrete is advertised.
    pub fn resolved_version(&self) -> Option<&str> {
        if self.installed_version != LATEST_VERSION {
            return (!self.installed_version.is_empty()).then_some(self.installed_version.as_str());
        }
        self.latest
            .as_deref()
            .filter(|v| !v.is_empty() && *v != LATEST_VERSION)
            .or_else(|| {
                self.versions
                    .iter()
                    .map(String::as_str)
                    .find(|v| *v != LATEST_VERSION && !v.is_empty())
            })
    }

    /// Decodes a descriptor list sent either as an array or as an object
    /// keyed by plugin name. Object order is kept as sent.
    pub fn list_from_value(value: Value) -> Result<Vec<Self>, serde_json::Error> {
        match value {
            Value::Object(entries) => entries
                .into_iter()
                .map(|(name, entry)| {
                    let mut descriptor: Self = serde_json::from_value(entry)?;
                    if descriptor.name.is_empty() {
                        descriptor.name = name;
                    }
                    Ok(descriptor)
                })
                .collect(),
            other => serde_json::from_value(other),
        }
    }
}

/// Element of an `updatePlugins` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSelection {
    pub name: String,
    pub version: String,
}
