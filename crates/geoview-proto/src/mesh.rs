use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `{ "meshes": { uuid: edit } }`. Entries stay as raw json so one malformed
/// edit can be rejected without losing the rest of the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshDelta {
    #[serde(default)]
    pub meshes: Map<String, Value>,
}

impl MeshDelta {
    pub fn removal<I, S>(uuids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let meshes = uuids
            .into_iter()
            .map(|uuid| (uuid.into(), serde_json::json!({ "remove": true })))
            .collect();
        Self { meshes }
    }

    pub fn insert(
        &mut self,
        uuid: impl Into<String>,
        payload: &MeshPayload,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(payload)?;
        self.meshes.insert(uuid.into(), value);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Decodes each entry independently.
    pub fn edits(&self) -> impl Iterator<Item = (&str, Result<MeshEdit, serde_json::Error>)> {
        self.meshes
            .iter()
            .map(|(uuid, value)| (uuid.as_str(), MeshEdit::from_value(value)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeshEdit {
    Remove,
    Upsert(MeshPayload),
}

impl MeshEdit {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        if value.get("remove").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(Self::Remove);
        }
        MeshPayload::deserialize(value).map(Self::Upsert)
    }
}

/// Geometry payload of a single mesh. Buffers are base64 encoded little
/// endian arrays: `V`/`VC` are f32 triples, `TC` f32 pairs, `F` i32 triples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default = "visible_by_default")]
    pub visibility: bool,
    #[serde(rename = "V", default, skip_serializing_if = "Option::is_none")]
    pub vertices: Option<String>,
    #[serde(rename = "F", default, skip_serializing_if = "Option::is_none")]
    pub faces: Option<String>,
    #[serde(rename = "VC", default, skip_serializing_if = "Option::is_none")]
    pub vertex_colors: Option<String>,
    #[serde(rename = "TC", default, skip_serializing_if = "Option::is_none")]
    pub texcoords: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<TexturePayload>,
}

fn visible_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TexturePayload {
    #[serde(default)]
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(rename = "texData")]
    pub data: String,
}

/// Response of the `meshErrorInfo` task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshErrorInfo {
    pub closed: bool,
    #[serde(rename = "edgeManifold")]
    pub edge_manifold: bool,
    #[serde(rename = "vertexManifold")]
    pub vertex_manifold: bool,
}

impl MeshErrorInfo {
    pub fn is_clean(&self) -> bool {
        self.closed && self.edge_manifold && self.vertex_manifold
    }
}
