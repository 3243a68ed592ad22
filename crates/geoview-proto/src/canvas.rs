use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3Wire {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2Wire {
    pub x: f32,
    pub y: f32,
}

/// Camera fields of a `syncParams` message. Only changed fields are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraSync {
    #[serde(rename = "sessionId", alias = "sessionUUID", default)]
    pub session_id: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec3Wire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Vec3Wire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up: Option<Vec3Wire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f32>,
}

impl CameraSync {
    pub fn has_changes(&self) -> bool {
        self.target.is_some() || self.pos.is_some() || self.up.is_some() || self.zoom.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CursorWire {
    #[serde(default)]
    pub dir: Vec2Wire,
    #[serde(default)]
    pub idx: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub remove: bool,
}

/// A `syncCursor` message. Removal may be flagged at the top level or on the
/// nested cursor, both forms are in use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CursorSync {
    #[serde(rename = "UUID", alias = "sessionUUID", alias = "sessionId", default)]
    pub session_id: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub remove: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorWire>,
}

impl CursorSync {
    pub fn is_removal(&self) -> bool {
        self.remove || self.cursor.map(|c| c.remove).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlsWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec3Wire>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3Wire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up: Option<Vec3Wire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f32>,
}

/// Response of `pullCanvasParameters`: the authoritative camera and the
/// cursors of every other session in the room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasParameters {
    #[serde(default)]
    pub controls: ControlsWire,
    #[serde(default)]
    pub camera: CameraWire,
    #[serde(default)]
    pub cursors: BTreeMap<String, CursorWire>,
}
