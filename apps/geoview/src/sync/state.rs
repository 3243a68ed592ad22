use geoview_proto::{CameraSync, CanvasParameters, CursorWire, Vec2Wire, Vec3Wire};
use glam::{Vec2, Vec3};

/// Camera and orbit controls as the user currently sees them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub target: Vec3,
    pub position: Vec3,
    pub up: Vec3,
    pub zoom: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            position: Vec3::new(0.0, 0.0, 10.0),
            up: Vec3::Y,
            zoom: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorState {
    /// Offset from the viewport centre in pixels.
    pub dir: Vec2,
    /// Icon the session picked.
    pub idx: u32,
}

impl From<CursorWire> for CursorState {
    fn from(wire: CursorWire) -> Self {
        Self {
            dir: vec2(wire.dir),
            idx: wire.idx,
        }
    }
}

impl From<CursorState> for CursorWire {
    fn from(state: CursorState) -> Self {
        Self {
            dir: Vec2Wire {
                x: state.dir.x,
                y: state.dir.y,
            },
            idx: state.idx,
            remove: false,
        }
    }
}

/// Partial camera assignment; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraUpdate {
    pub target: Option<Vec3>,
    pub position: Option<Vec3>,
    pub up: Option<Vec3>,
    pub zoom: Option<f32>,
}

impl CameraUpdate {
    pub fn is_empty(&self) -> bool {
        self.target.is_none() && self.position.is_none() && self.up.is_none() && self.zoom.is_none()
    }

    pub fn apply_to(&self, camera: &mut CameraState) {
        if let Some(target) = self.target {
            camera.target = target;
        }
        if let Some(position) = self.position {
            camera.position = position;
        }
        if let Some(up) = self.up {
            camera.up = up;
        }
        if let Some(zoom) = self.zoom {
            camera.zoom = zoom;
        }
    }
}

impl From<&CanvasParameters> for CameraUpdate {
    fn from(params: &CanvasParameters) -> Self {
        Self {
            target: params.controls.target.map(vec3),
            position: params.camera.position.map(vec3),
            up: params.camera.up.map(vec3),
            zoom: params.camera.zoom,
        }
    }
}

impl From<&CameraSync> for CameraUpdate {
    fn from(sync: &CameraSync) -> Self {
        Self {
            target: sync.target.map(vec3),
            position: sync.pos.map(vec3),
            up: sync.up.map(vec3),
            zoom: sync.zoom,
        }
    }
}

pub fn vec3(wire: Vec3Wire) -> Vec3 {
    Vec3::new(wire.x, wire.y, wire.z)
}

pub fn vec3_wire(v: Vec3) -> Vec3Wire {
    Vec3Wire {
        x: v.x,
        y: v.y,
        z: v.z,
    }
}

pub fn vec2(wire: Vec2Wire) -> Vec2 {
    Vec2::new(wire.x, wire.y)
}

/// Interactive side of the view: orbit controls plus the local pointer.
pub trait InteractiveControls: Send {
    /// Advance the controls from raw input.
    fn update(&mut self);

    fn camera(&self) -> CameraState;

    fn apply_camera(&mut self, update: &CameraUpdate);

    /// Local pointer, `None` until the pointer has entered the viewport.
    fn cursor(&self) -> Option<CursorState>;

    /// Wall clock millis of the last user stroke.
    fn stroke_timestamp(&self) -> i64;
}
