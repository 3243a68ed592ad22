use std::collections::HashMap;

use chrono::Utc;
use glam::{Vec2, Vec3};

use crate::scene::mesh::bounding_sphere;
use crate::scene::{MeshFace, MeshGeometry, MeshHandle, SceneView, ViewError};
use crate::sync::{CameraState, CameraUpdate, CursorState, InteractiveControls};

// Near/far planes sit this many bounding radii around the scene centre
const CLIP_NEAR: f32 = -1.01;
const CLIP_FAR: f32 = 1.01;

struct HeadlessMesh {
    face: MeshFace,
    visible: bool,
    in_group: bool,
    positions: Vec<Vec3>,
}

/// View without a renderer. Keeps the mesh group and an orthographic camera
/// so the client can run in a terminal or a test.
pub struct HeadlessView {
    width: f32,
    height: f32,
    meshes: HashMap<MeshHandle, HeadlessMesh>,
    next_handle: u64,
    camera: CameraState,
    pan_speed: f32,
    unified_bounds: Option<(Vec3, f32)>,
    cursor: Option<CursorState>,
    stroke_timestamp: i64,
}

impl HeadlessView {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1) as f32,
            height: height.max(1) as f32,
            meshes: HashMap::new(),
            next_handle: 0,
            camera: CameraState::default(),
            pan_speed: 1.0,
            unified_bounds: None,
            cursor: None,
            stroke_timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn group_len(&self) -> usize {
        self.meshes.values().filter(|m| m.in_group).count()
    }

    pub fn pan_speed(&self) -> f32 {
        self.pan_speed
    }

    /// Pointer position in window pixels.
    pub fn pointer_moved(&mut self, x: f32, y: f32, icon: u32) {
        let dir = Vec2::new(x - self.width / 2.0, y - self.height / 2.0);
        self.cursor = Some(CursorState { dir, idx: icon });
    }

    pub fn stroke(&mut self) {
        self.stroke_timestamp = Utc::now().timestamp_millis();
    }

    fn group_points(&self, visible_only: bool) -> Vec<Vec3> {
        self.meshes
            .values()
            .filter(|m| m.in_group && m.face == MeshFace::Front && (!visible_only || m.visible))
            .flat_map(|m| m.positions.iter().copied())
            .collect()
    }
}

impl SceneView for HeadlessView {
    fn build_mesh(
        &mut self,
        name: &str,
        geometry: &MeshGeometry,
        face: MeshFace,
        visible: bool,
    ) -> Result<MeshHandle, ViewError> {
        if geometry.positions.iter().any(|p| !p.is_finite()) {
            return Err(ViewError::Rejected {
                name: name.to_string(),
                reason: "non-finite vertex position".to_string(),
            });
        }
        self.next_handle += 1;
        let handle = MeshHandle(self.next_handle);
        self.meshes.insert(
            handle,
            HeadlessMesh {
                face,
                visible,
                in_group: false,
                positions: geometry.positions.clone(),
            },
        );
        Ok(handle)
    }

    fn add_to_group(&mut self, handle: MeshHandle) {
        if let Some(mesh) = self.meshes.get_mut(&handle) {
            mesh.in_group = true;
        }
    }

    fn remove_from_group(&mut self, handle: MeshHandle) {
        if let Some(mesh) = self.meshes.get_mut(&handle) {
            mesh.in_group = false;
        }
    }

    fn dispose(&mut self, handle: MeshHandle) {
        self.meshes.remove(&handle);
    }

    fn fit_to_frame(&mut self) {
        let points = self.group_points(true);
        let Some((center, radius)) = bounding_sphere(points.iter().copied()) else {
            return;
        };
        let shift = center - self.camera.target;
        self.camera.position += shift;
        self.camera.target += shift;

        let distance = (self.camera.position - self.camera.target).length();
        if distance > 0.0 {
            self.pan_speed = 100.0 / distance;
        }
        if radius > 0.0 {
            self.camera.zoom = self.width.min(self.height) * 0.5 / radius;
        }
        self.camera.far = distance * 2.0;
        self.stroke();
    }

    fn reset_camera(&mut self, refresh_bounds: bool) {
        if self.group_len() == 0 {
            return;
        }
        if refresh_bounds || self.unified_bounds.is_none() {
            let points = self.group_points(false);
            self.unified_bounds = bounding_sphere(points.iter().copied());
        }
        let Some((center, radius)) = self.unified_bounds else {
            return;
        };

        let to_camera = (self.camera.position - self.camera.target).normalize_or_zero();
        let shift = ((center - self.camera.target).length() + radius) * 1.01;
        self.camera.position = self.camera.target + to_camera * shift;
        if shift > 0.0 {
            self.pan_speed = 100.0 / shift;
        }

        let view_dir = (self.camera.target - self.camera.position).normalize_or_zero();
        let depth = (center - self.camera.position).dot(view_dir);
        self.camera.near = depth + radius * CLIP_NEAR;
        self.camera.far = depth + radius * CLIP_FAR;
        self.stroke();
    }
}

impl InteractiveControls for HeadlessView {
    fn update(&mut self) {}

    fn camera(&self) -> CameraState {
        self.camera
    }

    fn apply_camera(&mut self, update: &CameraUpdate) {
        update.apply_to(&mut self.camera);
    }

    fn cursor(&self) -> Option<CursorState> {
        self.cursor
    }

    fn stroke_timestamp(&self) -> i64 {
        self.stroke_timestamp
    }
}
