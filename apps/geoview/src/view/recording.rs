//! View double that records every call, for asserting call order and
//! resource disposal.

use std::collections::BTreeSet;

use glam::{Vec2, Vec3};

use crate::scene::{MeshFace, MeshGeometry, MeshHandle, SceneView, ViewError};
use crate::sync::{CameraState, CameraUpdate, CursorState, InteractiveControls};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    Build {
        name: String,
        face: MeshFace,
        handle: MeshHandle,
    },
    AddToGroup(MeshHandle),
    RemoveFromGroup(MeshHandle),
    Dispose(MeshHandle),
    FitToFrame,
    ResetCamera {
        refresh: bool,
    },
}

#[derive(Debug, Default)]
pub struct RecordingView {
    calls: Vec<ViewCall>,
    next_handle: u64,
    live: BTreeSet<MeshHandle>,
    fail_face: Option<MeshFace>,
    camera: CameraState,
    cursor: Option<CursorState>,
    stroke_timestamp: i64,
}

impl RecordingView {
    pub fn calls(&self) -> &[ViewCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&ViewCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn position(&self, pred: impl Fn(&ViewCall) -> bool) -> Option<usize> {
        self.calls.iter().position(pred)
    }

    pub fn dispose_count(&self, handle: MeshHandle) -> usize {
        self.count(|c| *c == ViewCall::Dispose(handle))
    }

    /// Built and not yet disposed.
    pub fn live_handles(&self) -> Vec<MeshHandle> {
        self.live.iter().copied().collect()
    }

    /// Make every subsequent build of `face` fail.
    pub fn fail_on(&mut self, face: MeshFace) {
        self.fail_face = Some(face);
    }

    pub fn nudge_zoom(&mut self, delta: f32) {
        self.camera.zoom += delta;
    }

    pub fn orbit(&mut self, offset: Vec3) {
        self.camera.position += offset;
    }

    pub fn set_cursor(&mut self, dir: Vec2, idx: u32) {
        self.cursor = Some(CursorState { dir, idx });
    }

    pub fn set_stroke_timestamp(&mut self, timestamp: i64) {
        self.stroke_timestamp = timestamp;
    }
}

impl SceneView for RecordingView {
    fn build_mesh(
        &mut self,
        name: &str,
        _geometry: &MeshGeometry,
        face: MeshFace,
        _visible: bool,
    ) -> Result<MeshHandle, ViewError> {
        if self.fail_face == Some(face) {
            return Err(ViewError::Rejected {
                name: name.to_string(),
                reason: format!("{face:?} builds disabled"),
            });
        }
        self.next_handle += 1;
        let handle = MeshHandle(self.next_handle);
        self.live.insert(handle);
        self.calls.push(ViewCall::Build {
            name: name.to_string(),
            face,
            handle,
        });
        Ok(handle)
    }

    fn add_to_group(&mut self, handle: MeshHandle) {
        self.calls.push(ViewCall::AddToGroup(handle));
    }

    fn remove_from_group(&mut self, handle: MeshHandle) {
        self.calls.push(ViewCall::RemoveFromGroup(handle));
    }

    fn dispose(&mut self, handle: MeshHandle) {
        self.live.remove(&handle);
        self.calls.push(ViewCall::Dispose(handle));
    }

    fn fit_to_frame(&mut self) {
        self.calls.push(ViewCall::FitToFrame);
    }

    fn reset_camera(&mut self, refresh_bounds: bool) {
        self.calls.push(ViewCall::ResetCamera {
            refresh: refresh_bounds,
        });
    }
}

impl InteractiveControls for RecordingView {
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
