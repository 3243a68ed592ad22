use thiserror::Error;

use super::mesh::MeshGeometry;

/// Opaque id of a renderable object owned by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u64);

/// Which side of the surface a built mesh renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFace {
    Front,
    Back,
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("view rejected mesh {name}: {reason}")]
    Rejected { name: String, reason: String },
}

/// Rendering side of the scene. The reconciler drives it, the view owns
/// every handle it returns until `dispose`.
pub trait SceneView: Send {
    fn build_mesh(
        &mut self,
        name: &str,
        geometry: &MeshGeometry,
        face: MeshFace,
        visible: bool,
    ) -> Result<MeshHandle, ViewError>;

    fn add_to_group(&mut self, handle: MeshHandle);

    fn remove_from_group(&mut self, handle: MeshHandle);

    fn dispose(&mut self, handle: MeshHandle);

    /// Frames every visible mesh.
    fn fit_to_frame(&mut self);

    /// Re-centres the camera on the scene, recomputing the unified bounding
    /// volume only when `refresh_bounds` is set.
    fn reset_camera(&mut self, refresh_bounds: bool);
}
