//! Wire definitions for the geoview room protocol.
//! Kept free of any runtime so a server implementation can depend on the
//! exact same envelope and payload shapes the client speaks.

pub mod canvas;
pub mod envelope;
pub mod mesh;
pub mod plugin;

pub use canvas::{
    CameraSync, CameraWire, CanvasParameters, ControlsWire, CursorSync, CursorWire, Vec2Wire,
    Vec3Wire,
};
pub use envelope::{flat_message, Envelope, ProtocolError, ServerBusy, SessionAssignment};
pub use mesh::{MeshDelta, MeshEdit, MeshErrorInfo, MeshPayload, TexturePayload};
pub use plugin::{PluginDescriptor, PluginSelection, LATEST_VERSION};

/// Task names shared by client and server.
pub mod tasks {
    pub const INITIALIZE_SESSION: &str = "initializeSession";
    pub const IS_SERVER_BUSY: &str = "isServerBusy";
    pub const FORCE_RELOAD: &str = "forceReload";
    pub const SYNC_MESHES: &str = "syncMeshes";
    pub const SYNC_PARAMS: &str = "syncParams";
    pub const SYNC_CURSOR: &str = "syncCursor";
    pub const LOAD_POLYGON_MESH: &str = "loadPolygonMesh";
    pub const UNDO: &str = "undo";
    pub const REDO: &str = "redo";
    pub const TOGGLE_MESH_VISIBILITY: &str = "toggleMeshVisibility";
    pub const MESH_ERROR_INFO: &str = "meshErrorInfo";
    pub const LIST_PLUGINS: &str = "listPlugins";
    pub const UPDATE_PLUGINS: &str = "updatePlugins";
    pub const PULL_CANVAS_PARAMETERS: &str = "pullCanvasParameters";
    pub const PULL_CURRENT_MESHES: &str = "pullCurrentMeshes";
}
