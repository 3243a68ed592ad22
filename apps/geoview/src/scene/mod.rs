//! Local scene state: decoded meshes, the view they are rendered by and the
//! reconciler keeping both in step with server deltas.

pub mod mesh;
pub mod reconciler;
pub mod view;

pub use mesh::{MeshDecodeError, MeshGeometry, Texture};
pub use reconciler::{MeshResource, ReconcileError, ReconcileReport, SceneReconciler};
pub use view::{MeshFace, MeshHandle, SceneView, ViewError};
