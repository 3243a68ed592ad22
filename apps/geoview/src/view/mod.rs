//! Views the client can drive.

pub mod headless;
pub mod recording;

pub use headless::HeadlessView;

use crate::scene::SceneView;
use crate::sync::InteractiveControls;

/// A view usable by both the reconciler and the sync loop.
pub trait ViewHost: SceneView + InteractiveControls {}

impl<T: SceneView + InteractiveControls> ViewHost for T {}
