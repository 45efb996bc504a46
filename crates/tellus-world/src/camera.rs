//! Camera movement quantized to a chunk-sized grid.

use glam::{IVec3, Vec3};

/// Detects when the camera crosses into a new grid cell.
///
/// Rebuilding the octree on every camera twitch would thrash the workers;
/// a rebuild only becomes worthwhile once the camera has moved on the order
/// of a chunk edge, so positions are quantized to a grid of that pitch and
/// only cell crossings count as movement.
pub struct CameraTracker {
    cell_size: f32,
    last_cell: Option<IVec3>,
}

impl CameraTracker {
    /// Track movement on a grid of `cell_size` pitch.
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            last_cell: None,
        }
    }

    /// Feed a camera position; true when it landed in a new grid cell.
    /// The first position always counts as a crossing.
    pub fn update(&mut self, position: Vec3) -> bool {
        let cell = (position / self.cell_size).floor().as_ivec3();
        if self.last_cell == Some(cell) {
            return false;
        }
        self.last_cell = Some(cell);
        true
    }
}
