//! The runtime world: background workers, camera tracking, and the scene
//! command buffer.
//!
//! Terrain and foliage each run their own octree on a dedicated worker
//! thread. The host feeds camera positions once per frame and drains scene
//! commands once per frame; everything in between (LOD decisions, sampling,
//! meshing, placement, caching, the grass refresh) happens off the render
//! thread and is published only when finished.

mod camera;
mod commands;
mod foliage;
mod terrain;
mod worker;

use std::sync::Arc;

pub use camera::CameraTracker;
pub use commands::SceneCommand;
pub use foliage::{build_foliage_chunk, foliage_cache_key};
pub use terrain::{TerrainChunk, build_terrain_chunk, max_climate_zone};
pub use worker::{WorkerEvent, WorkerHandle, spawn_foliage_worker, spawn_terrain_worker};

use glam::Vec3;
use tellus_cache::ChunkStore;
use tellus_cells::CellGraph;
use tellus_config::WorldConfig;
use tellus_field::{DensityField, FieldParams};
use tellus_foliage::ZoneVariants;

/// A running planet: both workers plus the camera trackers gating them.
pub struct PlanetWorld {
    terrain: WorkerHandle,
    foliage: WorkerHandle,
    terrain_tracker: CameraTracker,
    foliage_tracker: CameraTracker,
}

impl PlanetWorld {
    /// Spin up the workers over a simulation cell graph.
    ///
    /// `variants` maps climate zones to weighted foliage mesh pools; the
    /// host resolves the mesh ids it hands out here when foliage commands
    /// come back.
    pub fn new(
        graph: Arc<CellGraph>,
        config: &WorldConfig,
        store: Arc<dyn ChunkStore>,
        variants: Vec<ZoneVariants>,
    ) -> Self {
        let field = DensityField::new(
            graph,
            FieldParams {
                planet_radius: config.terrain.planet_radius,
                terrain_height: config.terrain.terrain_height,
                noise_scale: config.terrain.noise_scale,
                seed: config.terrain.world_seed as u32,
            },
        );

        let terrain = spawn_terrain_worker(
            field.clone(),
            Arc::clone(&store),
            config.terrain.clone(),
            config.foliage.clone(),
        );
        let foliage = spawn_foliage_worker(
            field,
            store,
            config.terrain.clone(),
            config.foliage.clone(),
            variants,
        );

        Self {
            terrain,
            foliage,
            terrain_tracker: CameraTracker::new(config.terrain.chunk_size as f32),
            foliage_tracker: CameraTracker::new(config.foliage.chunk_size as f32),
        }
    }

    /// Feed the camera position, once per frame. Workers are only notified
    /// when the camera crosses into a new chunk-sized grid cell.
    pub fn update_camera(&mut self, position: Vec3) {
        if self.terrain_tracker.update(position) {
            self.terrain.notify_camera(position);
        }
        if self.foliage_tracker.update(position) {
            self.foliage.notify_camera(position);
        }
    }

    /// Drain every scene command published since the last frame.
    pub fn drain_commands(&self) -> Vec<SceneCommand> {
        let mut commands = self.terrain.drain_commands();
        commands.extend(self.foliage.drain_commands());
        commands
    }
}
