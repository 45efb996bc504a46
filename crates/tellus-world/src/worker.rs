//! Background workers, one per octree.
//!
//! Each worker owns its octree outright; the host only ever talks to it
//! through channels. Camera movement arrives as events (coalesced to the
//! latest position when the host outpaces the worker), finished content
//! leaves as [`SceneCommand`]s the host drains once per frame. The terrain
//! worker also owns the grass refresh, since it holds the meshes the scan
//! walks.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use glam::Vec3;
use tellus_cache::ChunkStore;
use tellus_config::{FoliageParams, TerrainParams};
use tellus_field::DensityField;
use tellus_foliage::{
    FoliageChunk, GrassParams, PlacementParams, VariantTable, ZoneVariants, scan_grass,
};
use tellus_octree::{HALF_SQRT3, LodPolicy, Octree};
use tracing::{debug, error};

use crate::commands::SceneCommand;
use crate::foliage::build_foliage_chunk;
use crate::terrain::{TerrainChunk, build_terrain_chunk, max_climate_zone};

/// An event delivered to a worker.
pub enum WorkerEvent {
    /// The camera crossed into a new grid cell.
    CameraMoved(Vec3),
    /// Tear the worker down; its thread exits after the current pass.
    Shutdown,
}

/// Handle to a running worker: event inbox, command outbox, join on drop.
pub struct WorkerHandle {
    events: Sender<WorkerEvent>,
    commands: Receiver<SceneCommand>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Notify the worker of a camera position.
    pub fn notify_camera(&self, position: Vec3) {
        let _ = self.events.send(WorkerEvent::CameraMoved(position));
    }

    /// Drain every command published since the last call. Never blocks.
    pub fn drain_commands(&self) -> Vec<SceneCommand> {
        self.commands.try_iter().collect()
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.events.send(WorkerEvent::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Spawn the terrain worker. `foliage` supplies the grass settings; grass
/// scans over terrain meshes, so it lives on this thread.
pub fn spawn_terrain_worker(
    field: DensityField,
    store: Arc<dyn ChunkStore>,
    terrain: TerrainParams,
    foliage: FoliageParams,
) -> WorkerHandle {
    let (event_tx, event_rx) = unbounded();
    let (command_tx, command_rx) = unbounded();

    let thread = std::thread::Builder::new()
        .name("terrain-worker".into())
        .spawn(move || terrain_worker_loop(event_rx, command_tx, field, store, terrain, foliage))
        .expect("failed to spawn terrain worker thread");

    WorkerHandle {
        events: event_tx,
        commands: command_rx,
        thread: Some(thread),
    }
}

/// Spawn the foliage worker. The variant tables are validated once on the
/// worker thread; malformed zones are reported and skipped.
pub fn spawn_foliage_worker(
    field: DensityField,
    store: Arc<dyn ChunkStore>,
    terrain: TerrainParams,
    foliage: FoliageParams,
    variants: Vec<ZoneVariants>,
) -> WorkerHandle {
    let (event_tx, event_rx) = unbounded();
    let (command_tx, command_rx) = unbounded();

    let thread = std::thread::Builder::new()
        .name("foliage-worker".into())
        .spawn(move || {
            let table = VariantTable::new(variants);
            foliage_worker_loop(event_rx, command_tx, field, store, terrain, foliage, table)
        })
        .expect("failed to spawn foliage worker thread");

    WorkerHandle {
        events: event_tx,
        commands: command_rx,
        thread: Some(thread),
    }
}

/// Pull the next event, then fold any backlog into it so a burst of camera
/// crossings costs one rebuild. Returns `None` on shutdown or disconnect,
/// `Some(None)` on a grass-timer tick.
fn next_event(events: &Receiver<WorkerEvent>, timeout: Duration) -> Option<Option<Vec3>> {
    let mut moved = match events.recv_timeout(timeout) {
        Ok(WorkerEvent::Shutdown) => return None,
        Ok(WorkerEvent::CameraMoved(position)) => Some(position),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => return None,
    };
    for event in events.try_iter() {
        match event {
            WorkerEvent::Shutdown => return None,
            WorkerEvent::CameraMoved(position) => moved = Some(position),
        }
    }
    Some(moved)
}

fn terrain_worker_loop(
    events: Receiver<WorkerEvent>,
    commands: Sender<SceneCommand>,
    field: DensityField,
    store: Arc<dyn ChunkStore>,
    terrain: TerrainParams,
    foliage: FoliageParams,
) {
    let mut tree: Octree<TerrainChunk> = Octree::new(
        terrain.planet_radius,
        terrain.terrain_height,
        terrain.chunk_size as f32,
    );
    let policy = LodPolicy {
        render_distance: terrain.render_distance,
        max_depth: terrain.max_depth,
        leaf_size_floor: i32::MAX,
    };
    let grass_params = GrassParams {
        grass_distance: foliage.grass_distance,
        max_instances: foliage.max_grass_instances,
        ..GrassParams::default()
    };
    let grass_interval = Duration::from_secs_f32(foliage.grass_refresh_secs.max(0.05));
    let resolution = terrain.chunk_size as usize;
    let max_zone = max_climate_zone(field.graph());
    let mut camera = None;

    while let Some(moved) = next_event(&events, grass_interval) {
        match moved {
            Some(position) => {
                camera = Some(position);
                rebuild_terrain(
                    &mut tree, position, &field, &*store, &policy, resolution, max_zone, &commands,
                );
            }
            None => {
                if let Some(position) = camera {
                    refresh_grass(&tree, position, &grass_params, &commands);
                }
            }
        }
    }
    debug!("terrain worker shutting down");
}

#[allow(clippy::too_many_arguments)]
fn rebuild_terrain(
    tree: &mut Octree<TerrainChunk>,
    camera: Vec3,
    field: &DensityField,
    store: &dyn ChunkStore,
    policy: &LodPolicy,
    resolution: usize,
    max_zone: f32,
    commands: &Sender<SceneCommand>,
) {
    let outcome = match tree.rebuild(camera, field, policy) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "terrain rebuild aborted");
            return;
        }
    };

    for (path, _) in outcome.released {
        let _ = commands.send(SceneCommand::DetachTerrain { path });
    }

    for id in outcome.pending {
        let (path, origin, side_length, cell) = {
            let node = tree.node(id);
            (node.path.clone(), node.origin, node.side_length, node.cell)
        };
        match build_terrain_chunk(
            field,
            store,
            &path,
            origin,
            side_length,
            resolution,
            cell,
            max_zone,
        ) {
            Ok(chunk) => {
                if let Some(mesh) = &chunk.mesh {
                    let _ = commands.send(SceneCommand::AttachTerrain {
                        path: path.clone(),
                        origin,
                        mesh: mesh.clone(),
                    });
                }
                tree.attach_chunk(id, chunk);
            }
            Err(e) => {
                // Leave a placeholder so the node is not retried against the
                // same corrupt input every pass.
                error!(path = %path, error = %e, "terrain chunk build failed");
                tree.attach_chunk(id, TerrainChunk { origin, mesh: None });
            }
        }
    }
}

fn refresh_grass(
    tree: &Octree<TerrainChunk>,
    camera: Vec3,
    params: &GrassParams,
    commands: &Sender<SceneCommand>,
) {
    let mut near = Vec::new();
    tree.for_each_leaf(|id, node| {
        let in_range =
            camera.distance(node.center()) <= params.grass_distance + node.side_length * HALF_SQRT3;
        if in_range && node.chunk.is_some() {
            near.push(id);
        }
    });

    let chunks = near.iter().filter_map(|&id| {
        let chunk = tree.node(id).chunk.as_ref()?;
        Some((chunk.origin, chunk.mesh.as_ref()?))
    });
    let instances = scan_grass(chunks, camera, params);
    let _ = commands.send(SceneCommand::SetGrass { instances });
}

fn foliage_worker_loop(
    events: Receiver<WorkerEvent>,
    commands: Sender<SceneCommand>,
    field: DensityField,
    store: Arc<dyn ChunkStore>,
    terrain: TerrainParams,
    foliage: FoliageParams,
    table: VariantTable,
) {
    let mut tree: Octree<FoliageChunk> = Octree::new(
        terrain.planet_radius,
        terrain.terrain_height,
        foliage.chunk_size as f32,
    );
    let policy = LodPolicy {
        render_distance: foliage.render_distance,
        max_depth: i32::MAX,
        leaf_size_floor: foliage.leaf_size_floor,
    };
    let params = PlacementParams {
        spacing: foliage.spacing,
        max_slope_deg: foliage.max_slope_deg,
        min_ocean_height: foliage.min_ocean_height,
    };

    loop {
        let mut moved = match events.recv() {
            Ok(WorkerEvent::CameraMoved(position)) => position,
            Ok(WorkerEvent::Shutdown) | Err(_) => break,
        };
        let mut shutdown = false;
        for event in events.try_iter() {
            match event {
                WorkerEvent::Shutdown => shutdown = true,
                WorkerEvent::CameraMoved(position) => moved = position,
            }
        }
        if shutdown {
            break;
        }
        let camera = moved;

        let outcome = match tree.rebuild(camera, &field, &policy) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "foliage rebuild aborted");
                continue;
            }
        };

        for (path, _) in outcome.released {
            let _ = commands.send(SceneCommand::DetachFoliage { path });
        }

        for id in outcome.pending {
            let (path, origin, side_length, cell) = {
                let node = tree.node(id);
                (node.path.clone(), node.origin, node.side_length, node.cell)
            };
            match build_foliage_chunk(
                &field,
                &*store,
                &path,
                origin,
                side_length,
                cell,
                &params,
                &table,
                terrain.world_seed,
                foliage.max_instances,
            ) {
                Ok(chunk) => {
                    if !chunk.transforms.is_empty() {
                        let _ = commands.send(SceneCommand::AttachFoliage {
                            path: path.clone(),
                            chunk: chunk.clone(),
                        });
                    }
                    tree.attach_chunk(id, chunk);
                }
                Err(e) => {
                    error!(path = %path, error = %e, "foliage chunk build failed");
                    tree.attach_chunk(id, FoliageChunk::default());
                }
            }
        }
    }
    debug!("foliage worker shutting down");
}
