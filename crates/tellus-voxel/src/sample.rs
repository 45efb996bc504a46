//! Parallel density sampling onto a padded chunk grid.

use std::sync::atomic::{AtomicU8, Ordering};

use glam::Vec3;
use tellus_cells::{CellGraphError, CellId};
use tellus_field::DensityField;
use tracing::debug;

use crate::grid::{VoxelChunk, grid_index};

const HAS_SOLID: u8 = 0b01;
const HAS_AIR: u8 = 0b10;

/// Sample the density field onto a `(resolution + 1)^3` grid.
///
/// `origin` is the chunk's minimum corner; grid point `(x, y, z)` samples at
/// `origin + (x, y, z) * voxel_edge`, where `voxel_edge` is `2^k` for LOD
/// level `k`. The extra sample per axis is the seam shared with the
/// neighbouring chunk.
///
/// Z-slabs of the grid are sampled on separate worker threads, each owning a
/// disjoint slice of the output; emptiness flags are merged through an
/// atomic bitwise-or. A locator failure in any slab aborts the whole chunk
/// (corrupted simulation input is never papered over with zero fill).
pub fn sample_chunk(
    field: &DensityField,
    origin: Vec3,
    resolution: usize,
    voxel_edge: f32,
    hint: CellId,
) -> Result<VoxelChunk, CellGraphError> {
    let points = resolution + 1;
    let mut densities = vec![0.0_f32; points * points * points];
    let mut zones = vec![0_i32; points * points * points];

    let occupancy = AtomicU8::new(0);
    let slab_len = points * points;

    // One z-slab per task, grouped so we never spawn more threads than
    // cores. Each slab walks its own locator hint chain from the node's
    // cached cell.
    let workers = num_cpus::get().clamp(1, points);
    let slabs_per_worker = points.div_ceil(workers);

    std::thread::scope(|scope| -> Result<(), CellGraphError> {
        let mut handles = Vec::with_capacity(workers);

        let density_groups = densities.chunks_mut(slab_len * slabs_per_worker);
        let zone_groups = zones.chunks_mut(slab_len * slabs_per_worker);

        for (group, (dens, zone)) in density_groups.zip(zone_groups).enumerate() {
            let occupancy = &occupancy;
            let z_base = group * slabs_per_worker;
            handles.push(scope.spawn(move || -> Result<(), CellGraphError> {
                let mut flags = 0_u8;
                let mut cell = hint;
                for (slab, (dens, zone)) in dens
                    .chunks_mut(slab_len)
                    .zip(zone.chunks_mut(slab_len))
                    .enumerate()
                {
                    let z = z_base + slab;
                    for y in 0..points {
                        for x in 0..points {
                            let world = origin
                                + Vec3::new(x as f32, y as f32, z as f32) * voxel_edge;
                            let sample = field.sample(world, cell)?;
                            cell = sample.cell;

                            let idx = grid_index(x, y, 0, points);
                            dens[idx] = sample.density;
                            zone[idx] = field.graph().climate_zone(sample.cell);

                            if sample.density > 0.0 {
                                flags |= HAS_SOLID;
                            } else if sample.density < 0.0 {
                                flags |= HAS_AIR;
                            }
                        }
                    }
                }
                occupancy.fetch_or(flags, Ordering::Relaxed);
                Ok(())
            }));
        }

        for handle in handles {
            handle.join().expect("sampling worker panicked")?;
        }
        Ok(())
    })?;

    let flags = occupancy.load(Ordering::Relaxed);
    let empty = flags != (HAS_SOLID | HAS_AIR);
    if empty {
        debug!(?origin, resolution, "chunk has no surface crossing");
    }

    Ok(VoxelChunk {
        points,
        empty,
        densities,
        zones,
    })
}

/// Re-derive only the climate-zone grid, for chunks whose densities came
/// from the cache. Single-threaded; the locator hint chain makes this walk
/// cheap.
pub fn sample_zones(
    field: &DensityField,
    origin: Vec3,
    resolution: usize,
    voxel_edge: f32,
    hint: CellId,
) -> Result<Vec<i32>, CellGraphError> {
    let points = resolution + 1;
    let mut zones = vec![0_i32; points * points * points];
    let mut cell = hint;
    for z in 0..points {
        for y in 0..points {
            for x in 0..points {
                let world = origin + Vec3::new(x as f32, y as f32, z as f32) * voxel_edge;
                cell = field.cell_of(world, cell)?;
                zones[grid_index(x, y, z, points)] = field.graph().climate_zone(cell);
            }
        }
    }
    Ok(zones)
}
