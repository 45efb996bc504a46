//! The foliage chunk build pipeline: cache, place, variant assignment.

use glam::Vec3;
use rand_chacha::ChaCha8Rng;
use tellus_cache::ChunkStore;
use tellus_cells::{CellGraphError, CellId};
use tellus_field::DensityField;
use tellus_foliage::{FoliageChunk, PlacementParams, VariantTable, node_rng, place_foliage};
use tracing::warn;

/// Cache key for a node's foliage payload, distinct from the terrain key
/// sharing the same octree path.
pub fn foliage_cache_key(path: &str) -> String {
    format!("{path}_fol")
}

/// Build one foliage chunk, preferring the cache.
///
/// Cached payloads carry only transforms; variant ids are re-drawn against
/// the current tables, and instances whose climate zone no longer has a
/// usable pool are dropped. A miss or a corrupt payload runs a fresh
/// placement pass (seeded by the world seed and node path, so the result is
/// identical across sessions) and writes it back.
#[allow(clippy::too_many_arguments)]
pub fn build_foliage_chunk(
    field: &DensityField,
    store: &dyn ChunkStore,
    path: &str,
    origin: Vec3,
    side_length: f32,
    cell: CellId,
    params: &PlacementParams,
    table: &VariantTable,
    world_seed: u64,
    max_instances: usize,
) -> Result<FoliageChunk, CellGraphError> {
    let key = foliage_cache_key(path);
    let mut rng = node_rng(world_seed, path);

    if let Some(bytes) = store.load(&key) {
        match FoliageChunk::decode(&bytes) {
            Ok(cached) => return redraw_variants(field, table, cached, cell, &mut rng),
            Err(e) => warn!(path, error = %e, "corrupt cached foliage, replacing"),
        }
    }

    let mut chunk = place_foliage(field, origin, side_length, cell, params, table, &mut rng)?;
    if chunk.transforms.len() > max_instances {
        warn!(
            path,
            placed = chunk.transforms.len(),
            max_instances,
            "foliage placement over budget, truncating"
        );
        chunk.transforms.truncate(max_instances);
        chunk.variants.truncate(max_instances);
    }
    store.store(&key, &chunk.encode());
    Ok(chunk)
}

fn redraw_variants(
    field: &DensityField,
    table: &VariantTable,
    cached: FoliageChunk,
    hint: CellId,
    rng: &mut ChaCha8Rng,
) -> Result<FoliageChunk, CellGraphError> {
    let mut chunk = FoliageChunk::default();
    let mut cell = hint;
    for transform in cached.transforms {
        cell = field.cell_of(transform.position, cell)?;
        let zone = field.graph().climate_zone(cell);
        if let Some(variant) = table.select(zone, rng) {
            chunk.transforms.push(transform);
            chunk.variants.push(variant);
        }
    }
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tellus_cache::MemoryStore;
    use tellus_cells::CellGraph;
    use tellus_field::FieldParams;
    use tellus_foliage::ZoneVariants;

    fn flat_field() -> DensityField {
        let positions = vec![Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
        let neighbours = vec![
            vec![2, 4, 3, 5],
            vec![2, 5, 3, 4],
            vec![0, 5, 1, 4],
            vec![0, 4, 1, 5],
            vec![0, 2, 1, 3],
            vec![0, 3, 1, 2],
        ];
        let graph = CellGraph::new(
            positions,
            neighbours,
            vec![0.2; 6],
            vec![0.0; 6],
            vec![Vec3::ZERO; 6],
            vec![1; 6],
        )
        .unwrap();
        DensityField::new(
            Arc::new(graph),
            FieldParams {
                planet_radius: 12_000.0,
                terrain_height: 1_000.0,
                noise_scale: 0.0,
                seed: 0,
            },
        )
    }

    fn table() -> VariantTable {
        VariantTable::new(vec![ZoneVariants {
            zone: 1,
            meshes: vec![3],
            weights: vec![1.0],
        }])
    }

    #[test]
    fn test_placement_is_cached_under_suffixed_key() {
        let field = flat_field();
        let store = MemoryStore::new();
        let origin = Vec3::new(12_136.0, -64.0, -64.0);

        let chunk = build_foliage_chunk(
            &field,
            &store,
            "40",
            origin,
            128.0,
            0,
            &PlacementParams::default(),
            &table(),
            7,
            10_000,
        )
        .unwrap();

        assert!(!chunk.transforms.is_empty());
        assert!(store.load("40_fol").is_some());
        assert!(store.load("40").is_none(), "terrain key must stay free");
    }

    #[test]
    fn test_cache_hit_restores_transforms_and_redraws_variants() {
        let field = flat_field();
        let store = MemoryStore::new();
        let origin = Vec3::new(12_136.0, -64.0, -64.0);
        let params = PlacementParams::default();

        let fresh = build_foliage_chunk(
            &field, &store, "40", origin, 128.0, 0, &params, &table(), 7, 10_000,
        )
        .unwrap();
        let revived = build_foliage_chunk(
            &field, &store, "40", origin, 128.0, 0, &params, &table(), 7, 10_000,
        )
        .unwrap();

        assert_eq!(revived.transforms, fresh.transforms);
        assert_eq!(revived.transforms.len(), revived.variants.len());
        // A single-entry table can only ever draw variant 3.
        assert!(revived.variants.iter().all(|&v| v == 3));
    }

    #[test]
    fn test_revival_drops_zones_without_pools() {
        let field = flat_field();
        let store = MemoryStore::new();
        let origin = Vec3::new(12_136.0, -64.0, -64.0);
        let params = PlacementParams::default();

        let fresh = build_foliage_chunk(
            &field, &store, "40", origin, 128.0, 0, &params, &table(), 7, 10_000,
        )
        .unwrap();
        assert!(!fresh.transforms.is_empty());

        // Revive against an empty table: every zone lost its pool.
        let empty_table = VariantTable::new(vec![]);
        let revived = build_foliage_chunk(
            &field, &store, "40", origin, 128.0, 0, &params, &empty_table, 7, 10_000,
        )
        .unwrap();
        assert!(revived.transforms.is_empty());
    }

    #[test]
    fn test_budget_truncation() {
        let field = flat_field();
        let store = MemoryStore::new();
        let origin = Vec3::new(12_136.0, -64.0, -64.0);

        let chunk = build_foliage_chunk(
            &field,
            &store,
            "40",
            origin,
            128.0,
            0,
            &PlacementParams::default(),
            &table(),
            7,
            3,
        )
        .unwrap();
        assert_eq!(chunk.transforms.len(), 3);
        assert_eq!(chunk.variants.len(), 3);
    }
}
