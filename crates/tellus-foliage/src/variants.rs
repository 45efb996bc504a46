//! Weighted mesh-variant tables, one per climate zone.

use hashbrown::HashMap;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::error;

/// The mesh pool of one climate zone: parallel mesh-id and weight arrays.
#[derive(Clone, Debug)]
pub struct ZoneVariants {
    /// Climate zone this pool applies to.
    pub zone: i32,
    /// Host-side mesh ids, resolved by the render sink.
    pub meshes: Vec<u32>,
    /// Relative selection weight per mesh; need not be normalized.
    pub weights: Vec<f32>,
}

/// Validated variant tables keyed by climate zone.
///
/// A zone whose mesh and weight arrays disagree in length is a
/// configuration error: it is reported once at setup and the zone is
/// skipped thereafter (nothing placed there), never a crash.
pub struct VariantTable {
    zones: HashMap<i32, (ZoneVariants, f32)>,
}

impl VariantTable {
    /// Validate and index the per-zone pools.
    pub fn new(entries: Vec<ZoneVariants>) -> Self {
        let mut zones = HashMap::new();
        for entry in entries {
            if entry.meshes.len() != entry.weights.len() {
                error!(
                    zone = entry.zone,
                    meshes = entry.meshes.len(),
                    weights = entry.weights.len(),
                    "foliage variant table mismatch, skipping zone"
                );
                continue;
            }
            if entry.meshes.is_empty() {
                continue;
            }
            let total: f32 = entry.weights.iter().sum();
            if total <= 0.0 {
                error!(
                    zone = entry.zone,
                    "foliage variant weights sum to zero, skipping zone"
                );
                continue;
            }
            zones.insert(entry.zone, (entry, total));
        }
        Self { zones }
    }

    /// True when the zone has a usable pool.
    pub fn has_zone(&self, zone: i32) -> bool {
        self.zones.contains_key(&zone)
    }

    /// Draw a mesh id for a zone by cumulative weight: sample uniform in
    /// `[0, total)` and subtract weights until the remainder crosses zero.
    /// `None` for unknown or skipped zones.
    pub fn select(&self, zone: i32, rng: &mut ChaCha8Rng) -> Option<u32> {
        let (entry, total) = self.zones.get(&zone)?;
        let mut w = rng.random_range(0.0..*total);
        for (mesh, weight) in entry.meshes.iter().zip(&entry.weights) {
            w -= weight;
            if w <= 0.0 {
                return Some(*mesh);
            }
        }
        // Floating point can leave a sliver of remainder; the draw belongs
        // to the last entry.
        entry.meshes.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(99)
    }

    #[test]
    fn test_mismatched_zone_is_skipped_not_fatal() {
        let table = VariantTable::new(vec![
            ZoneVariants {
                zone: 0,
                meshes: vec![1, 2],
                weights: vec![1.0], // mismatch
            },
            ZoneVariants {
                zone: 1,
                meshes: vec![3],
                weights: vec![1.0],
            },
        ]);
        assert!(!table.has_zone(0));
        assert!(table.has_zone(1));
        assert_eq!(table.select(0, &mut rng()), None);
        assert_eq!(table.select(1, &mut rng()), Some(3));
    }

    #[test]
    fn test_unknown_zone_selects_nothing() {
        let table = VariantTable::new(vec![]);
        assert_eq!(table.select(42, &mut rng()), None);
    }

    #[test]
    fn test_weighted_draw_matches_weights() {
        let table = VariantTable::new(vec![ZoneVariants {
            zone: 0,
            meshes: vec![10, 20],
            weights: vec![9.0, 1.0],
        }]);
        let mut rng = rng();
        let mut heavy = 0;
        let draws = 2_000;
        for _ in 0..draws {
            if table.select(0, &mut rng) == Some(10) {
                heavy += 1;
            }
        }
        // Expect ~90%; allow a generous band for a seeded run.
        let share = heavy as f32 / draws as f32;
        assert!(
            (0.85..=0.95).contains(&share),
            "heavy variant drawn {share} of the time"
        );
    }

    #[test]
    fn test_zero_weight_pool_is_skipped() {
        let table = VariantTable::new(vec![ZoneVariants {
            zone: 0,
            meshes: vec![1],
            weights: vec![0.0],
        }]);
        assert!(!table.has_zone(0));
    }
}
