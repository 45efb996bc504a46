//! The sampled chunk grid and its binary encoding.

/// Flat index of a grid point in a cube of `points` samples per edge.
#[inline]
pub fn grid_index(x: usize, y: usize, z: usize, points: usize) -> usize {
    x + y * points + z * points * points
}

/// Errors raised while decoding a cached chunk payload.
#[derive(Debug, thiserror::Error)]
pub enum ChunkDecodeError {
    /// The payload is empty; even the flag byte is missing.
    #[error("chunk payload is empty")]
    MissingFlag,

    /// The payload length does not match the expected grid size.
    #[error("chunk payload truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected byte count for this grid resolution.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
}

/// One sampled terrain chunk: the signed density grid and the climate-zone
/// grid used for material tagging.
///
/// `empty` is true when every density sample shares one sign (the surface
/// does not cross the chunk). Empty chunks decoded from the cache carry no
/// grid data; meshing skips them before ever touching `densities`.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelChunk {
    /// Samples per edge, `n + 1` for base resolution `n`.
    pub points: usize,
    /// True when no surface crossing exists in this chunk.
    pub empty: bool,
    /// `points^3` signed densities; empty when `empty` and loaded from cache.
    pub densities: Vec<f32>,
    /// Climate-zone id per grid point; not persisted, re-derived on cache
    /// hits.
    pub zones: Vec<i32>,
}

impl VoxelChunk {
    /// Canonical cache payload: `[u8 empty][f32 LE × points^3]`, with the
    /// densities omitted entirely for empty chunks.
    pub fn encode(&self) -> Vec<u8> {
        if self.empty {
            return vec![1];
        }
        let mut buf = Vec::with_capacity(1 + self.densities.len() * 4);
        buf.push(0);
        for d in &self.densities {
            buf.extend_from_slice(&d.to_le_bytes());
        }
        buf
    }

    /// Decode a cache payload for a chunk of `points` samples per edge.
    ///
    /// The zone grid is not part of the payload; callers re-derive it with
    /// [`crate::sample_zones`] before meshing.
    pub fn decode(bytes: &[u8], points: usize) -> Result<Self, ChunkDecodeError> {
        let Some((&flag, rest)) = bytes.split_first() else {
            return Err(ChunkDecodeError::MissingFlag);
        };

        if flag == 1 {
            return Ok(Self {
                points,
                empty: true,
                densities: Vec::new(),
                zones: Vec::new(),
            });
        }

        let count = points * points * points;
        if rest.len() != count * 4 {
            return Err(ChunkDecodeError::Truncated {
                expected: 1 + count * 4,
                actual: bytes.len(),
            });
        }

        let densities = rest
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self {
            points,
            empty: false,
            densities,
            zones: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid(points: usize) -> VoxelChunk {
        let count = points * points * points;
        VoxelChunk {
            points,
            empty: false,
            densities: (0..count).map(|i| i as f32 * 0.25 - 3.0).collect(),
            zones: vec![0; count],
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let chunk = sample_grid(5);
        let bytes = chunk.encode();
        assert_eq!(bytes.len(), 1 + 125 * 4);

        let decoded = VoxelChunk::decode(&bytes, 5).unwrap();
        assert!(!decoded.empty);
        assert_eq!(decoded.densities, chunk.densities);

        // Byte-identical re-encode (zones are not part of the payload).
        let reencoded = VoxelChunk {
            zones: chunk.zones.clone(),
            ..decoded
        }
        .encode();
        assert_eq!(reencoded, bytes);
    }

    #[test]
    fn test_empty_chunk_persists_only_the_flag() {
        let chunk = VoxelChunk {
            points: 33,
            empty: true,
            densities: vec![1.0; 33 * 33 * 33],
            zones: vec![0; 33 * 33 * 33],
        };
        let bytes = chunk.encode();
        assert_eq!(bytes, vec![1]);

        let decoded = VoxelChunk::decode(&bytes, 33).unwrap();
        assert!(decoded.empty);
        assert!(decoded.densities.is_empty());
    }

    #[test]
    fn test_decode_rejects_empty_payload() {
        assert!(matches!(
            VoxelChunk::decode(&[], 5),
            Err(ChunkDecodeError::MissingFlag)
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let chunk = sample_grid(4);
        let mut bytes = chunk.encode();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            VoxelChunk::decode(&bytes, 4),
            Err(ChunkDecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_grid_index_layout() {
        // x fastest, then y, then z, matching the sampler's write order.
        assert_eq!(grid_index(0, 0, 0, 4), 0);
        assert_eq!(grid_index(1, 0, 0, 4), 1);
        assert_eq!(grid_index(0, 1, 0, 4), 4);
        assert_eq!(grid_index(0, 0, 1, 4), 16);
        assert_eq!(grid_index(3, 3, 3, 4), 63);
    }
}
