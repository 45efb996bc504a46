//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// Top-level world configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// Terrain generation settings.
    pub terrain: TerrainParams,
    /// Foliage and grass settings.
    pub foliage: FoliageParams,
    /// Chunk cache settings.
    pub cache: CacheConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Terrain generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainParams {
    /// Base sphere radius in world units.
    pub planet_radius: f32,
    /// Full-scale relief height above the base sphere.
    pub terrain_height: f32,
    /// Voxels per chunk edge at full resolution.
    pub chunk_size: u32,
    /// Octree subdivision depth cap.
    pub max_depth: i32,
    /// Camera distance within which terrain keeps subdividing.
    pub render_distance: f32,
    /// Amplitude of the high-frequency noise detail, in simulation-height
    /// units.
    pub noise_scale: f32,
    /// Seed shared by the noise field and all per-node foliage generators.
    pub world_seed: u64,
}

/// Foliage and grass parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FoliageParams {
    /// Camera distance within which the foliage octree keeps subdividing.
    pub render_distance: f32,
    /// Voxels per foliage chunk edge; foliage leaves are coarser than
    /// terrain leaves.
    pub chunk_size: u32,
    /// Leaves acquire instances once their size is at or below this floor.
    pub leaf_size_floor: i32,
    /// Planar interval of the placement candidate grid.
    pub spacing: f32,
    /// Maximum surface slope (degrees) an instance tolerates.
    pub max_slope_deg: f32,
    /// Minimum surface height above the base radius; lower is ocean floor.
    pub min_ocean_height: f32,
    /// Per-leaf instance safety cap.
    pub max_instances: usize,
    /// Half-extent of the camera box the grass scan covers.
    pub grass_distance: f32,
    /// Global grass instance budget.
    pub max_grass_instances: usize,
    /// Seconds between grass refreshes.
    pub grass_refresh_secs: f32,
}

/// Chunk cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Persist generated chunks to disk.
    pub enabled: bool,
    /// Directory for cached chunk payloads.
    pub dir: String,
}

/// Debug/development settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            planet_radius: 12_000.0,
            terrain_height: 1_000.0,
            chunk_size: 32,
            max_depth: 4,
            render_distance: 300.0,
            noise_scale: 0.05,
            world_seed: 0,
        }
    }
}

impl Default for FoliageParams {
    fn default() -> Self {
        Self {
            render_distance: 300.0,
            chunk_size: 64,
            leaf_size_floor: 1,
            spacing: 16.0,
            max_slope_deg: 45.0,
            min_ocean_height: 50.0,
            max_instances: 10_000,
            grass_distance: 50.0,
            max_grass_instances: 10_000,
            grass_refresh_secs: 1.0,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "chunk_cache".to_string(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Load / Save / Reload ---

impl WorldConfig {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: WorldConfig = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            info!("loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = WorldConfig::default();
            config.save(config_dir)?;
            info!("created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: WorldConfig = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            info!("config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
