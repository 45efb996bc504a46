//! Tunable parameters for the planet generator, persisted as RON.
//!
//! All sections default to the values the simulation was authored against,
//! so a missing or partial config file never blocks startup. Unknown fields
//! are ignored, missing fields fall back to their defaults.

mod config;
mod error;

pub use config::{CacheConfig, DebugConfig, FoliageParams, TerrainParams, WorldConfig};
pub use error::ConfigError;
