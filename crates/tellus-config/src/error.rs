//! Failures of the `config.ron` round trip.

/// What can go wrong while loading, saving, or hot-reloading the world
/// config. Read and parse failures are distinct so [`load_or_create`]
/// (which tolerates a missing file but not a corrupt one) and [`reload`]
/// (which tolerates neither) can report precisely.
///
/// [`load_or_create`]: crate::WorldConfig::load_or_create
/// [`reload`]: crate::WorldConfig::reload
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `config.ron` exists but could not be read.
    #[error("reading world config: {0}")]
    ReadError(#[source] std::io::Error),

    /// The config directory or `config.ron` could not be written.
    #[error("writing world config: {0}")]
    WriteError(#[source] std::io::Error),

    /// The on-disk RON does not describe a valid world config.
    #[error("parsing world config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// The in-memory config failed to serialize to RON.
    #[error("serializing world config: {0}")]
    SerializeError(#[source] ron::Error),
}
