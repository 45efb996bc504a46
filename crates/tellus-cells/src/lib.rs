//! The coarse spherical cell partition and the pure queries over it.
//!
//! A planet's simulation output arrives as a set of irregular cells on the
//! unit sphere, each carrying height, climate and weather samples. This crate
//! owns that immutable dataset ([`CellGraph`]) and the two queries everything
//! else is built on: nearest-cell lookup by greedy hill-climb, and continuous
//! scalar interpolation via spherical barycentric weights.

mod graph;
mod interp;
mod locator;

pub use graph::{CellGraph, CellGraphError, CellId};
pub use interp::spherical_area;
