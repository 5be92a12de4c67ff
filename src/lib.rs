//! Townwright - procedural walled-town plan generator
//!
//! Given a seed and a parcel count, [`Model::generate`] lays out a walled
//! town: a Voronoi subdivision of land parcels, a curtain wall with gates
//! and towers, a street network routed from the gates to the center, and a
//! functional ward with building footprints on every parcel. The finished
//! [`Model`] is read-only geometry for a renderer or exporter; this crate
//! does no I/O of its own.

pub mod core;
pub mod geom;
pub mod town;
pub mod wards;

pub use crate::core::error::{GenerationError, Result};
pub use geom::{PointId, PointStore, Polygon, Voronoi};
pub use town::{CurtainWall, Model, Patch, PatchId, Topology};
pub use wards::{Ward, WardKind};
