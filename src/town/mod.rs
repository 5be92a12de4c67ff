//! Town assembly: patches, walls, street topology and the build pipeline

pub mod model;
pub mod patch;
pub mod topology;
pub mod wall;

pub use model::Model;
pub use patch::{Patch, PatchId};
pub use topology::{Graph, Topology};
pub use wall::CurtainWall;
