//! Geometry kernel: shared-vertex arena, polygon algebra, carving, Voronoi

pub mod cutter;
pub mod point;
pub mod polygon;
pub mod voronoi;

pub use point::{PointId, PointStore};
pub use polygon::Polygon;
pub use voronoi::{Region, Triangle, Voronoi};
