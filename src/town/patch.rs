//! Land parcels cut out of the Voronoi diagram

use serde::{Deserialize, Serialize};

use crate::geom::voronoi::Region;
use crate::geom::Polygon;
use crate::wards::Ward;

/// Stable patch identifier. Patches are dropped and split during wall
/// building, so everything refers to them by id rather than list position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchId(pub u32);

/// One cell of the planar subdivision: a candidate land parcel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    pub id: PatchId,
    pub shape: Polygon,
    pub within_city: bool,
    pub within_walls: bool,
    pub ward: Option<Ward>,
}

impl Patch {
    pub fn new(id: PatchId, shape: Polygon) -> Self {
        Self {
            id,
            shape,
            within_city: false,
            within_walls: false,
            ward: None,
        }
    }

    /// Wraps a Voronoi region's cell polygon. The polygon vertices are the
    /// region's triangle circumcenters, shared by handle with every
    /// neighbouring patch.
    pub fn from_region(id: PatchId, region: &Region) -> Self {
        Self::new(id, region.polygon())
    }
}
