//! Shared vertex arena
//!
//! Polygons never own coordinates; they hold `PointId` handles into a
//! `PointStore`. Patches, walls and streets that touch the same junction
//! hold the same handle, so moving the point through one of them is visible
//! to all — that aliasing is what keeps adjacent parcels edge-matched
//! through smoothing and junction merges. Handles are plain indices:
//! nothing is freed inside a generation attempt, and a retry throws the
//! whole store away.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Handle to a vertex in a [`PointStore`]. Identity (not coordinates) is
/// what adjacency tests, junction merges and gate lookups compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointId(pub u32);

/// Arena of 2D points addressed by [`PointId`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointStore {
    points: Vec<DVec2>,
}

impl PointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, p: DVec2) -> PointId {
        let id = PointId(self.points.len() as u32);
        self.points.push(p);
        id
    }

    pub fn pos(&self, id: PointId) -> DVec2 {
        self.points[id.0 as usize]
    }

    /// Move a point. Every polygon holding this handle observes the change.
    pub fn set(&mut self, id: PointId, p: DVec2) {
        self.points[id.0 as usize] = p;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_read() {
        let mut store = PointStore::new();
        let a = store.alloc(DVec2::new(1.0, 2.0));
        let b = store.alloc(DVec2::new(3.0, 4.0));
        assert_ne!(a, b);
        assert_eq!(store.pos(a), DVec2::new(1.0, 2.0));
        assert_eq!(store.pos(b), DVec2::new(3.0, 4.0));
    }

    #[test]
    fn test_mutation_is_shared_through_copies() {
        let mut store = PointStore::new();
        let a = store.alloc(DVec2::ZERO);
        let alias = a;
        store.set(a, DVec2::new(5.0, 5.0));
        assert_eq!(store.pos(alias), DVec2::new(5.0, 5.0));
    }

    #[test]
    fn test_same_coordinates_distinct_identity() {
        let mut store = PointStore::new();
        let a = store.alloc(DVec2::ONE);
        let b = store.alloc(DVec2::ONE);
        assert_ne!(a, b);
        assert_eq!(store.pos(a), store.pos(b));
    }
}
