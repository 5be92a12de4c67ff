//! Curtain walls: circumference, gates, towers and gate road stubs

use glam::DVec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{GenerationError, Result};
use crate::geom::{PointId, Polygon};
use crate::town::model::Model;
use crate::town::patch::{Patch, PatchId};

/// Wall around a set of patches. A "real" wall is physically built
/// (smoothed, towered, with road stubs carved at its gates); a notional
/// one only marks the city limit and its entrances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurtainWall {
    pub shape: Polygon,
    /// One flag per circumference edge: true for wall, false for the
    /// breaks flanking a gate.
    pub segments: Vec<bool>,
    pub gates: Vec<PointId>,
    pub towers: Vec<PointId>,
    real: bool,
    enclosed: Vec<PatchId>,
}

impl CurtainWall {
    pub fn build(
        real: bool,
        model: &mut Model,
        enclosed: Vec<PatchId>,
        reserved: &[PointId],
        rng: &mut ChaCha8Rng,
    ) -> Result<Self> {
        let shape = if enclosed.len() == 1 {
            model
                .find_patch(enclosed[0])
                .map(|p| p.shape.clone())
                .ok_or(GenerationError::BadWallShape)?
        } else {
            find_circumference(model, &enclosed)?
        };

        let mut wall = Self {
            segments: vec![true; shape.len()],
            shape,
            gates: Vec::new(),
            towers: Vec::new(),
            real,
            enclosed,
        };

        if real && wall.enclosed.len() > 1 {
            // Gentler smoothing for larger circumferences.
            let factor = (40.0 / wall.enclosed.len() as f64).min(1.0);
            let smoothed = wall.shape.smoothed_with(&model.store, factor);
            for (i, &v) in wall.shape.verts().iter().enumerate() {
                if !reserved.contains(&v) {
                    model.store.set(v, smoothed[i]);
                }
            }
        }

        wall.build_gates(model, reserved, rng)?;
        Ok(wall)
    }

    /// Picks gates among entrance candidates, keeping a minimum separation
    /// by discarding each pick's immediate neighbours from the pool.
    fn build_gates(
        &mut self,
        model: &mut Model,
        reserved: &[PointId],
        rng: &mut ChaCha8Rng,
    ) -> Result<()> {
        // An entrance must touch more than one enclosed patch so a street
        // can continue inward; a one-patch wall accepts any vertex.
        let mut entrances: Vec<PointId> = if self.enclosed.len() > 1 {
            self.shape
                .verts()
                .iter()
                .copied()
                .filter(|&v| {
                    !reserved.contains(&v)
                        && self
                            .enclosed
                            .iter()
                            .filter(|&&pid| {
                                model.find_patch(pid).map_or(false, |p| p.shape.contains(v))
                            })
                            .count()
                            > 1
                })
                .collect()
        } else {
            self.shape
                .verts()
                .iter()
                .copied()
                .filter(|v| !reserved.contains(v))
                .collect()
        };

        if entrances.is_empty() {
            return Err(GenerationError::BadWallShape);
        }

        loop {
            let index = rng.gen_range(0..entrances.len());
            let gate = entrances[index];
            self.gates.push(gate);

            if self.real {
                self.carve_road_stub(model, gate, reserved);
            }

            // Drop the pick and both neighbours, wrapping around the pool.
            if index == 0 {
                entrances.drain(0..2.min(entrances.len()));
                entrances.pop();
            } else if index == entrances.len() - 1 {
                entrances.pop();
                entrances.pop();
                if !entrances.is_empty() {
                    entrances.remove(0);
                }
            } else {
                entrances.drain(index - 1..=index + 1);
            }

            if entrances.len() < 3 {
                break;
            }
        }

        if self.gates.is_empty() {
            return Err(GenerationError::BadWallShape);
        }

        // Mark the gate breaks and relax each gate vertex a little.
        let n = self.shape.len();
        for &gate in &self.gates {
            if let Some(i) = self.shape.index_of(gate) {
                self.segments[(i + n - 1) % n] = false;
                self.segments[i] = false;
            }
            if self.real {
                let smoothed = self.shape.smooth_vertex(&model.store, gate, 2.0 / 3.0);
                model.store.set(gate, smoothed);
            }
        }
        debug!(gates = self.gates.len(), real = self.real, "gates placed");
        Ok(())
    }

    /// If a gate touches exactly one patch outside the wall, split that
    /// patch along the chord best aligned with the outward wall normal so
    /// a road can leave the gate. A failed split just skips the stub.
    fn carve_road_stub(&self, model: &mut Model, gate: PointId, reserved: &[PointId]) {
        let outer: Vec<PatchId> = model
            .patch_by_vertex(gate)
            .into_iter()
            .filter(|pid| !self.enclosed.contains(pid))
            .collect();
        if outer.len() != 1 {
            return;
        }
        let Some(outer_patch) = model.find_patch(outer[0]) else {
            return;
        };
        if outer_patch.shape.len() <= 3 {
            return;
        }
        let (Some(next), Some(prev)) = (self.shape.next(gate), self.shape.prev(gate)) else {
            return;
        };
        let wall_dir = model.store.pos(next) - model.store.pos(prev);
        let out_dir = DVec2::new(wall_dir.y, -wall_dir.x);
        let gate_pos = model.store.pos(gate);

        let shape = outer_patch.shape.clone();
        let Some(farthest) = shape.max_vertex_by(&model.store, |v, pos| {
            if self.shape.contains(v) || reserved.contains(&v) {
                f64::NEG_INFINITY
            } else {
                let dir = pos - gate_pos;
                let len = dir.length();
                if len < 1e-9 {
                    f64::NEG_INFINITY
                } else {
                    dir.dot(out_dir) / len
                }
            }
        }) else {
            return;
        };

        let Some(halves) = shape.split(gate, farthest) else {
            return;
        };
        if halves.iter().any(|h| h.len() < 3) {
            return;
        }
        model.replace_patch(outer[0], halves.to_vec());
    }

    /// Towers stand on every non-gate vertex still flanked by a wall
    /// segment. Only real walls get towers.
    pub fn build_towers(&mut self) {
        self.towers.clear();
        if !self.real {
            return;
        }
        let n = self.shape.len();
        for (i, &v) in self.shape.verts().iter().enumerate() {
            if !self.gates.contains(&v) && (self.segments[(i + n - 1) % n] || self.segments[i]) {
                self.towers.push(v);
            }
        }
    }

    /// Largest vertex distance from the town origin.
    pub fn radius(&self, store: &crate::geom::PointStore) -> f64 {
        self.shape
            .positions(store)
            .map(|p| p.length())
            .fold(0.0, f64::max)
    }

    pub fn is_real(&self) -> bool {
        self.real
    }

    /// Does this wall run along the edge `v0 -> v1` of the given patch?
    pub fn borders_by(&self, patch_id: PatchId, v0: PointId, v1: PointId) -> bool {
        let inside = self.enclosed.contains(&patch_id);
        let index = if inside {
            self.shape.find_edge(v0, v1)
        } else {
            self.shape.find_edge(v1, v0)
        };
        index.map_or(false, |i| self.segments[i])
    }

    /// Does this wall touch the given patch along any wall segment?
    pub fn borders(&self, patch_id: PatchId, patch_shape: &Polygon) -> bool {
        let inside = self.enclosed.contains(&patch_id);
        let n = self.shape.len();
        (0..n).any(|i| {
            if !self.segments[i] {
                return false;
            }
            let v0 = self.shape.verts()[i];
            let v1 = self.shape.verts()[(i + 1) % n];
            if inside {
                patch_shape.find_edge(v0, v1).is_some()
            } else {
                patch_shape.find_edge(v1, v0).is_some()
            }
        })
    }
}

/// Outer boundary of a patch set: every edge not shared (in reverse) by
/// another patch in the set, chained into one closed loop. Failure to
/// close the loop means the enclosed area is not simply connected.
pub fn find_circumference(model: &Model, patch_ids: &[PatchId]) -> Result<Polygon> {
    if patch_ids.is_empty() {
        return Err(GenerationError::BadWallShape);
    }
    if patch_ids.len() == 1 {
        return model
            .find_patch(patch_ids[0])
            .map(|p| p.shape.clone())
            .ok_or(GenerationError::BadWallShape);
    }

    let patches: Vec<&Patch> = patch_ids
        .iter()
        .filter_map(|&pid| model.find_patch(pid))
        .collect();

    let mut starts: Vec<PointId> = Vec::new();
    let mut ends: Vec<PointId> = Vec::new();
    for p in &patches {
        for (a, b) in p.shape.edges() {
            let shared = patches.iter().any(|q| q.shape.find_edge(b, a).is_some());
            if !shared {
                starts.push(a);
                ends.push(b);
            }
        }
    }
    if starts.is_empty() {
        return Err(GenerationError::BadWallShape);
    }

    let mut result = Vec::new();
    let mut index = 0;
    loop {
        result.push(starts[index]);
        let Some(next) = starts.iter().position(|&v| v == ends[index]) else {
            return Err(GenerationError::BadWallShape);
        };
        index = next;
        if index == 0 {
            break;
        }
        if result.len() > starts.len() {
            return Err(GenerationError::BadWallShape);
        }
    }
    Ok(Polygon::new(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::PointStore;
    use crate::town::model::Model;
    use rand::SeedableRng;

    fn two_square_model() -> (Model, PatchId, PatchId) {
        let mut model = Model::empty(2, false, false, true);
        let a = model.store.alloc(DVec2::new(0.0, 0.0));
        let b = model.store.alloc(DVec2::new(10.0, 0.0));
        let c = model.store.alloc(DVec2::new(10.0, 10.0));
        let d = model.store.alloc(DVec2::new(0.0, 10.0));
        let e = model.store.alloc(DVec2::new(20.0, 0.0));
        let f = model.store.alloc(DVec2::new(20.0, 10.0));
        let left = PatchId(100);
        let right = PatchId(101);
        let mut lp = Patch::new(left, Polygon::new(vec![a, b, c, d]));
        let mut rp = Patch::new(right, Polygon::new(vec![b, e, f, c]));
        lp.within_city = true;
        rp.within_city = true;
        model.patches.push(lp);
        model.patches.push(rp);
        model.inner = vec![left, right];
        (model, left, right)
    }

    #[test]
    fn test_circumference_of_two_squares() {
        let (model, left, right) = two_square_model();
        let circ = find_circumference(&model, &[left, right]).unwrap();
        assert_eq!(circ.len(), 6);
        // The shared edge is internal.
        let b = model.patches[0].shape.verts()[1];
        let c = model.patches[0].shape.verts()[2];
        assert!(circ.find_edge(b, c).is_none());
        assert!(circ.find_edge(c, b).is_none());
    }

    #[test]
    fn test_circumference_empty_set_fails() {
        let (model, _, _) = two_square_model();
        assert_eq!(
            find_circumference(&model, &[]),
            Err(GenerationError::BadWallShape)
        );
    }

    #[test]
    fn test_single_patch_wall_shape_is_patch_boundary() {
        let mut model = Model::empty(1, false, false, true);
        let shape = Polygon::regular(&mut model.store, 8, 20.0);
        let pid = PatchId(0);
        let mut patch = Patch::new(pid, shape.clone());
        patch.within_city = true;
        model.patches.push(patch);
        model.inner = vec![pid];

        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(42);
        let wall = CurtainWall::build(true, &mut model, vec![pid], &[], &mut rng).unwrap();
        assert_eq!(wall.shape.verts(), shape.verts());
        assert!(!wall.gates.is_empty());
        for &gate in &wall.gates {
            assert!(wall.shape.contains(gate));
        }
    }

    #[test]
    fn test_gates_keep_minimum_separation() {
        for seed in [1u64, 5, 9, 21, 42] {
            let mut model = Model::empty(1, false, false, true);
            let shape = Polygon::regular(&mut model.store, 12, 30.0);
            let pid = PatchId(0);
            let mut patch = Patch::new(pid, shape.clone());
            patch.within_city = true;
            model.patches.push(patch);
            model.inner = vec![pid];

            let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
            let wall = CurtainWall::build(true, &mut model, vec![pid], &[], &mut rng).unwrap();
            let n = wall.shape.len();
            for (i, &g1) in wall.gates.iter().enumerate() {
                for &g2 in wall.gates.iter().skip(i + 1) {
                    let i1 = wall.shape.index_of(g1).unwrap();
                    let i2 = wall.shape.index_of(g2).unwrap();
                    let gap = (i1 + n - i2) % n;
                    let gap = gap.min(n - gap);
                    assert!(gap >= 2, "gates {i1} and {i2} are ring neighbours");
                }
            }
        }
    }

    #[test]
    fn test_reserved_vertices_are_never_gates() {
        let mut model = Model::empty(1, false, false, true);
        let shape = Polygon::regular(&mut model.store, 10, 25.0);
        let pid = PatchId(0);
        let mut patch = Patch::new(pid, shape.clone());
        patch.within_city = true;
        model.patches.push(patch);
        model.inner = vec![pid];
        let reserved: Vec<PointId> = shape.verts()[..4].to_vec();

        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(7);
        let wall = CurtainWall::build(true, &mut model, vec![pid], &reserved, &mut rng).unwrap();
        for gate in &wall.gates {
            assert!(!reserved.contains(gate));
        }
    }

    #[test]
    fn test_towers_avoid_gates() {
        let mut model = Model::empty(1, false, false, true);
        let shape = Polygon::regular(&mut model.store, 12, 30.0);
        let pid = PatchId(0);
        let mut patch = Patch::new(pid, shape.clone());
        patch.within_city = true;
        model.patches.push(patch);
        model.inner = vec![pid];

        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(3);
        let mut wall = CurtainWall::build(true, &mut model, vec![pid], &[], &mut rng).unwrap();
        wall.build_towers();
        assert!(!wall.towers.is_empty());
        for tower in &wall.towers {
            assert!(!wall.gates.contains(tower));
        }
    }

    #[test]
    fn test_notional_wall_has_no_towers() {
        let (mut model, left, right) = two_square_model();
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(11);
        let mut wall =
            CurtainWall::build(false, &mut model, vec![left, right], &[], &mut rng).unwrap();
        wall.build_towers();
        assert!(wall.towers.is_empty());
        assert!(!wall.gates.is_empty());
    }

    #[test]
    fn test_wall_radius() {
        let mut store = PointStore::new();
        let shape = Polygon::regular(&mut store, 6, 15.0);
        let wall = CurtainWall {
            segments: vec![true; shape.len()],
            shape,
            gates: Vec::new(),
            towers: Vec::new(),
            real: true,
            enclosed: Vec::new(),
        };
        assert!((wall.radius(&store) - 15.0).abs() < 1e-9);
    }
}
