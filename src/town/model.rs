//! Model orchestrator: the six-stage generation pipeline and retry loop
//!
//! BuildPatches -> OptimizeJunctions -> BuildWalls -> BuildStreets ->
//! CreateWards -> BuildGeometry. A structural failure anywhere discards
//! the whole partial model and restarts from a fresh site layout; the RNG
//! stream is shared across attempts, so a fixed seed reproduces the same
//! sequence of attempts and the same final town.

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::error::{GenerationError, Result};
use crate::geom::{PointId, PointStore, Polygon, Voronoi};
use crate::town::patch::{Patch, PatchId};
use crate::town::topology::Topology;
use crate::town::wall::CurtainWall;
use crate::wards::{self, Ward, WardKind, WardSlot};

/// Adjacent boundary vertices closer than this merge into one junction.
const JUNCTION_MERGE_DISTANCE: f64 = 8.0;
/// Full-pipeline attempt budget.
const RETRY_LIMIT: u32 = 100;
/// Citadel shapes below this compactness cannot carry a castle.
const CITADEL_MIN_COMPACTNESS: f64 = 0.75;
/// Blend factor for artery smoothing.
const ARTERY_SMOOTHING: f64 = 0.4;

/// A finished town plan. One instance corresponds to one successful
/// generation attempt; failed attempts leave nothing behind.
#[derive(Debug, Clone, Serialize)]
pub struct Model {
    pub store: PointStore,
    pub patches: Vec<Patch>,
    /// The city parcels proper, in radial order from the center.
    pub inner: Vec<PatchId>,
    pub plaza: Option<PatchId>,
    pub citadel: Option<PatchId>,
    /// Vertex of the central patch nearest the origin.
    pub center: Option<PointId>,
    /// City limit; a real wall when `walls_needed` was drawn.
    pub border: Option<CurtainWall>,
    /// All gates, wall and citadel both.
    pub gates: Vec<PointId>,
    pub streets: Vec<Polygon>,
    pub roads: Vec<Polygon>,
    pub arteries: Vec<Polygon>,
    pub city_radius: f64,
    #[serde(skip)]
    pub topology: Option<Topology>,
    n_patches: usize,
    plaza_needed: bool,
    citadel_needed: bool,
    walls_needed: bool,
    next_patch_id: u32,
}

impl Model {
    /// Generates a town of `n_patches` inner parcels from `seed`,
    /// retrying structural failures up to the attempt budget.
    pub fn generate(n_patches: usize, seed: u64) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let plaza_needed = rng.gen_bool(0.5);
        let citadel_needed = rng.gen_bool(0.5);
        let walls_needed = rng.gen_bool(0.5);

        for attempt in 0..RETRY_LIMIT {
            let mut model = Self::empty(n_patches, plaza_needed, citadel_needed, walls_needed);
            match model.try_build(&mut rng) {
                Ok(()) => {
                    info!(attempt, n_patches, "town generated");
                    return Ok(model);
                }
                Err(err) => warn!(attempt, %err, "generation attempt failed"),
            }
        }
        Err(GenerationError::RetriesExhausted {
            attempts: RETRY_LIMIT,
        })
    }

    pub(crate) fn empty(
        n_patches: usize,
        plaza_needed: bool,
        citadel_needed: bool,
        walls_needed: bool,
    ) -> Self {
        Self {
            store: PointStore::new(),
            patches: Vec::new(),
            inner: Vec::new(),
            plaza: None,
            citadel: None,
            center: None,
            border: None,
            gates: Vec::new(),
            streets: Vec::new(),
            roads: Vec::new(),
            arteries: Vec::new(),
            city_radius: 0.0,
            topology: None,
            n_patches,
            plaza_needed,
            citadel_needed,
            walls_needed,
            next_patch_id: 0,
        }
    }

    fn try_build(&mut self, rng: &mut ChaCha8Rng) -> Result<()> {
        self.build_patches(rng)?;
        self.optimize_junctions();
        self.build_walls(rng)?;
        self.build_streets()?;
        self.create_wards(rng);
        self.build_geometry(rng);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn find_patch(&self, id: PatchId) -> Option<&Patch> {
        self.patches.iter().find(|p| p.id == id)
    }

    pub fn find_patch_mut(&mut self, id: PatchId) -> Option<&mut Patch> {
        self.patches.iter_mut().find(|p| p.id == id)
    }

    fn alloc_patch_id(&mut self) -> PatchId {
        let id = PatchId(self.next_patch_id);
        self.next_patch_id += 1;
        id
    }

    /// The physical wall, when one was built.
    pub fn wall(&self) -> Option<&CurtainWall> {
        if self.walls_needed {
            self.border.as_ref()
        } else {
            None
        }
    }

    pub fn plaza_shape(&self) -> Option<&Polygon> {
        self.plaza
            .and_then(|id| self.find_patch(id))
            .map(|p| &p.shape)
    }

    pub fn citadel_shape(&self) -> Option<&Polygon> {
        self.citadel
            .and_then(|id| self.find_patch(id))
            .map(|p| &p.shape)
    }

    /// The citadel's own wall, once the castle ward exists.
    pub fn citadel_wall(&self) -> Option<&CurtainWall> {
        self.citadel
            .and_then(|id| self.find_patch(id))
            .and_then(|p| p.ward.as_ref())
            .and_then(|w| match &w.kind {
                WardKind::Castle(wall) => Some(wall.as_ref()),
                _ => None,
            })
    }

    pub fn citadel_radius(&self) -> Option<f64> {
        self.citadel_wall().map(|w| w.radius(&self.store))
    }

    pub fn center_pos(&self) -> DVec2 {
        self.center.map(|c| self.store.pos(c)).unwrap_or(DVec2::ZERO)
    }

    /// Every patch whose boundary holds the vertex handle `v`.
    pub fn patch_by_vertex(&self, v: PointId) -> Vec<PatchId> {
        self.patches
            .iter()
            .filter(|p| p.shape.contains(v))
            .map(|p| p.id)
            .collect()
    }

    /// The patch on the far side of the edge leaving `v` on `pid`.
    pub fn neighbour_across(&self, pid: PatchId, v: PointId) -> Option<PatchId> {
        let patch = self.find_patch(pid)?;
        let next = patch.shape.next(v)?;
        self.patches
            .iter()
            .find(|p| p.id != pid && p.shape.find_edge(next, v).is_some())
            .map(|p| p.id)
    }

    pub fn neighbours(&self, pid: PatchId) -> Vec<PatchId> {
        let Some(patch) = self.find_patch(pid) else {
            return Vec::new();
        };
        self.patches
            .iter()
            .filter(|p| p.id != pid && p.shape.borders(&patch.shape))
            .map(|p| p.id)
            .collect()
    }

    /// Enclosed parcels keep full building density: inside the wall, or
    /// surrounded by city on every side.
    pub fn is_enclosed(&self, pid: PatchId) -> bool {
        let Some(patch) = self.find_patch(pid) else {
            return false;
        };
        if !patch.within_city {
            return false;
        }
        if patch.within_walls {
            return true;
        }
        self.neighbours(pid)
            .iter()
            .all(|&n| self.find_patch(n).map_or(false, |p| p.within_city))
    }

    /// Swap a patch for the pieces it was split into.
    pub fn replace_patch(&mut self, old: PatchId, pieces: Vec<Polygon>) {
        let Some(index) = self.patches.iter().position(|p| p.id == old) else {
            return;
        };
        self.patches.remove(index);
        for (offset, shape) in pieces.into_iter().enumerate() {
            let id = self.alloc_patch_id();
            self.patches.insert(index + offset, Patch::new(id, shape));
        }
    }

    // ------------------------------------------------------------------
    // Stage 1: BuildPatches
    // ------------------------------------------------------------------

    /// Lays sites on a loose spiral, triangulates, relaxes the central
    /// sites, and wraps the real Voronoi regions into patches in radial
    /// order. Patch 0 carries the town center (and plaza); patch
    /// `n_patches` just outside the ring becomes the citadel.
    fn build_patches(&mut self, rng: &mut ChaCha8Rng) -> Result<()> {
        let start_angle = rng.gen::<f64>() * std::f64::consts::TAU;
        let site_count = self.n_patches * 8;
        let mut sites = Vec::with_capacity(site_count);
        for i in 0..site_count {
            let a = start_angle + (i as f64).sqrt() * 5.0;
            let r = if i == 0 {
                0.0
            } else {
                10.0 + i as f64 * (2.0 + rng.gen::<f64>())
            };
            sites.push(DVec2::new(a.cos() * r, a.sin() * r));
        }

        let mut voronoi = Voronoi::build(&mut self.store, &sites);
        voronoi.sort_points_by_radius(&self.store);
        for _ in 0..3 {
            let mut to_relax: Vec<PointId> = voronoi.points.iter().take(3).copied().collect();
            if let Some(&p) = voronoi.points.get(self.n_patches) {
                to_relax.push(p);
            }
            voronoi = voronoi.relax(&mut self.store, Some(&to_relax));
            voronoi.sort_points_by_radius(&self.store);
        }

        let regions = voronoi.partition(&self.store);
        debug!(sites = site_count, regions = regions.len(), "patches partitioned");
        if regions.len() < self.n_patches {
            return Err(GenerationError::BadPatchLayout);
        }

        for (count, region) in regions.iter().enumerate() {
            let id = self.alloc_patch_id();
            let mut patch = Patch::from_region(id, region);
            if count == 0 {
                self.center = patch.shape.min_vertex(&self.store, |p| p.length());
                if self.plaza_needed {
                    self.plaza = Some(id);
                }
            } else if count == self.n_patches && self.citadel_needed {
                self.citadel = Some(id);
                patch.within_city = true;
            }
            if count < self.n_patches {
                patch.within_city = true;
                patch.within_walls = self.walls_needed;
                self.inner.push(id);
            }
            self.patches.push(patch);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stage 2: OptimizeJunctions
    // ------------------------------------------------------------------

    /// Merges near-coincident junctions until none remain, so a second
    /// run is a no-op. Each merge averages the two positions and rewires
    /// every patch that referenced the removed vertex.
    fn optimize_junctions(&mut self) {
        // Terminates: every merge removes a vertex from some patch.
        while self.merge_close_junctions() > 0 {}
    }

    fn merge_close_junctions(&mut self) -> usize {
        let mut targets: Vec<PatchId> = self.inner.clone();
        if let Some(c) = self.citadel {
            if !targets.contains(&c) {
                targets.push(c);
            }
        }

        let mut merges = 0;
        let mut to_clean: Vec<PatchId> = Vec::new();
        for pid in targets {
            let mut index = 0;
            loop {
                let pair = match self.find_patch(pid) {
                    Some(patch) if index < patch.shape.len() && patch.shape.len() > 3 => {
                        let len = patch.shape.len();
                        Some((
                            patch.shape.verts()[index],
                            patch.shape.verts()[(index + 1) % len],
                        ))
                    }
                    _ => None,
                };
                let Some((v0, v1)) = pair else {
                    break;
                };

                if v0 != v1
                    && self.store.pos(v0).distance(self.store.pos(v1)) < JUNCTION_MERGE_DISTANCE
                {
                    for i in 0..self.patches.len() {
                        if self.patches[i].id != pid && self.patches[i].shape.replace(v1, v0) {
                            to_clean.push(self.patches[i].id);
                        }
                    }
                    let mid = (self.store.pos(v0) + self.store.pos(v1)) / 2.0;
                    self.store.set(v0, mid);
                    if let Some(patch) = self.find_patch_mut(pid) {
                        patch.shape.remove_vertex(v1);
                    }
                    merges += 1;
                }
                index += 1;
            }
        }

        for pid in to_clean {
            if let Some(patch) = self.find_patch_mut(pid) {
                patch.shape.dedup_vertices();
            }
        }
        merges
    }

    // ------------------------------------------------------------------
    // Stage 3: BuildWalls
    // ------------------------------------------------------------------

    fn build_walls(&mut self, rng: &mut ChaCha8Rng) -> Result<()> {
        let reserved: Vec<PointId> = self
            .citadel
            .and_then(|c| self.find_patch(c))
            .map(|p| p.shape.verts().to_vec())
            .unwrap_or_default();

        let enclosed = self.inner.clone();
        let mut border = CurtainWall::build(self.walls_needed, self, enclosed, &reserved, rng)?;
        border.build_towers();

        // Far countryside is irrelevant to the plan; drop it.
        let radius = border.radius(&self.store);
        let center_pos = self.center_pos();
        let store = &self.store;
        self.patches
            .retain(|p| p.shape.distance(store, center_pos) < radius * 3.0);

        self.gates = border.gates.clone();
        self.border = Some(border);

        if let Some(cid) = self.citadel {
            let citadel_shape = self
                .find_patch(cid)
                .map(|p| p.shape.clone())
                .ok_or(GenerationError::BadPatchLayout)?;
            // Keep the outward-facing vertices fixed; castle gates must
            // open toward the city.
            let castle_reserved: Vec<PointId> = citadel_shape
                .verts()
                .iter()
                .copied()
                .filter(|&v| {
                    self.patch_by_vertex(v)
                        .iter()
                        .any(|&pid| self.find_patch(pid).map_or(false, |p| !p.within_city))
                })
                .collect();

            let mut castle_wall = CurtainWall::build(true, self, vec![cid], &castle_reserved, rng)?;
            castle_wall.build_towers();

            let compactness = citadel_shape.compactness(&self.store);
            if compactness < CITADEL_MIN_COMPACTNESS {
                return Err(GenerationError::BadCitadelShape { compactness });
            }

            self.gates.extend(castle_wall.gates.iter().copied());
            if let Some(patch) = self.find_patch_mut(cid) {
                patch.ward = Some(Ward::new(WardKind::Castle(Box::new(castle_wall))));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stage 4: BuildStreets
    // ------------------------------------------------------------------

    /// Connects every gate to the plaza (or the town center) through the
    /// inner subgraph; border gates also grow an outward road from the
    /// farthest reachable vertex in the gate's direction. Overlapping
    /// routes are then merged into arteries and lightly smoothed.
    fn build_streets(&mut self) -> Result<()> {
        let topology = Topology::from_model(self);
        let border_gates: Vec<PointId> = self
            .border
            .as_ref()
            .map(|b| b.gates.clone())
            .unwrap_or_default();
        let center = self.center.ok_or(GenerationError::BadPatchLayout)?;

        for gate in self.gates.clone() {
            let end = match self.plaza_shape() {
                Some(plaza) => {
                    let gate_pos = self.store.pos(gate);
                    plaza
                        .min_vertex(&self.store, |v| v.distance(gate_pos))
                        .unwrap_or(center)
                }
                None => center,
            };

            let street = topology
                .build_path(gate, end, &topology.outer)
                .ok_or(GenerationError::UnreachableStreet)?;
            self.streets.push(Polygon::new(street));

            if border_gates.contains(&gate) {
                let far = self.store.pos(gate).normalize_or_zero() * 1000.0;
                if let Some(start) = topology.nearest_vertex(far) {
                    if let Some(road) = topology.build_path(start, gate, &topology.inner) {
                        self.roads.push(Polygon::new(road));
                    }
                }
            }
        }
        debug!(
            streets = self.streets.len(),
            roads = self.roads.len(),
            "street network routed"
        );

        self.tidy_up_roads();

        let arteries = self.arteries.clone();
        for artery in &arteries {
            if artery.len() < 3 {
                continue;
            }
            let smoothed = artery.smoothed_with(&self.store, ARTERY_SMOOTHING);
            for i in 1..artery.len() - 1 {
                self.store.set(artery.verts()[i], smoothed[i]);
            }
        }

        self.topology = Some(topology);
        Ok(())
    }

    /// Cuts all routes into unique segments (plaza-internal ones are
    /// dropped, the plaza is open ground) and chains shared endpoints
    /// back into a minimal artery set.
    fn tidy_up_roads(&mut self) {
        let plaza_shape = self.plaza_shape().cloned();
        let mut segments: Vec<(PointId, PointId)> = Vec::new();
        {
            let mut cut = |poly: &Polygon| {
                for i in 1..poly.len() {
                    let v0 = poly.verts()[i - 1];
                    let v1 = poly.verts()[i];
                    if let Some(plaza) = &plaza_shape {
                        if plaza.contains(v0) && plaza.contains(v1) {
                            continue;
                        }
                    }
                    if !segments.contains(&(v0, v1)) {
                        segments.push((v0, v1));
                    }
                }
            };
            for street in &self.streets {
                cut(street);
            }
            for road in &self.roads {
                cut(road);
            }
        }

        self.arteries.clear();
        while let Some((start, end)) = segments.pop() {
            let mut attached = false;
            for artery in self.arteries.iter_mut() {
                if artery.first() == Some(end) {
                    artery.insert_front(start);
                    attached = true;
                    break;
                }
                if artery.last() == Some(start) {
                    artery.push(end);
                    attached = true;
                    break;
                }
            }
            if !attached {
                self.arteries.push(Polygon::new(vec![start, end]));
            }
        }
    }

    // ------------------------------------------------------------------
    // Stage 5: CreateWards
    // ------------------------------------------------------------------

    /// Assigns exactly one ward to every city parcel: plaza first, gate
    /// wards by chance, then the positional template scored patch by
    /// patch; the countryside falls to farms and plain wards.
    fn create_wards(&mut self, rng: &mut ChaCha8Rng) {
        let mut unassigned: Vec<PatchId> = self.inner.clone();

        if let Some(plaza_id) = self.plaza {
            if let Some(patch) = self.find_patch_mut(plaza_id) {
                patch.ward = Some(Ward::new(WardKind::Market));
            }
            unassigned.retain(|&id| id != plaza_id);
        }

        let border_gates: Vec<PointId> = self
            .border
            .as_ref()
            .map(|b| b.gates.clone())
            .unwrap_or_default();
        let gate_chance = if self.wall().is_some() { 0.5 } else { 0.2 };
        for gate in border_gates.iter().copied() {
            for pid in self.patch_by_vertex(gate) {
                let vacant = self
                    .find_patch(pid)
                    .map_or(false, |p| p.within_city && p.ward.is_none());
                if vacant && rng.gen_bool(gate_chance) {
                    let kind = WardKind::gate(rng);
                    if let Some(patch) = self.find_patch_mut(pid) {
                        patch.ward = Some(Ward::new(kind));
                    }
                    unassigned.retain(|&id| id != pid);
                }
            }
        }

        let mut slots = WardSlot::template();
        for _ in 0..slots.len() / 10 {
            let idx = rng.gen_range(0..slots.len() - 1);
            slots.swap(idx, idx + 1);
        }

        let mut slot_idx = 0;
        while !unassigned.is_empty() {
            let slot = slots.get(slot_idx).copied().unwrap_or(WardSlot::Slum);
            slot_idx += 1;

            let mut best: Option<PatchId> = None;
            let mut best_rate = f64::INFINITY;
            for &pid in &unassigned {
                let rate = wards::rate_location(self, slot, pid, rng);
                if rate < best_rate {
                    best_rate = rate;
                    best = Some(pid);
                }
            }
            let chosen = best.unwrap_or_else(|| unassigned[rng.gen_range(0..unassigned.len())]);
            let kind = slot.instantiate(rng);
            if let Some(patch) = self.find_patch_mut(chosen) {
                patch.ward = Some(Ward::new(kind));
            }
            unassigned.retain(|&id| id != chosen);
        }

        // A real wall pulls suburbs out of its gates.
        if self.walls_needed {
            let skip_chance = if self.n_patches > 5 {
                1.0 / (self.n_patches - 5) as f64
            } else {
                1.0
            };
            for gate in border_gates {
                if rng.gen_bool(skip_chance.clamp(0.0, 1.0)) {
                    continue;
                }
                for pid in self.patch_by_vertex(gate) {
                    let vacant = self.find_patch(pid).map_or(false, |p| p.ward.is_none());
                    if vacant {
                        let kind = WardKind::gate(rng);
                        if let Some(patch) = self.find_patch_mut(pid) {
                            patch.within_city = true;
                            patch.ward = Some(Ward::new(kind));
                        }
                    }
                }
            }
        }

        self.city_radius = 0.0;
        let ids: Vec<PatchId> = self.patches.iter().map(|p| p.id).collect();
        for pid in ids {
            let Some(patch) = self.find_patch(pid) else {
                continue;
            };
            if patch.within_city {
                let r = patch
                    .shape
                    .positions(&self.store)
                    .map(|p| p.length())
                    .fold(0.0, f64::max);
                self.city_radius = self.city_radius.max(r);
            } else if patch.ward.is_none() {
                let compact = patch.shape.compactness(&self.store);
                let kind = if rng.gen_bool(0.2) && compact >= 0.7 {
                    WardKind::Farm
                } else {
                    WardKind::Common
                };
                if let Some(patch) = self.find_patch_mut(pid) {
                    patch.ward = Some(Ward::new(kind));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Stage 6: BuildGeometry
    // ------------------------------------------------------------------

    fn build_geometry(&mut self, rng: &mut ChaCha8Rng) {
        let ids: Vec<PatchId> = self.patches.iter().map(|p| p.id).collect();
        for pid in ids {
            wards::build_geometry(self, pid, rng);
        }
    }
}
