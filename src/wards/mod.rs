//! Ward types: the functional use assigned to every parcel
//!
//! A ward is a tagged kind plus the building footprints it generates.
//! Kinds dispatch through plain matches: a scoring function used during
//! assignment and a geometry builder run in the final pipeline stage.

pub mod alleys;
pub mod special;

use glam::DVec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::geom::{polygon::distance_to_line, Polygon};
use crate::town::model::Model;
use crate::town::patch::PatchId;
use crate::town::wall::CurtainWall;

pub use alleys::AlleyParams;

/// Width of the main streets hugging walls, plazas and arteries.
pub const MAIN_STREET: f64 = 2.0;
/// Width of ordinary streets between city parcels.
pub const REGULAR_STREET: f64 = 1.0;
/// Width of the alleys carved between buildings.
pub const ALLEY: f64 = 0.6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ward {
    pub kind: WardKind,
    pub geometry: Vec<Polygon>,
}

impl Ward {
    pub fn new(kind: WardKind) -> Self {
        Self {
            kind,
            geometry: Vec::new(),
        }
    }

    pub fn label(&self) -> &'static str {
        match &self.kind {
            WardKind::Craftsmen(_) => "Craftsmen",
            WardKind::Merchant(_) => "Merchant",
            WardKind::Slum(_) => "Slum",
            WardKind::Patriciate(_) => "Patriciate",
            WardKind::Gate(_) => "Gate",
            WardKind::Administration(_) => "Administration",
            WardKind::Market => "Market",
            WardKind::Cathedral => "Temple",
            WardKind::Military => "Military",
            WardKind::Park => "Park",
            WardKind::Farm => "Farm",
            WardKind::Castle(_) => "Castle",
            WardKind::Common => "Ward",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WardKind {
    Craftsmen(AlleyParams),
    Merchant(AlleyParams),
    Slum(AlleyParams),
    Patriciate(AlleyParams),
    Gate(AlleyParams),
    Administration(AlleyParams),
    Market,
    Cathedral,
    Military,
    Park,
    Farm,
    /// The citadel ward carries its own curtain wall.
    Castle(Box<CurtainWall>),
    /// Generic countryside parcel with no buildings of its own.
    Common,
}

impl WardKind {
    pub fn gate(rng: &mut ChaCha8Rng) -> Self {
        WardKind::Gate(AlleyParams::gate(rng))
    }
}

/// Slot in the positional assignment template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WardSlot {
    Craftsmen,
    Merchant,
    Cathedral,
    Administration,
    Slum,
    Patriciate,
    Market,
    Military,
    Park,
}

impl WardSlot {
    /// The fixed 35-entry template, weighted toward craftsmen with
    /// designated positions for the rarer wards.
    pub fn template() -> Vec<WardSlot> {
        (0..35)
            .map(|i| match i {
                2 | 5 => WardSlot::Cathedral,
                14 => WardSlot::Administration,
                16 | 18 | 24 | 25 | 30 => WardSlot::Slum,
                19 | 32 => WardSlot::Patriciate,
                20 | 33 => WardSlot::Market,
                1 | 34 => WardSlot::Merchant,
                29 => WardSlot::Military,
                31 => WardSlot::Park,
                _ => WardSlot::Craftsmen,
            })
            .collect()
    }

    /// Draws the concrete ward kind for this slot.
    pub fn instantiate(self, rng: &mut ChaCha8Rng) -> WardKind {
        match self {
            WardSlot::Craftsmen => WardKind::Craftsmen(AlleyParams::craftsmen(rng)),
            WardSlot::Merchant => WardKind::Merchant(AlleyParams::merchant(rng)),
            WardSlot::Cathedral => WardKind::Cathedral,
            WardSlot::Administration => WardKind::Administration(AlleyParams::administration(rng)),
            WardSlot::Slum => WardKind::Slum(AlleyParams::slum(rng)),
            WardSlot::Patriciate => WardKind::Patriciate(AlleyParams::patriciate(rng)),
            WardSlot::Market => WardKind::Market,
            WardSlot::Military => WardKind::Military,
            WardSlot::Park => WardKind::Park,
        }
    }
}

/// Placement desirability of `pid` for a slot; lower is better, infinity
/// rejects the patch outright.
pub fn rate_location(model: &Model, slot: WardSlot, pid: PatchId, rng: &mut ChaCha8Rng) -> f64 {
    let Some(patch) = model.find_patch(pid) else {
        return f64::INFINITY;
    };
    let store = &model.store;
    let target = || -> DVec2 {
        match model.plaza_shape() {
            Some(plaza) => plaza.center(store),
            None => model.center_pos(),
        }
    };

    match slot {
        // Merchants cluster around the market.
        WardSlot::Merchant => patch.shape.distance(store, target()),
        // Slums drift to the city edge.
        WardSlot::Slum => -patch.shape.distance(store, target()),
        WardSlot::Cathedral => match model.plaza_shape() {
            Some(plaza) if patch.shape.borders(plaza) => -1.0 / patch.shape.square(store).abs(),
            _ => patch.shape.distance(store, target()) * patch.shape.square(store).abs(),
        },
        WardSlot::Administration => match model.plaza_shape() {
            Some(plaza) if patch.shape.borders(plaza) => 0.0,
            Some(plaza) => patch.shape.distance(store, plaza.center(store)),
            None => patch.shape.distance(store, model.center_pos()),
        },
        WardSlot::Patriciate => {
            // Likes parks next door, dislikes slums.
            let mut rate = 0.0;
            for other in &model.patches {
                if other.id != pid && other.shape.borders(&patch.shape) {
                    match other.ward.as_ref().map(|w| &w.kind) {
                        Some(WardKind::Park) => rate -= 1.0,
                        Some(WardKind::Slum(_)) => rate += 1.0,
                        _ => {}
                    }
                }
            }
            rate
        }
        WardSlot::Market => {
            // Never two markets back to back.
            let market_next_door = model.inner.iter().any(|&iid| {
                model.find_patch(iid).map_or(false, |p| {
                    matches!(p.ward.as_ref().map(|w| &w.kind), Some(WardKind::Market))
                        && p.shape.borders(&patch.shape)
                })
            });
            if market_next_door {
                return f64::INFINITY;
            }
            match model.plaza_shape() {
                Some(plaza) => {
                    patch.shape.square(store).abs() / plaza.square(store).abs().max(1e-9)
                }
                None => patch.shape.distance(store, model.center_pos()),
            }
        }
        WardSlot::Military => {
            let by_citadel = model
                .citadel_shape()
                .map_or(false, |c| c.borders(&patch.shape));
            if by_citadel {
                return 0.0;
            }
            if let Some(wall) = model.wall() {
                if wall.borders(pid, &patch.shape) {
                    return 1.0;
                }
            }
            if model.citadel.is_none() && model.wall().is_none() {
                0.0
            } else {
                f64::INFINITY
            }
        }
        WardSlot::Craftsmen | WardSlot::Park => rng.gen::<f64>(),
    }
}

/// Buildable block of a patch: the parcel inset by half a street width per
/// edge, wider against walls, plazas and arteries.
pub(crate) fn city_block(model: &mut Model, pid: PatchId) -> Polygon {
    let Some(patch) = model.find_patch(pid) else {
        return Polygon::default();
    };
    let shape = patch.shape.clone();
    let inner_patch = model.wall().is_none() || patch.within_walls;

    let mut inset = Vec::with_capacity(shape.len());
    for (v0, v1) in shape.edges() {
        let on_wall = model.wall().map_or(false, |w| w.borders_by(pid, v0, v1));
        let dist = if on_wall {
            MAIN_STREET
        } else {
            let mut on_street = inner_patch
                && model
                    .plaza_shape()
                    .map_or(false, |plaza| plaza.find_edge(v1, v0).is_some());
            if !on_street {
                on_street = model
                    .arteries
                    .iter()
                    .any(|a| a.contains(v0) && a.contains(v1));
            }
            if on_street {
                MAIN_STREET
            } else if inner_patch {
                REGULAR_STREET
            } else {
                ALLEY
            }
        };
        inset.push(dist / 2.0);
    }

    if shape.is_convex(&model.store) {
        shape.shrink(&mut model.store, &inset)
    } else {
        shape.buffer(&mut model.store, &inset)
    }
}

/// Thins out buildings on patches that are not enclosed by the city:
/// the further a lot sits from a populated edge, the likelier it is
/// dropped, with gates anchoring pockets of density.
pub(crate) fn filter_outskirts(
    model: &Model,
    pid: PatchId,
    rng: &mut ChaCha8Rng,
    buildings: Vec<Polygon>,
) -> Vec<Polygon> {
    let Some(patch) = model.find_patch(pid) else {
        return buildings;
    };
    let store = &model.store;
    let shape = &patch.shape;

    struct PopEdge {
        origin: DVec2,
        dir: DVec2,
        reach: f64,
    }
    let mut populated: Vec<PopEdge> = Vec::new();
    let mut add_edge = |v0: crate::geom::PointId, v1: crate::geom::PointId, factor: f64| {
        let origin = store.pos(v0);
        let dir = store.pos(v1) - origin;
        let reach = shape
            .verts()
            .iter()
            .filter(|&&v| v != v0 && v != v1)
            .map(|&v| distance_to_line(origin, dir, store.pos(v)) * factor)
            .fold(0.0, f64::max);
        populated.push(PopEdge { origin, dir, reach });
    };

    for (v0, v1) in shape.edges() {
        let on_road = model
            .arteries
            .iter()
            .any(|a| a.contains(v0) && a.contains(v1));
        if on_road {
            add_edge(v0, v1, 1.0);
        } else if let Some(neighbour) = model.neighbour_across(pid, v0) {
            let (in_city, enclosed) = model
                .find_patch(neighbour)
                .map(|n| (n.within_city, model.is_enclosed(neighbour)))
                .unwrap_or((false, false));
            if in_city {
                add_edge(v0, v1, if enclosed { 1.0 } else { 0.4 });
            }
        }
    }

    let density: Vec<f64> = shape
        .verts()
        .iter()
        .map(|&v| {
            if model.gates.contains(&v) {
                1.0
            } else if model
                .patch_by_vertex(v)
                .iter()
                .all(|&p| model.find_patch(p).map_or(false, |p| p.within_city))
            {
                2.0 * rng.gen::<f64>()
            } else {
                0.0
            }
        })
        .collect();

    buildings
        .into_iter()
        .filter(|building| {
            let mut min_dist: f64 = 1.0;
            for edge in &populated {
                for p in building.positions(store) {
                    let d = distance_to_line(edge.origin, edge.dir, p);
                    let rel = if edge.reach > 0.0 { d / edge.reach } else { 1.0 };
                    min_dist = min_dist.min(rel);
                }
            }
            let weights = shape.interpolate(store, building.center(store));
            let pressure: f64 = density
                .iter()
                .zip(&weights)
                .map(|(d, w)| d * w)
                .sum();
            if pressure > 0.0 {
                min_dist /= pressure;
            }
            crate::core::random::fuzzy(rng, 1.0) > min_dist
        })
        .collect()
}

/// Builds the footprint geometry for the ward on `pid`, in place.
pub(crate) fn build_geometry(model: &mut Model, pid: PatchId, rng: &mut ChaCha8Rng) {
    let Some(kind) = model
        .find_patch(pid)
        .and_then(|p| p.ward.as_ref())
        .map(|w| w.kind.clone())
    else {
        return;
    };

    let geometry = match &kind {
        WardKind::Craftsmen(params)
        | WardKind::Merchant(params)
        | WardKind::Slum(params)
        | WardKind::Patriciate(params)
        | WardKind::Gate(params)
        | WardKind::Administration(params) => {
            let block = city_block(model, pid);
            let buildings = alleys::create_alleys(&mut model.store, rng, &block, params);
            if model.is_enclosed(pid) {
                buildings
            } else {
                filter_outskirts(model, pid, rng, buildings)
            }
        }
        WardKind::Market => special::market(model, pid, rng),
        WardKind::Cathedral => special::cathedral(model, pid, rng),
        WardKind::Military => special::military(model, pid, rng),
        WardKind::Park => special::park(model, pid, rng),
        WardKind::Farm => special::farm(model, pid, rng),
        WardKind::Castle(_) => special::castle(model, pid, rng),
        WardKind::Common => Vec::new(),
    };

    if let Some(ward) = model.find_patch_mut(pid).and_then(|p| p.ward.as_mut()) {
        ward.geometry = geometry;
    }
}
