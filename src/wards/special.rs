//! Wards that place explicitly shaped structures instead of alley lots

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::geom::{cutter, Polygon};
use crate::town::model::Model;
use crate::town::patch::PatchId;

use super::alleys::{create_alleys, create_ortho_building, AlleyParams};
use super::{city_block, ALLEY, MAIN_STREET};

/// Market: an open plaza with a statue or fountain, usually pulled toward
/// the longest side.
pub fn market(model: &mut Model, pid: PatchId, rng: &mut ChaCha8Rng) -> Vec<Polygon> {
    let Some(patch) = model.find_patch(pid) else {
        return Vec::new();
    };
    let shape = patch.shape.clone();
    if shape.len() < 3 {
        return Vec::new();
    }

    let statue = rng.gen_bool(0.6);
    let offset = statue || rng.gen_bool(0.3);

    let long_edge = if statue || offset {
        shape.longest_edge(&model.store).map(|e| {
            let n = shape.len();
            (
                model.store.pos(shape.verts()[e]),
                model.store.pos(shape.verts()[(e + 1) % n]),
            )
        })
    } else {
        None
    };

    let object = if statue {
        let o = Polygon::rect(
            &mut model.store,
            1.0 + rng.gen::<f64>(),
            1.0 + rng.gen::<f64>(),
        );
        if let Some((a, b)) = long_edge {
            o.rotate(&mut model.store, (b.y - a.y).atan2(b.x - a.x));
        }
        o
    } else {
        Polygon::circle(&mut model.store, 1.0 + rng.gen::<f64>())
    };

    let centroid = shape.centroid(&model.store);
    let pos = match (offset, long_edge) {
        (true, Some((a, b))) => centroid.lerp(a.lerp(b, 0.5), 0.2 + rng.gen::<f64>() * 0.4),
        _ => centroid,
    };
    object.translate(&mut model.store, pos);
    vec![object]
}

/// Cathedral: a ring of cloister buildings around a courtyard, or one
/// large orthogonal complex.
pub fn cathedral(model: &mut Model, pid: PatchId, rng: &mut ChaCha8Rng) -> Vec<Polygon> {
    let block = city_block(model, pid);
    if block.len() < 3 {
        return Vec::new();
    }
    if rng.gen_bool(0.4) {
        cutter::ring(&mut model.store, &block, 2.0 + rng.gen::<f64>() * 4.0)
    } else {
        create_ortho_building(&mut model.store, rng, &block, 50.0, 0.8)
    }
}

/// Military ward: coarse, regular barracks rows sized by the block.
pub fn military(model: &mut Model, pid: PatchId, rng: &mut ChaCha8Rng) -> Vec<Polygon> {
    let block = city_block(model, pid);
    if block.len() < 3 {
        return Vec::new();
    }
    let params = AlleyParams {
        min_sq: block.square(&model.store).abs().sqrt() * (1.0 + rng.gen::<f64>()),
        grid_chaos: 0.1 + rng.gen::<f64>() * 0.3,
        size_chaos: 0.3,
        empty_prob: 0.25,
    };
    create_alleys(&mut model.store, rng, &block, &params)
}

/// Park: radial paths when the block is round enough, otherwise a fan
/// from the most central vertex.
pub fn park(model: &mut Model, pid: PatchId, _rng: &mut ChaCha8Rng) -> Vec<Polygon> {
    let block = city_block(model, pid);
    if block.len() < 3 {
        return Vec::new();
    }
    if block.compactness(&model.store) >= 0.7 {
        cutter::radial(&mut model.store, &block, None, ALLEY)
    } else {
        cutter::semi_radial(&mut model.store, &block, ALLEY)
    }
}

/// Farm: a small rotated housing block between a field corner and the
/// parcel center.
pub fn farm(model: &mut Model, pid: PatchId, rng: &mut ChaCha8Rng) -> Vec<Polygon> {
    let Some(patch) = model.find_patch(pid) else {
        return Vec::new();
    };
    let shape = patch.shape.clone();
    if shape.is_empty() {
        return Vec::new();
    }
    let housing = Polygon::rect(&mut model.store, 4.0, 4.0);
    let corner = model
        .store
        .pos(shape.verts()[rng.gen_range(0..shape.len())]);
    let pos = corner.lerp(shape.centroid(&model.store), 0.3 + rng.gen::<f64>() * 0.4);
    housing.rotate(&mut model.store, rng.gen::<f64>() * std::f64::consts::PI);
    housing.translate(&mut model.store, pos);
    create_ortho_building(&mut model.store, rng, &housing, 8.0, 0.5)
}

/// Castle: the keep complex inside the citadel, well back from the walls.
pub fn castle(model: &mut Model, pid: PatchId, rng: &mut ChaCha8Rng) -> Vec<Polygon> {
    let Some(patch) = model.find_patch(pid) else {
        return Vec::new();
    };
    let shape = patch.shape.clone();
    let block = shape.shrink_uniform(&mut model.store, MAIN_STREET * 2.0);
    if block.len() < 3 {
        return Vec::new();
    }
    let side = block.square(&model.store).abs().sqrt() * 4.0;
    create_ortho_building(&mut model.store, rng, &block, side, 0.6)
}
