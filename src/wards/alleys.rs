//! Shared recursive subdivision of blocks into building lots
//!
//! Both carvers run on an explicit worklist rather than recursion so a
//! pathological block bounds the work instead of the stack.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::random;
use crate::geom::{cutter, PointStore, Polygon};

use super::ALLEY;

/// Hard cap on subdivision steps for a single block.
const SUBDIVISION_BUDGET: usize = 4096;

/// Density and irregularity knobs for the alley carver. Each ward kind
/// draws its own set at assignment time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AlleyParams {
    /// Target lot area; lots below a randomized multiple of this stop
    /// subdividing.
    pub min_sq: f64,
    /// 0..1, skews split ratios and angles away from a regular grid.
    pub grid_chaos: f64,
    /// 0..1, widens the lot-size spread.
    pub size_chaos: f64,
    /// Chance that a finished lot stays empty.
    pub empty_prob: f64,
}

impl AlleyParams {
    pub fn craftsmen(rng: &mut ChaCha8Rng) -> Self {
        Self {
            min_sq: 10.0 + 80.0 * rng.gen::<f64>() * rng.gen::<f64>(),
            grid_chaos: 0.5 + rng.gen::<f64>() * 0.2,
            size_chaos: 0.6,
            empty_prob: 0.04,
        }
    }

    pub fn merchant(rng: &mut ChaCha8Rng) -> Self {
        Self {
            min_sq: 50.0 + 60.0 * rng.gen::<f64>() * rng.gen::<f64>(),
            grid_chaos: 0.5 + rng.gen::<f64>() * 0.3,
            size_chaos: 0.7,
            empty_prob: 0.15,
        }
    }

    pub fn slum(rng: &mut ChaCha8Rng) -> Self {
        Self {
            min_sq: 10.0 + 30.0 * rng.gen::<f64>() * rng.gen::<f64>(),
            grid_chaos: 0.6 + rng.gen::<f64>() * 0.4,
            size_chaos: 0.8,
            empty_prob: 0.03,
        }
    }

    pub fn patriciate(rng: &mut ChaCha8Rng) -> Self {
        Self {
            min_sq: 80.0 + 30.0 * rng.gen::<f64>() * rng.gen::<f64>(),
            grid_chaos: 0.5 + rng.gen::<f64>() * 0.3,
            size_chaos: 0.8,
            empty_prob: 0.2,
        }
    }

    pub fn gate(rng: &mut ChaCha8Rng) -> Self {
        Self {
            min_sq: 10.0 + 50.0 * rng.gen::<f64>() * rng.gen::<f64>(),
            grid_chaos: 0.5 + rng.gen::<f64>() * 0.3,
            size_chaos: 0.7,
            empty_prob: 0.04,
        }
    }

    pub fn administration(rng: &mut ChaCha8Rng) -> Self {
        Self {
            min_sq: 80.0 + 30.0 * rng.gen::<f64>() * rng.gen::<f64>(),
            grid_chaos: 0.1 + rng.gen::<f64>() * 0.3,
            size_chaos: 0.3,
            empty_prob: 0.04,
        }
    }
}

/// Carves `block` into building lots by repeatedly bisecting through the
/// longest edge with a randomized ratio, leaving alley gaps while a branch
/// is still large.
pub fn create_alleys(
    store: &mut PointStore,
    rng: &mut ChaCha8Rng,
    block: &Polygon,
    params: &AlleyParams,
) -> Vec<Polygon> {
    let mut lots = Vec::new();
    if block.len() < 3 {
        return lots;
    }
    let mut work: Vec<(Polygon, bool)> = vec![(block.clone(), true)];
    let mut budget = SUBDIVISION_BUDGET;

    while let Some((poly, gap)) = work.pop() {
        if budget == 0 {
            lots.push(poly);
            continue;
        }
        budget -= 1;

        let Some(edge) = poly.longest_edge(store) else {
            continue;
        };
        let anchor = poly.verts()[edge];

        let spread = 0.8 * params.grid_chaos;
        let ratio = (1.0 - spread) / 2.0 + rng.gen::<f64>() * spread;
        let angle_spread = if poly.square(store).abs() < params.min_sq * 4.0 {
            0.0
        } else {
            std::f64::consts::PI / 6.0 * params.grid_chaos
        };
        let angle = (rng.gen::<f64>() - 0.5) * angle_spread;

        let halves = cutter::bisect(store, &poly, anchor, ratio, angle, if gap { ALLEY } else { 0.0 });
        if halves.len() == 1 && halves[0].len() == poly.len() {
            // The cut failed; the block stays whole.
            lots.push(poly);
            continue;
        }

        for half in halves {
            if half.len() < 3 {
                continue;
            }
            let sq = half.square(store).abs();
            let threshold =
                params.min_sq * 2.0f64.powf(4.0 * params.size_chaos * (rng.gen::<f64>() - 0.5));
            if sq < threshold {
                if !rng.gen_bool(params.empty_prob.clamp(0.0, 1.0)) {
                    lots.push(half);
                }
            } else {
                let keep_gap = sq > params.min_sq / (rng.gen::<f64>() * rng.gen::<f64>());
                work.push((half, keep_gap));
            }
        }
    }
    lots
}

/// Slices `poly` into roughly rectangular blocks along the axis pair of
/// its longest edge; used by the wards that build one large structure.
pub fn create_ortho_building(
    store: &mut PointStore,
    rng: &mut ChaCha8Rng,
    poly: &Polygon,
    min_block_sq: f64,
    fill: f64,
) -> Vec<Polygon> {
    if poly.len() < 3 {
        return Vec::new();
    }
    if poly.square(store).abs() < min_block_sq {
        return vec![poly.clone()];
    }
    let Some(edge) = poly.longest_edge(store) else {
        return vec![poly.clone()];
    };
    let n = poly.len();
    let c1 = store.pos(poly.verts()[(edge + 1) % n]) - store.pos(poly.verts()[edge]);
    let c2 = c1.perp();
    let fill = fill.clamp(0.0, 1.0);

    for _ in 0..100 {
        let mut blocks = Vec::new();
        let mut work = vec![poly.clone()];
        let mut budget = SUBDIVISION_BUDGET;
        while let Some(p) = work.pop() {
            if budget == 0 {
                blocks.push(p);
                continue;
            }
            budget -= 1;

            let Some(e) = p.longest_edge(store) else {
                continue;
            };
            let len = p.len();
            let v0 = store.pos(p.verts()[e]);
            let v1 = store.pos(p.verts()[(e + 1) % len]);
            let v = v1 - v0;
            let ratio = 0.4 + rng.gen::<f64>() * 0.2;
            let origin = v0.lerp(v1, ratio);
            // Cut across the longest edge, along whichever axis is more
            // perpendicular to it.
            let axis = if v.dot(c1).abs() < v.dot(c2).abs() { c1 } else { c2 };

            let halves = p.cut(store, origin, origin + axis, 0.0);
            if halves.len() == 1 && halves[0].len() == p.len() {
                if rng.gen_bool(fill) {
                    blocks.push(p);
                }
                continue;
            }
            for half in halves {
                if half.len() < 3 {
                    continue;
                }
                let threshold = min_block_sq * 2.0f64.powf(2.0 * random::normal(rng) - 1.0);
                if half.square(store).abs() < threshold {
                    if rng.gen_bool(fill) {
                        blocks.push(half);
                    }
                } else {
                    work.push(half);
                }
            }
        }
        if !blocks.is_empty() {
            return blocks;
        }
    }
    vec![poly.clone()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;
    use rand::SeedableRng;

    fn block(store: &mut PointStore) -> Polygon {
        Polygon::from_points(
            store,
            &[
                DVec2::new(0.0, 0.0),
                DVec2::new(40.0, 2.0),
                DVec2::new(42.0, 38.0),
                DVec2::new(-2.0, 40.0),
            ],
        )
    }

    #[test]
    fn test_create_alleys_produces_lots_within_block() {
        let mut store = PointStore::new();
        let b = block(&mut store);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let params = AlleyParams {
            min_sq: 50.0,
            grid_chaos: 0.4,
            size_chaos: 0.5,
            empty_prob: 0.0,
        };
        let lots = create_alleys(&mut store, &mut rng, &b, &params);
        assert!(lots.len() > 1);
        let total: f64 = lots.iter().map(|l| l.square(&store).abs()).sum();
        let block_area = b.square(&store).abs();
        // Alley gaps eat some area; lots never exceed the block.
        assert!(total < block_area);
        assert!(total > block_area * 0.2);
        for lot in &lots {
            assert!(lot.len() >= 3);
        }
    }

    #[test]
    fn test_create_alleys_empty_prob_one_drops_all_leaves() {
        let mut store = PointStore::new();
        let b = block(&mut store);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let params = AlleyParams {
            min_sq: 50.0,
            grid_chaos: 0.3,
            size_chaos: 0.2,
            empty_prob: 1.0,
        };
        let lots = create_alleys(&mut store, &mut rng, &b, &params);
        assert!(lots.is_empty());
    }

    #[test]
    fn test_create_alleys_terminates_on_tiny_block() {
        let mut store = PointStore::new();
        let tiny = Polygon::from_points(
            &mut store,
            &[
                DVec2::new(0.0, 0.0),
                DVec2::new(0.5, 0.0),
                DVec2::new(0.2, 0.4),
            ],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let params = AlleyParams {
            min_sq: 100.0,
            grid_chaos: 1.0,
            size_chaos: 1.0,
            empty_prob: 0.0,
        };
        let lots = create_alleys(&mut store, &mut rng, &tiny, &params);
        assert!(lots.len() <= 2);
    }

    #[test]
    fn test_ortho_building_small_block_kept_whole() {
        let mut store = PointStore::new();
        let b = Polygon::rect(&mut store, 3.0, 3.0);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let blocks = create_ortho_building(&mut store, &mut rng, &b, 50.0, 1.0);
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn test_ortho_building_slices_large_block() {
        let mut store = PointStore::new();
        let b = Polygon::rect(&mut store, 30.0, 20.0);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let blocks = create_ortho_building(&mut store, &mut rng, &b, 40.0, 1.0);
        assert!(blocks.len() > 1);
        let total: f64 = blocks.iter().map(|x| x.square(&store).abs()).sum();
        assert!((total - 600.0).abs() < 1.0);
    }
}
