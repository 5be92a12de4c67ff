//! Polygon carving primitives shared by ward geometry
//!
//! All of these allocate fresh points for the pieces they produce; the
//! input polygon is never mutated.

use glam::DVec2;

use super::point::{PointId, PointStore};
use super::polygon::Polygon;

/// Cut through the point at `ratio` along the edge starting at `vertex`,
/// perpendicular to that edge rotated by `angle`. `gap` leaves an alley
/// between the two halves.
pub fn bisect(
    store: &mut PointStore,
    poly: &Polygon,
    vertex: PointId,
    ratio: f64,
    angle: f64,
    gap: f64,
) -> Vec<Polygon> {
    let Some(next) = poly.next(vertex) else {
        return vec![poly.clone()];
    };
    let a = store.pos(vertex);
    let b = store.pos(next);
    let p1 = a.lerp(b, ratio);
    let d = b - a;
    let (sin, cos) = angle.sin_cos();
    let rotated = DVec2::new(d.x * cos - d.y * sin, d.y * cos + d.x * sin);
    let p2 = p1 + rotated.perp();
    poly.cut(store, p1, p2, gap)
}

/// Fan of triangular sectors from `center` (the centroid by default) to
/// every edge, with `gap`-wide alleys along the radial edges.
pub fn radial(
    store: &mut PointStore,
    poly: &Polygon,
    center: Option<DVec2>,
    gap: f64,
) -> Vec<Polygon> {
    if poly.len() < 3 {
        return Vec::new();
    }
    let c = center.unwrap_or_else(|| poly.centroid(store));
    let cid = store.alloc(c);
    let mut sectors = Vec::with_capacity(poly.len());
    for (v0, v1) in poly.edges() {
        let mut sector = Polygon::new(vec![cid, v0, v1]);
        if gap > 0.0 {
            sector = sector.shrink(store, &[gap / 2.0, 0.0, gap / 2.0]);
        }
        if sector.len() >= 3 {
            sectors.push(sector);
        }
    }
    sectors
}

/// Radial fan anchored on the vertex nearest the centroid instead of an
/// interior point; edges already touching that vertex get no alley.
pub fn semi_radial(store: &mut PointStore, poly: &Polygon, gap: f64) -> Vec<Polygon> {
    if poly.len() < 3 {
        return Vec::new();
    }
    let centroid = poly.centroid(store);
    let Some(center) = poly.min_vertex(store, |p| p.distance(centroid)) else {
        return Vec::new();
    };
    let half_gap = gap / 2.0;
    let mut sectors = Vec::new();
    for (v0, v1) in poly.edges() {
        if v0 == center || v1 == center {
            continue;
        }
        let mut sector = Polygon::new(vec![center, v0, v1]);
        if half_gap > 0.0 {
            let d = [
                if poly.find_edge(center, v0).is_none() {
                    half_gap
                } else {
                    0.0
                },
                0.0,
                if poly.find_edge(v1, center).is_none() {
                    half_gap
                } else {
                    0.0
                },
            ];
            sector = sector.shrink(store, &d);
        }
        if sector.len() >= 3 {
            sectors.push(sector);
        }
    }
    sectors
}

/// Peels a `thickness`-deep slice off every edge, shortest edges first,
/// leaving the middle open. The slices are the ring pieces.
pub fn ring(store: &mut PointStore, poly: &Polygon, thickness: f64) -> Vec<Polygon> {
    if poly.len() < 3 {
        return Vec::new();
    }
    let inward_sign = if poly.square(store) >= 0.0 { 1.0 } else { -1.0 };
    let mut slices: Vec<(DVec2, DVec2, f64)> = poly
        .edges()
        .map(|(v0, v1)| {
            let a = store.pos(v0);
            let b = store.pos(v1);
            let n = (b - a).perp().normalize_or_zero() * inward_sign * thickness;
            (a + n, b + n, a.distance(b))
        })
        .collect();
    slices.sort_by(|s1, s2| s1.2.total_cmp(&s2.2));

    let mut peel = Vec::new();
    let mut remainder = poly.clone();
    for (p1, p2, _) in slices {
        if remainder.len() < 3 {
            break;
        }
        let halves = remainder.cut(store, p1, p2, 0.0);
        if halves.len() != 2 {
            continue;
        }
        let inward = (p2 - p1).perp().normalize_or_zero() * inward_sign;
        // The slice lies on the outer side of the offset line.
        let (inner, outer) = {
            let side0 = (halves[0].centroid(store) - p1).dot(inward);
            if side0 > 0.0 {
                (halves[0].clone(), halves[1].clone())
            } else {
                (halves[1].clone(), halves[0].clone())
            }
        };
        if outer.len() >= 3 {
            peel.push(outer);
        }
        remainder = inner;
    }
    peel
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(store: &mut PointStore, side: f64) -> Polygon {
        Polygon::from_points(
            store,
            &[
                DVec2::new(0.0, 0.0),
                DVec2::new(side, 0.0),
                DVec2::new(side, side),
                DVec2::new(0.0, side),
            ],
        )
    }

    #[test]
    fn test_bisect_splits_in_two() {
        let mut store = PointStore::new();
        let sq = square(&mut store, 10.0);
        let anchor = sq.verts()[0];
        let halves = bisect(&mut store, &sq, anchor, 0.5, 0.0, 0.0);
        assert_eq!(halves.len(), 2);
        let total: f64 = halves.iter().map(|h| h.square(&store).abs()).sum();
        assert!((total - 100.0).abs() < 1.0);
    }

    #[test]
    fn test_bisect_gap_removes_area() {
        let mut store = PointStore::new();
        let sq = square(&mut store, 10.0);
        let anchor = sq.verts()[0];
        let halves = bisect(&mut store, &sq, anchor, 0.5, 0.0, 1.0);
        assert_eq!(halves.len(), 2);
        let total: f64 = halves.iter().map(|h| h.square(&store).abs()).sum();
        assert!(total < 100.0);
    }

    #[test]
    fn test_radial_covers_polygon() {
        let mut store = PointStore::new();
        let hex = Polygon::regular(&mut store, 6, 10.0);
        let sectors = radial(&mut store, &hex, None, 0.0);
        assert_eq!(sectors.len(), 6);
        let total: f64 = sectors.iter().map(|s| s.square(&store).abs()).sum();
        assert!((total - hex.square(&store).abs()).abs() < 1e-6);
    }

    #[test]
    fn test_radial_with_gap_shrinks_sectors() {
        let mut store = PointStore::new();
        let hex = Polygon::regular(&mut store, 6, 10.0);
        let sectors = radial(&mut store, &hex, None, 1.0);
        assert!(!sectors.is_empty());
        let total: f64 = sectors.iter().map(|s| s.square(&store).abs()).sum();
        assert!(total < hex.square(&store).abs());
    }

    #[test]
    fn test_semi_radial_skips_center_vertex_edges() {
        let mut store = PointStore::new();
        let hex = Polygon::regular(&mut store, 6, 10.0);
        let sectors = semi_radial(&mut store, &hex, 0.0);
        // Two of the six edges touch the anchor vertex.
        assert_eq!(sectors.len(), 4);
    }

    #[test]
    fn test_ring_leaves_open_middle() {
        let mut store = PointStore::new();
        let sq = square(&mut store, 20.0);
        let slices = ring(&mut store, &sq, 2.0);
        assert!(!slices.is_empty());
        let total: f64 = slices.iter().map(|s| s.square(&store).abs()).sum();
        // The ring covers the border but not the courtyard.
        assert!(total < 400.0);
        assert!(total > 0.0);
    }
}
