//! Polygons over shared vertex handles
//!
//! A polygon is an ordered, closed ring of [`PointId`]s (streets reuse the
//! same type as open polylines). Winding is meaningful: counter-clockwise
//! rings have positive signed area and their interior lies to the left of
//! each edge. Operations that need coordinates take the [`PointStore`];
//! operations that create vertices take it mutably.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::point::{PointId, PointStore};

const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon {
    verts: Vec<PointId>,
}

/// Intersection of two parameterized lines `p1 + t1*d1` and `p2 + t2*d2`.
pub fn intersect_lines(p1: DVec2, d1: DVec2, p2: DVec2, d2: DVec2) -> Option<(f64, f64)> {
    let denom = d1.perp_dot(d2);
    if denom.abs() < EPS {
        return None;
    }
    let diff = p2 - p1;
    let t1 = diff.perp_dot(d2) / denom;
    let t2 = diff.perp_dot(d1) / denom;
    Some((t1, t2))
}

/// Perpendicular distance from `p` to the line through `origin` along `dir`.
pub fn distance_to_line(origin: DVec2, dir: DVec2, p: DVec2) -> f64 {
    let len = dir.length();
    if len < EPS {
        return origin.distance(p);
    }
    ((p - origin).perp_dot(dir) / len).abs()
}

impl Polygon {
    pub fn new(verts: Vec<PointId>) -> Self {
        Self { verts }
    }

    /// Allocate fresh points for every coordinate and ring them up.
    pub fn from_points(store: &mut PointStore, pts: &[DVec2]) -> Self {
        Self {
            verts: pts.iter().map(|&p| store.alloc(p)).collect(),
        }
    }

    /// Axis-aligned rectangle centered on the origin, counter-clockwise.
    pub fn rect(store: &mut PointStore, w: f64, h: f64) -> Self {
        let (hw, hh) = (w / 2.0, h / 2.0);
        Self::from_points(
            store,
            &[
                DVec2::new(-hw, -hh),
                DVec2::new(hw, -hh),
                DVec2::new(hw, hh),
                DVec2::new(-hw, hh),
            ],
        )
    }

    /// Regular n-gon of radius `r` centered on the origin.
    pub fn regular(store: &mut PointStore, n: usize, r: f64) -> Self {
        let pts: Vec<DVec2> = (0..n)
            .map(|i| {
                let a = i as f64 / n as f64 * std::f64::consts::TAU;
                DVec2::new(a.cos() * r, a.sin() * r)
            })
            .collect();
        Self::from_points(store, &pts)
    }

    /// 16-gon circle approximation of radius `r`.
    pub fn circle(store: &mut PointStore, r: f64) -> Self {
        Self::regular(store, 16, r)
    }

    pub fn verts(&self) -> &[PointId] {
        &self.verts
    }

    pub fn len(&self) -> usize {
        self.verts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verts.is_empty()
    }

    pub fn first(&self) -> Option<PointId> {
        self.verts.first().copied()
    }

    pub fn last(&self) -> Option<PointId> {
        self.verts.last().copied()
    }

    pub fn push(&mut self, v: PointId) {
        self.verts.push(v);
    }

    pub fn insert_front(&mut self, v: PointId) {
        self.verts.insert(0, v);
    }

    /// Identity containment: does this ring hold the handle itself?
    pub fn contains(&self, v: PointId) -> bool {
        self.verts.contains(&v)
    }

    pub fn index_of(&self, v: PointId) -> Option<usize> {
        self.verts.iter().position(|&x| x == v)
    }

    pub fn next(&self, v: PointId) -> Option<PointId> {
        self.index_of(v)
            .map(|i| self.verts[(i + 1) % self.verts.len()])
    }

    pub fn prev(&self, v: PointId) -> Option<PointId> {
        self.index_of(v)
            .map(|i| self.verts[(i + self.verts.len() - 1) % self.verts.len()])
    }

    /// Replace the first occurrence of `from` with `to`.
    pub fn replace(&mut self, from: PointId, to: PointId) -> bool {
        match self.index_of(from) {
            Some(i) => {
                self.verts[i] = to;
                true
            }
            None => false,
        }
    }

    /// Remove the first occurrence of `v`.
    pub fn remove_vertex(&mut self, v: PointId) -> bool {
        match self.index_of(v) {
            Some(i) => {
                self.verts.remove(i);
                true
            }
            None => false,
        }
    }

    /// Drop repeated handles, keeping first occurrences in ring order.
    pub fn dedup_vertices(&mut self) {
        let mut seen = Vec::with_capacity(self.verts.len());
        self.verts.retain(|v| {
            if seen.contains(v) {
                false
            } else {
                seen.push(*v);
                true
            }
        });
    }

    pub fn positions<'a>(&'a self, store: &'a PointStore) -> impl Iterator<Item = DVec2> + 'a {
        self.verts.iter().map(move |&v| store.pos(v))
    }

    /// Directed edges as handle pairs, wrapping around the ring.
    pub fn edges(&self) -> impl Iterator<Item = (PointId, PointId)> + '_ {
        let n = self.verts.len();
        (0..n).map(move |i| (self.verts[i], self.verts[(i + 1) % n]))
    }

    /// Index of the directed edge `a -> b`, if present.
    pub fn find_edge(&self, a: PointId, b: PointId) -> Option<usize> {
        let n = self.verts.len();
        (0..n).find(|&i| self.verts[i] == a && self.verts[(i + 1) % n] == b)
    }

    /// Two polygons border iff one holds some edge of the other reversed.
    pub fn borders(&self, other: &Polygon) -> bool {
        self.edges().any(|(a, b)| other.find_edge(b, a).is_some())
    }

    /// Signed area; counter-clockwise rings are positive.
    pub fn square(&self, store: &PointStore) -> f64 {
        let n = self.verts.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            let a = store.pos(self.verts[i]);
            let b = store.pos(self.verts[(i + 1) % n]);
            sum += a.perp_dot(b);
        }
        sum / 2.0
    }

    pub fn perimeter(&self, store: &PointStore) -> f64 {
        let n = self.verts.len();
        (0..n)
            .map(|i| {
                store
                    .pos(self.verts[i])
                    .distance(store.pos(self.verts[(i + 1) % n]))
            })
            .sum()
    }

    /// Isoperimetric ratio 4*pi*A / P^2; a circle scores about 1.
    pub fn compactness(&self, store: &PointStore) -> f64 {
        let p = self.perimeter(store);
        if p < EPS {
            return 0.0;
        }
        4.0 * std::f64::consts::PI * self.square(store).abs() / (p * p)
    }

    /// Plain vertex average.
    pub fn center(&self, store: &PointStore) -> DVec2 {
        if self.verts.is_empty() {
            return DVec2::ZERO;
        }
        self.positions(store).sum::<DVec2>() / self.verts.len() as f64
    }

    /// Area-weighted centroid; falls back to the vertex average for
    /// degenerate rings.
    pub fn centroid(&self, store: &PointStore) -> DVec2 {
        let a = self.square(store);
        if a.abs() < EPS {
            return self.center(store);
        }
        let n = self.verts.len();
        let mut c = DVec2::ZERO;
        for i in 0..n {
            let p = store.pos(self.verts[i]);
            let q = store.pos(self.verts[(i + 1) % n]);
            c += (p + q) * p.perp_dot(q);
        }
        c / (6.0 * a)
    }

    /// Distance from `p` to the nearest vertex.
    pub fn distance(&self, store: &PointStore, p: DVec2) -> f64 {
        self.positions(store)
            .map(|v| v.distance(p))
            .fold(f64::INFINITY, f64::min)
    }

    /// Vertex minimizing `key` over its position.
    pub fn min_vertex(&self, store: &PointStore, key: impl Fn(DVec2) -> f64) -> Option<PointId> {
        self.verts
            .iter()
            .copied()
            .min_by(|&a, &b| key(store.pos(a)).total_cmp(&key(store.pos(b))))
    }

    /// Vertex maximizing `key` over its handle and position.
    pub fn max_vertex_by(
        &self,
        store: &PointStore,
        key: impl Fn(PointId, DVec2) -> f64,
    ) -> Option<PointId> {
        self.verts
            .iter()
            .copied()
            .max_by(|&a, &b| key(a, store.pos(a)).total_cmp(&key(b, store.pos(b))))
    }

    /// Index of the longest edge.
    pub fn longest_edge(&self, store: &PointStore) -> Option<usize> {
        let n = self.verts.len();
        if n < 2 {
            return None;
        }
        (0..n).max_by(|&i, &j| {
            let li = store
                .pos(self.verts[i])
                .distance(store.pos(self.verts[(i + 1) % n]));
            let lj = store
                .pos(self.verts[j])
                .distance(store.pos(self.verts[(j + 1) % n]));
            li.total_cmp(&lj)
        })
    }

    pub fn is_convex(&self, store: &PointStore) -> bool {
        let n = self.verts.len();
        if n < 4 {
            return true;
        }
        let mut sign = 0.0f64;
        for i in 0..n {
            let a = store.pos(self.verts[i]);
            let b = store.pos(self.verts[(i + 1) % n]);
            let c = store.pos(self.verts[(i + 2) % n]);
            let cross = (b - a).perp_dot(c - b);
            if cross.abs() < EPS {
                continue;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    /// Blend `v` toward the midpoint of its ring neighbours.
    /// `factor` 0 leaves the vertex alone, 1 moves it to the midpoint.
    pub fn smooth_vertex(&self, store: &PointStore, v: PointId, factor: f64) -> DVec2 {
        let (Some(p), Some(n)) = (self.prev(v), self.next(v)) else {
            return store.pos(v);
        };
        let mid = (store.pos(p) + store.pos(n)) / 2.0;
        store.pos(v).lerp(mid, factor)
    }

    /// Smoothed position for every vertex, computed from one snapshot.
    pub fn smoothed_with(&self, store: &PointStore, factor: f64) -> Vec<DVec2> {
        let n = self.verts.len();
        (0..n)
            .map(|i| {
                let prev = store.pos(self.verts[(i + n - 1) % n]);
                let cur = store.pos(self.verts[i]);
                let next = store.pos(self.verts[(i + 1) % n]);
                cur.lerp((prev + next) / 2.0, factor)
            })
            .collect()
    }

    /// Inverse-distance weights of `p` against every vertex, normalized.
    pub fn interpolate(&self, store: &PointStore, p: DVec2) -> Vec<f64> {
        let raw: Vec<f64> = self
            .positions(store)
            .map(|v| 1.0 / v.distance(p).max(EPS))
            .collect();
        let sum: f64 = raw.iter().sum();
        raw.into_iter().map(|w| w / sum).collect()
    }

    /// Split along the chord between two existing vertices. Both halves
    /// share `a` and `b`; each keeps the ring winding.
    pub fn split(&self, a: PointId, b: PointId) -> Option<[Polygon; 2]> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        if ia == ib {
            return None;
        }
        let n = self.verts.len();
        let walk = |from: usize, to: usize| {
            let mut out = Vec::new();
            let mut k = from;
            loop {
                out.push(self.verts[k]);
                if k == to {
                    break;
                }
                k = (k + 1) % n;
            }
            Polygon::new(out)
        };
        Some([walk(ia, ib), walk(ib, ia)])
    }

    /// Cut with the infinite line through `p1` and `p2`. Exactly two edge
    /// crossings produce two halves (with `gap` they are peeled back from
    /// the cut line by `gap / 2` each); anything else returns the polygon
    /// unchanged.
    pub fn cut(&self, store: &mut PointStore, p1: DVec2, p2: DVec2, gap: f64) -> Vec<Polygon> {
        let d1 = p2 - p1;
        let n = self.verts.len();
        let mut hits: Vec<(usize, f64)> = Vec::new();
        for i in 0..n {
            let a = store.pos(self.verts[i]);
            let b = store.pos(self.verts[(i + 1) % n]);
            if let Some((_, t2)) = intersect_lines(p1, d1, a, b - a) {
                if (0.0..1.0).contains(&t2) {
                    hits.push((i, t2));
                }
            }
        }
        if hits.len() != 2 {
            return vec![self.clone()];
        }
        let (e1, t1) = hits[0];
        let (e2, t2) = hits[1];
        let q1 = {
            let a = store.pos(self.verts[e1]);
            let b = store.pos(self.verts[(e1 + 1) % n]);
            store.alloc(a.lerp(b, t1))
        };
        let q2 = {
            let a = store.pos(self.verts[e2]);
            let b = store.pos(self.verts[(e2 + 1) % n]);
            store.alloc(a.lerp(b, t2))
        };

        let mut half1 = vec![q1];
        let mut k = (e1 + 1) % n;
        loop {
            half1.push(self.verts[k]);
            if k == e2 {
                break;
            }
            k = (k + 1) % n;
        }
        half1.push(q2);

        let mut half2 = vec![q2];
        let mut k = (e2 + 1) % n;
        loop {
            half2.push(self.verts[k]);
            if k == e1 {
                break;
            }
            k = (k + 1) % n;
        }
        half2.push(q1);

        let mut halves = vec![Polygon::new(half1), Polygon::new(half2)];
        if gap > 0.0 {
            halves = halves
                .into_iter()
                .map(|h| {
                    // The cut runs along each half's closing edge.
                    match h.last() {
                        Some(last) => h.peel(store, last, gap / 2.0),
                        None => h,
                    }
                })
                .collect();
        }
        halves
    }

    fn inward_normal(&self, store: &PointStore, dir: DVec2) -> DVec2 {
        let sign = if self.square(store) >= 0.0 { 1.0 } else { -1.0 };
        dir.perp().normalize_or_zero() * sign
    }

    /// Inward offset, one distance per edge, applied as successive line
    /// cuts. A distance large enough to consume the polygon yields an
    /// empty polygon.
    pub fn shrink(&self, store: &mut PointStore, d: &[f64]) -> Polygon {
        let mut q = self.clone();
        let n = self.verts.len();
        for i in 0..n.min(d.len()) {
            let dd = d[i];
            if dd <= 0.0 {
                continue;
            }
            if q.len() < 3 {
                return Polygon::default();
            }
            let a = store.pos(self.verts[i]);
            let b = store.pos(self.verts[(i + 1) % n]);
            let normal = self.inward_normal(store, b - a);
            if normal == DVec2::ZERO {
                continue;
            }
            let la = a + normal * dd;
            let lb = b + normal * dd;
            let halves = q.cut(store, la, lb, 0.0);
            q = Self::keep_inner(halves, store, la, normal);
        }
        q
    }

    pub fn shrink_uniform(&self, store: &mut PointStore, d: f64) -> Polygon {
        let dists = vec![d; self.verts.len()];
        self.shrink(store, &dists)
    }

    /// Shrink only the edge starting at `v`.
    pub fn peel(&self, store: &mut PointStore, v: PointId, d: f64) -> Polygon {
        let mut dists = vec![0.0; self.verts.len()];
        match self.index_of(v) {
            Some(i) => {
                dists[i] = d;
                self.shrink(store, &dists)
            }
            None => self.clone(),
        }
    }

    fn keep_inner(halves: Vec<Polygon>, store: &PointStore, on_line: DVec2, inward: DVec2) -> Polygon {
        for h in halves {
            if h.len() >= 3 && (h.centroid(store) - on_line).dot(inward) > 0.0 {
                return h;
            }
        }
        Polygon::default()
    }

    /// Inward offset by miter-joining the shifted edge lines. Rougher than
    /// `shrink` but tolerant of concave rings; negative distances expand.
    pub fn buffer(&self, store: &mut PointStore, d: &[f64]) -> Polygon {
        let n = self.verts.len();
        if n < 3 || d.len() < n {
            return self.clone();
        }
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let prev = store.pos(self.verts[(i + n - 1) % n]);
            let cur = store.pos(self.verts[i]);
            let next = store.pos(self.verts[(i + 1) % n]);
            let d_prev = d[(i + n - 1) % n];
            let d_cur = d[i];
            let e0 = cur - prev;
            let e1 = next - cur;
            let n0 = self.inward_normal(store, e0) * d_prev;
            let n1 = self.inward_normal(store, e1) * d_cur;
            let p = match intersect_lines(prev + n0, e0, cur + n1, e1) {
                Some((t, _)) => prev + n0 + e0 * t,
                None => cur + (n0 + n1) / 2.0,
            };
            out.push(p);
        }
        Polygon::from_points(store, &out)
    }

    /// Rotate every vertex around the origin. Only sound for polygons whose
    /// points are not shared with anything else (factory shapes).
    pub fn rotate(&self, store: &mut PointStore, angle: f64) {
        let (sin, cos) = angle.sin_cos();
        for &v in &self.verts {
            let p = store.pos(v);
            store.set(v, DVec2::new(p.x * cos - p.y * sin, p.x * sin + p.y * cos));
        }
    }

    /// Translate every vertex. Same sharing caveat as [`Polygon::rotate`].
    pub fn translate(&self, store: &mut PointStore, delta: DVec2) {
        for &v in &self.verts {
            let p = store.pos(v);
            store.set(v, p + delta);
        }
    }
}
