//! Street routing graph over patch boundary vertices
//!
//! One node per distinct vertex handle on any patch boundary, edges
//! weighted by Euclidean length. Nodes are split into an inner set (city
//! patches) and an outer set (countryside); wall circumference vertices
//! belong to neither, which is what lets a gate join the two sides.

use ahash::{AHashMap, AHashSet};
use glam::DVec2;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::geom::{PointId, PointStore};
use crate::town::model::Model;

pub type NodeId = usize;

/// Undirected weighted graph with A* search.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    links: Vec<AHashMap<NodeId, f64>>,
    pos: Vec<DVec2>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pos: DVec2) -> NodeId {
        self.links.push(AHashMap::new());
        self.pos.push(pos);
        self.links.len() - 1
    }

    pub fn link(&mut self, a: NodeId, b: NodeId, weight: f64) {
        self.links[a].insert(b, weight);
        self.links[b].insert(a, weight);
    }

    pub fn node_count(&self) -> usize {
        self.links.len()
    }

    pub fn pos(&self, n: NodeId) -> DVec2 {
        self.pos[n]
    }

    /// A* with a Euclidean heuristic. Excluded nodes are never expanded or
    /// entered (the start is always expandable). Returns the start-to-goal
    /// node list, or `None` when the goal is unreachable.
    pub fn a_star(
        &self,
        start: NodeId,
        goal: NodeId,
        exclude: &AHashSet<NodeId>,
    ) -> Option<Vec<NodeId>> {
        if start == goal {
            return Some(vec![start]);
        }
        let goal_pos = self.pos[goal];
        let mut open: BinaryHeap<Reverse<(OrderedFloat<f64>, NodeId)>> = BinaryHeap::new();
        let mut g_score: AHashMap<NodeId, f64> = AHashMap::new();
        let mut came_from: AHashMap<NodeId, NodeId> = AHashMap::new();
        let mut closed: AHashSet<NodeId> = AHashSet::new();

        g_score.insert(start, 0.0);
        open.push(Reverse((OrderedFloat(self.pos[start].distance(goal_pos)), start)));

        while let Some(Reverse((_, current))) = open.pop() {
            if current == goal {
                let mut path = vec![current];
                let mut at = current;
                while let Some(&prev) = came_from.get(&at) {
                    path.push(prev);
                    at = prev;
                }
                path.reverse();
                return Some(path);
            }
            if !closed.insert(current) {
                continue;
            }
            let current_g = g_score.get(&current).copied().unwrap_or(f64::INFINITY);
            for (&next, &weight) in &self.links[current] {
                if closed.contains(&next) || (exclude.contains(&next) && next != goal) {
                    continue;
                }
                let tentative = current_g + weight;
                if tentative < g_score.get(&next).copied().unwrap_or(f64::INFINITY) {
                    g_score.insert(next, tentative);
                    came_from.insert(next, current);
                    let f = tentative + self.pos[next].distance(goal_pos);
                    open.push(Reverse((OrderedFloat(f), next)));
                }
            }
        }
        None
    }
}

/// Vertex graph of a concrete model, with the inner/outer split used to
/// keep streets inside the walls and roads outside them.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub graph: Graph,
    pt2node: AHashMap<PointId, NodeId>,
    node2pt: Vec<PointId>,
    pub inner: AHashSet<NodeId>,
    pub outer: AHashSet<NodeId>,
}

impl Topology {
    /// Builds the routing graph from every patch boundary. Citadel
    /// vertices (except gates) are blocked outright so no street can
    /// tunnel through the castle grounds.
    pub fn from_model(model: &Model) -> Self {
        let mut topo = Topology::default();

        let mut blocked: AHashSet<PointId> = AHashSet::new();
        if let Some(cid) = model.citadel {
            if let Some(citadel) = model.find_patch(cid) {
                blocked.extend(citadel.shape.verts().iter().copied());
            }
        }
        for &gate in &model.gates {
            blocked.remove(&gate);
        }

        let border_shape = model.border.as_ref().map(|b| b.shape.clone());
        let on_border =
            |v: PointId| border_shape.as_ref().map_or(false, |shape| shape.contains(v));

        for patch in &model.patches {
            let n = patch.shape.len();
            if n < 2 {
                continue;
            }
            for i in 0..n {
                let v0 = patch.shape.verts()[i];
                let v1 = patch.shape.verts()[(i + 1) % n];
                let n0 = topo.process_point(&model.store, &blocked, v0);
                let n1 = topo.process_point(&model.store, &blocked, v1);

                for (node, v) in [(n0, v0), (n1, v1)] {
                    if let Some(node) = node {
                        if !on_border(v) {
                            if patch.within_city {
                                topo.inner.insert(node);
                            } else {
                                topo.outer.insert(node);
                            }
                        }
                    }
                }
                if let (Some(a), Some(b)) = (n0, n1) {
                    let w = model.store.pos(v0).distance(model.store.pos(v1));
                    topo.graph.link(a, b, w);
                }
            }
        }
        topo
    }

    fn process_point(
        &mut self,
        store: &PointStore,
        blocked: &AHashSet<PointId>,
        v: PointId,
    ) -> Option<NodeId> {
        if blocked.contains(&v) {
            return None;
        }
        let node = match self.pt2node.get(&v) {
            Some(&n) => n,
            None => {
                let n = self.graph.add(store.pos(v));
                self.pt2node.insert(v, n);
                self.node2pt.push(v);
                n
            }
        };
        Some(node)
    }

    pub fn node_of(&self, v: PointId) -> Option<NodeId> {
        self.pt2node.get(&v).copied()
    }

    /// Vertex handle whose node position is nearest to `target`.
    pub fn nearest_vertex(&self, target: DVec2) -> Option<PointId> {
        (0..self.node2pt.len())
            .min_by(|&a, &b| {
                self.graph
                    .pos(a)
                    .distance(target)
                    .total_cmp(&self.graph.pos(b).distance(target))
            })
            .map(|n| self.node2pt[n])
    }

    /// Shortest vertex path from `from` to `to` avoiding `exclude` nodes.
    /// Returns `None` when either endpoint has no node or no route exists.
    pub fn build_path(
        &self,
        from: PointId,
        to: PointId,
        exclude: &AHashSet<NodeId>,
    ) -> Option<Vec<PointId>> {
        let start = self.node_of(from)?;
        let goal = self.node_of(to)?;
        let nodes = self.graph.a_star(start, goal, exclude)?;
        Some(nodes.into_iter().map(|n| self.node2pt[n]).collect())
    }
}
