//! Space-connectivity topology graph: nodes are spaces plus one exterior sentinel, edges
//! carry the openings that join them and a resistance-style weight. Centrality, repair, and
//! the read-only queries built on top all live here.

use crate::opening::{DoorState, Opening, OpeningId, OpeningType};
use crate::space::{Space, SpaceId};
use fxhash::FxHashMap;
use petgraph::algo::all_simple_paths;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Sentinel ID for the node representing the outside world.
pub use crate::space::EXTERIOR_ID;

/// A node in the topology graph: either one of the detected spaces, or the exterior.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Space(SpaceId),
    Exterior,
}

/// Edge data for one adjacency connection (possibly carrying several merged openings).
#[derive(Clone, Debug)]
pub struct EdgeData {
    pub openings: Vec<OpeningId>,
    pub opening_types: Vec<OpeningType>,
    pub count: usize,
    pub weight: f64,
    pub is_repair: bool,
}

/// Per-node centrality metrics, computed once at build time.
#[derive(Clone, Copy, Debug, Default)]
pub struct Centrality {
    pub betweenness: f64,
    pub closeness: f64,
    pub degree: f64,
    pub centrality_score: f64,
}

/// One path from a space to the exterior.
#[derive(Clone, Debug)]
pub struct ExteriorPath {
    pub route: Vec<SpaceId>,
    pub via: Vec<OpeningId>,
    pub weight: f64,
    pub length: usize,
}

/// Per-space connectivity summary built from [`TopologyGraph::shortest_path_to_exterior`].
#[derive(Clone, Debug)]
pub struct ConnectivitySummary {
    pub min_weight: f64,
    pub avg_layers: f64,
    pub num_paths: usize,
    pub has_path_to_exterior: bool,
}

/// One simple path from a space to the exterior, as enumerated by
/// [`TopologyGraph::simple_paths_to_exterior`] for the ACH calculator. Distinct from
/// [`ExteriorPath`], which enumerates only *shortest* paths.
#[derive(Clone, Debug)]
pub struct SimplePath {
    pub route: Vec<SpaceId>,
    pub via: Vec<OpeningId>,
    pub weight: f64,
    pub length: usize,
    pub total_opening_area: f64,
    /// True if every edge on this path is a repair edge — i.e. the path exists only because
    /// the repair pass forced reachability, not because any real opening connects it. The ACH
    /// calculator treats such a path as equivalent to no path at all.
    pub is_repair: bool,
}

/// The space-adjacency topology graph.
pub struct TopologyGraph {
    graph: UnGraph<NodeKind, EdgeData>,
    node_index: FxHashMap<String, NodeIndex>,
    exterior: NodeIndex,
    centrality: FxHashMap<NodeIndex, Centrality>,
}

impl TopologyGraph {
    /// Builds the graph from detected spaces and openings, computes centrality, and repairs
    /// any component that cannot otherwise reach the exterior.
    pub fn build(spaces: &[Space], openings: &[Opening]) -> Self {
        log::info!("building space topology graph");
        let mut graph = UnGraph::new_undirected();
        let mut node_index = FxHashMap::default();

        for space in spaces {
            let idx = graph.add_node(NodeKind::Space(space.id.clone()));
            node_index.insert(space.id.0.clone(), idx);
        }
        let exterior = graph.add_node(NodeKind::Exterior);
        node_index.insert(EXTERIOR_ID.to_string(), exterior);

        for opening in openings {
            let key_a = node_key(&opening.connects[0], &node_index);
            let key_b = node_key(&opening.connects[1], &node_index);
            let (Some(&a), Some(&b)) = (node_index.get(&key_a), node_index.get(&key_b)) else {
                continue;
            };
            let weight = if opening.area > 0.0 { 1.0 / opening.area } else { 10.0 };

            if let Some(edge) = graph.find_edge(a, b) {
                let data = graph.edge_weight_mut(edge).unwrap();
                data.openings.push(opening.id.clone());
                data.opening_types.push(opening.opening_type);
                data.count = data.openings.len();
                data.weight = data.weight.min(weight);
            } else {
                graph.add_edge(
                    a,
                    b,
                    EdgeData {
                        openings: vec![opening.id.clone()],
                        opening_types: vec![opening.opening_type],
                        count: 1,
                        weight,
                        is_repair: false,
                    },
                );
            }
        }

        let mut topo = Self {
            graph,
            node_index,
            exterior,
            centrality: FxHashMap::default(),
        };
        topo.repair_disconnected_components(spaces);
        topo.compute_centrality();
        topo
    }

    fn repair_disconnected_components(&mut self, spaces: &[Space]) {
        let components = connected_components(&self.graph);
        if components.len() <= 1 {
            return;
        }
        log::warn!("detected {} disconnected space groups, attempting repair", components.len());

        let exterior_component = components.iter().find(|c| c.contains(&self.exterior)).cloned();
        let Some(exterior_component) = exterior_component else {
            return;
        };

        for component in &components {
            if component == &exterior_component {
                continue;
            }
            let largest = component
                .iter()
                .filter_map(|&idx| match &self.graph[idx] {
                    NodeKind::Space(id) => spaces.iter().find(|s| &s.id == id).map(|s| (idx, s.volume)),
                    NodeKind::Exterior => None,
                })
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

            if let Some((idx, _)) = largest {
                log::warn!("adding repair connection to exterior");
                self.graph.add_edge(
                    idx,
                    self.exterior,
                    EdgeData {
                        openings: vec![OpeningId("repair_opening".into())],
                        opening_types: Vec::new(),
                        count: 1,
                        weight: 2.0,
                        is_repair: true,
                    },
                );
            }
        }
    }

    fn compute_centrality(&mut self) {
        let n = self.graph.node_count();
        let mut betweenness: FxHashMap<NodeIndex, f64> = FxHashMap::default();
        let mut closeness: FxHashMap<NodeIndex, f64> = FxHashMap::default();

        for node in self.graph.node_indices() {
            betweenness.entry(node).or_insert(0.0);
        }

        for s in self.graph.node_indices() {
            let (dist, sigma, pred, order) = dijkstra_with_predecessors(&self.graph, s);

            let reachable: Vec<NodeIndex> = order.iter().copied().filter(|&v| v != s).collect();
            let total_dist: f64 = reachable.iter().map(|v| dist[v]).sum();
            let reached = reachable.len();
            closeness.insert(
                s,
                if total_dist > 0.0 && n > 1 {
                    (reached as f64 / (n as f64 - 1.0)) * (reached as f64 / total_dist)
                } else {
                    0.0
                },
            );

            let mut delta: FxHashMap<NodeIndex, f64> = FxHashMap::default();
            for &v in &order {
                delta.entry(v).or_insert(0.0);
            }
            for &w in order.iter().rev() {
                let preds = pred.get(&w).cloned().unwrap_or_default();
                for v in preds {
                    let ratio = sigma[&v] / sigma[&w];
                    let contribution = ratio * (1.0 + delta[&w]);
                    *delta.get_mut(&v).unwrap() += contribution;
                }
                if w != s {
                    *betweenness.get_mut(&w).unwrap() += delta[&w];
                }
            }
        }

        // Brandes' algorithm double-counts undirected pairs.
        for v in betweenness.values_mut() {
            *v /= 2.0;
        }

        let max_betweenness = betweenness.values().cloned().fold(0.0_f64, f64::max).max(1.0);
        let max_closeness = closeness.values().cloned().fold(0.0_f64, f64::max).max(1.0);
        let max_degree = self
            .graph
            .node_indices()
            .map(|n| self.graph.edges(n).count() as f64)
            .fold(0.0_f64, f64::max)
            .max(1.0);

        for node in self.graph.node_indices() {
            let degree = self.graph.edges(node).count() as f64;
            let b = *betweenness.get(&node).unwrap_or(&0.0);
            let c = *closeness.get(&node).unwrap_or(&0.0);
            let score = 0.4 * (b / max_betweenness) + 0.4 * (c / max_closeness) + 0.2 * (degree / max_degree);
            self.centrality.insert(
                node,
                Centrality {
                    betweenness: b,
                    closeness: c,
                    degree,
                    centrality_score: score,
                },
            );
        }
    }

    fn node_for(&self, space: &SpaceId) -> Option<NodeIndex> {
        self.node_index.get(&space.0).copied()
    }

    pub fn centrality_of(&self, space: &SpaceId) -> Option<Centrality> {
        self.node_for(space).and_then(|n| self.centrality.get(&n)).copied()
    }

    /// Spaces that cannot reach the exterior by any path.
    pub fn isolated_spaces(&self) -> Vec<SpaceId> {
        let mut isolated = Vec::new();
        for node in self.graph.node_indices() {
            if node == self.exterior {
                continue;
            }
            if let NodeKind::Space(id) = &self.graph[node] {
                if !has_path(&self.graph, node, self.exterior) {
                    isolated.push(id.clone());
                }
            }
        }
        isolated.sort_by(|a, b| a.0.cmp(&b.0));
        isolated
    }

    /// All shortest-weight paths from `space` to the exterior (original_source's
    /// `find_path_to_exterior`, bounded to `max_paths`), sorted by ascending weight.
    pub fn shortest_path_to_exterior(&self, space: &SpaceId, max_paths: usize) -> Vec<ExteriorPath> {
        let Some(start) = self.node_for(space) else {
            return Vec::new();
        };
        let (dist, _sigma, pred, _order) = dijkstra_with_predecessors(&self.graph, start);
        let Some(&target_dist) = dist.get(&self.exterior) else {
            return Vec::new();
        };
        if !target_dist.is_finite() {
            return Vec::new();
        }

        let mut routes: Vec<Vec<NodeIndex>> = Vec::new();
        let mut stack = vec![vec![self.exterior]];
        while let Some(path) = stack.pop() {
            let head = *path.last().unwrap();
            if head == start {
                let mut route = path.clone();
                route.reverse();
                routes.push(route);
                if routes.len() >= max_paths * 4 {
                    break;
                }
                continue;
            }
            for &p in pred.get(&head).cloned().unwrap_or_default().iter() {
                let mut next = path.clone();
                next.push(p);
                stack.push(next);
            }
        }

        let mut paths: Vec<ExteriorPath> = routes
            .into_iter()
            .map(|route| {
                let mut weight = 0.0;
                let mut via = Vec::new();
                for w in route.windows(2) {
                    if let Some(edge) = self.graph.find_edge(w[0], w[1]) {
                        let data = &self.graph[edge];
                        weight += data.weight;
                        via.extend(data.openings.iter().cloned());
                    }
                }
                let space_route: Vec<SpaceId> = route
                    .iter()
                    .filter_map(|&n| match &self.graph[n] {
                        NodeKind::Space(id) => Some(id.clone()),
                        NodeKind::Exterior => None,
                    })
                    .collect();
                ExteriorPath {
                    route: space_route,
                    via,
                    weight,
                    length: route.len() - 1,
                }
            })
            .collect();

        paths.sort_by(|a, b| a.weight.partial_cmp(&b.weight).unwrap_or(Ordering::Equal));
        paths.truncate(max_paths);
        paths
    }

    /// Enumerates up to `max_paths` simple (not necessarily shortest) paths from `space` to
    /// the exterior with at most `cutoff` hops, sorted by ascending path weight — the ACH
    /// calculator's own path search (original_source's `_find_ventilation_paths`), distinct
    /// from [`Self::shortest_path_to_exterior`].
    pub fn simple_paths_to_exterior(&self, space: &SpaceId, cutoff: usize, max_paths: usize) -> Vec<SimplePath> {
        let Some(start) = self.node_for(space) else {
            return Vec::new();
        };
        if start == self.exterior {
            return Vec::new();
        }
        let max_intermediate = cutoff.saturating_sub(1);
        let routes: Vec<Vec<NodeIndex>> =
            all_simple_paths(&self.graph, start, self.exterior, 0, Some(max_intermediate)).collect();

        let mut paths: Vec<SimplePath> = routes
            .into_iter()
            .map(|route| {
                let mut weight = 0.0;
                let mut via = Vec::new();
                let mut total_opening_area = 0.0;
                let mut is_repair = true;
                for w in route.windows(2) {
                    if let Some(edge) = self.graph.find_edge(w[0], w[1]) {
                        let data = &self.graph[edge];
                        weight += data.weight;
                        let area_per_opening = if data.weight > 0.0 { 1.0 / data.weight } else { 1.0 };
                        total_opening_area += data.openings.len() as f64 * area_per_opening;
                        via.extend(data.openings.iter().cloned());
                        is_repair = is_repair && data.is_repair;
                    }
                }
                let length = route.len() - 1;
                let space_route: Vec<SpaceId> = route.iter().filter_map(|&n| self.node_label(n)).collect();
                SimplePath {
                    route: space_route,
                    via,
                    weight,
                    length,
                    total_opening_area,
                    is_repair,
                }
            })
            .collect();

        paths.sort_by(|a, b| a.weight.partial_cmp(&b.weight).unwrap_or(Ordering::Equal));
        paths.truncate(max_paths);
        paths
    }

    /// Per-space connectivity summary (original_source's `calculate_space_connectivity`).
    pub fn space_connectivity_summary(&self, space: &SpaceId) -> ConnectivitySummary {
        let paths = self.shortest_path_to_exterior(space, 3);
        if paths.is_empty() {
            return ConnectivitySummary {
                min_weight: f64::INFINITY,
                avg_layers: f64::INFINITY,
                num_paths: 0,
                has_path_to_exterior: false,
            };
        }
        let min_weight = paths[0].weight;
        let avg_layers = paths.iter().map(|p| p.length as f64).sum::<f64>() / paths.len() as f64;
        ConnectivitySummary {
            min_weight,
            avg_layers,
            num_paths: paths.len(),
            has_path_to_exterior: true,
        }
    }

    /// Top-10 edges by weighted edge betweenness centrality.
    pub fn critical_connections(&self) -> Vec<(SpaceId, SpaceId)> {
        let edge_betweenness = self.edge_betweenness();
        let mut edges: Vec<(EdgeIndex, f64)> = edge_betweenness.into_iter().collect();
        edges.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        edges.truncate(10);

        edges
            .into_iter()
            .filter_map(|(e, _)| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                let a = self.node_label(a)?;
                let b = self.node_label(b)?;
                Some((a, b))
            })
            .collect()
    }

    fn edge_betweenness(&self) -> FxHashMap<EdgeIndex, f64> {
        let mut result: FxHashMap<EdgeIndex, f64> = FxHashMap::default();
        for s in self.graph.node_indices() {
            let (_dist, sigma, pred, order) = dijkstra_with_predecessors(&self.graph, s);
            let mut delta: FxHashMap<NodeIndex, f64> = FxHashMap::default();
            for &v in &order {
                delta.entry(v).or_insert(0.0);
            }
            for &w in order.iter().rev() {
                for v in pred.get(&w).cloned().unwrap_or_default() {
                    let ratio = sigma[&v] / sigma[&w];
                    let contribution = ratio * (1.0 + delta[&w]);
                    *delta.get_mut(&v).unwrap() += contribution;
                    if let Some(edge) = self.graph.find_edge(v, w) {
                        *result.entry(edge).or_insert(0.0) += contribution;
                    }
                }
            }
        }
        for v in result.values_mut() {
            *v /= 2.0;
        }
        result
    }

    fn node_label(&self, node: NodeIndex) -> Option<SpaceId> {
        match &self.graph[node] {
            NodeKind::Space(id) => Some(id.clone()),
            NodeKind::Exterior => Some(SpaceId(EXTERIOR_ID.to_string())),
        }
    }

    /// `1 / (1 + delta_components)` after removing the top-3 critical edges and restoring
    /// them, per original_source's `evaluate_topology_resilience`.
    pub fn resilience_score(&self) -> f64 {
        let original = connected_components(&self.graph).len();
        let critical = self.critical_connections();

        let mut delta = 0i64;
        for (a, b) in critical.iter().take(3) {
            let (Some(na), Some(nb)) = (self.node_index.get(&a.0), self.node_index.get(&b.0)) else {
                continue;
            };
            if let Some(edge) = self.graph.find_edge(*na, *nb) {
                let mut clone = self.graph.clone();
                clone.remove_edge(edge);
                let new_components = connected_components(&clone).len();
                delta += new_components as i64 - original as i64;
            }
        }
        1.0 / (1.0 + delta.max(0) as f64)
    }

    /// Top-`n` spaces by `centrality_score` (original_source's `find_important_spaces`,
    /// generalized from its hardcoded top-5).
    pub fn find_important_spaces(&self, n: usize) -> Vec<SpaceId> {
        let mut scored: Vec<(SpaceId, f64)> = self
            .graph
            .node_indices()
            .filter_map(|idx| match &self.graph[idx] {
                NodeKind::Space(id) => {
                    let score = self.centrality.get(&idx).map(|c| c.centrality_score).unwrap_or(0.0);
                    Some((id.clone(), score))
                }
                NodeKind::Exterior => None,
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.into_iter().take(n).map(|(id, _)| id).collect()
    }

    /// Returns a re-weighted copy of the graph where edges carrying a closed opening have
    /// their weight multiplied by 10 (original_source's `get_opening_status_graph`). This is
    /// distinct from the ACH calculator's opening-state override, which instead scales the
    /// output ACH value.
    pub fn with_opening_states(&self, states: &FxHashMap<OpeningId, DoorState>) -> Self {
        let mut graph = self.graph.clone();
        for edge in graph.edge_indices().collect::<Vec<_>>() {
            let data = graph.edge_weight_mut(edge).unwrap();
            let has_closed = data
                .openings
                .iter()
                .any(|id| matches!(states.get(id), Some(DoorState::Closed)));
            if has_closed {
                data.weight *= 10.0;
            }
        }
        Self {
            graph,
            node_index: self.node_index.clone(),
            exterior: self.exterior,
            centrality: self.centrality.clone(),
        }
    }

    /// Every directly-connected pair of non-exterior spaces, for the ACH calculator's
    /// adjacent-rate smoothing pass (original_source's `_validate_ach_rates`).
    pub fn adjacent_space_pairs(&self) -> Vec<(SpaceId, SpaceId)> {
        let mut pairs = Vec::new();
        for edge in self.graph.edge_indices() {
            let Some((a, b)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            if a == self.exterior || b == self.exterior {
                continue;
            }
            if let (Some(a), Some(b)) = (self.node_label(a), self.node_label(b)) {
                pairs.push((a, b));
            }
        }
        pairs
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

fn node_key(space_id: &SpaceId, node_index: &FxHashMap<String, NodeIndex>) -> String {
    if node_index.contains_key(&space_id.0) {
        space_id.0.clone()
    } else {
        EXTERIOR_ID.to_string()
    }
}

fn connected_components(graph: &UnGraph<NodeKind, EdgeData>) -> Vec<HashSet<NodeIndex>> {
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut components = Vec::new();
    for start in graph.node_indices() {
        if visited.contains(&start) {
            continue;
        }
        let mut component = HashSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if !component.insert(node) {
                continue;
            }
            visited.insert(node);
            for neighbor in graph.neighbors(node) {
                if !component.contains(&neighbor) {
                    stack.push(neighbor);
                }
            }
        }
        components.push(component);
    }
    components
}

fn has_path(graph: &UnGraph<NodeKind, EdgeData>, from: NodeIndex, to: NodeIndex) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![from];
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        for neighbor in graph.neighbors(node) {
            stack.push(neighbor);
        }
    }
    false
}

#[derive(Copy, Clone, PartialEq)]
struct MinFloat(f64, NodeIndex);

impl Eq for MinFloat {}
impl Ord for MinFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.partial_cmp(&self.0).unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for MinFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

type DijkstraResult = (
    FxHashMap<NodeIndex, f64>,
    FxHashMap<NodeIndex, f64>,
    FxHashMap<NodeIndex, Vec<NodeIndex>>,
    Vec<NodeIndex>,
);

/// Dijkstra from `source` returning distances, shortest-path counts (`sigma`), predecessor
/// lists, and nodes in non-decreasing distance (finish) order — the inputs Brandes'
/// algorithm needs for both node and edge betweenness.
fn dijkstra_with_predecessors(graph: &UnGraph<NodeKind, EdgeData>, source: NodeIndex) -> DijkstraResult {
    const EPS: f64 = 1e-9;
    let mut dist: FxHashMap<NodeIndex, f64> = FxHashMap::default();
    let mut sigma: FxHashMap<NodeIndex, f64> = FxHashMap::default();
    let mut pred: FxHashMap<NodeIndex, Vec<NodeIndex>> = FxHashMap::default();
    let mut order: Vec<NodeIndex> = Vec::new();
    let mut settled: HashSet<NodeIndex> = HashSet::new();

    for node in graph.node_indices() {
        dist.insert(node, f64::INFINITY);
        sigma.insert(node, 0.0);
    }
    dist.insert(source, 0.0);
    sigma.insert(source, 1.0);

    let mut heap = BinaryHeap::new();
    heap.push(MinFloat(0.0, source));

    while let Some(MinFloat(d, v)) = heap.pop() {
        if settled.contains(&v) {
            continue;
        }
        if d > dist[&v] + EPS {
            continue;
        }
        settled.insert(v);
        order.push(v);

        for edge in graph.edges(v) {
            let w = edge.target();
            let weight = edge.weight().weight;
            let candidate = dist[&v] + weight;
            if candidate < dist[&w] - EPS {
                dist.insert(w, candidate);
                sigma.insert(w, sigma[&v]);
                pred.insert(w, vec![v]);
                heap.push(MinFloat(candidate, w));
            } else if (candidate - dist[&w]).abs() <= EPS {
                *sigma.get_mut(&w).unwrap() += sigma[&v];
                pred.entry(w).or_default().push(v);
            }
        }
    }

    // Unreachable nodes still need a sigma entry so later iteration does not panic.
    for node in graph.node_indices() {
        pred.entry(node).or_default();
    }

    (dist, sigma, pred, order)
}
