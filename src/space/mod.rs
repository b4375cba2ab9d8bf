//! Enclosed-space detection: exterior removal, connected-component labelling, adjacency and
//! fragment merging.

use crate::config::SpaceDetectionConfig;
use crate::voxel::{OccupancyField, OccupancyMap, VoxelIndex};
use fxhash::{FxHashMap, FxHashSet};
use nalgebra::Vector3;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use std::collections::VecDeque;
use std::fmt;

/// Sentinel ID string for the node representing the outside world. Shared by the opening
/// detector (which substitutes it for the absent side of a grid-boundary opening) and the
/// topology builder (which re-exports it as [`crate::topology::EXTERIOR_ID`]).
pub const EXTERIOR_ID: &str = "space_exterior";

/// Stable identifier for one detected space (`space_000`, `space_001`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpaceId(pub String);

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a space is as originally detected or the product of merging fragments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpaceType {
    Unknown,
    Merged,
}

/// One enclosed interior space.
#[derive(Clone, Debug)]
pub struct Space {
    pub id: SpaceId,
    /// Base-resolution voxel indices belonging to this space.
    pub voxels: Vec<VoxelIndex>,
    pub volume: f64,
    pub centroid: Vector3<f64>,
    pub bbox_min: Vector3<f64>,
    pub bbox_max: Vector3<f64>,
    pub dimensions: Vector3<f64>,
    pub space_type: SpaceType,
    pub merged_from: Vec<SpaceId>,
}

/// An undirected adjacency relationship between two spaces.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AdjacencyEdge {
    pub a: SpaceId,
    pub b: SpaceId,
}

/// Detects enclosed spaces from an occupancy field: exterior removal by boundary-seeded
/// flood fill, connected-component labelling of the remaining interior, attribute
/// computation, adjacency detection, and (as a distinct follow-up step) fragment merging.
pub struct SpaceDetector {
    config: SpaceDetectionConfig,
}

impl SpaceDetector {
    pub fn new(config: SpaceDetectionConfig) -> Self {
        Self { config }
    }

    /// Runs exterior removal, component labelling, attribute computation and adjacency
    /// detection. Does not merge fragments; call [`Self::merge_fragmented_spaces`]
    /// afterwards if that is desired. Also returns the flood-filled exterior voxel set, which
    /// the opening detector needs to find grid-boundary (window) openings.
    pub fn detect_spaces(
        &self,
        field: &dyn OccupancyField,
    ) -> (Vec<Space>, Vec<AdjacencyEdge>, FxHashSet<VoxelIndex>) {
        let base = field.base_voxel_size();
        let shape = field.grid_shape();
        let occupancy = field.to_occupancy_map();

        log::info!("detecting enclosed spaces from occupancy field");
        let exterior = self.flood_fill_exterior(&occupancy, shape);
        log::info!("exterior flood fill visited {} voxels", exterior.len());

        let raw_components = self.label_interior_components(&occupancy, shape, &exterior);
        log::info!("found {} raw connected components", raw_components.len());

        let mut spaces: Vec<Space> = raw_components
            .into_iter()
            .filter(|voxels| {
                let volume = voxels.len() as f64 * base.powi(3);
                volume >= self.config.min_space_volume
            })
            .enumerate()
            .map(|(i, voxels)| self.build_space(i, voxels, field, base))
            .collect();
        spaces.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        log::info!("{} spaces retained after volume filter", spaces.len());

        let adjacency = self.detect_adjacency(&spaces, base);
        (spaces, adjacency, exterior)
    }

    fn flood_fill_exterior(
        &self,
        occupancy: &OccupancyMap,
        shape: (i64, i64, i64),
    ) -> FxHashSet<VoxelIndex> {
        let (nx, ny, nz) = shape;
        let is_empty = |idx: &VoxelIndex| !occupancy.contains_key(idx);

        let mut boundary_seeds: Vec<VoxelIndex> = Vec::new();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let on_boundary = i == 0 || j == 0 || k == 0 || i == nx - 1 || j == ny - 1 || k == nz - 1;
                    if on_boundary {
                        let idx = (i, j, k);
                        if is_empty(&idx) {
                            boundary_seeds.push(idx);
                        }
                    }
                }
            }
        }

        let seeds: Vec<VoxelIndex> = if boundary_seeds.len() > self.config.max_seed_points {
            let stride = boundary_seeds.len() / self.config.max_seed_points;
            boundary_seeds
                .into_iter()
                .step_by(stride.max(1))
                .collect()
        } else {
            boundary_seeds
        };

        let mut visited: FxHashSet<VoxelIndex> = FxHashSet::default();
        let mut queue: VecDeque<VoxelIndex> = VecDeque::new();
        for seed in seeds {
            if visited.insert(seed) {
                queue.push_back(seed);
            }
        }

        while let Some((i, j, k)) = queue.pop_front() {
            for (di, dj, dk) in NEIGHBOR_OFFSETS {
                let n = (i + di, j + dj, k + dk);
                if n.0 < 0 || n.1 < 0 || n.2 < 0 || n.0 >= nx || n.1 >= ny || n.2 >= nz {
                    continue;
                }
                if is_empty(&n) && visited.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        visited
    }

    fn label_interior_components(
        &self,
        occupancy: &OccupancyMap,
        shape: (i64, i64, i64),
        exterior: &FxHashSet<VoxelIndex>,
    ) -> Vec<Vec<VoxelIndex>> {
        let (nx, ny, nz) = shape;
        let is_interior_empty = |idx: &VoxelIndex| !occupancy.contains_key(idx) && !exterior.contains(idx);

        let mut labeled: FxHashSet<VoxelIndex> = FxHashSet::default();
        let mut components: Vec<Vec<VoxelIndex>> = Vec::new();

        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let start = (i, j, k);
                    if !is_interior_empty(&start) || labeled.contains(&start) {
                        continue;
                    }
                    let mut component = Vec::new();
                    let mut queue = VecDeque::new();
                    queue.push_back(start);
                    labeled.insert(start);
                    while let Some(cur) = queue.pop_front() {
                        component.push(cur);
                        for (di, dj, dk) in NEIGHBOR_OFFSETS {
                            let n = (cur.0 + di, cur.1 + dj, cur.2 + dk);
                            if n.0 < 0 || n.1 < 0 || n.2 < 0 || n.0 >= nx || n.1 >= ny || n.2 >= nz {
                                continue;
                            }
                            if is_interior_empty(&n) && labeled.insert(n) {
                                queue.push_back(n);
                            }
                        }
                    }
                    component.sort_unstable();
                    components.push(component);
                }
            }
        }
        components
    }

    fn build_space(
        &self,
        index: usize,
        voxels: Vec<VoxelIndex>,
        field: &dyn OccupancyField,
        base: f64,
    ) -> Space {
        let centers: Vec<Vector3<f64>> = voxels.iter().map(|&v| field.voxel_center(v)).collect();
        let min = centers.iter().fold(
            Vector3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            |acc, p| acc.inf(p),
        );
        let max = centers.iter().fold(
            Vector3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |acc, p| acc.sup(p),
        );
        let half = Vector3::new(base, base, base) * 0.5;
        let bbox_min = min - half;
        let bbox_max = max + half;
        let centroid: Vector3<f64> = centers.iter().sum::<Vector3<f64>>() / centers.len() as f64;
        let volume = voxels.len() as f64 * base.powi(3);

        Space {
            id: SpaceId(format!("space_{:03}", index)),
            voxels,
            volume,
            centroid,
            bbox_min,
            bbox_max,
            dimensions: bbox_max - bbox_min,
            space_type: SpaceType::Unknown,
            merged_from: Vec::new(),
        }
    }

    /// Detects adjacency between space pairs using a KD-tree over centroids to narrow
    /// candidates, then confirming with the exact minimum voxel-index distance between the
    /// pair, matching original_source's `_detect_space_adjacency`/`_check_spaces_adjacent`.
    fn detect_adjacency(&self, spaces: &[Space], base: f64) -> Vec<AdjacencyEdge> {
        if spaces.len() < 2 {
            return Vec::new();
        }
        let points: Vec<CentroidPoint> = spaces
            .iter()
            .enumerate()
            .map(|(i, s)| CentroidPoint {
                index: i,
                point: s.centroid,
            })
            .collect();
        let tree = RTree::bulk_load(points);

        let mut edges: Vec<AdjacencyEdge> = Vec::new();
        for (i, space) in spaces.iter().enumerate() {
            let search_radius = space.dimensions.x.max(space.dimensions.y).max(space.dimensions.z) + 2.0 * base;
            let query = [space.centroid.x, space.centroid.y, space.centroid.z];
            for candidate in tree.locate_within_distance(query, search_radius * search_radius) {
                if candidate.index <= i {
                    continue;
                }
                if spaces_are_adjacent(space, &spaces[candidate.index]) {
                    edges.push(AdjacencyEdge {
                        a: space.id.clone(),
                        b: spaces[candidate.index].id.clone(),
                    });
                }
            }
        }
        edges
    }

    /// Merges spaces whose estimated separation (centroid distance minus each space's half
    /// maximum extent) is within `space_merge_distance`, unioning their voxel sets and
    /// recomputing attributes. Connected components of the merge-candidate graph become
    /// single merged spaces; adjacency edges migrate from the merged sources to the new node.
    pub fn merge_fragmented_spaces(
        &self,
        spaces: Vec<Space>,
        adjacency: Vec<AdjacencyEdge>,
        field: &dyn OccupancyField,
    ) -> (Vec<Space>, Vec<AdjacencyEdge>) {
        if spaces.len() < 2 {
            return (spaces, adjacency);
        }
        let base = field.base_voxel_size();

        let mut merge_edges: Vec<(usize, usize)> = Vec::new();
        for i in 0..spaces.len() {
            for j in (i + 1)..spaces.len() {
                let (a, b) = (&spaces[i], &spaces[j]);
                let centroid_distance = (a.centroid - b.centroid).norm();
                let half_max_a = a.dimensions.x.max(a.dimensions.y).max(a.dimensions.z) / 2.0;
                let half_max_b = b.dimensions.x.max(b.dimensions.y).max(b.dimensions.z) / 2.0;
                let estimated_separation = centroid_distance - half_max_a - half_max_b;
                if estimated_separation <= self.config.space_merge_distance {
                    merge_edges.push((i, j));
                }
            }
        }

        if merge_edges.is_empty() {
            return (spaces, adjacency);
        }
        log::info!("merging fragmented spaces across {} candidate edges", merge_edges.len());

        let groups = union_find_groups(spaces.len(), &merge_edges);

        let mut id_map: FxHashMap<SpaceId, SpaceId> = FxHashMap::default();
        let mut merged_spaces: Vec<Space> = Vec::new();
        for (new_index, group) in groups.iter().enumerate() {
            if group.len() == 1 {
                let space = spaces[group[0]].clone();
                id_map.insert(space.id.clone(), space.id.clone());
                merged_spaces.push(space);
                continue;
            }
            let mut voxels: Vec<VoxelIndex> = group.iter().flat_map(|&i| spaces[i].voxels.clone()).collect();
            voxels.sort_unstable();
            voxels.dedup();
            let new_id = SpaceId(format!("merged_{:03}", new_index));
            for &i in group {
                id_map.insert(spaces[i].id.clone(), new_id.clone());
            }
            let mut merged = self.build_space(0, voxels, field, base);
            merged.id = new_id;
            merged.space_type = SpaceType::Merged;
            merged.merged_from = group.iter().map(|&i| spaces[i].id.clone()).collect();
            merged_spaces.push(merged);
        }
        merged_spaces.sort_by(|a, b| a.id.0.cmp(&b.id.0));

        let mut new_edges: FxHashSet<(SpaceId, SpaceId)> = FxHashSet::default();
        for edge in &adjacency {
            let a = id_map.get(&edge.a).cloned().unwrap_or_else(|| edge.a.clone());
            let b = id_map.get(&edge.b).cloned().unwrap_or_else(|| edge.b.clone());
            if a == b {
                continue;
            }
            let key = if a.0 <= b.0 { (a, b) } else { (b, a) };
            new_edges.insert(key);
        }
        let mut edges: Vec<AdjacencyEdge> = new_edges.into_iter().map(|(a, b)| AdjacencyEdge { a, b }).collect();
        edges.sort_by(|e1, e2| (e1.a.0.clone(), e1.b.0.clone()).cmp(&(e2.a.0.clone(), e2.b.0.clone())));

        (merged_spaces, edges)
    }
}

const NEIGHBOR_OFFSETS: [(i64, i64, i64); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// Two spaces are adjacent when the minimum Euclidean distance between any pair of their
/// voxel indices is at most 1.5 (accounting for diagonal, not just face, proximity).
fn spaces_are_adjacent(a: &Space, b: &Space) -> bool {
    const THRESHOLD_SQ: f64 = 1.5 * 1.5;
    for va in &a.voxels {
        for vb in &b.voxels {
            let d = (
                (va.0 - vb.0) as f64,
                (va.1 - vb.1) as f64,
                (va.2 - vb.2) as f64,
            );
            let dist_sq = d.0 * d.0 + d.1 * d.1 + d.2 * d.2;
            if dist_sq <= THRESHOLD_SQ {
                return true;
            }
        }
    }
    false
}

fn union_find_groups(n: usize, edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }
    for &(a, b) in edges {
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        if ra != rb {
            parent[ra] = rb;
        }
    }
    let mut groups: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }
    let mut result: Vec<Vec<usize>> = groups.into_values().collect();
    result.sort_by_key(|g| g[0]);
    result
}

struct CentroidPoint {
    index: usize,
    point: Vector3<f64>,
}

impl RTreeObject for CentroidPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.point.x, self.point.y, self.point.z])
    }
}

impl PointDistance for CentroidPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        (self.point.x - point[0]).powi(2) + (self.point.y - point[1]).powi(2) + (self.point.z - point[2]).powi(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::DenseGrid;

    fn two_room_grid() -> DenseGrid {
        // A 3x7x3 solid block with two single-voxel interior voids at (1,1,1) and (1,5,1),
        // each fully enclosed by occupied walls and separated from one another by a solid
        // slab at y=3, producing two distinct interior rooms.
        let mut grid = DenseGrid::new(Vector3::zeros(), 1.0, (3, 7, 3));
        for i in 0..3 {
            for j in 0..7 {
                for k in 0..3 {
                    grid.set_occupied(i, j, k, true);
                }
            }
        }
        grid.set_occupied(1, 1, 1, false);
        grid.set_occupied(1, 5, 1, false);
        grid
    }

    #[test]
    fn detects_two_separate_rooms() {
        let grid = two_room_grid();
        let cfg = SpaceDetectionConfig {
            min_space_volume: 0.0,
            ..SpaceDetectionConfig::default()
        };
        let detector = SpaceDetector::new(cfg);
        let (spaces, _adjacency, _exterior) = detector.detect_spaces(&grid);
        assert_eq!(spaces.len(), 2);
    }

    #[test]
    fn volume_filter_drops_small_components() {
        let grid = two_room_grid();
        let cfg = SpaceDetectionConfig {
            min_space_volume: 10.0,
            ..SpaceDetectionConfig::default()
        };
        let detector = SpaceDetector::new(cfg);
        let (spaces, _adjacency, _exterior) = detector.detect_spaces(&grid);
        assert!(spaces.is_empty());
    }

    #[test]
    fn merge_unions_close_fragments() {
        let grid = two_room_grid();
        let cfg = SpaceDetectionConfig {
            min_space_volume: 0.0,
            space_merge_distance: 5.0,
            ..SpaceDetectionConfig::default()
        };
        let detector = SpaceDetector::new(cfg);
        let (spaces, adjacency, _exterior) = detector.detect_spaces(&grid);
        let (merged, _edges) = detector.merge_fragmented_spaces(spaces, adjacency, &grid);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].space_type, SpaceType::Merged);
    }
}
