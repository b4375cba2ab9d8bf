//! Opening detection: finds interface voxels between adjacent spaces, clusters them into
//! individual openings, computes their geometric features, and classifies them as doors or
//! passages.

use crate::config::OpeningConfig;
use crate::geometry::{fit_principal_plane, hull_features};
use crate::space::{AdjacencyEdge, Space, SpaceId, EXTERIOR_ID};
use crate::voxel::{OccupancyField, VoxelIndex};
use fxhash::FxHashSet;
use nalgebra::Vector3;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use std::fmt;

/// Stable identifier for one detected opening (`opening_001`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpeningId(pub String);

impl fmt::Display for OpeningId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification of an opening by size and shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpeningType {
    StandardDoor,
    WideDoor,
    Passage,
}

/// Open/closed state of a door-type opening. Passages have no meaningful state and stay
/// `Open`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoorState {
    Open,
    Closed,
}

/// A detected connection between two spaces (or a space and the exterior sentinel).
#[derive(Clone, Debug)]
pub struct Opening {
    pub id: OpeningId,
    pub opening_type: OpeningType,
    pub connects: [SpaceId; 2],
    pub position: Vector3<f64>,
    pub voxels: Vec<VoxelIndex>,
    pub area: f64,
    pub perimeter: f64,
    pub width: f64,
    pub height: f64,
    pub aspect_ratio: f64,
    pub circularity: f64,
    pub direction: Vector3<f64>,
    pub planarity: f64,
    pub state: DoorState,
}

pub struct OpeningDetector {
    config: OpeningConfig,
}

impl OpeningDetector {
    pub fn new(config: OpeningConfig) -> Self {
        Self { config }
    }

    /// Detects and classifies openings along every adjacency edge, then does the same for
    /// each space's interface with the exterior (the grid-boundary voxels consumed by
    /// exterior flood fill), which is how windows to the outside enter the graph per the
    /// two-endpoint invariant. Opening IDs are assigned in adjacency-pair order followed by
    /// space order, so the result is deterministic for a fixed input. Newly detected openings
    /// default to [`DoorState::Open`] (original_source's `detect_door_states` is a no-op
    /// placeholder over this same default).
    pub fn detect_openings(
        &self,
        field: &dyn OccupancyField,
        spaces: &[Space],
        adjacency: &[AdjacencyEdge],
        exterior_voxels: &FxHashSet<VoxelIndex>,
    ) -> Vec<Opening> {
        log::info!("detecting openings across {} adjacency edges", adjacency.len());
        let mut openings = Vec::new();
        let mut next_id = 1usize;

        for edge in adjacency {
            let space1 = spaces.iter().find(|s| s.id == edge.a);
            let space2 = spaces.iter().find(|s| s.id == edge.b);
            let (space1, space2) = match (space1, space2) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };

            let interface = find_interface_voxels(&space1.voxels, &space2.voxels);
            if interface.is_empty() {
                continue;
            }
            let clusters = cluster_interface_voxels(&interface);

            for cluster in clusters {
                let points: Vec<Vector3<f64>> = cluster.iter().map(|&v| field.voxel_center(v)).collect();
                if let Some(opening) = self.build_opening(&cluster, &points, [edge.a.clone(), edge.b.clone()]) {
                    let mut opening = opening;
                    opening.id = OpeningId(format!("opening_{:03}", next_id));
                    next_id += 1;
                    openings.push(opening);
                }
            }
        }

        if !exterior_voxels.is_empty() {
            let mut exterior_sorted: Vec<VoxelIndex> = exterior_voxels.iter().copied().collect();
            exterior_sorted.sort_unstable();

            for space in spaces {
                let nearby_exterior = exterior_near_bbox(&exterior_sorted, space);
                if nearby_exterior.is_empty() {
                    continue;
                }
                let interface = find_interface_voxels(&space.voxels, &nearby_exterior);
                if interface.is_empty() {
                    continue;
                }
                let clusters = cluster_interface_voxels(&interface);

                for cluster in clusters {
                    let points: Vec<Vector3<f64>> = cluster.iter().map(|&v| field.voxel_center(v)).collect();
                    let connects = [space.id.clone(), SpaceId(EXTERIOR_ID.to_string())];
                    if let Some(mut opening) = self.build_opening(&cluster, &points, connects) {
                        opening.id = OpeningId(format!("opening_{:03}", next_id));
                        next_id += 1;
                        openings.push(opening);
                    }
                }
            }
        }

        log::info!("detected {} openings", openings.len());
        openings
    }

    fn build_opening(&self, cluster: &[VoxelIndex], points: &[Vector3<f64>], connects: [SpaceId; 2]) -> Option<Opening> {
        let plane = fit_principal_plane(points)?;
        let projected: Vec<(f64, f64)> = points.iter().map(|p| plane.project(p)).collect();
        let hull = hull_features(&projected)?;
        let position = points.iter().sum::<Vector3<f64>>() / points.len() as f64;

        let opening_type = self.classify(hull.area, hull.width, hull.aspect_ratio);

        Some(Opening {
            id: OpeningId(String::new()),
            opening_type,
            connects,
            position,
            voxels: cluster.to_vec(),
            area: hull.area,
            perimeter: hull.perimeter,
            width: hull.width,
            height: hull.height,
            aspect_ratio: hull.aspect_ratio,
            circularity: hull.circularity,
            direction: plane.normal,
            planarity: plane.planarity,
            state: DoorState::Open,
        })
    }

    /// Classifies an opening by area/width/aspect ratio, per original_source's
    /// `_classify_openings`.
    fn classify(&self, area: f64, width: f64, aspect_ratio: f64) -> OpeningType {
        if area <= self.config.standard_door_area_limit && aspect_ratio >= 1.5 {
            OpeningType::StandardDoor
        } else if area <= self.config.wide_door_area_limit && width < 3.0 {
            OpeningType::WideDoor
        } else if area > self.config.wide_door_area_limit || aspect_ratio >= self.config.passage_aspect_ratio {
            OpeningType::Passage
        } else {
            OpeningType::StandardDoor
        }
    }
}

/// Finds interface voxels between two voxel sets: voxels of each whose nearest voxel in the
/// other is at exact Euclidean distance 1 (face-adjacent), per original_source's
/// `_find_space_interface`. Used for both space-space and space-exterior pairs.
fn find_interface_voxels(voxels_a: &[VoxelIndex], voxels_b: &[VoxelIndex]) -> Vec<VoxelIndex> {
    let tree_a = build_voxel_tree(voxels_a);
    let tree_b = build_voxel_tree(voxels_b);

    let mut interface = Vec::new();
    for &v in voxels_a {
        if nearest_distance(&tree_b, v) == Some(1.0) {
            interface.push(v);
        }
    }
    for &v in voxels_b {
        if nearest_distance(&tree_a, v) == Some(1.0) {
            interface.push(v);
        }
    }
    interface
}

/// Narrows the (potentially large) exterior voxel set down to those within one voxel of
/// `space`'s bounding box, so the per-space interface search below doesn't scan every
/// exterior voxel in the grid. `exterior_sorted` must be lexicographically sorted.
fn exterior_near_bbox(exterior_sorted: &[VoxelIndex], space: &Space) -> Vec<VoxelIndex> {
    let Some((min, max)) = space
        .voxels
        .iter()
        .fold(None, |acc: Option<(VoxelIndex, VoxelIndex)>, &v| match acc {
            None => Some((v, v)),
            Some((min, max)) => Some((
                (min.0.min(v.0), min.1.min(v.1), min.2.min(v.2)),
                (max.0.max(v.0), max.1.max(v.1), max.2.max(v.2)),
            )),
        })
    else {
        return Vec::new();
    };
    let margin = 1;
    exterior_sorted
        .iter()
        .copied()
        .filter(|&(i, j, k)| {
            i >= min.0 - margin
                && i <= max.0 + margin
                && j >= min.1 - margin
                && j <= max.1 + margin
                && k >= min.2 - margin
                && k <= max.2 + margin
        })
        .collect()
}

/// Clusters interface voxels with DBSCAN (eps=1.5, min_samples=2), discarding noise points
/// and clusters smaller than 3 voxels, per original_source's `_cluster_interface_voxels`.
fn cluster_interface_voxels(voxels: &[VoxelIndex]) -> Vec<Vec<VoxelIndex>> {
    const EPS: f64 = 1.5;
    const MIN_SAMPLES: usize = 2;

    let labels = dbscan(voxels, EPS, MIN_SAMPLES);
    let max_label = labels.iter().copied().flatten().max();
    let Some(max_label) = max_label else {
        return Vec::new();
    };

    let mut clusters: Vec<Vec<VoxelIndex>> = vec![Vec::new(); max_label + 1];
    for (i, label) in labels.iter().enumerate() {
        if let Some(l) = label {
            clusters[*l].push(voxels[i]);
        }
    }
    clusters.retain(|c| c.len() >= 3);
    clusters
}

/// A minimal DBSCAN implementation over integer 3D points. Returns `None` for noise points,
/// `Some(cluster_index)` otherwise.
fn dbscan(points: &[VoxelIndex], eps: f64, min_samples: usize) -> Vec<Option<usize>> {
    let eps_sq = eps * eps;
    let n = points.len();
    let neighbors: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| j != i && voxel_distance_sq(points[i], points[j]) <= eps_sq)
                .collect()
        })
        .collect();

    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut next_cluster = 0usize;

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        if neighbors[i].len() + 1 < min_samples {
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[i] = Some(cluster);

        let mut queue: Vec<usize> = neighbors[i].clone();
        let mut qi = 0;
        while qi < queue.len() {
            let j = queue[qi];
            qi += 1;
            if !visited[j] {
                visited[j] = true;
                if neighbors[j].len() + 1 >= min_samples {
                    for &k in &neighbors[j] {
                        if !queue.contains(&k) {
                            queue.push(k);
                        }
                    }
                }
            }
            if labels[j].is_none() {
                labels[j] = Some(cluster);
            }
        }
    }
    labels
}

fn voxel_distance_sq(a: VoxelIndex, b: VoxelIndex) -> f64 {
    let d = ((a.0 - b.0) as f64, (a.1 - b.1) as f64, (a.2 - b.2) as f64);
    d.0 * d.0 + d.1 * d.1 + d.2 * d.2
}

struct VoxelPoint(VoxelIndex);

impl RTreeObject for VoxelPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.0 .0 as f64, self.0 .1 as f64, self.0 .2 as f64])
    }
}

impl PointDistance for VoxelPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        (self.0 .0 as f64 - point[0]).powi(2)
            + (self.0 .1 as f64 - point[1]).powi(2)
            + (self.0 .2 as f64 - point[2]).powi(2)
    }
}

fn build_voxel_tree(voxels: &[VoxelIndex]) -> RTree<VoxelPoint> {
    RTree::bulk_load(voxels.iter().map(|&v| VoxelPoint(v)).collect())
}

fn nearest_distance(tree: &RTree<VoxelPoint>, query: VoxelIndex) -> Option<f64> {
    let q = [query.0 as f64, query.1 as f64, query.2 as f64];
    tree.nearest_neighbor(&q).map(|p| p.distance_2(&q).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::SpaceType;
    use crate::voxel::DenseGrid;

    fn two_rooms_with_opening() -> (DenseGrid, Space, Space) {
        // Two directly-adjacent 3x1x1 rooms (y=1 and y=2, both at x=0..3, z=1), sharing a
        // full-width, wall-free interface — every voxel of each room is face-adjacent
        // (distance exactly 1) to a voxel of the other.
        let mut grid = DenseGrid::new(Vector3::zeros(), 1.0, (3, 4, 3));
        for i in 0..3 {
            for j in 0..4 {
                for k in 0..3 {
                    grid.set_occupied(i, j, k, true);
                }
            }
        }
        let mut room_a = Vec::new();
        let mut room_b = Vec::new();
        for i in 0..3 {
            grid.set_occupied(i, 1, 1, false);
            room_a.push((i as i64, 1, 1));
            grid.set_occupied(i, 2, 1, false);
            room_b.push((i as i64, 2, 1));
        }

        let space_a = Space {
            id: crate::space::SpaceId("space_000".into()),
            voxels: room_a,
            volume: 3.0,
            centroid: Vector3::new(1.0, 1.0, 1.0),
            bbox_min: Vector3::new(0.0, 1.0, 0.0),
            bbox_max: Vector3::new(3.0, 2.0, 2.0),
            dimensions: Vector3::new(3.0, 1.0, 2.0),
            space_type: SpaceType::Unknown,
            merged_from: Vec::new(),
        };
        let space_b = Space {
            id: crate::space::SpaceId("space_001".into()),
            voxels: room_b,
            volume: 3.0,
            centroid: Vector3::new(1.0, 2.0, 1.0),
            bbox_min: Vector3::new(0.0, 2.0, 0.0),
            bbox_max: Vector3::new(3.0, 3.0, 2.0),
            dimensions: Vector3::new(3.0, 1.0, 2.0),
            space_type: SpaceType::Unknown,
            merged_from: Vec::new(),
        };
        (grid, space_a, space_b)
    }

    #[test]
    fn finds_interface_between_adjacent_rooms() {
        let (_grid, a, b) = two_rooms_with_opening();
        let interface = find_interface_voxels(&a.voxels, &b.voxels);
        assert_eq!(interface.len(), 6);
    }

    #[test]
    fn clusters_interface_into_one_opening() {
        let (_grid, a, b) = two_rooms_with_opening();
        let interface = find_interface_voxels(&a.voxels, &b.voxels);
        let clusters = cluster_interface_voxels(&interface);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 6);
    }

    #[test]
    fn detects_and_classifies_opening_as_door_or_passage() {
        let (grid, a, b) = two_rooms_with_opening();
        let adjacency = vec![AdjacencyEdge { a: a.id.clone(), b: b.id.clone() }];
        let detector = OpeningDetector::new(OpeningConfig::default());
        let openings = detector.detect_openings(&grid, &[a, b], &adjacency, &FxHashSet::default());
        assert_eq!(openings.len(), 1);
        assert_eq!(openings[0].state, DoorState::Open);
    }

    #[test]
    fn detects_window_opening_to_exterior() {
        // A 2x2 patch of room voxels at y=1 sits directly above a matching 2x2 patch of
        // exterior voxels at y=0 — a window onto the outside rather than another space.
        let space = Space {
            id: crate::space::SpaceId("space_000".into()),
            voxels: vec![(1, 1, 1), (2, 1, 1), (1, 1, 2), (2, 1, 2)],
            volume: 4.0,
            centroid: Vector3::new(2.0, 1.0, 2.0),
            bbox_min: Vector3::new(1.0, 1.0, 1.0),
            bbox_max: Vector3::new(3.0, 2.0, 3.0),
            dimensions: Vector3::new(2.0, 1.0, 2.0),
            space_type: SpaceType::Unknown,
            merged_from: Vec::new(),
        };
        let mut exterior = FxHashSet::default();
        exterior.insert((1, 0, 1));
        exterior.insert((2, 0, 1));
        exterior.insert((1, 0, 2));
        exterior.insert((2, 0, 2));

        let grid = DenseGrid::new(Vector3::zeros(), 1.0, (4, 4, 4));
        let detector = OpeningDetector::new(OpeningConfig::default());
        let openings = detector.detect_openings(&grid, &[space], &[], &exterior);
        assert_eq!(openings.len(), 1);
        assert!(openings[0].connects.contains(&crate::space::SpaceId(EXTERIOR_ID.to_string())));
    }
}
