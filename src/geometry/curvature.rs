//! Vertex curvature estimation and narrow-passage detection, used by the voxelizer's
//! refinement pass.

use crate::mesh::TriangleMesh;
use nalgebra::{Matrix3, Vector3};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Per-vertex curvature magnitude: the smallest eigenvalue of the covariance matrix of
/// vertex-normal directions within `radius` of each vertex, mirroring original_source's
/// `calculate_curvature`. Vertices with fewer than 3 neighbours within `radius` get 0.0.
pub fn vertex_curvature(mesh: &TriangleMesh, radius: f64) -> Vec<f64> {
    let normals = vertex_normals(mesh);
    let points: Vec<IndexedPoint> = mesh
        .vertices()
        .iter()
        .enumerate()
        .map(|(i, p)| IndexedPoint { index: i, point: *p })
        .collect();
    let tree = RTree::bulk_load(points);

    mesh.vertices()
        .iter()
        .map(|v| {
            let neighbor_indices: Vec<usize> = tree
                .locate_within_distance([v.x, v.y, v.z], radius * radius)
                .map(|p| p.index)
                .collect();
            if neighbor_indices.len() < 3 {
                return 0.0;
            }
            curvature_from_normals(&neighbor_indices, &normals)
        })
        .collect()
}

/// The mean edge length of the mesh, doubled — original_source's default radius for
/// [`vertex_curvature`] when the caller has no better estimate.
pub fn default_curvature_radius(mesh: &TriangleMesh) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for &tri in mesh.indices() {
        let [a, b, c] = mesh.triangle(tri);
        total += (b - a).norm() + (c - b).norm() + (a - c).norm();
        count += 3;
    }
    if count == 0 {
        return 1.0;
    }
    (total / count as f64) * 2.0
}

fn vertex_normals(mesh: &TriangleMesh) -> Vec<Vector3<f64>> {
    let mut accum = vec![Vector3::zeros(); mesh.vertices().len()];
    for &tri in mesh.indices() {
        let [a, b, c] = mesh.triangle(tri);
        let n = (b - a).cross(&(c - a));
        for &i in &tri {
            accum[i as usize] += n;
        }
    }
    accum
        .into_iter()
        .map(|n| if n.norm() > 1e-12 { n.normalize() } else { n })
        .collect()
}

fn curvature_from_normals(indices: &[usize], normals: &[Vector3<f64>]) -> f64 {
    let n = indices.len() as f64;
    let mean: Vector3<f64> = indices.iter().map(|&i| normals[i]).sum::<Vector3<f64>>() / n;

    let mut cov = Matrix3::zeros();
    for &i in indices {
        let d = normals[i] - mean;
        cov += d * d.transpose();
    }
    cov /= n - 1.0;

    cov.symmetric_eigen()
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
}

struct IndexedPoint {
    index: usize,
    point: Vector3<f64>,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.point.x, self.point.y, self.point.z])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        (self.point.x - point[0]).powi(2)
            + (self.point.y - point[1]).powi(2)
            + (self.point.z - point[2]).powi(2)
    }
}

/// Flags voxels whose distance to their nearest other voxel centre (k=2 nearest-neighbour
/// query, i.e. excluding self) falls below `threshold`, mirroring original_source's
/// `find_narrow_passages`. `centers` and the returned indices share the same ordering.
pub fn find_narrow_passages(centers: &[Vector3<f64>], threshold: f64) -> Vec<usize> {
    if centers.len() < 2 {
        return Vec::new();
    }
    let points: Vec<IndexedPoint> = centers
        .iter()
        .enumerate()
        .map(|(i, p)| IndexedPoint { index: i, point: *p })
        .collect();
    let tree = RTree::bulk_load(points);

    let mut narrow = Vec::new();
    for (i, c) in centers.iter().enumerate() {
        let query = [c.x, c.y, c.z];
        let second_nearest = tree
            .nearest_neighbor_iter(&query)
            .find(|p| p.index != i);
        if let Some(p) = second_nearest {
            if p.distance_2(&query).sqrt() < threshold {
                narrow.push(i);
            }
        }
    }
    narrow
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_region_has_near_zero_curvature() {
        let v = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        ];
        let idx = vec![[0, 1, 2], [0, 2, 3]];
        let mesh = TriangleMesh::new(v, idx).unwrap();
        let curv = vertex_curvature(&mesh, 5.0);
        assert!(curv.iter().all(|&c| c.abs() < 1e-9));
    }

    #[test]
    fn narrow_passage_flags_close_pairs() {
        let centers = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.1, 0.0, 0.0),
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::new(10.1, 0.0, 0.0),
        ];
        let narrow = find_narrow_passages(&centers, 1.0);
        assert_eq!(narrow.len(), 4);
    }

    #[test]
    fn no_narrow_passages_when_sparse() {
        let centers = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(5.0, 0.0, 0.0),
            Vector3::new(10.0, 0.0, 0.0),
        ];
        assert!(find_narrow_passages(&centers, 1.0).is_empty());
    }
}
