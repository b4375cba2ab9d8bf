//! Triangle mesh representation and point-in-mesh containment testing.

use crate::aabb::AxisAlignedBoundingBox3d;
use crate::error::AnalysisError;
use nalgebra::Vector3;
use rayon::prelude::*;

/// A closed, triangulated solid model in metres, already normalized by the caller.
///
/// Parsing a mesh out of a CAD exchange format (STEP/IGES/STL/OBJ/IFC) is a host concern;
/// this crate only consumes the in-memory triangulation.
#[derive(Clone, Debug)]
pub struct TriangleMesh {
    vertices: Vec<Vector3<f64>>,
    /// Vertex indices, three per triangle.
    indices: Vec<[u32; 3]>,
    aabb: AxisAlignedBoundingBox3d,
}

impl TriangleMesh {
    /// Builds a mesh from a vertex buffer and a triangle index buffer.
    ///
    /// Returns [`AnalysisError::InputError`] if there are no vertices/triangles, or if any
    /// index is out of bounds.
    pub fn new(vertices: Vec<Vector3<f64>>, indices: Vec<[u32; 3]>) -> Result<Self, AnalysisError> {
        if vertices.is_empty() {
            return Err(AnalysisError::InputError("mesh has no vertices".into()));
        }
        if indices.is_empty() {
            return Err(AnalysisError::InputError("mesh has no triangles".into()));
        }
        let n = vertices.len() as u32;
        if indices
            .iter()
            .any(|tri| tri.iter().any(|&i| i >= n))
        {
            return Err(AnalysisError::InputError(
                "mesh triangle references an out-of-range vertex index".into(),
            ));
        }
        let aabb = AxisAlignedBoundingBox3d::from_points_par(&vertices)
            .expect("non-empty vertex buffer checked above");
        Ok(Self {
            vertices,
            indices,
            aabb,
        })
    }

    pub fn vertices(&self) -> &[Vector3<f64>] {
        &self.vertices
    }

    pub fn indices(&self) -> &[[u32; 3]] {
        &self.indices
    }

    pub fn triangle(&self, tri: [u32; 3]) -> [Vector3<f64>; 3] {
        [
            self.vertices[tri[0] as usize],
            self.vertices[tri[1] as usize],
            self.vertices[tri[2] as usize],
        ]
    }

    /// The bounding box enclosing every vertex.
    pub fn aabb(&self) -> &AxisAlignedBoundingBox3d {
        &self.aabb
    }

    /// Tests whether `point` lies inside the (assumed watertight) solid, via ray-casting
    /// parity: a ray cast in the +z direction crosses the boundary an odd number of times iff
    /// the point is interior.
    pub fn contains_point(&self, point: &Vector3<f64>) -> bool {
        let mut crossings = 0usize;
        for &tri in &self.indices {
            let [a, b, c] = self.triangle(tri);
            if ray_crosses_triangle_upward(point, &a, &b, &c) {
                crossings += 1;
            }
        }
        crossings % 2 == 1
    }

    /// Batched, parallel containment test, matching the grid-slab pattern original_source's
    /// voxelizer uses when it calls `mesh.contains(points)` over a block of candidate voxel
    /// centres at once.
    pub fn contains_points(&self, points: &[Vector3<f64>]) -> Vec<bool> {
        points
            .par_iter()
            .map(|p| self.contains_point(p))
            .collect()
    }
}

/// Tests whether an upward ray (+z direction) from `point` crosses triangle `(a, b, c)`,
/// using the standard 2D edge-parity test on the triangle's xy-projection plus a plane-height
/// comparison, with a half-open edge convention (`y >= a.y` / `y < b.y`) to avoid double
/// counting rays that pass exactly through a shared vertex or edge.
fn ray_crosses_triangle_upward(
    point: &Vector3<f64>,
    a: &Vector3<f64>,
    b: &Vector3<f64>,
    c: &Vector3<f64>,
) -> bool {
    let mut crossed = false;
    for (p0, p1) in [(a, b), (b, c), (c, a)] {
        let cond = (p0.y > point.y) != (p1.y > point.y);
        if !cond {
            continue;
        }
        let t = (point.y - p0.y) / (p1.y - p0.y);
        let x_at_y = p0.x + t * (p1.x - p0.x);
        if x_at_y > point.x {
            crossed = !crossed;
        }
    }
    if !crossed {
        return false;
    }
    // The edge loop above only establishes that the upward ray crosses the triangle's
    // xy-projection; recover the plane height at (point.x, point.y) to confirm the
    // crossing is above the query point.
    let normal = (b - a).cross(&(c - a));
    if normal.z.abs() < 1e-12 {
        return false;
    }
    let plane_z = a.z - (normal.x * (point.x - a.x) + normal.y * (point.y - a.y)) / normal.z;
    plane_z > point.z
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube() -> TriangleMesh {
        let v = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(0.0, 1.0, 1.0),
        ];
        let idx: Vec<[u32; 3]> = vec![
            [0, 2, 1], [0, 3, 2], // bottom
            [4, 5, 6], [4, 6, 7], // top
            [0, 1, 5], [0, 5, 4], // front
            [1, 2, 6], [1, 6, 5], // right
            [2, 3, 7], [2, 7, 6], // back
            [3, 0, 4], [3, 4, 7], // left
        ];
        TriangleMesh::new(v, idx).unwrap()
    }

    #[test]
    fn rejects_empty_input() {
        assert!(TriangleMesh::new(vec![], vec![]).is_err());
        assert!(TriangleMesh::new(vec![Vector3::zeros()], vec![]).is_err());
    }

    #[test]
    fn rejects_out_of_range_index() {
        let v = vec![Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)];
        assert!(TriangleMesh::new(v, vec![[0, 1, 5]]).is_err());
    }

    #[test]
    fn cube_center_is_inside() {
        let mesh = unit_cube();
        assert!(mesh.contains_point(&Vector3::new(0.5, 0.5, 0.5)));
    }

    #[test]
    fn point_outside_cube_is_outside() {
        let mesh = unit_cube();
        assert!(!mesh.contains_point(&Vector3::new(2.0, 0.5, 0.5)));
        assert!(!mesh.contains_point(&Vector3::new(0.5, 0.5, -1.0)));
    }

    #[test]
    fn batched_matches_single_point_queries() {
        let mesh = unit_cube();
        let points = vec![
            Vector3::new(0.5, 0.5, 0.5),
            Vector3::new(5.0, 5.0, 5.0),
        ];
        let batched = mesh.contains_points(&points);
        let single: Vec<bool> = points.iter().map(|p| mesh.contains_point(p)).collect();
        assert_eq!(batched, single);
    }
}
