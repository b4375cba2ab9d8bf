//! Principal-plane fitting for roughly-planar point clusters (opening interfaces).

use nalgebra::{Matrix3, Vector3};

/// Result of fitting a plane to a set of 3D points via PCA on their covariance matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct PrincipalPlane {
    /// Centroid of the input points.
    pub centroid: Vector3<f64>,
    /// Unit normal of the fitted plane (eigenvector of the smallest covariance eigenvalue).
    pub normal: Vector3<f64>,
    /// First in-plane basis vector.
    pub basis_u: Vector3<f64>,
    /// Second in-plane basis vector, orthogonal to `basis_u` and `normal`.
    pub basis_v: Vector3<f64>,
    /// `1 - smallest_eigenvalue / (largest_eigenvalue + eps)`: 1.0 for a perfectly flat
    /// point set, lower as the distribution becomes more volumetric.
    pub planarity: f64,
}

/// Fits a plane through `points` using the covariance-eigendecomposition method
/// original_source's `compute_opening_features`/`compute_opening_direction` use. Returns
/// `None` if fewer than 3 points are given.
pub fn fit_principal_plane(points: &[Vector3<f64>]) -> Option<PrincipalPlane> {
    if points.len() < 3 {
        return None;
    }

    let n = points.len() as f64;
    let centroid: Vector3<f64> = points.iter().sum::<Vector3<f64>>() / n;

    let mut cov = Matrix3::zeros();
    for p in points {
        let d = p - centroid;
        cov += d * d.transpose();
    }
    cov /= n - 1.0;

    let eigen = cov.symmetric_eigen();
    // Sort eigenpairs ascending by eigenvalue; nalgebra does not guarantee an order.
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[a].partial_cmp(&eigen.eigenvalues[b]).unwrap());
    let lambda0 = eigen.eigenvalues[order[0]];
    let lambda2 = eigen.eigenvalues[order[2]];
    let normal = eigen.eigenvectors.column(order[0]).into_owned();

    const EPS: f64 = 1e-9;
    let planarity = 1.0 - lambda0 / (lambda2 + EPS);

    let (basis_u, basis_v) = orthonormal_basis(&normal);

    Some(PrincipalPlane {
        centroid,
        normal,
        basis_u,
        basis_v,
        planarity,
    })
}

/// Builds two orthonormal in-plane basis vectors for a unit `normal`, matching
/// original_source's special-case for near-vertical normals (use the world x/y axes
/// directly rather than risk a near-parallel cross product).
fn orthonormal_basis(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    if normal.z.abs() > 0.9 {
        (Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0))
    } else {
        let basis_u = normal.cross(&Vector3::z()).normalize();
        let basis_v = normal.cross(&basis_u).normalize();
        (basis_u, basis_v)
    }
}

impl PrincipalPlane {
    /// Projects a world-space point onto the fitted plane's 2D (u, v) coordinate system.
    pub fn project(&self, point: &Vector3<f64>) -> (f64, f64) {
        let d = point - self.centroid;
        (d.dot(&self.basis_u), d.dot(&self.basis_v))
    }

    /// Signed extent of the input points along the plane normal (max - min of the
    /// normal-axis projection), used as a sanity check on how flat the cluster is.
    pub fn height_range(&self, points: &[Vector3<f64>]) -> f64 {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for p in points {
            let h = (p - self.centroid).dot(&self.normal);
            min = min.min(h);
            max = max.max(h);
        }
        if min > max {
            0.0
        } else {
            max - min
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_square_has_near_unit_planarity() {
        let points = vec![
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(0.0, 1.0, 1.0),
        ];
        let plane = fit_principal_plane(&points).unwrap();
        assert!(plane.normal.z.abs() > 0.99);
        assert!(plane.planarity > 0.99);
    }

    #[test]
    fn too_few_points_returns_none() {
        assert!(fit_principal_plane(&[Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)]).is_none());
    }
}
