//! Geometric primitives shared across components: PCA plane fitting, 2D convex hulls, and
//! curvature/narrow-passage estimation.

pub mod convex_hull;
pub mod curvature;
pub mod pca;

pub use convex_hull::{convex_hull, hull_features, HullFeatures};
pub use curvature::{default_curvature_radius, find_narrow_passages, vertex_curvature};
pub use pca::{fit_principal_plane, PrincipalPlane};
