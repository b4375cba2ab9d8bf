//! Adaptive voxelization: turns a triangle mesh into an occupancy field, either a dense grid
//! or, when the dense grid would be too large, a sparse octree.

mod dense;
mod octree;
mod voxelizer;

pub use dense::DenseGrid;
pub use octree::{Octree, SparseOctree};
pub use voxelizer::Voxelizer;

use fxhash::FxHashMap;
use nalgebra::Vector3;

/// Integer coordinates of a voxel in the base-resolution grid (`base_voxel_size` edge length).
pub type VoxelIndex = (i64, i64, i64);

/// A sparse map from voxel index to its refined edge length. An entry's absence means the
/// voxel is empty (exterior or unoccupied interior); an entry's value is `base_voxel_size`
/// unless the voxel was flagged for refinement, in which case it is `min_voxel_size`.
pub type OccupancyMap = FxHashMap<VoxelIndex, f64>;

/// Common surface both voxelization strategies (dense grid, sparse octree) expose to
/// downstream components. Components after the voxelizer depend only on this trait, never
/// on which strategy produced the field — the memory-sensitive branching stays internal.
pub trait OccupancyField {
    /// World-space coordinate of the grid's `(0, 0, 0)` corner.
    fn origin(&self) -> Vector3<f64>;

    /// Nominal (unrefined) voxel edge length.
    fn base_voxel_size(&self) -> f64;

    /// Number of base-resolution voxels spanning the mesh's bounding box along each axis.
    /// Downstream components iterate this range when they need every voxel, occupied or
    /// not (e.g. exterior flood fill), rather than only the sparse occupied set.
    fn grid_shape(&self) -> (i64, i64, i64);

    /// Flattens the field into a sparse occupancy map keyed by base-resolution voxel index,
    /// the representation every downstream component (space detection, adjacency, opening
    /// detection) consumes.
    fn to_occupancy_map(&self) -> OccupancyMap;

    /// Converts a base-resolution voxel index to its world-space centre.
    fn voxel_center(&self, index: VoxelIndex) -> Vector3<f64> {
        let size = self.base_voxel_size();
        self.origin()
            + Vector3::new(
                (index.0 as f64 + 0.5) * size,
                (index.1 as f64 + 0.5) * size,
                (index.2 as f64 + 0.5) * size,
            )
    }
}
