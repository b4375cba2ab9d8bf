use super::{OccupancyField, OccupancyMap, VoxelIndex};
use nalgebra::Vector3;

/// A uniform, fully-materialized occupancy grid, used while the estimated memory footprint
/// stays within budget.
#[derive(Clone, Debug)]
pub struct DenseGrid {
    origin: Vector3<f64>,
    base_voxel_size: f64,
    shape: (usize, usize, usize),
    occupied: Vec<bool>,
    /// Per-voxel edge length: `base_voxel_size` unless the voxel was refined.
    voxel_size: Vec<f64>,
}

impl DenseGrid {
    pub fn new(origin: Vector3<f64>, base_voxel_size: f64, shape: (usize, usize, usize)) -> Self {
        let n = shape.0 * shape.1 * shape.2;
        Self {
            origin,
            base_voxel_size,
            shape,
            occupied: vec![false; n],
            voxel_size: vec![base_voxel_size; n],
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    fn flat_index(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.shape.1 + j) * self.shape.2 + k
    }

    /// Returns `None` if `index` falls outside the grid's bounds.
    fn flat_index_checked(&self, index: VoxelIndex) -> Option<usize> {
        let (i, j, k) = index;
        if i < 0 || j < 0 || k < 0 {
            return None;
        }
        let (i, j, k) = (i as usize, j as usize, k as usize);
        if i >= self.shape.0 || j >= self.shape.1 || k >= self.shape.2 {
            return None;
        }
        Some(self.flat_index(i, j, k))
    }

    pub fn is_occupied(&self, index: VoxelIndex) -> bool {
        self.flat_index_checked(index)
            .map(|f| self.occupied[f])
            .unwrap_or(false)
    }

    pub fn set_occupied(&mut self, i: usize, j: usize, k: usize, value: bool) {
        let f = self.flat_index(i, j, k);
        self.occupied[f] = value;
    }

    pub fn set_voxel_size(&mut self, i: usize, j: usize, k: usize, size: f64) {
        let f = self.flat_index(i, j, k);
        self.voxel_size[f] = size;
    }

    pub fn voxel_size_at(&self, i: usize, j: usize, k: usize) -> f64 {
        self.voxel_size[self.flat_index(i, j, k)]
    }

    /// Iterates every voxel index in lexicographic (i, j, k) order. Downstream components
    /// that walk a dense grid directly (rather than through the occupancy map) must use this
    /// ordering to keep ID assignment deterministic.
    pub fn iter_indices(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let (nx, ny, nz) = self.shape;
        (0..nx).flat_map(move |i| (0..ny).flat_map(move |j| (0..nz).map(move |k| (i, j, k))))
    }
}

impl OccupancyField for DenseGrid {
    fn origin(&self) -> Vector3<f64> {
        self.origin
    }

    fn base_voxel_size(&self) -> f64 {
        self.base_voxel_size
    }

    fn grid_shape(&self) -> (i64, i64, i64) {
        (self.shape.0 as i64, self.shape.1 as i64, self.shape.2 as i64)
    }

    fn to_occupancy_map(&self) -> OccupancyMap {
        let mut map = OccupancyMap::default();
        for (i, j, k) in self.iter_indices() {
            if self.occupied[self.flat_index(i, j, k)] {
                map.insert(
                    (i as i64, j as i64, k as i64),
                    self.voxel_size_at(i, j, k),
                );
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_map_contains_only_occupied_voxels() {
        let mut grid = DenseGrid::new(Vector3::zeros(), 1.0, (2, 2, 2));
        grid.set_occupied(0, 0, 0, true);
        grid.set_occupied(1, 1, 1, true);
        let map = grid.to_occupancy_map();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key(&(0, 0, 0)));
        assert!(map.contains_key(&(1, 1, 1)));
    }

    #[test]
    fn out_of_bounds_index_is_unoccupied() {
        let grid = DenseGrid::new(Vector3::zeros(), 1.0, (2, 2, 2));
        assert!(!grid.is_occupied((-1, 0, 0)));
        assert!(!grid.is_occupied((2, 0, 0)));
    }

    #[test]
    fn refined_voxel_size_is_reflected_in_occupancy_map() {
        let mut grid = DenseGrid::new(Vector3::zeros(), 1.0, (1, 1, 1));
        grid.set_occupied(0, 0, 0, true);
        grid.set_voxel_size(0, 0, 0, 0.125);
        let map = grid.to_occupancy_map();
        assert_eq!(map[&(0, 0, 0)], 0.125);
    }
}
