use super::{DenseGrid, Octree, OccupancyField, SparseOctree};
use crate::config::VoxelizationConfig;
use crate::geometry::{default_curvature_radius, find_narrow_passages, vertex_curvature};
use crate::mesh::TriangleMesh;
use nalgebra::Vector3;
use rayon::prelude::*;

/// Adaptive voxelizer: converts a triangle mesh into an occupancy field, refining voxels
/// near high-curvature or narrow-passage regions and falling back to a sparse octree when
/// the dense grid would exceed the configured memory budget.
pub struct Voxelizer {
    config: VoxelizationConfig,
}

impl Voxelizer {
    pub fn new(config: VoxelizationConfig) -> Self {
        Self { config }
    }

    /// Runs the full adaptive voxelization pipeline. Returns a boxed [`OccupancyField`] since
    /// the concrete representation (dense or octree) is chosen dynamically.
    pub fn voxelize(&self, mesh: &TriangleMesh) -> Box<dyn OccupancyField + Send + Sync> {
        log::info!("starting voxelization");

        let bbox = mesh.aabb();
        let origin = bbox.min();
        let dims = bbox.dimensions();
        let base = self.config.base_voxel_size;

        let shape = (
            (dims.x / base).ceil().max(1.0) as usize,
            (dims.y / base).ceil().max(1.0) as usize,
            (dims.z / base).ceil().max(1.0) as usize,
        );
        log::info!(
            "grid dimensions: {:?}, bounding box: {:?} - {:?}",
            shape,
            origin,
            bbox.max()
        );

        let voxel_count = (shape.0 * shape.1 * shape.2) as f64;
        // 3 grids of f64 (occupancy, size, scratch), matching original_source's memory
        // estimate of "3 arrays * 8 bytes per voxel".
        let memory_estimate_bytes = voxel_count * 3.0 * 8.0;
        let memory_estimate_mb = memory_estimate_bytes / (1024.0 * 1024.0);

        if memory_estimate_mb > self.config.max_memory_mb {
            log::warn!(
                "estimated memory usage ({:.2} MB) exceeds budget, falling back to octree",
                memory_estimate_mb
            );
            return Box::new(self.voxelize_octree(mesh, &origin, &dims));
        }
        log::info!("estimated memory usage: {:.2} MB", memory_estimate_mb);

        let mut grid = DenseGrid::new(origin, base, shape);
        self.fill_dense_grid(mesh, &mut grid, &origin, shape);

        let refinement_voxels = self.find_refinement_voxels(mesh, &origin, shape);
        log::info!("voxels flagged for refinement: {}", refinement_voxels.len());
        if !refinement_voxels.is_empty() {
            self.refine_regions(mesh, &mut grid, &origin, &refinement_voxels);
        }

        log::debug!("voxelization complete");
        Box::new(grid)
    }

    fn fill_dense_grid(
        &self,
        mesh: &TriangleMesh,
        grid: &mut DenseGrid,
        origin: &Vector3<f64>,
        shape: (usize, usize, usize),
    ) {
        let base = self.config.base_voxel_size;
        let indices: Vec<(usize, usize, usize)> = grid.iter_indices().collect();
        let centers: Vec<Vector3<f64>> = indices
            .iter()
            .map(|&(i, j, k)| {
                origin
                    + Vector3::new(
                        (i as f64 + 0.5) * base,
                        (j as f64 + 0.5) * base,
                        (k as f64 + 0.5) * base,
                    )
            })
            .collect();
        let contains = mesh.contains_points(&centers);
        for ((i, j, k), occupied) in indices.into_iter().zip(contains.into_iter()) {
            if occupied {
                grid.set_occupied(i, j, k, true);
            }
        }
        let _ = shape;
    }

    fn find_refinement_voxels(
        &self,
        mesh: &TriangleMesh,
        origin: &Vector3<f64>,
        shape: (usize, usize, usize),
    ) -> Vec<(usize, usize, usize)> {
        let radius = default_curvature_radius(mesh);
        let curvature = vertex_curvature(mesh, radius);
        let high_curvature_points: Vec<Vector3<f64>> = mesh
            .vertices()
            .iter()
            .zip(curvature.iter())
            .filter(|(_, &c)| c > self.config.curvature_threshold)
            .map(|(&v, _)| v)
            .collect();

        let narrow = find_narrow_passages(mesh.vertices(), self.config.width_threshold);
        let narrow_points: Vec<Vector3<f64>> = narrow.into_iter().map(|i| mesh.vertices()[i]).collect();

        let base = self.config.base_voxel_size;
        let mut voxels: Vec<(usize, usize, usize)> = Vec::new();
        for point in high_curvature_points.iter().chain(narrow_points.iter()) {
            let rel = point - origin;
            let idx = (
                (rel.x / base).floor() as i64,
                (rel.y / base).floor() as i64,
                (rel.z / base).floor() as i64,
            );
            if idx.0 >= 0
                && idx.1 >= 0
                && idx.2 >= 0
                && (idx.0 as usize) < shape.0
                && (idx.1 as usize) < shape.1
                && (idx.2 as usize) < shape.2
            {
                voxels.push((idx.0 as usize, idx.1 as usize, idx.2 as usize));
            }
        }
        voxels.sort_unstable();
        voxels.dedup();
        voxels
    }

    fn refine_regions(
        &self,
        mesh: &TriangleMesh,
        grid: &mut DenseGrid,
        origin: &Vector3<f64>,
        refinement_voxels: &[(usize, usize, usize)],
    ) {
        log::info!("refining flagged regions");
        let base = self.config.base_voxel_size;
        let min_size = self.config.min_voxel_size;
        let subdivision = (base / min_size).round().max(1.0) as usize;

        let results: Vec<((usize, usize, usize), bool)> = refinement_voxels
            .par_iter()
            .filter(|&&(i, j, k)| grid.is_occupied((i as i64, j as i64, k as i64)))
            .map(|&(i, j, k)| {
                let voxel_min = origin + Vector3::new(i as f64 * base, j as f64 * base, k as f64 * base);
                let mut points = Vec::with_capacity(subdivision.pow(3));
                for a in 0..subdivision {
                    for b in 0..subdivision {
                        for c in 0..subdivision {
                            points.push(
                                voxel_min
                                    + Vector3::new(
                                        (a as f64 + 0.5) * min_size,
                                        (b as f64 + 0.5) * min_size,
                                        (c as f64 + 0.5) * min_size,
                                    ),
                            );
                        }
                    }
                }
                let contains = mesh.contains_points(&points);
                let any_in = contains.iter().any(|&c| c);
                let all_in = contains.iter().all(|&c| c);
                ((i, j, k), any_in && !all_in)
            })
            .collect();

        for ((i, j, k), needs_refinement) in results {
            if needs_refinement {
                grid.set_voxel_size(i, j, k, min_size);
            }
        }
        log::info!("region refinement complete");
    }

    fn voxelize_octree(
        &self,
        mesh: &TriangleMesh,
        origin: &Vector3<f64>,
        dims: &Vector3<f64>,
    ) -> SparseOctree {
        let center = origin + dims * 0.5;
        let half_size = dims.x.max(dims.y).max(dims.z) / 2.0;
        let root = Octree::build(mesh, center, half_size, self.config.min_voxel_size);

        let mut leaves = Vec::new();
        root.collect_leaf_voxels(&mut leaves);
        log::info!("octree voxelization complete, generated {} voxels", leaves.len());

        let base = self.config.base_voxel_size;
        let grid_shape = (
            (dims.x / base).ceil().max(1.0) as i64,
            (dims.y / base).ceil().max(1.0) as i64,
            (dims.z / base).ceil().max(1.0) as i64,
        );
        SparseOctree::new(*origin, base, grid_shape, root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube_mesh() -> TriangleMesh {
        let v = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(2.0, 2.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
            Vector3::new(0.0, 0.0, 2.0),
            Vector3::new(2.0, 0.0, 2.0),
            Vector3::new(2.0, 2.0, 2.0),
            Vector3::new(0.0, 2.0, 2.0),
        ];
        let idx: Vec<[u32; 3]> = vec![
            [0, 2, 1], [0, 3, 2],
            [4, 5, 6], [4, 6, 7],
            [0, 1, 5], [0, 5, 4],
            [1, 2, 6], [1, 6, 5],
            [2, 3, 7], [2, 7, 6],
            [3, 0, 4], [3, 4, 7],
        ];
        TriangleMesh::new(v, idx).unwrap()
    }

    #[test]
    fn voxelizes_cube_to_dense_grid_with_interior_occupied() {
        let mesh = unit_cube_mesh();
        let mut cfg = VoxelizationConfig::default();
        cfg.base_voxel_size = 0.5;
        cfg.min_voxel_size = 0.25;
        let voxelizer = Voxelizer::new(cfg);
        let field = voxelizer.voxelize(&mesh);
        let map = field.to_occupancy_map();
        assert!(!map.is_empty());
    }

    #[test]
    fn falls_back_to_octree_when_over_budget() {
        let mesh = unit_cube_mesh();
        let mut cfg = VoxelizationConfig::default();
        cfg.base_voxel_size = 0.01;
        cfg.max_memory_mb = 0.001;
        let voxelizer = Voxelizer::new(cfg);
        let field = voxelizer.voxelize(&mesh);
        let map = field.to_occupancy_map();
        assert!(!map.is_empty());
    }
}
