use super::{OccupancyField, OccupancyMap, VoxelIndex};
use crate::mesh::TriangleMesh;
use nalgebra::Vector3;

/// Maximum recursion depth for octree construction, matching original_source's
/// `_build_octree(..., max_level=6)`.
pub const MAX_OCTREE_LEVEL: u32 = 6;

/// One node of an adaptive octree, used as the sparse occupancy fallback when a dense grid
/// would exceed the configured memory budget.
#[derive(Clone, Debug)]
pub struct Octree {
    center: Vector3<f64>,
    half_size: f64,
    level: u32,
    is_leaf: bool,
    is_occupied: bool,
    children: Vec<Octree>,
}

impl Octree {
    /// Builds and recursively subdivides an octree covering `center`/`half_size`, testing
    /// occupancy at each node's eight corners against `mesh`. Stops subdividing at
    /// [`MAX_OCTREE_LEVEL`] or once the node edge length reaches `min_voxel_size`, and also
    /// stops early wherever all eight corners agree (fully inside or fully outside) since
    /// further refinement cannot change the verdict there.
    pub fn build(mesh: &TriangleMesh, center: Vector3<f64>, half_size: f64, min_voxel_size: f64) -> Self {
        let mut root = Octree {
            center,
            half_size,
            level: 0,
            is_leaf: false,
            is_occupied: true,
            children: Vec::new(),
        };
        root.subdivide(mesh, min_voxel_size);
        root
    }

    fn subdivide(&mut self, mesh: &TriangleMesh, min_voxel_size: f64) {
        let edge = self.half_size * 2.0;
        if self.level >= MAX_OCTREE_LEVEL || edge <= min_voxel_size {
            self.is_leaf = true;
            self.is_occupied = self.corner_containment(mesh).iter().any(|&c| c);
            return;
        }

        let corners = self.corner_containment(mesh);
        let all_in = corners.iter().all(|&c| c);
        let all_out = corners.iter().all(|&c| !c);
        if all_in || all_out {
            self.is_leaf = true;
            self.is_occupied = !all_out;
            return;
        }

        self.is_leaf = false;
        self.is_occupied = true;

        const OFFSETS: [[f64; 3]; 8] = [
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [-1.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
        ];
        let child_half = self.half_size / 2.0;
        self.children = OFFSETS
            .iter()
            .map(|o| {
                let offset = Vector3::new(o[0], o[1], o[2]) * child_half;
                let mut child = Octree {
                    center: self.center + offset,
                    half_size: child_half,
                    level: self.level + 1,
                    is_leaf: false,
                    is_occupied: false,
                    children: Vec::new(),
                };
                child.subdivide(mesh, min_voxel_size);
                child
            })
            .collect();
    }

    fn corner_containment(&self, mesh: &TriangleMesh) -> [bool; 8] {
        let min = self.center - Vector3::new(self.half_size, self.half_size, self.half_size);
        let max = self.center + Vector3::new(self.half_size, self.half_size, self.half_size);
        let corners = [
            Vector3::new(min.x, min.y, min.z),
            Vector3::new(max.x, min.y, min.z),
            Vector3::new(min.x, max.y, min.z),
            Vector3::new(max.x, max.y, min.z),
            Vector3::new(min.x, min.y, max.z),
            Vector3::new(max.x, min.y, max.z),
            Vector3::new(min.x, max.y, max.z),
            Vector3::new(max.x, max.y, max.z),
        ];
        let mut result = [false; 8];
        for (r, c) in result.iter_mut().zip(corners.iter()) {
            *r = mesh.contains_point(c);
        }
        result
    }

    /// Collects every occupied leaf as `(centre, edge_length)`, matching original_source's
    /// `_collect_leaf_voxels` traversal order (depth-first, children in construction order).
    pub fn collect_leaf_voxels(&self, out: &mut Vec<(Vector3<f64>, f64)>) {
        if self.is_leaf {
            if self.is_occupied {
                out.push((self.center, self.half_size * 2.0));
            }
        } else {
            for child in &self.children {
                child.collect_leaf_voxels(out);
            }
        }
    }
}

/// The sparse occupancy representation used when a dense grid's estimated memory footprint
/// exceeds the configured budget.
#[derive(Clone, Debug)]
pub struct SparseOctree {
    origin: Vector3<f64>,
    base_voxel_size: f64,
    grid_shape: (i64, i64, i64),
    root: Octree,
}

impl SparseOctree {
    pub fn new(
        origin: Vector3<f64>,
        base_voxel_size: f64,
        grid_shape: (i64, i64, i64),
        root: Octree,
    ) -> Self {
        Self {
            origin,
            base_voxel_size,
            grid_shape,
            root,
        }
    }

    pub fn root(&self) -> &Octree {
        &self.root
    }
}

impl OccupancyField for SparseOctree {
    fn origin(&self) -> Vector3<f64> {
        self.origin
    }

    fn base_voxel_size(&self) -> f64 {
        self.base_voxel_size
    }

    fn grid_shape(&self) -> (i64, i64, i64) {
        self.grid_shape
    }

    fn to_occupancy_map(&self) -> OccupancyMap {
        let mut leaves = Vec::new();
        self.root.collect_leaf_voxels(&mut leaves);

        let mut map = OccupancyMap::default();
        for (center, edge) in leaves {
            let half = edge / 2.0;
            let min = center - Vector3::new(half, half, half);
            let max = center + Vector3::new(half, half, half);

            let to_index = |v: f64, origin: f64| ((v - origin) / self.base_voxel_size).floor() as i64;
            let i0 = to_index(min.x, self.origin.x);
            let i1 = to_index(max.x - 1e-9, self.origin.x);
            let j0 = to_index(min.y, self.origin.y);
            let j1 = to_index(max.y - 1e-9, self.origin.y);
            let k0 = to_index(min.z, self.origin.z);
            let k1 = to_index(max.z - 1e-9, self.origin.z);

            for i in i0..=i1 {
                for j in j0..=j1 {
                    for k in k0..=k1 {
                        let entry = map.entry((i, j, k)).or_insert(self.base_voxel_size);
                        if edge < *entry {
                            *entry = edge;
                        }
                    }
                }
            }
        }
        map
    }
}
