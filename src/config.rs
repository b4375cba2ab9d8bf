//! Typed analysis configuration.
//!
//! Replaces the global configuration singleton of earlier prototypes with an explicit value
//! threaded through every component's constructor. Each section mirrors one of the four
//! configuration groups named in the design: voxelization, space detection, openings and
//! ventilation. Unknown keys cannot be expressed at all since the record is a plain struct
//! rather than a dictionary.

use crate::error::AnalysisError;

/// Parameters controlling adaptive voxelization of the input mesh (component C1).
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelizationConfig {
    /// Base (coarse) voxel edge length, in metres.
    pub base_voxel_size: f64,
    /// Minimum refined voxel edge length, in metres.
    pub min_voxel_size: f64,
    /// Curvature magnitude above which a vertex triggers local refinement.
    pub curvature_threshold: f64,
    /// Nearest-other-vertex distance below which a vertex is considered part of a narrow
    /// passage and triggers local refinement.
    pub width_threshold: f64,
    /// Memory budget for the dense occupancy grid, in megabytes, before falling back to the
    /// octree strategy.
    pub max_memory_mb: f64,
}

impl Default for VoxelizationConfig {
    fn default() -> Self {
        Self {
            base_voxel_size: 1.0,
            min_voxel_size: 0.125,
            curvature_threshold: 0.5,
            width_threshold: 2.0,
            max_memory_mb: 8192.0,
        }
    }
}

/// Parameters controlling enclosed-space detection (component C2).
#[derive(Clone, Debug, PartialEq)]
pub struct SpaceDetectionConfig {
    /// Minimum volume, in cubic metres, for a connected component to be kept as a space.
    pub min_space_volume: f64,
    /// Maximum estimated separation, in metres, for two adjacent spaces to be merged.
    pub space_merge_distance: f64,
    /// Maximum number of boundary seed points sampled for exterior flood fill.
    pub max_seed_points: usize,
}

impl Default for SpaceDetectionConfig {
    fn default() -> Self {
        Self {
            min_space_volume: 5.0,
            space_merge_distance: 0.5,
            max_seed_points: 5000,
        }
    }
}

/// Parameters controlling opening detection and classification (component C3).
#[derive(Clone, Debug, PartialEq)]
pub struct OpeningConfig {
    /// Openings at or below this area (m²) with aspect ratio >= 1.5 classify as standard doors.
    pub standard_door_area_limit: f64,
    /// Openings at or below this area (m²) and narrower than 3 m classify as wide doors.
    pub wide_door_area_limit: f64,
    /// Aspect ratio at or above which a large/elongated opening classifies as a passage.
    pub passage_aspect_ratio: f64,
    /// Valid opening height range (min, max), in metres, used to filter implausible openings.
    pub opening_height_range: (f64, f64),
}

impl Default for OpeningConfig {
    fn default() -> Self {
        Self {
            standard_door_area_limit: 2.0,
            wide_door_area_limit: 5.0,
            passage_aspect_ratio: 3.0,
            opening_height_range: (0.0, 2.2),
        }
    }
}

/// Parameters controlling ACH computation (component C5).
#[derive(Clone, Debug, PartialEq)]
pub struct VentilationConfig {
    /// ACH assigned to single-hop (direct-to-exterior) paths.
    pub high_ach_rate: f64,
    /// ACH range used for two-hop paths; the midpoint is the base rate.
    pub medium_ach_range: (f64, f64),
    /// ACH range used for paths of three or more hops; the midpoint is the base rate.
    pub low_ach_range: (f64, f64),
    /// Exponent applied to summed opening area along a path.
    pub opening_influence_factor: f64,
    /// Per-hop multiplicative decay applied to a path's contribution.
    pub path_decay_factor: f64,
}

impl Default for VentilationConfig {
    fn default() -> Self {
        Self {
            high_ach_rate: 10.0,
            medium_ach_range: (5.0, 8.0),
            low_ach_range: (1.0, 4.0),
            opening_influence_factor: 0.7,
            path_decay_factor: 0.6,
        }
    }
}

/// Top-level configuration record for a single analysis run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalysisConfig {
    pub voxelization: VoxelizationConfig,
    pub space_detection: SpaceDetectionConfig,
    pub openings: OpeningConfig,
    pub ventilation: VentilationConfig,
}

impl AnalysisConfig {
    /// Validates the configuration, rejecting out-of-range values before any component
    /// constructor runs.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let v = &self.voxelization;
        if v.base_voxel_size <= 0.0 {
            return Err(AnalysisError::InputError(
                "voxelization.base_voxel_size must be positive".into(),
            ));
        }
        if v.min_voxel_size <= 0.0 || v.min_voxel_size > v.base_voxel_size {
            return Err(AnalysisError::InputError(
                "voxelization.min_voxel_size must be positive and <= base_voxel_size".into(),
            ));
        }
        if v.max_memory_mb <= 0.0 {
            return Err(AnalysisError::InputError(
                "voxelization.max_memory_mb must be positive".into(),
            ));
        }

        let s = &self.space_detection;
        if s.min_space_volume < 0.0 {
            return Err(AnalysisError::InputError(
                "space_detection.min_space_volume must be non-negative".into(),
            ));
        }
        if s.max_seed_points == 0 {
            return Err(AnalysisError::InputError(
                "space_detection.max_seed_points must be positive".into(),
            ));
        }

        let o = &self.openings;
        if o.standard_door_area_limit <= 0.0
            || o.wide_door_area_limit <= 0.0
            || o.wide_door_area_limit < o.standard_door_area_limit
        {
            return Err(AnalysisError::InputError(
                "openings area limits must be positive and standard <= wide".into(),
            ));
        }

        let t = &self.ventilation;
        if t.high_ach_rate <= 0.0 {
            return Err(AnalysisError::InputError(
                "ventilation.high_ach_rate must be positive".into(),
            ));
        }
        if t.medium_ach_range.0 > t.medium_ach_range.1 || t.low_ach_range.0 > t.low_ach_range.1 {
            return Err(AnalysisError::InputError(
                "ventilation ranges must have min <= max".into(),
            ));
        }
        if t.path_decay_factor <= 0.0 || t.path_decay_factor > 1.0 {
            return Err(AnalysisError::InputError(
                "ventilation.path_decay_factor must be in (0, 1]".into(),
            ));
        }

        Ok(())
    }
}
