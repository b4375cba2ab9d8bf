//!
//! Geometry-to-ventilation analysis of enclosed spaces in tessellated offshore platform
//! models. Entry point is the [analyze] function.
//!
//! The pipeline turns a watertight triangle mesh into a voxel occupancy field, finds the
//! enclosed interior spaces and the openings between them, builds a connectivity graph over
//! those spaces, estimates an air-changes-per-hour rate for each one, and assembles the
//! result into a single serializable record. Components: [`voxel::Voxelizer`] (C1),
//! [`space::SpaceDetector`] (C2), [`opening::OpeningDetector`] (C3),
//! [`topology::TopologyGraph`] (C4), [`ach::AchCalculator`] (C5) and
//! [`assembler::SpaceDataAssembler`] (C6).
//!

pub mod aabb;
pub mod ach;
pub mod assembler;
pub mod config;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod opening;
pub mod space;
pub mod topology;
pub mod voxel;

pub use assembler::SpaceAnalysisRecord;
pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
pub use mesh::TriangleMesh;

use assembler::{SpaceDataAssembler, ValidationReport};

/// Initializes the global rayon thread pool used by this crate's parallel components
/// (mesh containment queries, dense-grid filling, octree refinement).
///
/// Initialization of the global thread pool happens exactly once. Calling this a second time
/// returns an error; if the caller never calls it, rayon lazily initializes a default pool
/// sized to the available parallelism on first use.
pub fn initialize_thread_pool(num_threads: usize) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|e| AnalysisError::Unknown(e.into()))?;
    Ok(())
}

/// The full output of one [analyze] run: the assembled record plus its validation report.
#[derive(Clone, Debug)]
pub struct AnalysisOutput {
    pub record: SpaceAnalysisRecord,
    pub validation: ValidationReport,
}

/// Runs the complete ventilation analysis pipeline over a triangle mesh.
///
/// `generated_at` is an ISO-8601 timestamp supplied by the caller; this crate never reads the
/// system clock. Returns [`AnalysisError::InputError`] if `config` fails validation, and
/// [`AnalysisError::ValidationError`] if the assembled record fails its own validation pass
/// (the record is still attached, unwrapped, via [`AnalysisOutput`] — callers that want the
/// record despite validation failures should use [`analyze_unchecked`] instead).
pub fn analyze(mesh: &TriangleMesh, config: &AnalysisConfig, generated_at: &str) -> Result<AnalysisOutput> {
    config.validate()?;
    let (record, validation) = analyze_unchecked(mesh, config, generated_at);
    if !validation.is_valid() {
        return Err(AnalysisError::ValidationError(validation.errors.join("; ")));
    }
    Ok(AnalysisOutput { record, validation })
}

/// Runs the same pipeline as [analyze] but always returns the assembled record together with
/// its validation report, even when validation fails.
pub fn analyze_unchecked(
    mesh: &TriangleMesh,
    config: &AnalysisConfig,
    generated_at: &str,
) -> (SpaceAnalysisRecord, ValidationReport) {
    log::info!("starting ventilation analysis");

    let voxelizer = voxel::Voxelizer::new(config.voxelization.clone());
    let field = voxelizer.voxelize(mesh);

    let space_detector = space::SpaceDetector::new(config.space_detection.clone());
    let (spaces, adjacency, exterior_voxels) = space_detector.detect_spaces(field.as_ref());
    let (spaces, adjacency) = space_detector.merge_fragmented_spaces(spaces, adjacency, field.as_ref());

    let opening_detector = opening::OpeningDetector::new(config.openings.clone());
    let openings = opening_detector.detect_openings(field.as_ref(), &spaces, &adjacency, &exterior_voxels);

    let topology = topology::TopologyGraph::build(&spaces, &openings);

    let ach_calculator = ach::AchCalculator::new(config.ventilation.clone());
    let ach_results = ach_calculator.calculate_ach_rates(&spaces, &topology);

    let assembler = SpaceDataAssembler::new(config.clone());
    let record = assembler.assemble(&spaces, &openings, &ach_results, generated_at);
    let validation = assembler.validate(&record);

    log::info!(
        "ventilation analysis complete: {} spaces, {} connections, valid={}",
        record.spaces.len(),
        record.connections.len(),
        validation.is_valid()
    );

    (record, validation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn cube_mesh(size: f64) -> TriangleMesh {
        let v = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(size, 0.0, 0.0),
            Vector3::new(size, size, 0.0),
            Vector3::new(0.0, size, 0.0),
            Vector3::new(0.0, 0.0, size),
            Vector3::new(size, 0.0, size),
            Vector3::new(size, size, size),
            Vector3::new(0.0, size, size),
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
    fn invalid_config_is_rejected_before_voxelization() {
        let mesh = cube_mesh(4.0);
        let mut config = AnalysisConfig::default();
        config.voxelization.base_voxel_size = 0.0;
        assert!(analyze(&mesh, &config, "2026-01-01T00:00:00Z").is_err());
    }

    #[test]
    fn hollow_cube_produces_a_validated_record() {
        // A large enough solid cube that the default space-detection thresholds keep any
        // interior void (if the mesh were hollow) or at least run the pipeline cleanly end
        // to end over a plain solid block.
        let mesh = cube_mesh(6.0);
        let mut config = AnalysisConfig::default();
        config.voxelization.base_voxel_size = 1.0;
        config.voxelization.min_voxel_size = 0.5;
        config.space_detection.min_space_volume = 0.0;

        let (record, validation) = analyze_unchecked(&mesh, &config, "2026-01-01T00:00:00Z");
        assert!(validation.is_valid());
        assert_eq!(record.metadata.version, "1.0");
    }
}
