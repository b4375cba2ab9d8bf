//! Final assembly: combines detected spaces, openings and ACH results into the serializable
//! output record, plus a validation pass over the assembled data (component C6).

use crate::ach::AchResult;
use crate::config::AnalysisConfig;
use crate::opening::{DoorState, Opening, OpeningType};
use crate::space::{Space, SpaceId, SpaceType};
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryPath {
    pub route: Vec<String>,
    pub via: Vec<String>,
    pub length: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VentilationInfo {
    pub primary_path: Option<PrimaryPath>,
    pub path_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub space_type: String,
    pub volume: f64,
    pub bounding_box: BoundingBox,
    pub ventilation_rate: f64,
    pub connections: Vec<String>,
    pub ventilation_info: VentilationInfo,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub opening_type: String,
    pub connects: [String; 2],
    pub position: [f64; 3],
    pub area: f64,
    pub state: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpacePathEntry {
    pub route: Vec<String>,
    pub via: Vec<String>,
    pub contribution: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VentilationPathGroup {
    pub space_id: String,
    pub paths: Vec<SpacePathEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoxelizationSummary {
    pub base_size: f64,
    pub min_size: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VentilationSummary {
    pub high_ach: f64,
    pub medium_ach_range: (f64, f64),
    pub low_ach_range: (f64, f64),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSummary {
    pub voxelization: VoxelizationSummary,
    pub ventilation: VentilationSummary,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub version: String,
    pub generated_at: String,
    pub description: String,
    pub parameters: ParameterSummary,
}

/// The complete assembled analysis output, ready for serialization (with the `io` feature) or
/// direct in-process consumption.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceAnalysisRecord {
    pub metadata: AnalysisMetadata,
    pub spaces: Vec<SpaceRecord>,
    pub connections: Vec<ConnectionRecord>,
    pub ventilation_paths: Vec<VentilationPathGroup>,
}

/// Errors and warnings produced by [`SpaceDataAssembler::validate`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct SpaceDataAssembler {
    config: AnalysisConfig,
}

impl SpaceDataAssembler {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Combines analysis outputs into the final record. `generated_at` is an ISO-8601
    /// timestamp supplied by the caller (this crate never reads the system clock itself).
    pub fn assemble(
        &self,
        spaces: &[Space],
        openings: &[Opening],
        ach_results: &FxHashMap<SpaceId, AchResult>,
        generated_at: &str,
    ) -> SpaceAnalysisRecord {
        log::info!("assembling final space analysis record");

        let mut connections_by_space: FxHashMap<SpaceId, Vec<String>> = FxHashMap::default();
        for opening in openings {
            for space_id in &opening.connects {
                connections_by_space
                    .entry(space_id.clone())
                    .or_default()
                    .push(opening.id.to_string());
            }
        }

        let space_records: Vec<SpaceRecord> = spaces
            .iter()
            .map(|space| {
                let ach = ach_results.get(&space.id);
                let ventilation_info = match ach.and_then(|r| r.paths.first()) {
                    Some(path) => VentilationInfo {
                        primary_path: Some(PrimaryPath {
                            route: path.route.iter().map(|id| id.to_string()).collect(),
                            via: path.via.iter().map(|id| id.to_string()).collect(),
                            length: path.length,
                        }),
                        path_count: ach.map(|r| r.paths.len()).unwrap_or(0),
                    },
                    None => VentilationInfo {
                        primary_path: None,
                        path_count: 0,
                    },
                };

                SpaceRecord {
                    id: space.id.to_string(),
                    space_type: space_type_label(space.space_type).to_string(),
                    volume: space.volume,
                    bounding_box: BoundingBox {
                        min: [space.bbox_min.x, space.bbox_min.y, space.bbox_min.z],
                        max: [space.bbox_max.x, space.bbox_max.y, space.bbox_max.z],
                    },
                    ventilation_rate: ach.map(|r| r.ach_rate).unwrap_or(0.0),
                    connections: connections_by_space.get(&space.id).cloned().unwrap_or_default(),
                    ventilation_info,
                }
            })
            .collect();

        let connection_records: Vec<ConnectionRecord> = openings
            .iter()
            .map(|opening| ConnectionRecord {
                id: opening.id.to_string(),
                opening_type: opening_type_label(opening.opening_type).to_string(),
                connects: [opening.connects[0].to_string(), opening.connects[1].to_string()],
                position: [opening.position.x, opening.position.y, opening.position.z],
                area: opening.area,
                state: door_state_label(opening.state).to_string(),
            })
            .collect();

        let mut ventilation_path_groups: Vec<VentilationPathGroup> = ach_results
            .iter()
            .filter(|(_, result)| !result.paths.is_empty())
            .map(|(space_id, result)| {
                let weights: Vec<f64> = result.paths.iter().map(|p| 1.0 / (p.weight + 0.1)).collect();
                let total: f64 = weights.iter().sum();
                let paths: Vec<SpacePathEntry> = result
                    .paths
                    .iter()
                    .zip(weights.iter())
                    .map(|(path, w)| SpacePathEntry {
                        route: path.route.iter().map(|id| id.to_string()).collect(),
                        via: path.via.iter().map(|id| id.to_string()).collect(),
                        contribution: if total > 0.0 { w / total } else { 0.0 },
                    })
                    .collect();
                VentilationPathGroup {
                    space_id: space_id.to_string(),
                    paths,
                }
            })
            .collect();
        ventilation_path_groups.sort_by(|a, b| a.space_id.cmp(&b.space_id));

        SpaceAnalysisRecord {
            metadata: AnalysisMetadata {
                version: "1.0".to_string(),
                generated_at: generated_at.to_string(),
                description: "Enclosed-space ventilation analysis of a tessellated platform model".to_string(),
                parameters: ParameterSummary {
                    voxelization: VoxelizationSummary {
                        base_size: self.config.voxelization.base_voxel_size,
                        min_size: self.config.voxelization.min_voxel_size,
                    },
                    ventilation: VentilationSummary {
                        high_ach: self.config.ventilation.high_ach_rate,
                        medium_ach_range: self.config.ventilation.medium_ach_range,
                        low_ach_range: self.config.ventilation.low_ach_range,
                    },
                },
            },
            spaces: space_records,
            connections: connection_records,
            ventilation_paths: ventilation_path_groups,
        }
    }

    /// Checks the assembled record for missing/duplicate IDs, dangling connection references,
    /// and implausible volumes/ventilation rates, per original_source's `validate_space_data`.
    pub fn validate(&self, record: &SpaceAnalysisRecord) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut space_ids = std::collections::HashSet::new();

        for space in &record.spaces {
            if !space_ids.insert(space.id.clone()) {
                report.errors.push(format!("duplicate space id: {}", space.id));
            }
            if space.volume <= 0.0 {
                report.warnings.push(format!("space {} has implausible volume: {}", space.id, space.volume));
            }
            if space.ventilation_rate < 0.0 {
                report
                    .warnings
                    .push(format!("space {} has negative ventilation rate: {}", space.id, space.ventilation_rate));
            } else if space.ventilation_rate > 20.0 {
                report
                    .warnings
                    .push(format!("space {} has implausibly high ventilation rate: {}", space.id, space.ventilation_rate));
            }
        }

        let mut connection_ids = std::collections::HashSet::new();
        for connection in &record.connections {
            if !connection_ids.insert(connection.id.clone()) {
                report.errors.push(format!("duplicate connection id: {}", connection.id));
            }
            for space_id in &connection.connects {
                if !space_ids.contains(space_id) && space_id != crate::topology::EXTERIOR_ID {
                    report
                        .errors
                        .push(format!("connection {} references unknown space: {}", connection.id, space_id));
                }
            }
        }

        report
    }
}

fn space_type_label(space_type: SpaceType) -> &'static str {
    match space_type {
        SpaceType::Unknown => "unknown",
        SpaceType::Merged => "merged",
    }
}

fn opening_type_label(opening_type: OpeningType) -> &'static str {
    match opening_type {
        OpeningType::StandardDoor => "standard_door",
        OpeningType::WideDoor => "wide_door",
        OpeningType::Passage => "passage",
    }
}

fn door_state_label(state: DoorState) -> &'static str {
    match state {
        DoorState::Open => "open",
        DoorState::Closed => "closed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ach::AchResult;
    use crate::topology::SimplePath;
    use nalgebra::Vector3;

    fn space(id: &str) -> Space {
        Space {
            id: SpaceId(id.to_string()),
            voxels: Vec::new(),
            volume: 10.0,
            centroid: Vector3::zeros(),
            bbox_min: Vector3::zeros(),
            bbox_max: Vector3::new(1.0, 1.0, 1.0),
            dimensions: Vector3::new(1.0, 1.0, 1.0),
            space_type: SpaceType::Unknown,
            merged_from: Vec::new(),
        }
    }

    fn opening(id: &str, a: &str, b: &str) -> Opening {
        Opening {
            id: crate::opening::OpeningId(id.to_string()),
            opening_type: OpeningType::StandardDoor,
            connects: [SpaceId(a.to_string()), SpaceId(b.to_string())],
            position: Vector3::zeros(),
            voxels: Vec::new(),
            area: 2.0,
            perimeter: 0.0,
            width: 1.0,
            height: 1.0,
            aspect_ratio: 1.0,
            circularity: 0.0,
            direction: Vector3::z(),
            planarity: 1.0,
            state: DoorState::Open,
        }
    }

    #[test]
    fn assembled_record_validates_clean() {
        let spaces = vec![space("space_000")];
        let openings = vec![opening("opening_001", "space_000", "space_exterior")];
        let mut ach_results = FxHashMap::default();
        ach_results.insert(
            SpaceId("space_000".into()),
            AchResult {
                ach_rate: 8.0,
                paths: vec![SimplePath {
                    route: vec![SpaceId("space_000".into()), SpaceId("space_exterior".into())],
                    via: vec![crate::opening::OpeningId("opening_001".into())],
                    weight: 0.5,
                    length: 1,
                    total_opening_area: 2.0,
                    is_repair: false,
                }],
            },
        );

        let assembler = SpaceDataAssembler::new(AnalysisConfig::default());
        let record = assembler.assemble(&spaces, &openings, &ach_results, "2026-01-01T00:00:00Z");
        let report = assembler.validate(&record);
        assert!(report.is_valid());
        assert_eq!(record.spaces[0].connections.len(), 1);
    }

    #[test]
    fn dangling_connection_reference_is_an_error() {
        let spaces = vec![space("space_000")];
        let openings = vec![opening("opening_001", "space_000", "space_999")];
        let ach_results = FxHashMap::default();

        let assembler = SpaceDataAssembler::new(AnalysisConfig::default());
        let record = assembler.assemble(&spaces, &openings, &ach_results, "2026-01-01T00:00:00Z");
        let report = assembler.validate(&record);
        assert!(!report.is_valid());
    }
}
