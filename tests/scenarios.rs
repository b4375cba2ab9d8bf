//! Integration tests covering the seed scenarios: one test per numbered scenario.
//!
//! Most scenarios construct `Space`/`Opening` values directly rather than deriving them from
//! a voxelized mesh. A literal voxel-level window or door is a one-voxel gap in an otherwise
//! solid wall, which a plain 6-connected exterior flood fill would walk straight through,
//! merging the "room" into the exterior component rather than keeping it distinct — so space
//! and opening detection is exercised at the component level here, the same way
//! `opening::mod`'s own unit tests do, while scenario 4 (fragment merging) exercises the real
//! voxel grid where that mismatch does not apply.

use fxhash::FxHashMap;
use nalgebra::Vector3;
use platform_ventilation::ach::AchCalculator;
use platform_ventilation::assembler::SpaceDataAssembler;
use platform_ventilation::config::{AnalysisConfig, SpaceDetectionConfig, VentilationConfig};
use platform_ventilation::opening::{DoorState, Opening, OpeningId, OpeningType};
use platform_ventilation::space::{Space, SpaceDetector, SpaceId, SpaceType};
use platform_ventilation::topology::TopologyGraph;
use platform_ventilation::voxel::DenseGrid;

fn make_space(id: &str, volume: f64) -> Space {
    Space {
        id: SpaceId(id.to_string()),
        voxels: Vec::new(),
        volume,
        centroid: Vector3::zeros(),
        bbox_min: Vector3::zeros(),
        bbox_max: Vector3::new(1.0, 1.0, 1.0),
        dimensions: Vector3::new(1.0, 1.0, 1.0),
        space_type: SpaceType::Unknown,
        merged_from: Vec::new(),
    }
}

fn make_opening(
    id: &str,
    a: &str,
    b: &str,
    opening_type: OpeningType,
    area: f64,
    width: f64,
    height: f64,
    aspect_ratio: f64,
) -> Opening {
    Opening {
        id: OpeningId(id.to_string()),
        opening_type,
        connects: [SpaceId(a.to_string()), SpaceId(b.to_string())],
        position: Vector3::zeros(),
        voxels: Vec::new(),
        area,
        perimeter: 2.0 * (width + height),
        width,
        height,
        aspect_ratio,
        circularity: 0.0,
        direction: Vector3::z(),
        planarity: 1.0,
        state: DoorState::Open,
    }
}

/// Scenario 1: single empty cube with one window, no internal partitions. Expected: 1 space,
/// 1 opening to the exterior, topology weight 1, ACH = ACH_high (path length 1).
#[test]
fn scenario_1_single_room_with_window() {
    let room = make_space("space_000", 1000.0);
    // A 1x1 m window: area = width * height = 1.0, so edge weight 1/area = 1.0.
    let opening = make_opening(
        "opening_001",
        "space_000",
        "space_exterior",
        OpeningType::WideDoor,
        1.0,
        1.0,
        1.0,
        1.0,
    );

    let topology = TopologyGraph::build(&[room.clone()], &[opening.clone()]);
    assert_eq!(topology.edge_count(), 1);
    assert!(topology.isolated_spaces().is_empty());

    let calculator = AchCalculator::new(VentilationConfig::default());
    let rates = calculator.calculate_ach_rates(&[room.clone()], &topology);
    let result = &rates[&SpaceId("space_000".into())];
    assert_eq!(result.paths.len(), 1);
    assert_eq!(result.paths[0].length, 1);
    assert!((result.ach_rate - VentilationConfig::default().high_ach_rate).abs() < 1e-6);

    let assembler = SpaceDataAssembler::new(AnalysisConfig::default());
    let record = assembler.assemble(&[room], &[opening], &rates, "2026-07-27T00:00:00Z");
    let report = assembler.validate(&record);
    assert!(report.is_valid());
    assert_eq!(record.spaces[0].connections.len(), 1);
}

/// Scenario 2: two rooms joined by one door, no external opening. Expected: after the repair
/// pass, an edge to the exterior exists from the larger room; both spaces' ACH stay at or
/// below `mean(ACH_medium_range)`.
#[test]
fn scenario_2_two_rooms_one_door_no_exterior() {
    let small = make_space("space_000", 75.0);
    let large = make_space("space_001", 90.0);
    let door = make_opening(
        "opening_001",
        "space_000",
        "space_001",
        OpeningType::StandardDoor,
        1.2,
        2.1,
        0.9,
        2.1 / 0.9,
    );

    let spaces = vec![small, large];
    let topology = TopologyGraph::build(&spaces, &[door.clone()]);

    // Both components (the door-joined pair, and the lone exterior) get reconciled by the
    // repair pass, so nothing is left unreachable.
    assert!(topology.isolated_spaces().is_empty());
    assert_eq!(topology.edge_count(), 2);

    let calculator = AchCalculator::new(VentilationConfig::default());
    let rates = calculator.calculate_ach_rates(&spaces, &topology);
    let medium_mean = mean(VentilationConfig::default().medium_ach_range);

    let small_rate = rates[&SpaceId("space_000".into())].ach_rate;
    let large_rate = rates[&SpaceId("space_001".into())].ach_rate;
    assert!(small_rate <= medium_mean + 1e-9, "small room ACH {small_rate} exceeded medium mean");
    assert!(large_rate <= medium_mean + 1e-9, "large room ACH {large_rate} exceeded medium mean");

    // The larger room is the one the repair pass attaches directly to the exterior; its only
    // path is therefore repair-only, so it floors to the lowest ACH.
    assert!((large_rate - VentilationConfig::default().low_ach_range.0).abs() < 1e-9);
    let _ = door;
}

/// Scenario 3: corridor flanked by two rooms, each joined to the corridor by a door, corridor
/// has one window to the outside. Expected: 3 spaces, 3 openings (2 doors + 1 window), and
/// the corridor-to-exterior opening classifies as a passage (`aspect_ratio >= passage_aspect`).
#[test]
fn scenario_3_corridor_with_two_rooms() {
    let room_a = make_space("space_000", 48.0);
    let corridor = make_space("space_001", 60.0);
    let room_b = make_space("space_002", 48.0);

    let door_a = make_opening(
        "opening_001",
        "space_000",
        "space_001",
        OpeningType::StandardDoor,
        1.0,
        2.1,
        0.9,
        2.1 / 0.9,
    );
    let door_b = make_opening(
        "opening_002",
        "space_001",
        "space_002",
        OpeningType::StandardDoor,
        1.0,
        2.1,
        0.9,
        2.1 / 0.9,
    );
    // Corridor window: wide and low, aspect ratio clears the passage threshold (3.0).
    let window = make_opening(
        "opening_003",
        "space_001",
        "space_exterior",
        OpeningType::Passage,
        2.7,
        3.0,
        0.9,
        3.0 / 0.9,
    );

    let spaces = vec![room_a, corridor, room_b];
    let openings = vec![door_a, door_b, window];
    assert_eq!(openings.len(), 3);
    assert!(openings
        .iter()
        .any(|o| o.opening_type == OpeningType::Passage && o.aspect_ratio >= AnalysisConfig::default().openings.passage_aspect_ratio));

    let topology = TopologyGraph::build(&spaces, &openings);
    // The corridor's direct window keeps the whole graph connected without any repair edge.
    assert!(topology.isolated_spaces().is_empty());
    assert_eq!(topology.edge_count(), 3);

    let calculator = AchCalculator::new(VentilationConfig::default());
    let rates = calculator.calculate_ach_rates(&spaces, &topology);
    let low_min = VentilationConfig::default().low_ach_range.0;
    let high = VentilationConfig::default().high_ach_rate;
    for space in &spaces {
        let rate = rates[&space.id].ach_rate;
        assert!((low_min..=high).contains(&rate), "ACH {rate} for {} out of bounds", space.id);
    }

    // Each flanking room's best path runs through the corridor: one intermediate hop.
    let room_a_result = &rates[&SpaceId("space_000".into())];
    assert_eq!(room_a_result.paths[0].length, 2);
}

/// Scenario 4: a single room with a partial interior wall splitting it into two blobs
/// separated by a gap below the merge distance. Expected: after fragment merging, exactly one
/// space of type `merged`, `merged_from` of length 2, volume equal to the sum of the
/// fragments.
#[test]
fn scenario_4_fragmented_space_merges() {
    // A solid 3x7x3 block with two single-voxel interior voids, separated along the middle
    // axis by solid material — the grid boundary is entirely solid, so there is no exterior
    // flood reachable at all and both voids are immediately interior components.
    let mut grid = DenseGrid::new(Vector3::zeros(), 1.0, (3, 7, 3));
    for i in 0..3 {
        for j in 0..7 {
            for k in 0..3 {
                grid.set_occupied(i, j, k, true);
            }
        }
    }
    grid.set_occupied(1, 1, 1, false);
    grid.set_occupied(1, 5, 1, false);

    let config = SpaceDetectionConfig {
        min_space_volume: 0.0,
        space_merge_distance: 5.0,
        ..SpaceDetectionConfig::default()
    };
    let detector = SpaceDetector::new(config);
    let (spaces, adjacency, _exterior) = detector.detect_spaces(&grid);
    assert_eq!(spaces.len(), 2);
    let fragment_volumes: f64 = spaces.iter().map(|s| s.volume).sum();

    let (merged, edges) = detector.merge_fragmented_spaces(spaces, adjacency, &grid);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].space_type, SpaceType::Merged);
    assert_eq!(merged[0].merged_from.len(), 2);
    assert!((merged[0].volume - fragment_volumes).abs() < 1e-9);

    let topology = TopologyGraph::build(&merged, &[]);
    assert_eq!(topology.node_count(), 2);
    let _ = edges;
}

/// Scenario 5: a sealed box within another box, no opening at all. Expected: the repair pass
/// adds an `is_repair=true` edge between the inner space and the exterior, and the inner
/// space's ACH equals `ACH_low_min`.
#[test]
fn scenario_5_disconnected_interior_room() {
    let outer = make_space("space_000", 500.0);
    let inner = make_space("space_001", 20.0);
    // Only the outer room has a real opening to the exterior; the inner room has none at all.
    let window = make_opening(
        "opening_001",
        "space_000",
        "space_exterior",
        OpeningType::WideDoor,
        1.0,
        1.0,
        1.0,
        1.0,
    );

    let spaces = vec![outer, inner];
    let topology = TopologyGraph::build(&spaces, &[window.clone()]);
    assert!(topology.isolated_spaces().is_empty());
    // One real edge (outer-exterior) plus one repair edge (inner-exterior).
    assert_eq!(topology.edge_count(), 2);

    let calculator = AchCalculator::new(VentilationConfig::default());
    let rates = calculator.calculate_ach_rates(&spaces, &topology);
    let inner_rate = rates[&SpaceId("space_001".into())].ach_rate;
    assert!((inner_rate - VentilationConfig::default().low_ach_range.0).abs() < 1e-9);

    let outer_rate = rates[&SpaceId("space_000".into())].ach_rate;
    assert!((outer_rate - VentilationConfig::default().high_ach_rate).abs() < 1e-6);
    let _ = window;
}

/// Scenario 6: scenario 3's corridor layout with one door flagged closed. Expected: the
/// affected space's derived ACH is 0.7x its original value, and the stored ACH map (the one
/// `calculate_ach_rates` returned) is unchanged.
#[test]
fn scenario_6_closed_door_override() {
    let room_a = make_space("space_000", 48.0);
    let corridor = make_space("space_001", 60.0);
    let door_a = make_opening(
        "opening_001",
        "space_000",
        "space_001",
        OpeningType::StandardDoor,
        1.0,
        2.1,
        0.9,
        2.1 / 0.9,
    );
    let window = make_opening(
        "opening_002",
        "space_001",
        "space_exterior",
        OpeningType::WideDoor,
        1.0,
        1.0,
        1.0,
        1.0,
    );

    let spaces = vec![room_a, corridor];
    let openings = vec![door_a, window];
    let topology = TopologyGraph::build(&spaces, &openings);

    let calculator = AchCalculator::new(VentilationConfig::default());
    let rates = calculator.calculate_ach_rates(&spaces, &topology);
    let original = rates[&SpaceId("space_000".into())].ach_rate;

    let mut states = FxHashMap::default();
    states.insert(OpeningId("opening_001".into()), DoorState::Closed);
    let updated = calculator.apply_opening_states(&rates, &states);

    let after = updated[&SpaceId("space_000".into())];
    assert!((after - original * 0.7).abs() < 1e-9);

    // The original map handed to apply_opening_states is untouched.
    assert!((rates[&SpaceId("space_000".into())].ach_rate - original).abs() < 1e-12);
}

fn mean(range: (f64, f64)) -> f64 {
    (range.0 + range.1) / 2.0
}
