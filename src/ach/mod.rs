//! Air-changes-per-hour (ACH) estimation: enumerates ventilation paths to the exterior, scores
//! each by path length, opening area and decay, and combines them into a per-space rate.

use crate::config::VentilationConfig;
use crate::opening::{DoorState, OpeningId};
use crate::space::{Space, SpaceId};
use crate::topology::{SimplePath, TopologyGraph};
use fxhash::FxHashMap;

const PATH_CUTOFF_HOPS: usize = 6;
const MAX_PATHS: usize = 5;
/// Above this difference, adjacent spaces' ACH rates are pulled toward their mean
/// (original_source's `_validate_ach_rates`).
const NEIGHBOR_DISCREPANCY_THRESHOLD: f64 = 5.0;
/// Fraction of the gap to the mean that each adjacent pair is corrected by.
const NEIGHBOR_ADJUSTMENT_FACTOR: f64 = 0.3;
/// Multiplicative ACH penalty applied when any path to the exterior is blocked by a closed
/// opening (original_source's `update_ach_for_opening_state`), distinct from the topology
/// graph's own per-edge `x10` reweighting for closed openings.
const CLOSED_OPENING_PENALTY: f64 = 0.7;

/// ACH result for a single space.
#[derive(Clone, Debug)]
pub struct AchResult {
    pub ach_rate: f64,
    pub paths: Vec<SimplePath>,
}

/// Coarse ACH classification, used for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AchCategory {
    High,
    Medium,
    Low,
}

pub struct AchCalculator {
    config: VentilationConfig,
}

impl AchCalculator {
    pub fn new(config: VentilationConfig) -> Self {
        Self { config }
    }

    /// Computes ACH rates for every space, then smooths discrepancies between directly
    /// adjacent spaces (original_source's `calculate_ach_rates` + `_validate_ach_rates`).
    pub fn calculate_ach_rates(&self, spaces: &[Space], topology: &TopologyGraph) -> FxHashMap<SpaceId, AchResult> {
        log::info!("calculating ACH rates for {} spaces", spaces.len());
        let mut results: FxHashMap<SpaceId, AchResult> = FxHashMap::default();

        for space in spaces {
            let paths = topology.simple_paths_to_exterior(&space.id, PATH_CUTOFF_HOPS, MAX_PATHS);
            let ach_rate = self.calculate_space_ach(&paths);
            log::debug!("space {} ACH: {:.2}", space.id, ach_rate);
            results.insert(space.id.clone(), AchResult { ach_rate, paths });
        }

        self.smooth_adjacent_discrepancies(&mut results, topology);
        results
    }

    /// Combines a space's ventilation paths into a single ACH rate, per original_source's
    /// `_calculate_space_ach`. A repair edge exists only to satisfy the reachability
    /// invariant, not because a real opening moves air, so a path backed solely by repair
    /// edges is scored as if no ventilation path existed at all.
    fn calculate_space_ach(&self, paths: &[SimplePath]) -> f64 {
        let real_paths: Vec<&SimplePath> = paths.iter().filter(|p| !p.is_repair).collect();
        if real_paths.is_empty() {
            return self.config.low_ach_range.0;
        }

        let contributions: Vec<f64> = real_paths
            .iter()
            .map(|path| {
                let base_ach = match path.length {
                    1 => self.config.high_ach_rate,
                    2 => mean(self.config.medium_ach_range),
                    _ => mean(self.config.low_ach_range),
                };
                let opening_area_factor = path.total_opening_area.max(0.0).powf(self.config.opening_influence_factor);
                let decay_factor = self.config.path_decay_factor.powi(path.length as i32 - 1);
                base_ach * opening_area_factor * decay_factor
            })
            .collect();

        let weights: Vec<f64> = real_paths.iter().map(|p| 1.0 / (p.weight + 0.1)).collect();
        let weight_sum: f64 = weights.iter().sum();
        let ach_rate: f64 = contributions
            .iter()
            .zip(weights.iter())
            .map(|(c, w)| c * (w / weight_sum))
            .sum();

        ach_rate.clamp(self.config.low_ach_range.0, self.config.high_ach_rate)
    }

    /// Pulls directly-adjacent spaces' ACH rates toward their mean when they differ by more
    /// than [`NEIGHBOR_DISCREPANCY_THRESHOLD`], per original_source's `_validate_ach_rates`.
    fn smooth_adjacent_discrepancies(&self, results: &mut FxHashMap<SpaceId, AchResult>, topology: &TopologyGraph) {
        for (a, b) in topology.adjacent_space_pairs() {
            let (Some(rate_a), Some(rate_b)) = (
                results.get(&a).map(|r| r.ach_rate),
                results.get(&b).map(|r| r.ach_rate),
            ) else {
                continue;
            };
            if (rate_a - rate_b).abs() <= NEIGHBOR_DISCREPANCY_THRESHOLD {
                continue;
            }
            let average = (rate_a + rate_b) / 2.0;
            let (new_a, new_b) = if rate_a > rate_b {
                (
                    rate_a - (rate_a - average) * NEIGHBOR_ADJUSTMENT_FACTOR,
                    rate_b + (average - rate_b) * NEIGHBOR_ADJUSTMENT_FACTOR,
                )
            } else {
                (
                    rate_a + (average - rate_a) * NEIGHBOR_ADJUSTMENT_FACTOR,
                    rate_b - (rate_b - average) * NEIGHBOR_ADJUSTMENT_FACTOR,
                )
            };
            if let Some(r) = results.get_mut(&a) {
                r.ach_rate = new_a;
            }
            if let Some(r) = results.get_mut(&b) {
                r.ach_rate = new_b;
            }
        }
    }

    /// Per-path share of a space's total ACH contribution, weighted by inverse path
    /// resistance (original_source's `calculate_ventilation_contributions`).
    pub fn path_contributions(&self, paths: &[SimplePath]) -> Vec<f64> {
        if paths.is_empty() {
            return Vec::new();
        }
        let weights: Vec<f64> = paths.iter().map(|p| 1.0 / (p.weight + 0.1)).collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return vec![0.0; paths.len()];
        }
        weights.into_iter().map(|w| w / total).collect()
    }

    /// Returns a derived copy of `rates` where every space with a ventilation path blocked by
    /// a closed opening has its ACH scaled down, per original_source's
    /// `update_ach_for_opening_state`. This is distinct from the topology graph's own
    /// `x10`-per-closed-opening edge reweighting.
    pub fn apply_opening_states(
        &self,
        rates: &FxHashMap<SpaceId, AchResult>,
        states: &FxHashMap<OpeningId, DoorState>,
    ) -> FxHashMap<SpaceId, f64> {
        rates
            .iter()
            .map(|(id, result)| {
                let affected = result
                    .paths
                    .iter()
                    .any(|p| p.via.iter().any(|o| matches!(states.get(o), Some(DoorState::Closed))));
                let rate = if affected {
                    result.ach_rate * CLOSED_OPENING_PENALTY
                } else {
                    result.ach_rate
                };
                (id.clone(), rate)
            })
            .collect()
    }

    /// Classifies an ACH value (original_source's `get_ach_category`).
    pub fn ach_category(&self, ach_rate: f64) -> AchCategory {
        if ach_rate >= self.config.medium_ach_range.1 {
            AchCategory::High
        } else if ach_rate >= self.config.low_ach_range.1 {
            AchCategory::Medium
        } else {
            AchCategory::Low
        }
    }
}

fn mean(range: (f64, f64)) -> f64 {
    (range.0 + range.1) / 2.0
}
