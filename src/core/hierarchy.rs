//! Hierarchical partition search: a connectivity-radius sweep toward a
//! target cluster count.
//!
//! Each sweep trial rebuilds the radius connections over the same points,
//! re-runs the phase simulation and extracts the synchronized ensembles of
//! the terminal state. Oscillator phases carry over from trial to trial, so
//! groups merged at a smaller radius stay merged while the growing radius
//! pulls further groups together. The per-trial levels form an explicit
//! dendrogram from many small clusters toward few large ones.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tracing::debug;

use crate::cluster::{squared_distance, SyncClusterEngine};
use crate::error::{SynclustError, SynclustResult};
use crate::network::{InitialPhases, Snapshot, Trajectory};
use crate::solver::SolvePolicy;
use crate::topology::OscillatorId;

/// Radius schedule of the hierarchical sweep.
///
/// Trial 0 always runs at radius 0. Each later trial estimates its radius
/// as the mean distance from every point to its `k` nearest neighbors, with
/// `k` starting at `initial_neighbors` and growing by `neighbor_step`; once
/// `k` covers every point the radius grows by `radius_growth` instead.
/// Radii are forced strictly increasing: an estimate at or below the
/// previous radius is replaced by the smallest pairwise distance beyond it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SweepConfig {
    /// Neighbor count the first radius estimate uses.
    pub initial_neighbors: usize,
    /// Neighbor count increment per trial; 0 picks a step proportional to
    /// the point count.
    pub neighbor_step: usize,
    /// Multiplicative radius growth once the neighbor count covers every
    /// point.
    pub radius_growth: f64,
    /// Hard cap on executed trials.
    pub max_trials: usize,
    /// Circular phase tolerance for per-trial ensemble extraction.
    pub tolerance: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            initial_neighbors: 3,
            neighbor_step: 0,
            radius_growth: 1.15,
            max_trials: 64,
            tolerance: 0.05,
        }
    }
}

impl SweepConfig {
    /// Validate the schedule, rejecting values the sweep cannot work with.
    pub fn validate(&self) -> SynclustResult<()> {
        if self.initial_neighbors == 0 {
            return Err(SynclustError::Parameter(
                "initial_neighbors must be >= 1".into(),
            ));
        }
        if !self.radius_growth.is_finite() || self.radius_growth <= 1.0 {
            return Err(SynclustError::Parameter(
                "radius_growth must be finite and > 1".into(),
            ));
        }
        if self.max_trials == 0 {
            return Err(SynclustError::Parameter("max_trials must be >= 1".into()));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(SynclustError::Parameter(
                "tolerance must be finite and >= 0".into(),
            ));
        }
        Ok(())
    }

    /// Effective neighbor-count increment for `n` points.
    fn step_for(&self, n: usize) -> usize {
        if self.neighbor_step > 0 {
            self.neighbor_step
        } else {
            ((n as f64 * 0.03).round() as usize).max(1)
        }
    }
}

/// One executed sweep trial.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SweepLevel {
    /// Connectivity radius of the trial.
    pub radius: f64,
    /// Ensembles extracted from the trial's terminal snapshot, ascending.
    pub ensembles: Vec<Vec<OscillatorId>>,
    /// Number of ensembles.
    pub count: usize,
}

/// Hierarchical partition search over a radius sweep.
///
/// Wraps a [`SyncClusterEngine`] and re-runs it under growing connectivity
/// radii until the number of synchronized ensembles drops to the target,
/// keeping every executed level as the dendrogram. The search never fails
/// over an unreachable target: the level whose count comes closest wins,
/// with ties toward the finer partition.
#[derive(Debug, Clone)]
pub struct HierarchicalSyncEngine {
    engine: SyncClusterEngine,
    target: usize,
    sweep: SweepConfig,
    history: Vec<SweepLevel>,
    selected: Option<usize>,
}

impl HierarchicalSyncEngine {
    /// Search over `points` for `target` clusters, entropy-seeded.
    #[cfg(feature = "std")]
    pub fn new(
        points: Vec<Vec<f64>>,
        target: usize,
        initial: InitialPhases,
    ) -> SynclustResult<HierarchicalSyncEngine> {
        let engine = SyncClusterEngine::new(points, 0.0, false, initial)?;
        Self::assemble(engine, target)
    }

    /// Deterministic variant: random phase distributions draw from `seed`.
    pub fn with_seed(
        points: Vec<Vec<f64>>,
        target: usize,
        initial: InitialPhases,
        seed: u64,
    ) -> SynclustResult<HierarchicalSyncEngine> {
        let engine = SyncClusterEngine::with_seed(points, 0.0, false, initial, seed)?;
        Self::assemble(engine, target)
    }

    fn assemble(
        engine: SyncClusterEngine,
        target: usize,
    ) -> SynclustResult<HierarchicalSyncEngine> {
        let n = engine.oscillators();
        if target == 0 || target > n {
            return Err(SynclustError::Config(format!(
                "target cluster count must lie in [1, {n}], got {target}"
            )));
        }
        Ok(HierarchicalSyncEngine {
            engine,
            target,
            sweep: SweepConfig::default(),
            history: Vec::new(),
            selected: None,
        })
    }

    /// Run the radius sweep.
    ///
    /// Stops at the first trial whose ensemble count is at or below the
    /// target, at the trial cap, or once the radius already covers the
    /// farthest pair. Returns one snapshot per executed trial at times
    /// 0, 1, 2, ... when `collect_dynamic` is true, else the selected
    /// level's snapshot alone.
    pub fn process(
        &mut self,
        order: f64,
        policy: SolvePolicy,
        collect_dynamic: bool,
    ) -> SynclustResult<Trajectory> {
        self.sweep.validate()?;
        self.history.clear();
        self.selected = None;

        let n = self.engine.oscillators();
        let step = self.sweep.step_for(n);
        let max_sq = largest_pair_sq(self.engine.points());

        let mut snapshots = Vec::new();
        let mut radius = 0.0f64;
        let mut neighbors = self.sweep.initial_neighbors;
        loop {
            self.engine.reconnect(radius)?;
            let trial = self.engine.process(order, policy, false)?;
            let terminal = trial.terminal();
            let ensembles = terminal.sync_ensembles(self.sweep.tolerance);
            let count = ensembles.len();
            debug!(
                trial = self.history.len(),
                radius, count, "sweep trial finished"
            );

            snapshots.push(Snapshot::new(
                self.history.len() as f64,
                terminal.phases().to_vec(),
            ));
            self.history.push(SweepLevel {
                radius,
                ensembles,
                count,
            });

            if count <= self.target || self.history.len() >= self.sweep.max_trials {
                break;
            }
            // Saturated connectivity cannot lose any more ensembles.
            if radius * radius >= max_sq {
                break;
            }

            let mut proposed = if neighbors >= n {
                radius * self.sweep.radius_growth
            } else {
                average_neighbor_distance(self.engine.points(), neighbors)
            };
            neighbors += step;
            if proposed <= radius {
                match smallest_distance_above(self.engine.points(), radius) {
                    Some(next) => proposed = next,
                    None => break,
                }
            }
            radius = proposed;
        }

        let selected = nearest_level(&self.history, self.target);
        debug!(
            selected,
            radius = self.history[selected].radius,
            count = self.history[selected].count,
            target = self.target,
            "sweep level selected"
        );
        self.selected = Some(selected);

        if collect_dynamic {
            Ok(Trajectory::new(snapshots))
        } else {
            Ok(Trajectory::new(vec![snapshots[selected].clone()]))
        }
    }

    /// Executed sweep levels in radius order, the dendrogram.
    pub fn history(&self) -> &[SweepLevel] {
        &self.history
    }

    /// Level whose count came closest to the target in the latest sweep.
    pub fn selected_level(&self) -> Option<&SweepLevel> {
        self.selected.map(|idx| &self.history[idx])
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn sweep(&self) -> &SweepConfig {
        &self.sweep
    }

    /// Replace the sweep schedule for subsequent `process` calls.
    pub fn set_sweep(&mut self, sweep: SweepConfig) {
        self.sweep = sweep;
    }

    /// Underlying clustering engine; its radius tracks the latest trial.
    pub fn engine(&self) -> &SyncClusterEngine {
        &self.engine
    }
}

/// Index of the level whose count lands nearest the target; ties go to the
/// finer partition, then to the earlier trial.
fn nearest_level(history: &[SweepLevel], target: usize) -> usize {
    let mut best = 0;
    for (idx, level) in history.iter().enumerate().skip(1) {
        let best_gap = history[best].count.abs_diff(target);
        let gap = level.count.abs_diff(target);
        if gap < best_gap || (gap == best_gap && level.count > history[best].count) {
            best = idx;
        }
    }
    best
}

/// Mean distance from each point to its `k` nearest neighbors, the sweep's
/// radius estimate. `k` saturates at n - 1.
fn average_neighbor_distance(points: &[Vec<f64>], k: usize) -> f64 {
    let n = points.len();
    let k = k.min(n - 1);
    if k == 0 {
        return 0.0;
    }

    let mut total = 0.0;
    let mut distances = Vec::with_capacity(n - 1);
    for (i, point) in points.iter().enumerate() {
        distances.clear();
        for (j, other) in points.iter().enumerate() {
            if i != j {
                distances.push(squared_distance(point, other));
            }
        }
        distances.sort_unstable_by(f64::total_cmp);
        total += distances[..k].iter().map(|d| d.sqrt()).sum::<f64>();
    }
    total / (n * k) as f64
}

fn largest_pair_sq(points: &[Vec<f64>]) -> f64 {
    let n = points.len();
    let mut best = 0.0f64;
    for i in 0..n {
        for j in (i + 1)..n {
            best = best.max(squared_distance(&points[i], &points[j]));
        }
    }
    best
}

/// Smallest pairwise distance strictly beyond `radius`, or `None` when the
/// radius already covers every pair. The square root of a squared distance
/// can square back below it, so the result gets a one-ulp bump when needed
/// to keep that pair inside the returned radius.
fn smallest_distance_above(points: &[Vec<f64>], radius: f64) -> Option<f64> {
    let radius_sq = radius * radius;
    let n = points.len();
    let mut best: Option<f64> = None;
    for i in 0..n {
        for j in (i + 1)..n {
            let d_sq = squared_distance(&points[i], &points[j]);
            if d_sq > radius_sq && best.map_or(true, |b| d_sq < b) {
                best = Some(d_sq);
            }
        }
    }

    let d_sq = best?;
    let d = d_sq.sqrt();
    if d * d >= d_sq {
        Some(d)
    } else {
        Some(d + d * f64::EPSILON)
    }
}
