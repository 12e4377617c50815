//! Oscillator network: phases, Kuramoto coupling, order parameters and the
//! simulation loop.
//!
//! The network owns the adjacency built by [`crate::topology`] and, when
//! weighting is enabled, the normalized distance weights installed by the
//! clustering engine. Phases are plain f64 radians and are never wrapped
//! during integration; the sine of a phase difference is wrap-invariant and
//! ensemble extraction measures circular distance.

use core::f64::consts::{PI, TAU};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tracing::{debug, trace};

use crate::error::{SynclustError, SynclustResult};
use crate::prng::Prng;
use crate::solver::{integrate, IntegrationConfig, SolvePolicy};
use crate::topology::{Adjacency, OscillatorId};

/// Execution tier for the per-step phase updates.
///
/// The request is honored when the matching cargo feature is compiled in,
/// otherwise execution falls back to scalar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExecutionTier {
    /// Single-threaded execution (default, works everywhere).
    #[default]
    Scalar,
    /// Multi-threaded execution via rayon (requires the `parallel` feature).
    Parallel,
}

/// Initial phase distribution for a freshly constructed network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InitialPhases {
    /// Every phase 0; the network starts fully synchronized.
    Zero,
    /// Phases evenly spaced around the circle.
    Equipartition,
    /// Uniform draw from [0, 2π).
    RandomUniform,
    /// Gaussian draw centered at π with σ = π.
    #[default]
    RandomGaussian,
}

/// Phases of every oscillator at one simulation time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Snapshot {
    time: f64,
    phases: Vec<f64>,
}

impl Snapshot {
    pub(crate) fn new(time: f64, phases: Vec<f64>) -> Self {
        Self { time, phases }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    /// Global order parameter of this snapshot.
    pub fn order_parameter(&self) -> f64 {
        global_order(&self.phases)
    }

    /// Synchronized connected components of this snapshot.
    ///
    /// Two oscillators share a component when a chain of pairwise circular
    /// phase distances within `tolerance` links them. Components and their
    /// members come back in ascending index order.
    pub fn sync_ensembles(&self, tolerance: f64) -> Vec<Vec<OscillatorId>> {
        let n = self.phases.len();
        let mut visited = vec![false; n];
        let mut ensembles = Vec::new();

        for start in 0..n {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let mut members = vec![start];
            let mut frontier = vec![start];
            while let Some(i) = frontier.pop() {
                for j in 0..n {
                    if !visited[j] && phase_distance(self.phases[i], self.phases[j]) <= tolerance {
                        visited[j] = true;
                        members.push(j);
                        frontier.push(j);
                    }
                }
            }
            members.sort_unstable();
            ensembles.push(members);
        }
        ensembles
    }
}

/// Ordered, strictly time-increasing sequence of snapshots. Never empty: a
/// run that collects nothing still yields its terminal state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trajectory {
    snapshots: Vec<Snapshot>,
}

impl Trajectory {
    pub(crate) fn new(snapshots: Vec<Snapshot>) -> Self {
        debug_assert!(!snapshots.is_empty());
        Self { snapshots }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Last snapshot of the run.
    pub fn terminal(&self) -> &Snapshot {
        &self.snapshots[self.snapshots.len() - 1]
    }

    /// Snapshot times, in order.
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.snapshots.iter().map(|s| s.time)
    }

    /// Iterate over snapshots in time order.
    pub fn iter(&self) -> core::slice::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }
}

#[cfg(feature = "serde")]
impl Trajectory {
    /// Serialize the trajectory to a JSON string.
    pub fn to_json(&self) -> SynclustResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a trajectory from JSON, rejecting an empty snapshot list.
    pub fn from_json(text: &str) -> SynclustResult<Trajectory> {
        let trajectory: Trajectory = serde_json::from_str(text)?;
        if trajectory.snapshots.is_empty() {
            return Err(SynclustError::Parameter(
                "trajectory must contain at least one snapshot".into(),
            ));
        }
        Ok(trajectory)
    }
}

/// Cause of a completed simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Termination {
    /// The global order parameter reached the requested threshold.
    Reached,
    /// The order parameter stopped moving below the threshold, e.g. two
    /// locked anti-phase groups that will never align globally.
    Stalled,
}

/// Summary of the most recent simulation run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostics {
    /// Outer steps executed.
    pub steps: usize,
    /// Final global order parameter.
    pub order: f64,
    /// Why the run stopped.
    pub termination: Termination,
}

/// Kuramoto oscillator network over a fixed adjacency.
#[derive(Debug, Clone)]
pub struct SyncNetwork {
    adjacency: Adjacency,
    /// Row-major n*n normalized distance weights, present only when the
    /// clustering engine enables weighting.
    weights: Option<Vec<f64>>,
    phases: Vec<f64>,
    coupling: f64,
    frequency: f64,
    tier: ExecutionTier,
    integration: IntegrationConfig,
    last_run: Option<Diagnostics>,
}

impl SyncNetwork {
    /// Network over `adjacency` with entropy-seeded random distributions.
    #[cfg(feature = "std")]
    pub fn new(adjacency: Adjacency, initial: InitialPhases) -> SyncNetwork {
        Self::from_rng(adjacency, initial, Prng::from_entropy())
    }

    /// Deterministic variant: random distributions draw from `seed`.
    pub fn with_seed(adjacency: Adjacency, initial: InitialPhases, seed: u64) -> SyncNetwork {
        Self::from_rng(adjacency, initial, Prng::new(seed))
    }

    pub(crate) fn from_rng(
        adjacency: Adjacency,
        initial: InitialPhases,
        mut rng: Prng,
    ) -> SyncNetwork {
        let n = adjacency.oscillators();
        let phases = initial_phases(n, initial, &mut rng);
        SyncNetwork {
            adjacency,
            weights: None,
            phases,
            coupling: 1.0,
            frequency: 0.0,
            tier: ExecutionTier::default(),
            integration: IntegrationConfig::default(),
            last_run: None,
        }
    }

    pub fn oscillators(&self) -> usize {
        self.phases.len()
    }

    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    /// Normalized weight of the edge i -> j, when weighting is enabled.
    pub fn edge_weight(&self, i: OscillatorId, j: OscillatorId) -> Option<f64> {
        self.weights
            .as_ref()
            .map(|w| w[i * self.phases.len() + j])
    }

    /// Coupling strength applied to every neighbor sum (default 1.0).
    pub fn set_coupling(&mut self, coupling: f64) {
        self.coupling = coupling;
    }

    /// Common natural frequency ω (default 0.0, the gradient-flow form).
    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    pub fn set_execution_tier(&mut self, tier: ExecutionTier) {
        self.tier = tier;
    }

    pub fn set_integration(&mut self, integration: IntegrationConfig) {
        self.integration = integration;
    }

    pub fn integration(&self) -> &IntegrationConfig {
        &self.integration
    }

    /// Summary of the most recent `simulate_dynamic` run.
    pub fn last_run(&self) -> Option<&Diagnostics> {
        self.last_run.as_ref()
    }

    pub(crate) fn set_weights(&mut self, weights: Vec<f64>) {
        debug_assert_eq!(weights.len(), self.phases.len() * self.phases.len());
        self.weights = Some(weights);
    }

    pub(crate) fn replace_adjacency(&mut self, adjacency: Adjacency) {
        debug_assert_eq!(adjacency.oscillators(), self.phases.len());
        self.adjacency = adjacency;
    }

    /// Tier that will actually run, honoring compiled features.
    pub fn effective_tier(&self) -> ExecutionTier {
        match self.tier {
            ExecutionTier::Scalar => ExecutionTier::Scalar,
            ExecutionTier::Parallel => {
                #[cfg(feature = "parallel")]
                {
                    ExecutionTier::Parallel
                }
                #[cfg(not(feature = "parallel"))]
                {
                    ExecutionTier::Scalar
                }
            }
        }
    }

    /// Mean phase cohesion across connected pairs: exp(-|θj - θi|) averaged
    /// over every directed edge (1.0 when all connected pairs agree).
    pub fn local_order_parameter(&self) -> f64 {
        let mut amount = 0.0;
        let mut edges = 0usize;
        for i in 0..self.phases.len() {
            self.adjacency.for_each_neighbor(i, |j| {
                amount += (-(self.phases[j] - self.phases[i]).abs()).exp();
                edges += 1;
            });
        }
        amount / edges.max(1) as f64
    }

    /// Kuramoto phase derivative for oscillator `i` held at `theta`, with
    /// every other phase frozen at the previous step:
    /// ω + (coupling / k) * Σ w(i,j) * sin(θj - θ), k clamped to 1.
    fn phase_derivative(&self, i: OscillatorId, theta: f64) -> f64 {
        let mut acc = 0.0;
        let mut degree = 0usize;
        match &self.weights {
            Some(weights) => {
                let n = self.phases.len();
                let row = &weights[i * n..(i + 1) * n];
                self.adjacency.for_each_neighbor(i, |j| {
                    acc += row[j] * (self.phases[j] - theta).sin();
                    degree += 1;
                });
            }
            None => {
                self.adjacency.for_each_neighbor(i, |j| {
                    acc += (self.phases[j] - theta).sin();
                    degree += 1;
                });
            }
        }
        self.frequency + self.coupling * acc / degree.max(1) as f64
    }

    /// Advance every phase across one outer step starting at `time`.
    ///
    /// Jacobi update: all oscillators integrate against the same frozen
    /// previous-step phases, so the result is independent of visitation
    /// order and identical across execution tiers.
    pub fn step(&mut self, policy: SolvePolicy, time: f64) {
        match self.effective_tier() {
            ExecutionTier::Scalar => self.step_scalar(policy, time),
            ExecutionTier::Parallel => self.step_parallel(policy, time),
        }
    }

    fn step_scalar(&mut self, policy: SolvePolicy, time: f64) {
        let mut next = vec![0.0; self.phases.len()];
        for (i, slot) in next.iter_mut().enumerate() {
            *slot = integrate(
                policy,
                |_t, theta| self.phase_derivative(i, theta),
                time,
                self.phases[i],
                &self.integration,
            );
        }
        self.phases = next;
    }

    #[cfg(feature = "parallel")]
    fn step_parallel(&mut self, policy: SolvePolicy, time: f64) {
        use rayon::prelude::*;

        let this = &*self;
        let next: Vec<f64> = (0..this.phases.len())
            .into_par_iter()
            .map(|i| {
                integrate(
                    policy,
                    |_t, theta| this.phase_derivative(i, theta),
                    time,
                    this.phases[i],
                    &this.integration,
                )
            })
            .collect();
        self.phases = next;
    }

    #[cfg(not(feature = "parallel"))]
    fn step_parallel(&mut self, policy: SolvePolicy, time: f64) {
        self.step_scalar(policy, time);
    }

    /// Run the simulation until the global order parameter reaches `order`,
    /// the dynamics stall, or the step cap trips.
    ///
    /// Returns the full snapshot sequence (including the t = 0 state) when
    /// `collect_dynamic` is true, else the terminal snapshot alone. A stall
    /// below the threshold is a success carrying the locked state; only an
    /// exhausted step cap with the order parameter still moving is an error.
    pub fn simulate_dynamic(
        &mut self,
        order: f64,
        policy: SolvePolicy,
        collect_dynamic: bool,
    ) -> SynclustResult<Trajectory> {
        if !(order > 0.0 && order <= 1.0) {
            return Err(SynclustError::Parameter(format!(
                "order threshold must lie in (0, 1], got {order}"
            )));
        }
        self.integration.validate()?;

        let mut snapshots = Vec::new();
        let mut time = 0.0;
        if collect_dynamic {
            snapshots.push(Snapshot::new(time, self.phases.clone()));
        }

        let mut current = global_order(&self.phases);
        let mut steps = 0usize;
        let mut stalled_for = 0usize;
        let termination = if current >= order {
            Termination::Reached
        } else {
            loop {
                if steps == self.integration.max_steps {
                    return Err(SynclustError::Convergence {
                        steps,
                        order: current,
                        target: order,
                    });
                }

                self.step(policy, time);
                steps += 1;
                time += self.integration.step;
                if collect_dynamic {
                    snapshots.push(Snapshot::new(time, self.phases.clone()));
                }

                let next = global_order(&self.phases);
                trace!(step = steps, order = next, "phase step");
                let delta = (next - current).abs();
                current = next;
                if current >= order {
                    break Termination::Reached;
                }
                if delta < self.integration.stall_epsilon {
                    stalled_for += 1;
                    if stalled_for >= self.integration.stall_patience {
                        break Termination::Stalled;
                    }
                } else {
                    stalled_for = 0;
                }
            }
        };

        if !collect_dynamic {
            snapshots.push(Snapshot::new(time, self.phases.clone()));
        }

        debug!(steps, order = current, ?termination, "simulation finished");
        self.last_run = Some(Diagnostics {
            steps,
            order: current,
            termination,
        });
        Ok(Trajectory::new(snapshots))
    }
}

/// Global Kuramoto order parameter r ∈ [0, 1]: the magnitude of the mean
/// phase vector, 1.0 at perfect alignment.
pub fn global_order(phases: &[f64]) -> f64 {
    if phases.is_empty() {
        return 0.0;
    }
    let (sum_cos, sum_sin) = phases
        .iter()
        .fold((0.0, 0.0), |(c, s), &p| (c + p.cos(), s + p.sin()));
    let n = phases.len() as f64;
    ((sum_cos / n).powi(2) + (sum_sin / n).powi(2)).sqrt()
}

/// Circular distance between two phases, in [0, π].
pub fn phase_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(TAU);
    d.min(TAU - d)
}

fn initial_phases(n: usize, initial: InitialPhases, rng: &mut Prng) -> Vec<f64> {
    match initial {
        InitialPhases::Zero => vec![0.0; n],
        InitialPhases::Equipartition => (0..n).map(|i| TAU * i as f64 / n as f64).collect(),
        InitialPhases::RandomUniform => (0..n).map(|_| rng.gen_range_f64(0.0, TAU)).collect(),
        InitialPhases::RandomGaussian => (0..n).map(|_| rng.next_gaussian(PI, PI)).collect(),
    }
}
