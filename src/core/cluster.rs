//! Radius-based synchronization clustering engine.
//!
//! Every spatial input point becomes one oscillator; oscillators whose
//! points lie within the connectivity radius are coupled both ways. Running
//! the phase simulation pulls each connected group into agreement, and the
//! terminal snapshot's ensembles are the discovered clusters.

use tracing::debug;

use crate::error::{SynclustError, SynclustResult};
use crate::network::{InitialPhases, SyncNetwork, Trajectory};
use crate::prng::Prng;
use crate::solver::SolvePolicy;
use crate::topology::{Adjacency, ConnectionPolicy, OscillatorId};

/// Synchronization clustering over spatial input points.
///
/// Owns the points for its lifetime; the adjacency and, when enabled, the
/// normalized distance weights are derived once at construction. Clusters
/// come out of [`process`](Self::process) by feeding the trajectory's
/// terminal snapshot through
/// [`Snapshot::sync_ensembles`](crate::network::Snapshot::sync_ensembles).
#[derive(Debug, Clone)]
pub struct SyncClusterEngine {
    points: Vec<Vec<f64>>,
    radius: f64,
    weighted: bool,
    network: SyncNetwork,
}

impl SyncClusterEngine {
    /// Engine over `points` with entropy-seeded random phase distributions.
    ///
    /// Points within `radius` of each other (boundary inclusive, so
    /// coincident points connect even at radius 0) get their oscillators
    /// connected. With `enable_weights`, every coupling term is additionally
    /// scaled by the min-max normalized pairwise squared distance.
    #[cfg(feature = "std")]
    pub fn new(
        points: Vec<Vec<f64>>,
        radius: f64,
        enable_weights: bool,
        initial: InitialPhases,
    ) -> SynclustResult<SyncClusterEngine> {
        Self::from_rng(points, radius, enable_weights, initial, Prng::from_entropy())
    }

    /// Deterministic variant: random phase distributions draw from `seed`.
    pub fn with_seed(
        points: Vec<Vec<f64>>,
        radius: f64,
        enable_weights: bool,
        initial: InitialPhases,
        seed: u64,
    ) -> SynclustResult<SyncClusterEngine> {
        Self::from_rng(points, radius, enable_weights, initial, Prng::new(seed))
    }

    fn from_rng(
        points: Vec<Vec<f64>>,
        radius: f64,
        enable_weights: bool,
        initial: InitialPhases,
        rng: Prng,
    ) -> SynclustResult<SyncClusterEngine> {
        validate_input(&points, radius)?;
        let (adjacency, weights) = radius_connections(&points, radius, enable_weights)?;
        debug!(
            oscillators = points.len(),
            radius,
            weighted = enable_weights,
            edges = adjacency.directed_edges(),
            "radius connections built"
        );

        let mut network = SyncNetwork::from_rng(adjacency, initial, rng);
        if let Some(weights) = weights {
            network.set_weights(weights);
        }
        Ok(SyncClusterEngine {
            points,
            radius,
            weighted: enable_weights,
            network,
        })
    }

    /// Run the phase simulation until the global order parameter reaches
    /// `order`, per [`SyncNetwork::simulate_dynamic`].
    pub fn process(
        &mut self,
        order: f64,
        policy: SolvePolicy,
        collect_dynamic: bool,
    ) -> SynclustResult<Trajectory> {
        self.network.simulate_dynamic(order, policy, collect_dynamic)
    }

    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn weighted(&self) -> bool {
        self.weighted
    }

    pub fn oscillators(&self) -> usize {
        self.points.len()
    }

    /// Oscillators connected to `i`, ascending.
    pub fn neighbors(&self, i: OscillatorId) -> Vec<OscillatorId> {
        self.network.adjacency().neighbors(i)
    }

    /// Normalized weight of the edge i -> j, when weighting is enabled.
    pub fn edge_weight(&self, i: OscillatorId, j: OscillatorId) -> Option<f64> {
        self.network.edge_weight(i, j)
    }

    pub fn network(&self) -> &SyncNetwork {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut SyncNetwork {
        &mut self.network
    }

    /// Rebuild the radius connections at a new radius over the same points.
    ///
    /// Phases and weights survive: weights cover every pair and do not
    /// depend on the radius.
    pub(crate) fn reconnect(&mut self, radius: f64) -> SynclustResult<()> {
        let (adjacency, _) = radius_connections(&self.points, radius, false)?;
        self.network.replace_adjacency(adjacency);
        self.radius = radius;
        Ok(())
    }
}

fn validate_input(points: &[Vec<f64>], radius: f64) -> SynclustResult<()> {
    if points.is_empty() {
        return Err(SynclustError::Config(
            "spatial input must be non-empty".into(),
        ));
    }
    let dims = points[0].len();
    if dims == 0 {
        return Err(SynclustError::Config(
            "points need at least one coordinate".into(),
        ));
    }
    for (i, point) in points.iter().enumerate() {
        if point.len() != dims {
            return Err(SynclustError::Config(format!(
                "point {i} has {} coordinates, expected {dims}",
                point.len()
            )));
        }
        if point.iter().any(|c| !c.is_finite()) {
            return Err(SynclustError::Config(format!(
                "point {i} carries a non-finite coordinate"
            )));
        }
    }
    if !radius.is_finite() || radius < 0.0 {
        return Err(SynclustError::Config(format!(
            "connectivity radius must be finite and non-negative, got {radius}"
        )));
    }
    Ok(())
}

/// Radius-based adjacency and optional weight matrix over `points`.
///
/// Connects i and j both ways when their squared distance does not exceed
/// the squared radius. Weights record every pairwise squared distance,
/// connected or not, min-max normalized into [0, 1]; when all pairs share
/// one distance value every weight collapses to 1.
fn radius_connections(
    points: &[Vec<f64>],
    radius: f64,
    enable_weights: bool,
) -> SynclustResult<(Adjacency, Option<Vec<f64>>)> {
    let n = points.len();
    let mut adjacency = Adjacency::build(n, ConnectionPolicy::None)?;
    let radius_sq = radius * radius;

    let mut weights = enable_weights.then(|| vec![0.0; n * n]);
    let mut maximum = 0.0f64;
    let mut minimum = f64::MAX;

    for i in 0..n {
        for j in (i + 1)..n {
            let distance_sq = squared_distance(&points[i], &points[j]);
            if distance_sq <= radius_sq {
                adjacency.connect(i, j);
                adjacency.connect(j, i);
            }
            if let Some(weights) = &mut weights {
                weights[i * n + j] = distance_sq;
                weights[j * n + i] = distance_sq;
                maximum = maximum.max(distance_sq);
                minimum = minimum.min(distance_sq);
            }
        }
    }

    if let Some(weights) = &mut weights {
        let range = maximum - minimum;
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let cell = &mut weights[i * n + j];
                *cell = if range > 0.0 {
                    (*cell - minimum) / range
                } else {
                    1.0
                };
            }
        }
    }

    Ok((adjacency, weights))
}

/// Squared Euclidean distance between two equal-length coordinate slices.
pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Termination;

    fn line_points(xs: &[f64]) -> Vec<Vec<f64>> {
        xs.iter().map(|&x| vec![x]).collect()
    }

    #[test]
    fn two_separated_groups_synchronize_apart() {
        let points = vec![
            vec![0.0, 0.0],
            vec![0.2, 0.0],
            vec![0.0, 0.2],
            vec![0.2, 0.2],
            vec![0.1, 0.1],
            vec![8.0, 8.0],
            vec![8.2, 8.0],
            vec![8.0, 8.2],
            vec![8.2, 8.2],
            vec![8.1, 8.1],
        ];
        let mut engine =
            SyncClusterEngine::with_seed(points, 1.0, false, InitialPhases::RandomUniform, 7)
                .unwrap();
        assert_eq!(engine.oscillators(), 10);

        let trajectory = engine
            .process(0.998, SolvePolicy::ForwardEuler, false)
            .unwrap();
        let clusters = trajectory.terminal().sync_ensembles(0.05);
        assert_eq!(
            clusters,
            vec![vec![0, 1, 2, 3, 4], vec![5, 6, 7, 8, 9]],
            "groups should synchronize internally and stay apart"
        );
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let engine = SyncClusterEngine::with_seed(
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![3.0, 0.0]],
            1.0,
            false,
            InitialPhases::Zero,
            0,
        )
        .unwrap();

        assert_eq!(engine.neighbors(0), vec![1], "distance exactly 1.0 connects");
        assert_eq!(engine.neighbors(1), vec![0]);
        assert!(engine.neighbors(2).is_empty());
        assert_eq!(engine.edge_weight(0, 1), None, "weighting is off");
    }

    #[test]
    fn zero_radius_connects_coincident_points_only() {
        let engine = SyncClusterEngine::with_seed(
            vec![vec![0.0, 0.0], vec![0.0, 0.0], vec![1.0, 1.0]],
            0.0,
            false,
            InitialPhases::Zero,
            0,
        )
        .unwrap();

        assert_eq!(engine.neighbors(0), vec![1]);
        assert_eq!(engine.neighbors(1), vec![0]);
        assert!(engine.neighbors(2).is_empty());
    }

    #[test]
    fn weights_min_max_normalize_squared_distances() {
        let engine = SyncClusterEngine::with_seed(
            line_points(&[0.0, 1.0, 3.0]),
            5.0,
            true,
            InitialPhases::Zero,
            0,
        )
        .unwrap();
        assert!(engine.weighted());

        // Squared pair distances 1, 4 and 9 map to 0, 3/8 and 1.
        assert_eq!(engine.edge_weight(0, 1), Some(0.0));
        assert_eq!(engine.edge_weight(1, 2), Some(0.375));
        assert_eq!(engine.edge_weight(0, 2), Some(1.0));
        assert_eq!(engine.edge_weight(2, 0), Some(1.0), "weights are symmetric");
        assert_eq!(engine.edge_weight(1, 1), Some(0.0), "diagonal stays zero");
    }

    #[test]
    fn single_shared_distance_collapses_weights_to_one() {
        let engine = SyncClusterEngine::with_seed(
            line_points(&[0.0, 1.0]),
            1.0,
            true,
            InitialPhases::Zero,
            0,
        )
        .unwrap();
        assert_eq!(engine.edge_weight(0, 1), Some(1.0));
        assert_eq!(engine.edge_weight(1, 0), Some(1.0));
    }

    #[test]
    fn weights_cover_disconnected_pairs() {
        let engine = SyncClusterEngine::with_seed(
            line_points(&[0.0, 1.0, 10.0]),
            1.5,
            true,
            InitialPhases::Zero,
            0,
        )
        .unwrap();

        assert_eq!(engine.neighbors(0), vec![1], "10.0 lies beyond the radius");
        assert_eq!(engine.edge_weight(0, 2), Some(1.0));
    }

    #[test]
    fn weighted_run_still_separates_distance_groups() {
        // Min-max weighting zeroes the closest pair's coupling; each group
        // must lock through its remaining edges.
        let mut engine = SyncClusterEngine::with_seed(
            line_points(&[0.0, 0.4, 1.0, 4.0, 4.5, 5.2]),
            1.5,
            true,
            InitialPhases::RandomUniform,
            7,
        )
        .unwrap();
        engine.network_mut().set_coupling(10.0);

        let trajectory = engine
            .process(0.99, SolvePolicy::ForwardEuler, false)
            .unwrap();
        let clusters = trajectory.terminal().sync_ensembles(0.05);
        assert_eq!(clusters, vec![vec![0, 1, 2], vec![3, 4, 5]]);
        assert_eq!(
            engine.network().last_run().unwrap().termination,
            Termination::Stalled,
            "two locked groups never reach global order 0.99"
        );
    }

    #[test]
    fn construction_rejects_bad_input() {
        let cases: Vec<(Vec<Vec<f64>>, f64)> = vec![
            (vec![], 1.0),
            (vec![vec![]], 1.0),
            (vec![vec![0.0], vec![0.0, 1.0]], 1.0),
            (vec![vec![0.0], vec![f64::NAN]], 1.0),
            (vec![vec![0.0], vec![1.0]], -0.5),
            (vec![vec![0.0], vec![1.0]], f64::INFINITY),
        ];
        for (points, radius) in cases {
            let err = SyncClusterEngine::with_seed(points, radius, false, InitialPhases::Zero, 0)
                .unwrap_err();
            assert!(matches!(err, SynclustError::Config(_)), "{err:?}");
        }
    }

    #[test]
    fn collected_run_matches_diagnostics() {
        let mut engine = SyncClusterEngine::with_seed(
            vec![vec![0.0, 0.0], vec![0.15, 0.0], vec![0.0, 0.15]],
            0.5,
            false,
            InitialPhases::RandomUniform,
            7,
        )
        .unwrap();
        let trajectory = engine
            .process(0.95, SolvePolicy::ForwardEuler, true)
            .unwrap();

        let diag = *engine.network().last_run().unwrap();
        assert_eq!(diag.termination, Termination::Reached);
        assert_eq!(trajectory.len(), diag.steps + 1);
        assert_eq!(trajectory.snapshots()[0].time(), 0.0);
    }

    #[test]
    fn reconnect_rebuilds_connections_and_keeps_phases() {
        let mut engine = SyncClusterEngine::with_seed(
            line_points(&[0.0, 1.0, 2.2]),
            0.5,
            false,
            InitialPhases::RandomGaussian,
            11,
        )
        .unwrap();
        assert!(engine.neighbors(1).is_empty());
        let before = engine.network().phases().to_vec();

        engine.reconnect(1.5).unwrap();
        assert_eq!(engine.radius(), 1.5);
        assert_eq!(engine.neighbors(1), vec![0, 2]);
        assert_eq!(engine.network().phases(), before.as_slice());
    }
}
