//! # synclust
//!
//! Synchronization-based cluster analysis on Kuramoto oscillator networks.
//!
//! Every input point becomes a phase oscillator; oscillators whose points lie
//! within a connectivity radius are coupled; simulating the coupled dynamics
//! pulls each connected group into phase agreement, and the synchronized
//! groups of the terminal state are the discovered clusters.
//!
//! ## Quick Start
//!
//! ```
//! use synclust::prelude::*;
//!
//! let points = vec![
//!     vec![0.0, 0.0], vec![0.1, 0.0], vec![0.0, 0.1],
//!     vec![5.0, 5.0], vec![5.1, 5.0], vec![5.0, 5.1],
//! ];
//!
//! let mut engine = SyncClusterEngine::with_seed(
//!     points, 0.5, false, InitialPhases::RandomUniform, 42,
//! ).unwrap();
//!
//! let trajectory = engine.process(0.998, SolvePolicy::ForwardEuler, false).unwrap();
//! let clusters = trajectory.terminal().sync_ensembles(0.05);
//! assert_eq!(clusters.len(), 2);
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support (entropy seeding)
//! - `parallel`: Enable multi-threaded phase updates via rayon
//! - `serde`: Enable serialization of snapshots, trajectories and policies
//!
//! ## Modules
//!
//! - [`topology`]: Connection policies and the size-adaptive adjacency store
//! - [`network`]: Oscillator network, order parameters, simulation loop
//! - [`cluster`]: Radius-based synchronization clustering engine
//! - [`hierarchy`]: Radius sweep toward a target cluster count
//! - [`solver`]: Numeric integration schemes and their configuration

#[path = "core/error.rs"]
pub mod error;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/topology.rs"]
pub mod topology;

#[path = "core/solver.rs"]
pub mod solver;

#[path = "core/network.rs"]
pub mod network;

#[path = "core/cluster.rs"]
pub mod cluster;

#[path = "core/hierarchy.rs"]
pub mod hierarchy;

/// Prelude module for convenient imports.
///
/// ```
/// use synclust::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cluster::SyncClusterEngine;
    pub use crate::error::{SynclustError, SynclustResult};
    pub use crate::hierarchy::{HierarchicalSyncEngine, SweepConfig, SweepLevel};
    pub use crate::network::{
        Diagnostics, ExecutionTier, InitialPhases, Snapshot, SyncNetwork, Termination, Trajectory,
    };
    pub use crate::solver::{IntegrationConfig, SolvePolicy};
    pub use crate::topology::{Adjacency, ConnectionPolicy, OscillatorId, Representation};
}
