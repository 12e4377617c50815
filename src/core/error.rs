use thiserror::Error;

/// Root error type for all synclust failures.
#[derive(Error, Debug)]
pub enum SynclustError {
    /// Invalid input at construction (points, radius, target count).
    #[error("config error: {0}")]
    Config(String),

    /// Structural topology failure (grid policies on non-square counts).
    #[error("topology error: {0}")]
    Topology(String),

    /// Invalid simulation parameter at call time.
    #[error("parameter error: {0}")]
    Parameter(String),

    /// Step budget exhausted while the order parameter was still moving.
    #[error("no convergence after {steps} steps: order {order:.6} below target {target:.6}")]
    Convergence {
        steps: usize,
        order: f64,
        target: f64,
    },

    /// Trajectory (de)serialization failure.
    #[cfg(feature = "serde")]
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SynclustResult<T> = Result<T, SynclustError>;
