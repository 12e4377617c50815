//! Numeric integration schemes for advancing oscillator phases.
//!
//! All three schemes advance ONE oscillator across one outer step while
//! every other phase stays frozen inside the derivative closure; the
//! network's update loop owns the fan-out across oscillators.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{SynclustError, SynclustResult};

/// Fraction of the outer step below which the adaptive scheme stops
/// shrinking its internal step.
const MIN_STEP_FRACTION: f64 = 1e-3;

/// Numeric scheme used to advance oscillator phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolvePolicy {
    /// Forward Euler across fixed substeps. Fastest, and accurate enough
    /// for the gradient flows clustering produces.
    #[default]
    ForwardEuler,
    /// Classic fourth-order Runge-Kutta across fixed substeps.
    RungeKutta4,
    /// Runge-Kutta-Fehlberg 4(5) with adaptive internal steps.
    RungeKuttaFehlberg45,
}

/// Controls of the time-stepping loop, shared by every solver policy.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntegrationConfig {
    /// Outer step between order-parameter checks, in simulation time units.
    pub step: f64,
    /// Fixed substeps per outer step for the non-adaptive policies; also
    /// seeds the adaptive policy's first internal step.
    pub substeps: usize,
    /// Hard cap on outer steps per simulation run.
    pub max_steps: usize,
    /// Order-parameter change below which an outer step counts as stalled.
    pub stall_epsilon: f64,
    /// Consecutive stalled steps required before the run terminates. The
    /// order parameter can pass through transient flat spots (two groups
    /// whose alignments momentarily trade off); a single quiet step is not
    /// yet a lock.
    pub stall_patience: usize,
    /// Per-substep error tolerance for the adaptive policy.
    pub tolerance: f64,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            step: 0.1,
            substeps: 10,
            max_steps: 10_000,
            stall_epsilon: 1e-7,
            stall_patience: 5,
            tolerance: 1e-7,
        }
    }
}

impl IntegrationConfig {
    /// Validate the configuration, rejecting values the stepping loop
    /// cannot work with.
    pub fn validate(&self) -> SynclustResult<()> {
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(SynclustError::Parameter(
                "integration step must be finite and > 0".into(),
            ));
        }
        if self.substeps == 0 {
            return Err(SynclustError::Parameter("substeps must be >= 1".into()));
        }
        if self.max_steps == 0 {
            return Err(SynclustError::Parameter("max_steps must be >= 1".into()));
        }
        if !self.stall_epsilon.is_finite() || self.stall_epsilon < 0.0 {
            return Err(SynclustError::Parameter(
                "stall_epsilon must be finite and >= 0".into(),
            ));
        }
        if self.stall_patience == 0 {
            return Err(SynclustError::Parameter(
                "stall_patience must be >= 1".into(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(SynclustError::Parameter(
                "tolerance must be finite and > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Advance a single phase from `t` across one outer step of `cfg.step`.
///
/// `f(t, theta)` is the phase derivative dθ/dt.
pub fn integrate<F>(policy: SolvePolicy, f: F, t: f64, phase: f64, cfg: &IntegrationConfig) -> f64
where
    F: Fn(f64, f64) -> f64,
{
    match policy {
        SolvePolicy::ForwardEuler => euler(&f, t, phase, cfg),
        SolvePolicy::RungeKutta4 => rk4(&f, t, phase, cfg),
        SolvePolicy::RungeKuttaFehlberg45 => rkf45(&f, t, phase, cfg),
    }
}

fn euler<F: Fn(f64, f64) -> f64>(f: &F, t: f64, mut phase: f64, cfg: &IntegrationConfig) -> f64 {
    let h = cfg.step / cfg.substeps as f64;
    let mut time = t;
    for _ in 0..cfg.substeps {
        phase += h * f(time, phase);
        time += h;
    }
    phase
}

fn rk4<F: Fn(f64, f64) -> f64>(f: &F, t: f64, mut phase: f64, cfg: &IntegrationConfig) -> f64 {
    let h = cfg.step / cfg.substeps as f64;
    let mut time = t;
    for _ in 0..cfg.substeps {
        let k1 = h * f(time, phase);
        let k2 = h * f(time + h / 2.0, phase + k1 / 2.0);
        let k3 = h * f(time + h / 2.0, phase + k2 / 2.0);
        let k4 = h * f(time + h, phase + k3);
        phase += (k1 + 2.0 * k2 + 2.0 * k3 + k4) / 6.0;
        time += h;
    }
    phase
}

/// Fehlberg embedded 4(5) pair. The internal step adapts to the error
/// estimate between the fourth- and fifth-order solutions; the fifth-order
/// value is the one carried forward.
fn rkf45<F: Fn(f64, f64) -> f64>(f: &F, t: f64, mut phase: f64, cfg: &IntegrationConfig) -> f64 {
    let t_end = t + cfg.step;
    let h_min = cfg.step * MIN_STEP_FRACTION;
    let mut h = cfg.step / cfg.substeps as f64;
    let mut time = t;

    while time < t_end {
        h = h.min(t_end - time);
        if time + h == time {
            // Residual slice is below the resolution of `time`.
            break;
        }

        let k1 = h * f(time, phase);
        let k2 = h * f(time + h / 4.0, phase + k1 / 4.0);
        let k3 = h * f(
            time + h * 3.0 / 8.0,
            phase + k1 * 3.0 / 32.0 + k2 * 9.0 / 32.0,
        );
        let k4 = h * f(
            time + h * 12.0 / 13.0,
            phase + k1 * 1932.0 / 2197.0 - k2 * 7200.0 / 2197.0 + k3 * 7296.0 / 2197.0,
        );
        let k5 = h * f(
            time + h,
            phase + k1 * 439.0 / 216.0 - k2 * 8.0 + k3 * 3680.0 / 513.0 - k4 * 845.0 / 4104.0,
        );
        let k6 = h * f(
            time + h / 2.0,
            phase - k1 * 8.0 / 27.0 + k2 * 2.0 - k3 * 3544.0 / 2565.0 + k4 * 1859.0 / 4104.0
                - k5 * 11.0 / 40.0,
        );

        let fourth = phase + k1 * 25.0 / 216.0 + k3 * 1408.0 / 2565.0 + k4 * 2197.0 / 4104.0
            - k5 / 5.0;
        let fifth = phase + k1 * 16.0 / 135.0 + k3 * 6656.0 / 12825.0 + k4 * 28561.0 / 56430.0
            - k5 * 9.0 / 50.0
            + k6 * 2.0 / 55.0;
        let error = (fifth - fourth).abs();

        if error <= cfg.tolerance || h <= h_min {
            time += h;
            phase = fifth;
        }

        let scale = if error > 0.0 {
            0.84 * (cfg.tolerance / error).powf(0.25)
        } else {
            4.0
        };
        h = (h * scale.clamp(0.1, 4.0)).max(h_min);
    }
    phase
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_POLICIES: [SolvePolicy; 3] = [
        SolvePolicy::ForwardEuler,
        SolvePolicy::RungeKutta4,
        SolvePolicy::RungeKuttaFehlberg45,
    ];

    #[test]
    fn constant_derivative_advances_linearly() {
        let cfg = IntegrationConfig::default();
        for policy in ALL_POLICIES {
            let end = integrate(policy, |_, _| 2.0, 0.0, 1.0, &cfg);
            assert!(
                (end - 1.2).abs() < 1e-12,
                "{policy:?} got {end}, expected 1.2"
            );
        }
    }

    #[test]
    fn euler_tracks_exponential_decay() {
        // dy/dt = -y from y(0) = 1 over one outer step of 0.1.
        let cfg = IntegrationConfig::default();
        let end = integrate(SolvePolicy::ForwardEuler, |_, y| -y, 0.0, 1.0, &cfg);
        let exact = (-0.1f64).exp();
        assert!((end - exact).abs() < 1e-3, "euler error too large: {end}");
    }

    #[test]
    fn rk4_is_markedly_more_accurate_than_euler() {
        let cfg = IntegrationConfig::default();
        let exact = (-0.1f64).exp();
        let euler_err = (integrate(SolvePolicy::ForwardEuler, |_, y| -y, 0.0, 1.0, &cfg) - exact)
            .abs();
        let rk4_err =
            (integrate(SolvePolicy::RungeKutta4, |_, y| -y, 0.0, 1.0, &cfg) - exact).abs();
        assert!(rk4_err < 1e-8, "rk4 error {rk4_err}");
        assert!(rk4_err < euler_err / 100.0);
    }

    #[test]
    fn rkf45_stays_within_tolerance() {
        let cfg = IntegrationConfig::default();
        let end = integrate(
            SolvePolicy::RungeKuttaFehlberg45,
            |_, y| -y,
            0.0,
            1.0,
            &cfg,
        );
        let exact = (-0.1f64).exp();
        assert!((end - exact).abs() < 1e-6, "rkf45 error too large: {end}");
    }

    #[test]
    fn rkf45_crosses_the_full_outer_step() {
        // Time-dependent derivative: y' = t, so y(end) - y(0) = step^2 / 2.
        let cfg = IntegrationConfig {
            step: 1.0,
            ..Default::default()
        };
        let end = integrate(SolvePolicy::RungeKuttaFehlberg45, |t, _| t, 0.0, 0.0, &cfg);
        assert!((end - 0.5).abs() < 1e-6, "got {end}, expected 0.5");
    }

    #[test]
    fn validate_rejects_degenerate_configs() {
        let bad_step = IntegrationConfig {
            step: 0.0,
            ..Default::default()
        };
        assert!(bad_step.validate().is_err());

        let bad_substeps = IntegrationConfig {
            substeps: 0,
            ..Default::default()
        };
        assert!(bad_substeps.validate().is_err());

        let bad_cap = IntegrationConfig {
            max_steps: 0,
            ..Default::default()
        };
        assert!(bad_cap.validate().is_err());

        let bad_patience = IntegrationConfig {
            stall_patience: 0,
            ..Default::default()
        };
        assert!(bad_patience.validate().is_err());

        assert!(IntegrationConfig::default().validate().is_ok());
    }
}
