//! # Mitchell-Schaeffer-RS
//!
//! The Mitchell-Schaeffer two-current model of cardiac membrane potential
//! in a single, spatially unresolved (0D) cell.
//!
//! ## History
//!
//! Published by Colleen Mitchell and David Schaeffer (Duke University) in
//! 2003 as a deliberately minimal alternative to detailed ionic models:
//! two state variables, two currents, five parameters.
//!
//! Mitchell, C. C., & Schaeffer, D. G. (2003). A two-current model for the
//! dynamics of cardiac membrane potential. Bulletin of Mathematical
//! Biology, 65, 767-793. <https://doi.org/10.1016/S0092-8240(03)00041-7>
//!
//! ## Model
//!
//! ```text
//! du/dt = J_in + J_out + I_stim
//! J_in  = h * u^2 * (1 - u) / tau_in
//! J_out = -u / tau_out
//!
//! dh/dt = (1 - h) / tau_open   if u <  u_gate
//! dh/dt = -h / tau_close       if u >= u_gate
//! ```
//!
//! `u` is the dimensionless transmembrane potential, `h` the gating
//! variable standing in for Na+ channel availability.
//!
//! ## Components
//!
//! 1. **Equation kernel**: pure rate functions, no state, no I/O
//! 2. **Stimulus protocols**: pulse, pulse train, or arbitrary f(t)
//! 3. **Driver**: fixed-step forward Euler producing a [`Trace`]
//! 4. **Sweeps**: embarrassingly parallel batch runs via rayon

use cardiac_core::{CardiacError, Current, Gate, Potential, Result, RunConfig, Time, Trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// PARAMETERS
// ============================================================================

/// Model parameters (all time constants in the same unit as simulation time)
///
/// Immutable after construction. [`Parameters::new`] rejects non-positive
/// values; the kernel and driver assume validity and never re-check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Inward current time constant (fast depolarization)
    pub tau_in: f64,
    /// Outward current time constant (repolarization)
    pub tau_out: f64,
    /// Gate recovery time constant (sub-threshold)
    pub tau_open: f64,
    /// Gate inactivation time constant (supra-threshold)
    pub tau_close: f64,
    /// Gate switching threshold on u
    pub u_gate: f64,
}

impl Default for Parameters {
    /// Canonical configuration from Mitchell & Schaeffer (2003)
    fn default() -> Self {
        Self {
            tau_in: 0.3,
            tau_out: 6.0,
            tau_open: 120.0,
            tau_close: 150.0,
            u_gate: 0.13,
        }
    }
}

impl Parameters {
    pub fn new(
        tau_in: f64,
        tau_out: f64,
        tau_open: f64,
        tau_close: f64,
        u_gate: f64,
    ) -> Result<Self> {
        let params = Self {
            tau_in,
            tau_out,
            tau_open,
            tau_close,
            u_gate,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check that every constant is positive and finite
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("tau_in", self.tau_in),
            ("tau_out", self.tau_out),
            ("tau_open", self.tau_open),
            ("tau_close", self.tau_close),
            ("u_gate", self.u_gate),
        ];
        for (name, value) in fields {
            if !(value > 0.0) || !value.is_finite() {
                return Err(CardiacError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }

    /// Smallest time constant of the model.
    ///
    /// Forward Euler is only stable for dt small relative to this value;
    /// with the canonical parameters that is tau_in = 0.3.
    pub fn min_time_constant(&self) -> f64 {
        self.tau_in
            .min(self.tau_out)
            .min(self.tau_open)
            .min(self.tau_close)
    }
}

// ============================================================================
// EQUATION KERNEL
// ============================================================================

/// Inward (depolarizing) current: J_in = h * u^2 * (1 - u) / tau_in
///
/// Regenerative: grows with u, shuts off as u approaches 1, scaled by
/// channel availability h.
pub fn j_in(u: Potential, h: Gate, tau_in: f64) -> f64 {
    h * u * u * (1.0 - u) / tau_in
}

/// Outward (repolarizing) current: J_out = -u / tau_out
pub fn j_out(u: Potential, tau_out: f64) -> f64 {
    -u / tau_out
}

/// Gate dynamics: recovery toward 1 below the threshold, decay toward 0
/// at or above it.
///
/// The threshold is a hard switch with no hysteresis; a state sitting
/// exactly at u_gate takes the supra-threshold (closing) branch.
pub fn dh_dt(u: Potential, h: Gate, params: &Parameters) -> f64 {
    if u < params.u_gate {
        (1.0 - h) / params.tau_open
    } else {
        -h / params.tau_close
    }
}

/// Instantaneous rates of change for both state variables.
///
/// Total over finite inputs: given finite (u, h, i_stim) and validated
/// parameters the result is always finite. Out-of-range u or h is a
/// caller concern and is not rejected here.
pub fn derivatives(u: Potential, h: Gate, i_stim: Current, params: &Parameters) -> (f64, f64) {
    let du_dt = j_in(u, h, params.tau_in) + j_out(u, params.tau_out) + i_stim;
    (du_dt, dh_dt(u, h, params))
}

// ============================================================================
// STIMULUS PROTOCOLS
// ============================================================================

/// External stimulus protocol, evaluated as a pure function of time.
///
/// The driver also accepts an arbitrary closure `Fn(Time) -> Current`
/// through [`Simulation::run_with`]; these variants cover the common
/// pacing protocols.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Stimulus {
    /// No stimulus
    None,
    /// Single rectangular pulse, active on [start, start + duration)
    Pulse {
        amplitude: Current,
        start: Time,
        duration: Time,
    },
    /// Periodic rectangular pulses starting at `start`
    PulseTrain {
        amplitude: Current,
        start: Time,
        duration: Time,
        period: Time,
    },
}

impl Stimulus {
    /// Periodic pacing protocol; the period must exceed the pulse width
    pub fn pulse_train(
        amplitude: Current,
        start: Time,
        duration: Time,
        period: Time,
    ) -> Result<Self> {
        if !(period > 0.0) || period <= duration {
            return Err(CardiacError::InvalidConfig(format!(
                "pulse train period must exceed pulse duration, got period {period}, duration {duration}"
            )));
        }
        Ok(Self::PulseTrain {
            amplitude,
            start,
            duration,
            period,
        })
    }

    /// Stimulus current at time t
    pub fn at(&self, t: Time) -> Current {
        match *self {
            Self::None => 0.0,
            Self::Pulse {
                amplitude,
                start,
                duration,
            } => {
                if t >= start && t < start + duration {
                    amplitude
                } else {
                    0.0
                }
            }
            Self::PulseTrain {
                amplitude,
                start,
                duration,
                period,
            } => {
                if t < start {
                    return 0.0;
                }
                let phase = (t - start) % period;
                if phase < duration {
                    amplitude
                } else {
                    0.0
                }
            }
        }
    }
}

// ============================================================================
// SIMULATION DRIVER
// ============================================================================

/// Cell state: the (u, h) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Transmembrane potential
    pub u: Potential,
    /// Gating variable
    pub h: Gate,
}

impl State {
    /// Fully resting, fully recovered cell: u = 0, h = 1
    pub fn resting() -> Self {
        Self { u: 0.0, h: 1.0 }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::resting()
    }
}

/// Fixed-step forward-Euler driver for one cell.
///
/// Owns the run's state exclusively; each call to [`Simulation::run`]
/// produces a fresh [`Trace`] and leaves the simulation unchanged, so a
/// single `Simulation` value can drive repeated or concurrent runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Simulation {
    pub parameters: Parameters,
    pub config: RunConfig,
    pub initial: State,
}

impl Simulation {
    pub fn new(parameters: Parameters, config: RunConfig) -> Self {
        Self {
            parameters,
            config,
            initial: State::resting(),
        }
    }

    /// Override the initial state (default: resting)
    pub fn with_initial(mut self, initial: State) -> Self {
        self.initial = initial;
        self
    }

    /// Run the simulation under a stimulus protocol
    pub fn run(&self, stimulus: &Stimulus) -> Trace {
        self.run_with(|t| stimulus.at(t))
    }

    /// Run the simulation with an arbitrary stimulus function.
    ///
    /// Records the initial state at t = 0, then performs exactly
    /// `config.steps()` Euler iterations, sampling the stimulus at the
    /// start of each step. Grid times are computed as `i * dt` rather
    /// than accumulated, so the grid carries no additive rounding drift.
    ///
    /// Deterministic: identical inputs produce bit-identical traces.
    ///
    /// Stability is the caller's responsibility: forward Euler diverges
    /// when dt is large relative to `parameters.min_time_constant()`,
    /// and the driver neither clamps state nor detects blow-up.
    pub fn run_with<F: Fn(Time) -> Current>(&self, stimulus: F) -> Trace {
        let dt = self.config.dt;
        let steps = self.config.steps();

        let mut trace = Trace::with_capacity(steps + 1);
        let State { mut u, mut h } = self.initial;
        trace.push(0.0, u, h);

        for i in 0..steps {
            let t = i as f64 * dt;
            let i_stim = stimulus(t);
            let (du, dh) = derivatives(u, h, i_stim, &self.parameters);
            u += dt * du;
            h += dt * dh;
            trace.push((i + 1) as f64 * dt, u, h);
        }

        trace
    }
}

// ============================================================================
// PARAMETER SWEEPS
// ============================================================================

/// One point of a batch run: a parameter set paired with its protocol
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweepPoint {
    pub parameters: Parameters,
    pub stimulus: Stimulus,
}

/// Run every sweep point independently in parallel.
///
/// Each run owns its own state and trace, so no coordination is needed;
/// the result order matches the input order.
pub fn sweep(points: &[SweepPoint], config: RunConfig, initial: State) -> Vec<Trace> {
    points
        .par_iter()
        .map(|point| {
            Simulation::new(point.parameters, config)
                .with_initial(initial)
                .run(&point.stimulus)
        })
        .collect()
}

/// Action potential duration: total time the potential spends above
/// `threshold`, measured on the left endpoint of each grid interval.
pub fn apd(trace: &Trace, threshold: Potential) -> Time {
    trace
        .samples()
        .windows(2)
        .filter(|w| w[0].u > threshold)
        .map(|w| w[1].t - w[0].t)
        .sum()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let p = Parameters::default();
        assert_eq!(p.tau_close, 150.0);
        assert_eq!(p.tau_open, 120.0);
        assert_eq!(p.tau_out, 6.0);
        assert_eq!(p.tau_in, 0.3);
        assert_eq!(p.u_gate, 0.13);
        assert_eq!(p.min_time_constant(), 0.3);
    }

    #[test]
    fn test_parameter_validation() {
        assert!(Parameters::new(0.3, 6.0, 120.0, 150.0, 0.13).is_ok());
        assert!(Parameters::new(0.0, 6.0, 120.0, 150.0, 0.13).is_err());
        assert!(Parameters::new(0.3, -6.0, 120.0, 150.0, 0.13).is_err());
        assert!(Parameters::new(0.3, 6.0, 0.0, 150.0, 0.13).is_err());
        assert!(Parameters::new(0.3, 6.0, 120.0, f64::NAN, 0.13).is_err());
        assert!(Parameters::new(0.3, 6.0, 120.0, 150.0, 0.0).is_err());
    }

    #[test]
    fn test_kernel_at_rest_potential() {
        // u = 0 carries no current regardless of h or stimulus absence
        let p = Parameters::default();
        for h in [0.0, 0.5, 1.0] {
            let (du_dt, dh_dt) = derivatives(0.0, h, 0.0, &p);
            assert_eq!(du_dt, 0.0);
            // Below the gate the only dynamics is recovery toward h = 1
            assert_eq!(dh_dt, (1.0 - h) / p.tau_open);
        }
    }

    #[test]
    fn test_gate_branch_switch() {
        let p = Parameters::default();
        let h = 0.5;
        let eps = 1e-9;

        // Sub-threshold: gate opens (positive rate for h < 1)
        assert!(dh_dt(p.u_gate - eps, h, &p) > 0.0);
        // Supra-threshold: gate closes (negative rate for h > 0)
        assert!(dh_dt(p.u_gate + eps, h, &p) < 0.0);
        // Exactly at the boundary: closing branch
        assert_eq!(dh_dt(p.u_gate, h, &p), -h / p.tau_close);
    }

    #[test]
    fn test_resting_state_is_fixed_point() {
        let sim = Simulation::new(Parameters::default(), RunConfig::new(0.1, 0.1).unwrap());
        let trace = sim.run(&Stimulus::None);

        assert_eq!(trace.len(), 2);
        let last = trace.last().unwrap();
        assert_eq!(last.u, 0.0);
        assert_eq!(last.h, 1.0);
    }

    #[test]
    fn test_trace_length_and_grid() {
        let config = RunConfig::new(0.3, 1.0).unwrap();
        let sim = Simulation::new(Parameters::default(), config);
        let trace = sim.run(&Stimulus::None);

        // ceil(1.0 / 0.3) = 4 steps beyond the initial sample
        assert_eq!(trace.len(), 5);
        for (i, sample) in trace.iter().enumerate() {
            assert_eq!(sample.t, i as f64 * 0.3);
        }
    }

    #[test]
    fn test_determinism() {
        let sim = Simulation::new(Parameters::default(), RunConfig::new(0.01, 50.0).unwrap());
        let stim = Stimulus::Pulse {
            amplitude: 0.2,
            start: 0.0,
            duration: 1.0,
        };

        let a = sim.run(&stim);
        let b = sim.run(&stim);

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.t.to_bits(), y.t.to_bits());
            assert_eq!(x.u.to_bits(), y.u.to_bits());
            assert_eq!(x.h.to_bits(), y.h.to_bits());
        }
    }

    #[test]
    fn test_pulse_stimulus() {
        let stim = Stimulus::Pulse {
            amplitude: 0.2,
            start: 0.0,
            duration: 1.0,
        };
        assert_eq!(stim.at(0.0), 0.2);
        assert_eq!(stim.at(0.99), 0.2);
        assert_eq!(stim.at(1.0), 0.0);
        assert_eq!(stim.at(200.0), 0.0);
    }

    #[test]
    fn test_pulse_train_stimulus() {
        let stim = Stimulus::pulse_train(0.2, 10.0, 1.0, 50.0).unwrap();
        assert_eq!(stim.at(0.0), 0.0);
        assert_eq!(stim.at(9.99), 0.0);
        assert_eq!(stim.at(10.0), 0.2);
        assert_eq!(stim.at(10.99), 0.2);
        assert_eq!(stim.at(11.0), 0.0);
        assert_eq!(stim.at(60.5), 0.2);
        assert_eq!(stim.at(61.5), 0.0);

        // Pulse wider than the period is rejected
        assert!(Stimulus::pulse_train(0.2, 0.0, 2.0, 1.0).is_err());
    }

    #[test]
    fn test_closure_stimulus() {
        let sim = Simulation::new(Parameters::default(), RunConfig::new(0.01, 1.0).unwrap());
        let stim = Stimulus::Pulse {
            amplitude: 0.2,
            start: 0.0,
            duration: 1.0,
        };

        let from_enum = sim.run(&stim);
        let from_closure = sim.run_with(|t| if t < 1.0 { 0.2 } else { 0.0 });

        for (x, y) in from_enum.iter().zip(from_closure.iter()) {
            assert_eq!(x.u.to_bits(), y.u.to_bits());
        }
    }

    #[test]
    fn test_action_potential_scenario() {
        // Canonical excitation-recovery cycle: brief supra-threshold pulse
        // from rest elicits upstroke, plateau, and repolarization.
        let params = Parameters::default();
        let sim = Simulation::new(params, RunConfig::new(0.01, 300.0).unwrap());
        let stim = Stimulus::Pulse {
            amplitude: 0.2,
            start: 0.0,
            duration: 1.0,
        };

        let trace = sim.run(&stim);
        assert_eq!(trace.len(), 30001);

        // Upstroke: u crosses the gate during the pulse and climbs near 1
        // within a few time units of onset
        let crossed = trace
            .iter()
            .find(|s| s.u >= params.u_gate)
            .expect("no gate crossing");
        assert!(crossed.t < 1.0);
        assert!(trace.peak_potential().unwrap() > 0.8);

        // Plateau: still elevated at t = 100
        let at_100 = trace.iter().find(|s| s.t >= 100.0).unwrap();
        assert!(at_100.u > 0.5);

        // Repolarized by the end of the run
        let last = trace.last().unwrap();
        assert!(last.u < 0.1);
        // and the duration above threshold is tens to hundreds of units
        let duration = apd(&trace, 0.5);
        assert!(duration > 50.0 && duration < 280.0);
    }

    #[test]
    fn test_subthreshold_pulse_does_not_excite() {
        // A very weak, very short pulse decays without an action potential
        let sim = Simulation::new(Parameters::default(), RunConfig::new(0.01, 100.0).unwrap());
        let stim = Stimulus::Pulse {
            amplitude: 0.01,
            start: 0.0,
            duration: 0.5,
        };

        let trace = sim.run(&stim);
        assert!(trace.peak_potential().unwrap() < 0.05);
        assert!(trace.last().unwrap().u < 0.01);
    }

    #[test]
    fn test_sweep_matches_sequential_runs() {
        let config = RunConfig::new(0.01, 20.0).unwrap();
        let points: Vec<SweepPoint> = [0.05, 0.1, 0.2]
            .iter()
            .map(|&amplitude| SweepPoint {
                parameters: Parameters::default(),
                stimulus: Stimulus::Pulse {
                    amplitude,
                    start: 0.0,
                    duration: 1.0,
                },
            })
            .collect();

        let parallel = sweep(&points, config, State::resting());
        assert_eq!(parallel.len(), points.len());

        for (point, trace) in points.iter().zip(&parallel) {
            let sequential = Simulation::new(point.parameters, config).run(&point.stimulus);
            for (x, y) in sequential.iter().zip(trace.iter()) {
                assert_eq!(x.u.to_bits(), y.u.to_bits());
                assert_eq!(x.h.to_bits(), y.h.to_bits());
            }
        }
    }

    #[test]
    fn test_apd_counts_time_above_threshold() {
        let mut trace = Trace::new();
        trace.push(0.0, 0.0, 1.0);
        trace.push(1.0, 0.5, 0.9);
        trace.push(2.0, 0.6, 0.8);
        trace.push(3.0, 0.1, 0.8);

        assert_eq!(apd(&trace, 0.3), 2.0);
        assert_eq!(apd(&trace, 0.9), 0.0);
    }
}
