//! # Cardiac Core
//!
//! Shared types for 0D (single-cell, spatially unresolved) cardiac
//! electrophysiology simulation.
//!
//! ## Design Philosophy
//!
//! 1. Model crates own the equations; this crate owns the plumbing
//! 2. Configuration is validated once, at construction
//! 3. The trace is the sole output artifact of a run
//!
//! A "0D" simulation has no spatial index: the state is a handful of
//! scalars, and the output is a time series of those scalars.

use serde::{Deserialize, Serialize};
use std::io::Write;
use thiserror::Error;

/// Time point (model time units)
pub type Time = f64;

/// Transmembrane potential (dimensionless, nominally in [0, 1])
pub type Potential = f64;

/// Stimulus current (dimensionless driving term)
pub type Current = f64;

/// Gating variable (dimensionless, nominally in [0, 1])
pub type Gate = f64;

/// Common errors
#[derive(Debug, Error)]
pub enum CardiacError {
    #[error("Invalid parameter {name}: {value} (must be positive)")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CardiacError>;

/// One recorded point of a simulation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Simulation time
    pub t: Time,
    /// Transmembrane potential
    pub u: Potential,
    /// Gating variable
    pub h: Gate,
}

/// Time series produced by one simulation run.
///
/// Append-only while the run is in progress; callers receive it by value
/// once the run completes and from then on it is effectively immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    samples: Vec<Sample>,
}

impl Trace {
    pub fn new() -> Self {
        Self { samples: Vec::new() }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self { samples: Vec::with_capacity(n) }
    }

    pub fn push(&mut self, t: Time, u: Potential, h: Gate) {
        self.samples.push(Sample { t, u, h });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Time column
    pub fn times(&self) -> Vec<Time> {
        self.samples.iter().map(|s| s.t).collect()
    }

    /// Potential column
    pub fn potentials(&self) -> Vec<Potential> {
        self.samples.iter().map(|s| s.u).collect()
    }

    /// Gating variable column
    pub fn gates(&self) -> Vec<Gate> {
        self.samples.iter().map(|s| s.h).collect()
    }

    /// Maximum potential reached over the run
    pub fn peak_potential(&self) -> Option<Potential> {
        self.samples
            .iter()
            .map(|s| s.u)
            .max_by(|a, b| a.total_cmp(b))
    }

    /// Write the trace as CSV (`t,u,h` header plus one row per sample)
    pub fn to_csv<W: Write>(&self, mut w: W) -> Result<()> {
        writeln!(w, "t,u,h")?;
        for s in &self.samples {
            writeln!(w, "{},{},{}", s.t, s.u, s.h)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Fixed-step run configuration
///
/// Validated once at construction; the integration loop itself performs
/// no per-step checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunConfig {
    /// Time step
    pub dt: Time,
    /// Total duration
    pub duration: Time,
}

impl RunConfig {
    pub fn new(dt: Time, duration: Time) -> Result<Self> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(CardiacError::InvalidConfig(format!(
                "dt must be positive and finite, got {dt}"
            )));
        }
        if !(duration > 0.0) || !duration.is_finite() {
            return Err(CardiacError::InvalidConfig(format!(
                "duration must be positive and finite, got {duration}"
            )));
        }
        Ok(Self { dt, duration })
    }

    /// Number of integration steps: ceil(duration / dt)
    pub fn steps(&self) -> usize {
        (self.duration / self.dt).ceil() as usize
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            duration: 300.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_push() {
        let mut trace = Trace::new();
        trace.push(0.0, 0.0, 1.0);
        trace.push(0.01, 0.002, 1.0);
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.last().unwrap().t, 0.01);
    }

    #[test]
    fn test_trace_columns() {
        let mut trace = Trace::new();
        trace.push(0.0, 0.1, 0.9);
        trace.push(1.0, 0.5, 0.8);
        assert_eq!(trace.times(), vec![0.0, 1.0]);
        assert_eq!(trace.potentials(), vec![0.1, 0.5]);
        assert_eq!(trace.gates(), vec![0.9, 0.8]);
        assert_eq!(trace.peak_potential(), Some(0.5));
    }

    #[test]
    fn test_trace_csv() {
        let mut trace = Trace::new();
        trace.push(0.0, 0.0, 1.0);
        trace.push(0.5, 0.25, 0.75);

        let mut buf = Vec::new();
        trace.to_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "t,u,h");
        assert_eq!(lines[1], "0,0,1");
        assert_eq!(lines[2], "0.5,0.25,0.75");
    }

    #[test]
    fn test_run_config_steps() {
        let config = RunConfig::new(0.01, 300.0).unwrap();
        assert_eq!(config.steps(), 30000);

        // Non-integer ratio rounds up
        let config = RunConfig::new(0.3, 1.0).unwrap();
        assert_eq!(config.steps(), 4);
    }

    #[test]
    fn test_run_config_rejects_bad_values() {
        assert!(RunConfig::new(0.0, 100.0).is_err());
        assert!(RunConfig::new(-0.01, 100.0).is_err());
        assert!(RunConfig::new(0.01, 0.0).is_err());
        assert!(RunConfig::new(f64::NAN, 100.0).is_err());
    }

    #[test]
    fn test_run_config_rejects_non_finite() {
        // An infinite dt or duration would make steps() saturate and the
        // integration loop unbounded
        assert!(RunConfig::new(f64::INFINITY, 10.0).is_err());
        assert!(RunConfig::new(0.01, f64::INFINITY).is_err());
        assert!(RunConfig::new(0.01, f64::NAN).is_err());
    }
}
