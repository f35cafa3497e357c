// src/grid.rs
// The ordered set of time instants every series of one run is sampled on.
// Construction validates the grid once; afterwards it is read-only and shared by all derived series.

use crate::error::{MotionError, MotionResult};
use serde::Serialize;

/// Largest grid [`SampleGrid::linspace`] will allocate.
pub const MAX_SAMPLES: usize = 1_000_000;

/// Strictly increasing, non-empty, finite time instants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SampleGrid {
    instants: Vec<f64>,
}

impl SampleGrid {
    /// Evenly spaced instants from `start` to `end` inclusive, like `linspace(start, end, count)`.
    /// A single sample yields `[start]`.
    pub fn linspace(start: f64, end: f64, count: usize) -> MotionResult<Self> {
        if count == 0 {
            return Err(MotionError::invalid_params("sample count must be at least 1"));
        }
        if count > MAX_SAMPLES {
            return Err(MotionError::invalid_params(format!(
                "sample count {count} exceeds the limit of {MAX_SAMPLES}"
            )));
        }
        if !start.is_finite() || !end.is_finite() {
            return Err(MotionError::invalid_params("time span must be finite"));
        }
        if count == 1 {
            return Ok(Self { instants: vec![start] });
        }
        if end <= start {
            return Err(MotionError::invalid_params(format!(
                "time span end ({end}) must be greater than start ({start})"
            )));
        }
        let num_steps = (count - 1) as f64; // Intervals between samples.
        let step = (end - start) / num_steps;
        let mut instants: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
        instants[count - 1] = end; // Pin the last instant so rounding never overshoots the span.
        Self::from_instants(instants)
    }

    /// Wraps caller-supplied instants after checking ordering and finiteness.
    pub fn from_instants(instants: Vec<f64>) -> MotionResult<Self> {
        if instants.is_empty() {
            return Err(MotionError::invalid_params("sample grid is empty"));
        }
        if let Some(bad) = instants.iter().find(|t| !t.is_finite()) {
            return Err(MotionError::invalid_params(format!("sample grid holds non-finite instant {bad}")));
        }
        for (i, pair) in instants.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(MotionError::invalid_params(format!(
                    "sample grid is not strictly increasing at index {}: {} -> {}",
                    i + 1,
                    pair[0],
                    pair[1]
                )));
            }
        }
        Ok(Self { instants })
    }

    pub fn len(&self) -> usize {
        self.instants.len()
    }

    /// Always false for a constructed grid; present for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.instants.is_empty()
    }

    pub fn start(&self) -> f64 {
        self.instants[0]
    }

    pub fn end(&self) -> f64 {
        self.instants[self.instants.len() - 1]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.instants
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.instants.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.instants.clone()
    }
}
