// src/reconstruct.rs
// Maps rod angles back to Cartesian positions of the two point masses.
// The pivot is fixed at the origin; angles are measured from the downward vertical, so y grows upward.

use crate::math::{State, SystemParameters};
use serde::Serialize;

/// Positions of mass 1 (end of rod 1) and mass 2 (end of rod 2) at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CartesianPoint {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

pub fn reconstruct(state: &State, params: &SystemParameters) -> CartesianPoint {
    let x1 = params.rod_length_1 * state.phi.sin();
    let y1 = -params.rod_length_1 * state.phi.cos();
    let x2 = x1 + params.rod_length_2 * state.psi.sin();
    let y2 = y1 - params.rod_length_2 * state.psi.cos();
    CartesianPoint { x1, y1, x2, y2 }
}

/// Applies [`reconstruct`] independently to every sample.
pub fn reconstruct_trajectory(trajectory: &[State], params: &SystemParameters) -> Vec<CartesianPoint> {
    trajectory.iter().map(|s| reconstruct(s, params)).collect()
}
