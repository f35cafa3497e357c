// src/energy.rs
// Mechanical energy of the spring-coupled double pendulum, per sample, with no smoothing.
// Any drift in the total is left visible so callers can judge the integration.

use crate::math::{State, SystemParameters};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EnergySample {
    pub kinetic: f64,
    pub potential: f64,
    /// Stored as `kinetic + potential`, never recomputed independently.
    pub total: f64,
}

impl EnergySample {
    pub fn new(kinetic: f64, potential: f64) -> Self {
        Self { kinetic, potential, total: kinetic + potential }
    }
}

/// T = ½m(l1 φ')² + ½m(l2 ψ')²
pub fn kinetic_energy(state: &State, params: &SystemParameters) -> f64 {
    let v1 = params.rod_length_1 * state.dphi;
    let v2 = params.rod_length_2 * state.dpsi;
    0.5 * params.mass * v1 * v1 + 0.5 * params.mass * v2 * v2
}

/// U = m g [l1(1 - cos φ) + l2(1 - cos ψ)] + ½ c l1² sin²φ
pub fn potential_energy(state: &State, params: &SystemParameters) -> f64 {
    let SystemParameters { mass: m, rod_length_1: l1, rod_length_2: l2, spring_stiffness: c, gravity: g } =
        *params;
    let gravity = m * g * (l1 * (1.0 - state.phi.cos()) + l2 * (1.0 - state.psi.cos()));
    let spring = 0.5 * c * l1 * l1 * state.phi.sin().powi(2);
    gravity + spring
}

pub fn energy(state: &State, params: &SystemParameters) -> EnergySample {
    EnergySample::new(kinetic_energy(state, params), potential_energy(state, params))
}

pub fn energy_series(trajectory: &[State], params: &SystemParameters) -> Vec<EnergySample> {
    trajectory.iter().map(|s| energy(s, params)).collect()
}

/// Spread of the total energy over a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergySummary {
    pub initial: f64,
    pub min: f64,
    pub max: f64,
    /// (max - min) / |initial|; infinite when the run starts at zero energy but moves.
    pub relative_drift: f64,
}

impl EnergySummary {
    /// `None` for an empty series.
    pub fn from_series(series: &[EnergySample]) -> Option<Self> {
        let initial = series.first()?.total;
        let (min, max) = series
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), e| (lo.min(e.total), hi.max(e.total)));
        let spread = max - min;
        let relative_drift = if spread == 0.0 { 0.0 } else { spread / initial.abs() };
        Some(Self { initial, min, max, relative_drift })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_3, FRAC_PI_6};

    #[test]
    fn rest_has_zero_energy() {
        let e = energy(&State::default(), &SystemParameters::default());
        assert_eq!(e, EnergySample { kinetic: 0.0, potential: 0.0, total: 0.0 });
    }

    #[test]
    fn reference_initial_energy_closed_form() {
        let p = SystemParameters::default();
        let e = energy(&State::new(FRAC_PI_6, FRAC_PI_3, 0.0, 0.0), &p);
        // cos 30° = √3/2, cos 60° = 1/2, sin² 30° = 1/4.
        let expected = 9.81 * ((1.0 - 3f64.sqrt() / 2.0) + 0.5) + 0.5 * 0.25;
        assert_eq!(e.kinetic, 0.0);
        assert_relative_eq!(e.potential, expected, epsilon = 1e-12);
        assert_eq!(e.total, e.kinetic + e.potential);
    }

    #[test]
    fn kinetic_terms_add() {
        let p = SystemParameters { mass: 2.0, rod_length_1: 3.0, rod_length_2: 0.5, ..SystemParameters::default() };
        let t = kinetic_energy(&State::new(0.0, 0.0, 1.0, 4.0), &p);
        assert_relative_eq!(t, 0.5 * 2.0 * 9.0 + 0.5 * 2.0 * 4.0);
    }

    #[test]
    fn summary_reports_spread() {
        let series = [EnergySample::new(1.0, 1.0), EnergySample::new(0.5, 1.4), EnergySample::new(1.2, 0.9)];
        let s = EnergySummary::from_series(&series).unwrap();
        assert_eq!(s.initial, 2.0);
        assert_relative_eq!(s.min, 1.9);
        assert_relative_eq!(s.max, 2.1);
        assert_relative_eq!(s.relative_drift, 0.1, epsilon = 1e-12);
        assert!(EnergySummary::from_series(&[]).is_none());
    }

    proptest! {
        #[test]
        fn total_is_exact_sum(
            phi in -4.0f64..4.0,
            psi in -4.0f64..4.0,
            dphi in -10.0f64..10.0,
            dpsi in -10.0f64..10.0,
            c in 0.0f64..50.0,
        ) {
            let p = SystemParameters { spring_stiffness: c, ..SystemParameters::default() };
            let e = energy(&State::new(phi, psi, dphi, dpsi), &p);
            prop_assert_eq!(e.total, e.kinetic + e.potential);
            prop_assert!(e.kinetic >= 0.0);
        }
    }
}
