// src/engine.rs
// One call per run: validate inputs, compute every series over the grid, hand back owned results.
// Nothing here is shared between runs.

use crate::energy::{energy_series, EnergySample, EnergySummary};
use crate::error::MotionResult;
use crate::grid::SampleGrid;
use crate::kinematics::{DerivedExpressions, KinematicsSeries, MotionLaw};
use crate::logic::{IntegrationStats, IntegratorSettings, PendulumSolver};
use crate::math::{State, SystemParameters};
use crate::reconstruct::{reconstruct_trajectory, CartesianPoint};
use crate::vector_field::VectorField;
use serde::Serialize;
use tracing::info;

/// Result of a prescribed-trajectory run.
#[derive(Debug, Clone, Serialize)]
pub struct KinematicsRun {
    pub series: KinematicsSeries,
    pub velocity: VectorField,
    pub acceleration: VectorField,
    pub expressions: DerivedExpressions,
}

pub fn run_kinematics(law: &MotionLaw, grid: &SampleGrid) -> MotionResult<KinematicsRun> {
    info!(radius = %law.radius(), angle = %law.angle(), samples = grid.len(), "kinematics run");
    let derived = law.derive()?;
    let series = derived.sample(grid)?;
    Ok(KinematicsRun {
        velocity: series.velocity_field(),
        acceleration: series.acceleration_field(),
        expressions: derived.expressions(),
        series,
    })
}

/// Column-oriented dynamics series, index-aligned to the grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicsSeries {
    pub t: Vec<f64>,
    pub x1: Vec<f64>,
    pub y1: Vec<f64>,
    pub x2: Vec<f64>,
    pub y2: Vec<f64>,
    pub kinetic: Vec<f64>,
    pub potential: Vec<f64>,
    pub total: Vec<f64>,
    pub phi: Vec<f64>,
    pub psi: Vec<f64>,
    pub dphi: Vec<f64>,
    pub dpsi: Vec<f64>,
}

impl DynamicsSeries {
    fn from_samples(grid: &SampleGrid, states: &[State], points: &[CartesianPoint], energies: &[EnergySample]) -> Self {
        Self {
            t: grid.to_vec(),
            x1: points.iter().map(|p| p.x1).collect(),
            y1: points.iter().map(|p| p.y1).collect(),
            x2: points.iter().map(|p| p.x2).collect(),
            y2: points.iter().map(|p| p.y2).collect(),
            kinetic: energies.iter().map(|e| e.kinetic).collect(),
            potential: energies.iter().map(|e| e.potential).collect(),
            total: energies.iter().map(|e| e.total).collect(),
            phi: states.iter().map(|s| s.phi).collect(),
            psi: states.iter().map(|s| s.psi).collect(),
            dphi: states.iter().map(|s| s.dphi).collect(),
            dpsi: states.iter().map(|s| s.dpsi).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

/// Result of a pendulum run.
#[derive(Debug, Clone, Serialize)]
pub struct DynamicsRun {
    pub params: SystemParameters,
    #[serde(skip)]
    pub states: Vec<State>,
    #[serde(skip)]
    pub points: Vec<CartesianPoint>,
    #[serde(skip)]
    pub energies: Vec<EnergySample>,
    pub series: DynamicsSeries,
    pub summary: Option<EnergySummary>,
    pub stats: IntegrationStats,
}

pub fn run_dynamics(
    params: SystemParameters,
    initial: State,
    grid: &SampleGrid,
    settings: IntegratorSettings,
) -> MotionResult<DynamicsRun> {
    let solver = PendulumSolver::new(params)?.with_settings(settings);
    let (states, stats) = solver.solve(initial, grid)?;
    let points = reconstruct_trajectory(&states, &params);
    let energies = energy_series(&states, &params);
    let summary = EnergySummary::from_series(&energies);
    if let Some(s) = &summary {
        info!(
            initial = s.initial,
            relative_drift = s.relative_drift,
            accepted = stats.accepted,
            rejected = stats.rejected,
            "dynamics run finished"
        );
    }
    Ok(DynamicsRun {
        series: DynamicsSeries::from_samples(grid, &states, &points, &energies),
        params,
        states,
        points,
        energies,
        summary,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MotionError;

    #[test]
    fn dynamics_series_columns_align() {
        let grid = SampleGrid::linspace(0.0, 1.0, 25).unwrap();
        let run = run_dynamics(
            SystemParameters::default(),
            State::new(0.2, 0.1, 0.0, 0.0),
            &grid,
            IntegratorSettings::default(),
        )
        .unwrap();
        let s = &run.series;
        assert_eq!(s.len(), grid.len());
        assert!(!s.is_empty());
        for col in [&s.x1, &s.y1, &s.x2, &s.y2, &s.kinetic, &s.potential, &s.total, &s.phi, &s.psi, &s.dphi, &s.dpsi]
        {
            assert_eq!(col.len(), grid.len());
        }
        assert_eq!(run.states.len(), grid.len());
        assert_eq!(s.x1[3], run.points[3].x1);
        assert_eq!(s.total[7], run.energies[7].total);
    }

    #[test]
    fn invalid_parameters_fail_before_integration() {
        let grid = SampleGrid::linspace(0.0, 1.0, 5).unwrap();
        let params = SystemParameters { rod_length_2: 0.0, ..SystemParameters::default() };
        let err = run_dynamics(params, State::default(), &grid, IntegratorSettings::default()).unwrap_err();
        assert!(matches!(err, MotionError::InvalidParameters(_)));
    }

    #[test]
    fn kinematics_fields_match_series() {
        let grid = SampleGrid::linspace(0.0, 1.0, 11).unwrap();
        let run = run_kinematics(&MotionLaw::reference(), &grid).unwrap();
        assert_eq!(run.velocity.len(), grid.len());
        assert_eq!(run.acceleration.len(), grid.len());
        assert_eq!(run.velocity.magnitude[4], run.series.vx[4].hypot(run.series.vy[4]));
    }
}
