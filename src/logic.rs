// src/logic.rs
// Numerical integration: an adaptive Dormand–Prince 5(4) embedded Runge–Kutta scheme that advances a
// state vector across a sample grid. Internal steps are clipped at every grid instant, so the returned
// trajectory holds exactly one state per instant and trajectory[0] is the initial state itself.
// Step control: standard error norm with rtol/atol, safety factor 0.9, growth clamped to [0.2, 5].

use crate::error::{MotionError, MotionResult};
use crate::grid::SampleGrid;
use crate::math::{SpringDoublePendulum, State, SystemParameters};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Right-hand side of a first-order system y' = f(t, y) with `N` components.
pub trait OdeSystem<const N: usize> {
    fn rhs(&self, t: f64, y: &[f64; N]) -> [f64; N];
}

/// Tolerances and budgets for [`Integrator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntegratorSettings {
    pub rtol: f64,
    pub atol: f64,
    pub initial_step: f64,
    pub max_step: f64,
    /// Consecutive rejected steps tolerated before giving up.
    pub max_rejections: usize,
    /// Total step attempts across the whole run.
    pub max_steps: usize,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-9,
            atol: 1e-12,
            initial_step: 1e-3,
            max_step: f64::INFINITY,
            max_rejections: 40,
            max_steps: 1_000_000,
        }
    }
}

impl IntegratorSettings {
    pub fn validate(&self) -> MotionResult<()> {
        if !(self.rtol > 0.0 && self.atol >= 0.0 && self.rtol.is_finite() && self.atol.is_finite()) {
            return Err(MotionError::invalid_params("tolerances must be finite, rtol > 0 and atol >= 0"));
        }
        if !(self.initial_step > 0.0 && self.max_step > 0.0) {
            return Err(MotionError::invalid_params("step sizes must be > 0"));
        }
        if self.max_rejections == 0 || self.max_steps == 0 {
            return Err(MotionError::invalid_params("step budgets must be at least 1"));
        }
        Ok(())
    }
}

/// Work counters of one integration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntegrationStats {
    pub accepted: usize,
    pub rejected: usize,
    pub evaluations: usize,
}

// Dormand–Prince 5(4) tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
// Fifth-order weights (also row 7 of the tableau, which makes the scheme FSAL).
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;
// Difference between fifth- and fourth-order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Adaptive explicit integrator. Holds only settings and the counters of its last run.
#[derive(Debug, Clone, Default)]
pub struct Integrator {
    pub settings: IntegratorSettings,
    pub stats: IntegrationStats,
}

// y + h * Σ a_i k_i
fn combine<const N: usize>(y: &[f64; N], h: f64, terms: &[(f64, &[f64; N])]) -> [f64; N] {
    let mut out = *y;
    for (i, slot) in out.iter_mut().enumerate() {
        let mut acc = 0.0;
        for (a, k) in terms {
            acc += a * k[i];
        }
        *slot += h * acc;
    }
    out
}

impl Integrator {
    pub fn new(settings: IntegratorSettings) -> Self {
        Self { settings, stats: IntegrationStats::default() }
    }

    /// Integrates `system` from `initial` at `grid.start()` and returns one state per grid instant.
    pub fn integrate<const N: usize, S: OdeSystem<N>>(
        &mut self,
        system: &S,
        initial: [f64; N],
        grid: &SampleGrid,
    ) -> MotionResult<Vec<[f64; N]>> {
        self.settings.validate()?;
        if initial.iter().any(|v| !v.is_finite()) {
            return Err(MotionError::invalid_params("initial state must be finite"));
        }
        self.stats = IntegrationStats::default();

        let instants = grid.as_slice();
        let mut trajectory = Vec::with_capacity(instants.len());
        trajectory.push(initial); // Exactly the caller's initial condition.

        let mut t = instants[0];
        let mut y = initial;
        let mut k1 = system.rhs(t, &y);
        self.stats.evaluations += 1;
        let mut h = self.settings.initial_step.min(self.settings.max_step);
        let mut rejections_in_row = 0usize;

        for &target in &instants[1..] {
            while t < target {
                // Budget is spent only when another attempt is actually needed.
                if self.stats.accepted + self.stats.rejected >= self.settings.max_steps {
                    warn!(
                        last_time = t,
                        max_steps = self.settings.max_steps,
                        "integration diverged: step budget exhausted"
                    );
                    return Err(MotionError::divergence(t));
                }
                let remaining = target - t;
                // Land exactly on the grid instant; avoid leaving a sliver smaller than rounding noise.
                let (step, lands) = if h >= remaining || remaining - h <= 1e-12 * remaining.max(t.abs()) {
                    (remaining, true)
                } else {
                    (h, false)
                };
                let (y_new, k7, err) = self.attempt(system, t, &y, &k1, step);

                if err.is_finite() && err <= 1.0 && y_new.iter().all(|v| v.is_finite()) {
                    t = if lands { target } else { t + step };
                    y = y_new;
                    k1 = k7;
                    self.stats.accepted += 1;
                    rejections_in_row = 0;
                    let factor = if err == 0.0 {
                        MAX_FACTOR
                    } else {
                        (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                    };
                    // A clipped step says nothing about the natural step size; keep the larger one.
                    h = (step * factor).max(if lands { h } else { 0.0 }).min(self.settings.max_step);
                } else {
                    self.stats.rejected += 1;
                    rejections_in_row += 1;
                    let factor = if err.is_finite() {
                        (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, 1.0)
                    } else {
                        MIN_FACTOR
                    };
                    h = step * factor;
                    if rejections_in_row > self.settings.max_rejections
                        || h <= 16.0 * f64::EPSILON * t.abs().max(1.0)
                    {
                        warn!(last_time = t, step = h, "integration diverged: step size collapsed");
                        return Err(MotionError::divergence(t));
                    }
                }

            }
            trajectory.push(y);
        }

        debug!(
            accepted = self.stats.accepted,
            rejected = self.stats.rejected,
            evaluations = self.stats.evaluations,
            "integration finished"
        );
        Ok(trajectory)
    }

    // One Dormand–Prince step; returns (y_{n+1}, f(t+h, y_{n+1}), scaled error norm).
    fn attempt<const N: usize, S: OdeSystem<N>>(
        &mut self,
        system: &S,
        t: f64,
        y: &[f64; N],
        k1: &[f64; N],
        h: f64,
    ) -> ([f64; N], [f64; N], f64) {
        let k2 = system.rhs(t + C2 * h, &combine(y, h, &[(A21, k1)]));
        let k3 = system.rhs(t + C3 * h, &combine(y, h, &[(A31, k1), (A32, &k2)]));
        let k4 = system.rhs(t + C4 * h, &combine(y, h, &[(A41, k1), (A42, &k2), (A43, &k3)]));
        let k5 = system.rhs(t + C5 * h, &combine(y, h, &[(A51, k1), (A52, &k2), (A53, &k3), (A54, &k4)]));
        let k6 = system.rhs(t + h, &combine(y, h, &[(A61, k1), (A62, &k2), (A63, &k3), (A64, &k4), (A65, &k5)]));
        let y_new = combine(y, h, &[(B1, k1), (B3, &k3), (B4, &k4), (B5, &k5), (B6, &k6)]);
        let k7 = system.rhs(t + h, &y_new);
        self.stats.evaluations += 6;

        let mut sum = 0.0;
        for i in 0..N {
            let local = h * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
            let scale = self.settings.atol + self.settings.rtol * y[i].abs().max(y_new[i].abs());
            sum += (local / scale).powi(2);
        }
        let err = if N == 0 { 0.0 } else { (sum / N as f64).sqrt() };
        (y_new, k7, err)
    }
}

/// Integrates the spring-coupled double pendulum over `grid`.
/// Kept as a thin solver object in the same shape as the physical model: fixed parameters, many runs.
#[derive(Debug, Clone)]
pub struct PendulumSolver {
    model: SpringDoublePendulum,
    settings: IntegratorSettings,
}

impl PendulumSolver {
    pub fn new(params: SystemParameters) -> MotionResult<Self> {
        Ok(Self { model: SpringDoublePendulum::new(params)?, settings: IntegratorSettings::default() })
    }

    pub fn with_settings(mut self, settings: IntegratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn params(&self) -> &SystemParameters {
        self.model.params()
    }

    /// Returns the state trajectory (one per grid instant) and the integrator's work counters.
    pub fn solve(&self, initial: State, grid: &SampleGrid) -> MotionResult<(Vec<State>, IntegrationStats)> {
        info!(
            phi0 = initial.phi,
            psi0 = initial.psi,
            samples = grid.len(),
            t_end = grid.end(),
            "integrating pendulum"
        );
        let mut integrator = Integrator::new(self.settings);
        let raw = integrator.integrate(&self.model, initial.to_array(), grid)?;
        let trajectory = raw.into_iter().map(State::from_array).collect();
        Ok((trajectory, integrator.stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Harmonic {
        omega: f64,
    }

    impl OdeSystem<2> for Harmonic {
        fn rhs(&self, _t: f64, y: &[f64; 2]) -> [f64; 2] {
            [y[1], -self.omega * self.omega * y[0]]
        }
    }

    // y' = y², y(0) = 1 blows up at t = 1.
    struct BlowUp;

    impl OdeSystem<1> for BlowUp {
        fn rhs(&self, _t: f64, y: &[f64; 1]) -> [f64; 1] {
            [y[0] * y[0]]
        }
    }

    // y' = cos t, exercises explicit time dependence.
    struct Forced;

    impl OdeSystem<1> for Forced {
        fn rhs(&self, t: f64, _y: &[f64; 1]) -> [f64; 1] {
            [t.cos()]
        }
    }

    #[test]
    fn harmonic_oscillator_matches_exact_solution() {
        let grid = SampleGrid::linspace(0.0, 10.0, 101).unwrap();
        let mut integrator = Integrator::default();
        let sol = integrator.integrate(&Harmonic { omega: 2.0 }, [1.0, 0.0], &grid).unwrap();
        assert_eq!(sol.len(), grid.len());
        for (t, y) in grid.iter().zip(&sol) {
            assert_relative_eq!(y[0], (2.0 * t).cos(), epsilon = 1e-7);
            assert_relative_eq!(y[1], -2.0 * (2.0 * t).sin(), epsilon = 1e-7);
        }
        assert!(integrator.stats.accepted >= grid.len() - 1);
    }

    #[test]
    fn time_dependent_rhs() {
        let grid = SampleGrid::linspace(0.0, 6.0, 13).unwrap();
        let sol = Integrator::default().integrate(&Forced, [0.0], &grid).unwrap();
        for (t, y) in grid.iter().zip(&sol) {
            assert_relative_eq!(y[0], t.sin(), epsilon = 1e-8);
        }
    }

    #[test]
    fn first_sample_is_initial_state_bitwise() {
        let grid = SampleGrid::linspace(0.0, 1.0, 5).unwrap();
        let y0 = [0.1 + 0.2, 1.0 / 3.0];
        let sol = Integrator::default().integrate(&Harmonic { omega: 1.0 }, y0, &grid).unwrap();
        assert_eq!(sol[0], y0);
    }

    #[test]
    fn single_instant_grid_returns_initial_only() {
        let grid = SampleGrid::linspace(3.0, 3.0, 1).unwrap();
        let sol = Integrator::default().integrate(&Harmonic { omega: 1.0 }, [1.0, 0.0], &grid).unwrap();
        assert_eq!(sol, vec![[1.0, 0.0]]);
    }

    #[test]
    fn blow_up_reports_divergence_with_last_time() {
        let grid = SampleGrid::linspace(0.0, 2.0, 21).unwrap();
        let err = Integrator::default().integrate(&BlowUp, [1.0], &grid).unwrap_err();
        match err {
            MotionError::IntegrationDivergence { last_time } => {
                assert!(last_time < 1.0, "last_time = {last_time}");
                assert!(last_time > 0.9, "last_time = {last_time}");
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn step_budget_exhaustion_is_divergence() {
        let settings = IntegratorSettings { max_steps: 10, max_step: 1e-3, ..IntegratorSettings::default() };
        let grid = SampleGrid::linspace(0.0, 1.0, 3).unwrap();
        let err = Integrator::new(settings).integrate(&Harmonic { omega: 1.0 }, [1.0, 0.0], &grid).unwrap_err();
        assert!(matches!(err, MotionError::IntegrationDivergence { .. }));
    }

    #[test]
    fn run_using_exactly_the_step_budget_succeeds() {
        let grid = SampleGrid::linspace(0.0, 5.0, 11).unwrap();
        let system = Harmonic { omega: 3.0 };
        let mut free = Integrator::default();
        let reference = free.integrate(&system, [1.0, 0.0], &grid).unwrap();
        let attempts = free.stats.accepted + free.stats.rejected;

        let exact = IntegratorSettings { max_steps: attempts, ..IntegratorSettings::default() };
        let mut bounded = Integrator::new(exact);
        assert_eq!(bounded.integrate(&system, [1.0, 0.0], &grid).unwrap(), reference);
        assert_eq!(bounded.stats, free.stats);

        let short = IntegratorSettings { max_steps: attempts - 1, ..IntegratorSettings::default() };
        let err = Integrator::new(short).integrate(&system, [1.0, 0.0], &grid).unwrap_err();
        assert!(matches!(err, MotionError::IntegrationDivergence { .. }));
    }

    #[test]
    fn invalid_settings_rejected() {
        let settings = IntegratorSettings { rtol: 0.0, ..IntegratorSettings::default() };
        let grid = SampleGrid::linspace(0.0, 1.0, 3).unwrap();
        let err = Integrator::new(settings).integrate(&Harmonic { omega: 1.0 }, [1.0, 0.0], &grid).unwrap_err();
        assert!(matches!(err, MotionError::InvalidParameters(_)));
    }

    #[test]
    fn pendulum_solver_keeps_initial_state() {
        let solver = PendulumSolver::new(SystemParameters::default()).unwrap();
        let grid = SampleGrid::linspace(0.0, 2.0, 50).unwrap();
        let initial = State::new(0.4, -0.3, 0.0, 1.0);
        let (trajectory, stats) = solver.solve(initial, &grid).unwrap();
        assert_eq!(trajectory.len(), 50);
        assert_eq!(trajectory[0], initial);
        assert!(stats.evaluations > 0);
        assert!(trajectory.iter().all(State::is_finite));
    }
}
