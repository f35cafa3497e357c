// src/math.rs
// Equations of motion for a double pendulum whose first rod is coupled to a spring.
// State is (φ, ψ, φ', ψ'): the two rod angles from the downward vertical and their rates.
// The right-hand side is pure; validation of the parameters happens once, at construction.

use crate::error::{MotionError, MotionResult};
use crate::logic::OdeSystem;
use serde::{Deserialize, Serialize};

/// Physical constants of one run. Immutable once validated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemParameters {
    pub mass: f64,             // m, same for both point masses.
    pub rod_length_1: f64,     // l1.
    pub rod_length_2: f64,     // l2.
    pub spring_stiffness: f64, // c.
    pub gravity: f64,          // g.
}

impl Default for SystemParameters {
    fn default() -> Self {
        Self { mass: 1.0, rod_length_1: 1.0, rod_length_2: 1.0, spring_stiffness: 1.0, gravity: 9.81 }
    }
}

impl SystemParameters {
    /// Builds and validates the parameter set.
    pub fn new(
        mass: f64,
        rod_length_1: f64,
        rod_length_2: f64,
        spring_stiffness: f64,
        gravity: f64,
    ) -> MotionResult<Self> {
        let params = Self { mass, rod_length_1, rod_length_2, spring_stiffness, gravity };
        params.validate()?;
        Ok(params)
    }

    /// Mass and rod lengths must be strictly positive; every constant must be finite.
    pub fn validate(&self) -> MotionResult<()> {
        let named = [
            ("mass", self.mass),
            ("rod_length_1", self.rod_length_1),
            ("rod_length_2", self.rod_length_2),
            ("spring_stiffness", self.spring_stiffness),
            ("gravity", self.gravity),
        ];
        for (name, value) in named {
            if !value.is_finite() {
                return Err(MotionError::invalid_params(format!("{name} must be finite, got {value}")));
            }
        }
        for (name, value) in &named[..3] {
            if *value <= 0.0 {
                return Err(MotionError::invalid_params(format!("{name} must be > 0, got {value}")));
            }
        }
        Ok(())
    }
}

/// Generalized coordinates and their rates at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    pub phi: f64,  // Angle of rod 1.
    pub psi: f64,  // Angle of rod 2.
    pub dphi: f64, // dφ/dt.
    pub dpsi: f64, // dψ/dt.
}

impl State {
    pub const fn new(phi: f64, psi: f64, dphi: f64, dpsi: f64) -> Self {
        Self { phi, psi, dphi, dpsi }
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.phi, self.psi, self.dphi, self.dpsi]
    }

    pub fn from_array(y: [f64; 4]) -> Self {
        Self::new(y[0], y[1], y[2], y[3])
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// d(state)/dt for the spring-coupled double pendulum.
///
/// ```text
/// φ'' = [ -l2 ψ'² sin(φ-ψ) - g sin φ - (c l1 / m) cos φ sin φ ] / l1
/// ψ'' = [  l1 φ'² sin(φ-ψ) - g sin ψ ] / l2
/// ```
/// The system is autonomous; `_t` is accepted so the signature matches any time-dependent right-hand side.
pub fn derivative(state: &State, _t: f64, params: &SystemParameters) -> State {
    let SystemParameters { mass: m, rod_length_1: l1, rod_length_2: l2, spring_stiffness: c, gravity: g } =
        *params;
    let (sin_phi, cos_phi) = state.phi.sin_cos();
    let sin_rel = (state.phi - state.psi).sin(); // sin(φ - ψ), shared by both rows.

    let ddphi = (-l2 * state.dpsi * state.dpsi * sin_rel - g * sin_phi - (c * l1 / m) * cos_phi * sin_phi) / l1;
    let ddpsi = (l1 * state.dphi * state.dphi * sin_rel - g * state.psi.sin()) / l2;

    State::new(state.dphi, state.dpsi, ddphi, ddpsi)
}

/// The pendulum model as seen by the integrator. Only constructible from valid parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringDoublePendulum {
    params: SystemParameters,
}

impl SpringDoublePendulum {
    pub fn new(params: SystemParameters) -> MotionResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SystemParameters {
        &self.params
    }
}

impl OdeSystem<4> for SpringDoublePendulum {
    fn rhs(&self, t: f64, y: &[f64; 4]) -> [f64; 4] {
        derivative(&State::from_array(*y), t, &self.params).to_array()
    }
}
