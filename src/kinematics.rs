// src/kinematics.rs
// Prescribed-trajectory path: a polar motion law r(t), θ(t) is turned into Cartesian position
// x = r cos θ, y = r sin θ, differentiated twice symbolically, compiled, and sampled on a grid.

use crate::error::{MotionError, MotionResult};
use crate::grid::SampleGrid;
use crate::symbolic::{CompiledExpr, Expr};
use crate::vector_field::VectorField;
use serde::Serialize;
use tracing::debug;

/// Polar position law in the time symbol `t`.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionLaw {
    radius: Expr,
    angle: Expr,
}

impl MotionLaw {
    pub fn new(radius: Expr, angle: Expr) -> Self {
        Self { radius, angle }
    }

    /// Builds the law from text, e.g. `("2 + sin(12*t)", "t + 0.2*cos(12*t)")`.
    pub fn parse(radius: &str, angle: &str) -> MotionResult<Self> {
        Ok(Self::new(Expr::parse(radius)?, Expr::parse(angle)?))
    }

    /// r(t) = 2 + sin(12t), θ(t) = t + 0.2 cos(12t).
    pub fn reference() -> Self {
        let t = Expr::t;
        Self::new(2.0 + (12.0 * t()).sin(), t() + 0.2 * (12.0 * t()).cos())
    }

    pub fn radius(&self) -> &Expr {
        &self.radius
    }

    pub fn angle(&self) -> &Expr {
        &self.angle
    }

    /// Cartesian position expressions (x, y).
    pub fn position(&self) -> (Expr, Expr) {
        let x = self.radius.clone() * self.angle.clone().cos();
        let y = self.radius.clone() * self.angle.clone().sin();
        (x, y)
    }

    /// Differentiates the position twice and compiles all six component expressions.
    pub fn derive(&self) -> MotionResult<DerivedLaw> {
        let (x, y) = self.position();
        let vx = x.derivative()?;
        let vy = y.derivative()?;
        let ax = vx.derivative()?;
        let ay = vy.derivative()?;
        debug!(%vx, %vy, "velocity expressions");
        debug!(%ax, %ay, "acceleration expressions");
        Ok(DerivedLaw {
            x: x.simplify().compile()?,
            y: y.simplify().compile()?,
            vx: vx.compile()?,
            vy: vy.compile()?,
            ax: ax.compile()?,
            ay: ay.compile()?,
        })
    }
}

/// Closed-form position, velocity and acceleration of a [`MotionLaw`].
#[derive(Debug)]
pub struct DerivedLaw {
    x: CompiledExpr,
    y: CompiledExpr,
    vx: CompiledExpr,
    vy: CompiledExpr,
    ax: CompiledExpr,
    ay: CompiledExpr,
}

/// Derived expressions rendered as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedExpressions {
    pub x: String,
    pub y: String,
    pub vx: String,
    pub vy: String,
    pub ax: String,
    pub ay: String,
}

impl DerivedLaw {
    pub fn position(&self, t: f64) -> (f64, f64) {
        (self.x.eval(t), self.y.eval(t))
    }

    pub fn velocity(&self, t: f64) -> (f64, f64) {
        (self.vx.eval(t), self.vy.eval(t))
    }

    pub fn acceleration(&self, t: f64) -> (f64, f64) {
        (self.ax.eval(t), self.ay.eval(t))
    }

    pub fn expressions(&self) -> DerivedExpressions {
        DerivedExpressions {
            x: self.x.source().to_string(),
            y: self.y.source().to_string(),
            vx: self.vx.source().to_string(),
            vy: self.vy.source().to_string(),
            ax: self.ax.source().to_string(),
            ay: self.ay.source().to_string(),
        }
    }

    /// Evaluates every component at every grid instant.
    pub fn sample(&self, grid: &SampleGrid) -> MotionResult<KinematicsSeries> {
        let t = grid.as_slice();
        let series = KinematicsSeries {
            t: grid.to_vec(),
            x: self.x.eval_all(t),
            y: self.y.eval_all(t),
            vx: self.vx.eval_all(t),
            vy: self.vy.eval_all(t),
            ax: self.ax.eval_all(t),
            ay: self.ay.eval_all(t),
        };
        // A law like sqrt(t - 5) compiles fine but has no value on part of the grid.
        if let Some(i) = series.first_non_finite() {
            return Err(MotionError::unsupported(format!(
                "motion law is not finite at t = {}",
                series.t[i]
            )));
        }
        Ok(series)
    }
}

/// Index-aligned kinematics series handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KinematicsSeries {
    pub t: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub vx: Vec<f64>,
    pub vy: Vec<f64>,
    pub ax: Vec<f64>,
    pub ay: Vec<f64>,
}

impl KinematicsSeries {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn velocity_field(&self) -> VectorField {
        VectorField::from_components(&self.vx, &self.vy)
    }

    pub fn acceleration_field(&self) -> VectorField {
        VectorField::from_components(&self.ax, &self.ay)
    }

    fn first_non_finite(&self) -> Option<usize> {
        (0..self.len()).find(|&i| {
            ![self.x[i], self.y[i], self.vx[i], self.vy[i], self.ax[i], self.ay[i]]
                .iter()
                .all(|v| v.is_finite())
        })
    }
}
