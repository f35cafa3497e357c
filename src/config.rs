// src/config.rs
// Server options (command line / environment) and the request bodies for both run modes.
// Request fields missing from the JSON fall back to the reference scenarios.

use crate::error::MotionResult;
use crate::grid::SampleGrid;
use crate::kinematics::MotionLaw;
use crate::math::{State, SystemParameters};
use crate::vector_field::{ACCELERATION_SCALE, VELOCITY_SCALE};
use clap::Parser;
use serde::Deserialize;
use std::f64::consts::{FRAC_PI_3, FRAC_PI_6};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "planar-motion-sim", about = "Planar kinematics and spring-pendulum dynamics service")]
pub struct ServerArgs {
    /// Address to bind.
    #[arg(long, env = "PLANAR_MOTION_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, short, env = "PLANAR_MOTION_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Worker threads; defaults to the number of CPUs.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Directory of renderer assets served at `/`, if any.
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Body of `POST /api/kinematics`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KinematicsRequest {
    pub radius: String,
    pub angle: String,
    pub t_start: f64,
    pub t_end: f64,
    pub samples: usize,
    pub velocity_scale: f64,
    pub acceleration_scale: f64,
    pub include_glyphs: bool,
    pub include_plot: bool,
}

impl Default for KinematicsRequest {
    fn default() -> Self {
        Self {
            radius: "2 + sin(12*t)".to_string(),
            angle: "t + 0.2*cos(12*t)".to_string(),
            t_start: 0.0,
            t_end: 10.0,
            samples: 1001,
            velocity_scale: VELOCITY_SCALE,
            acceleration_scale: ACCELERATION_SCALE,
            include_glyphs: false,
            include_plot: false,
        }
    }
}

impl KinematicsRequest {
    pub fn law(&self) -> MotionResult<MotionLaw> {
        MotionLaw::parse(&self.radius, &self.angle)
    }

    pub fn grid(&self) -> MotionResult<SampleGrid> {
        SampleGrid::linspace(self.t_start, self.t_end, self.samples)
    }
}

/// Body of `POST /api/dynamics`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DynamicsRequest {
    pub mass: f64,
    pub rod_length_1: f64,
    pub rod_length_2: f64,
    pub spring_stiffness: f64,
    pub gravity: f64,
    pub phi0: f64,
    pub psi0: f64,
    pub dphi0: f64,
    pub dpsi0: f64,
    pub t_end: f64,
    pub samples: usize,
    pub include_plot: bool,
}

impl Default for DynamicsRequest {
    fn default() -> Self {
        let p = SystemParameters::default();
        Self {
            mass: p.mass,
            rod_length_1: p.rod_length_1,
            rod_length_2: p.rod_length_2,
            spring_stiffness: p.spring_stiffness,
            gravity: p.gravity,
            phi0: FRAC_PI_6,
            psi0: FRAC_PI_3,
            dphi0: 0.0,
            dpsi0: 0.0,
            t_end: 20.0,
            samples: 500,
            include_plot: false,
        }
    }
}

impl DynamicsRequest {
    pub fn params(&self) -> MotionResult<SystemParameters> {
        SystemParameters::new(self.mass, self.rod_length_1, self.rod_length_2, self.spring_stiffness, self.gravity)
    }

    pub fn initial(&self) -> State {
        State::new(self.phi0, self.psi0, self.dphi0, self.dpsi0)
    }

    pub fn grid(&self) -> MotionResult<SampleGrid> {
        SampleGrid::linspace(0.0, self.t_end, self.samples)
    }
}
