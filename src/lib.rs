pub mod config;
pub mod energy;
pub mod engine;
pub mod error;
pub mod grid;
pub mod kinematics;
pub mod logic;
pub mod math;
pub mod reconstruct;
pub mod symbolic;
pub mod ui;
pub mod vector_field;

pub use energy::{energy, energy_series, EnergySample, EnergySummary};
pub use engine::{run_dynamics, run_kinematics, DynamicsRun, DynamicsSeries, KinematicsRun};
pub use error::{MotionError, MotionResult};
pub use grid::{SampleGrid, MAX_SAMPLES};
pub use kinematics::{DerivedLaw, KinematicsSeries, MotionLaw};
pub use logic::{IntegrationStats, Integrator, IntegratorSettings, OdeSystem, PendulumSolver};
pub use math::{derivative, SpringDoublePendulum, State, SystemParameters};
pub use reconstruct::{reconstruct, reconstruct_trajectory, CartesianPoint};
pub use symbolic::{CompiledExpr, Expr, Func};
pub use vector_field::{heading, magnitude, rotate, Glyph, PlacedGlyph, VectorField};
