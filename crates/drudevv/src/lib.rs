//! drudevv library
//!
//! Velocity-Verlet integration of polarizable (Drude oscillator) systems
//! with Nose-Hoover chain and Langevin thermostats, image charges, an
//! external electric field and cosine-acceleration shear.

pub mod config;
pub mod demo;
pub mod errors;
pub mod integrator;
pub mod physics;
pub mod prelude;
pub mod resources;

// Re-export commonly used items
pub use config::{IntegratorConfig, SimulationConfig};
pub use errors::{DrudeError, Result};
pub use integrator::{DrudeVerletIntegrator, IntegratorPhase};
pub use physics::math::{Scalar, Vector};
