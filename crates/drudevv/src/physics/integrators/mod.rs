//! Base time stepping for the Drude integrator

use crate::physics::context::ParticleState;
use crate::physics::math::{Scalar, Vector};

pub mod constraints;
pub mod hard_wall;
pub mod velocity_verlet;

pub use constraints::ConstraintSolver;
pub use hard_wall::DrudeHardWall;
pub use velocity_verlet::VelocityVerlet;

/// Per-step settings, read from the integrator configuration every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParameters {
    pub step_size: Scalar,
    pub constraint_tolerance: Scalar,
    pub hard_wall: DrudeHardWall,
}

/// A split-step integrator driven by the controller.
///
/// The first half advances positions by a full step and velocities by half
/// a step; forces are then re-evaluated by the caller and the second half
/// completes the velocity update.
pub trait Integrator: Send + Sync {
    /// # Arguments
    /// * `state` - Particle state, updated in place
    /// * `extra_force` - Auxiliary forces added to the conservative ones
    /// * `params` - Step size, constraint tolerance and Drude hard wall
    fn first_half(&mut self, state: &mut ParticleState, extra_force: &[Vector], params: &StepParameters);

    fn second_half(&mut self, state: &mut ParticleState, extra_force: &[Vector], params: &StepParameters);

    /// Get the name of this integrator
    fn name(&self) -> &str;

    /// Get the order of this integrator
    fn order(&self) -> usize;
}
