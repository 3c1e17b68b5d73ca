//! Velocity Verlet integration method

use super::{ConstraintSolver, Integrator, StepParameters};
use crate::physics::context::ParticleState;
use crate::physics::math::{Scalar, Vector};
use crate::physics::topology::DrudePair;
use rayon::prelude::*;

/// Velocity Verlet with holonomic constraints and a Drude hard wall
///
/// A second-order symplectic and time-reversible integrator:
/// 1. v(t+dt/2) = v(t) + dt/2 · f(t)/m
/// 2. Δx = dt · v(t+dt/2), projected onto the constraints (SHAKE)
/// 3. x(t+dt) = x(t) + Δx, v(t+dt/2) = Δx/dt
/// 4. v(t+dt) = v(t+dt/2) + dt/2 · f(t+dt)/m, projected (RATTLE)
///
/// Massless particles never move.
#[derive(Debug, Clone, Default)]
pub struct VelocityVerlet {
    constraints: ConstraintSolver,
    drude_pairs: Vec<DrudePair>,
    position_deltas: Vec<Vector>,
}

impl VelocityVerlet {
    pub fn new(constraints: ConstraintSolver, drude_pairs: Vec<DrudePair>, num_particles: usize) -> Self {
        Self {
            constraints,
            drude_pairs,
            position_deltas: vec![Vector::ZERO; num_particles],
        }
    }

    pub fn constraints(&self) -> &ConstraintSolver {
        &self.constraints
    }

    fn kick(state: &mut ParticleState, extra_force: &[Vector], half_dt: Scalar) {
        state
            .velocities
            .par_iter_mut()
            .zip(state.forces.par_iter())
            .zip(extra_force.par_iter())
            .zip(state.inverse_masses.par_iter())
            .filter(|(_, inv_m)| **inv_m != 0.0)
            .for_each(|(((v, f), fx), inv_m)| {
                *v += (*f + *fx) * (half_dt * inv_m);
            });
    }
}

impl Integrator for VelocityVerlet {
    fn first_half(&mut self, state: &mut ParticleState, extra_force: &[Vector], params: &StepParameters) {
        let dt = params.step_size;
        Self::kick(state, extra_force, 0.5 * dt);

        self.position_deltas.resize(state.num_particles(), Vector::ZERO);
        self.position_deltas
            .par_iter_mut()
            .zip(state.velocities.par_iter())
            .zip(state.inverse_masses.par_iter())
            .for_each(|((delta, v), inv_m)| {
                *delta = if *inv_m == 0.0 { Vector::ZERO } else { *v * dt };
            });

        self.constraints.constrain_positions(
            &state.positions,
            &mut self.position_deltas,
            &state.inverse_masses,
            params.constraint_tolerance,
        );

        let inv_dt = if dt == 0.0 { 0.0 } else { 1.0 / dt };
        state
            .positions
            .par_iter_mut()
            .zip(state.velocities.par_iter_mut())
            .zip(self.position_deltas.par_iter())
            .zip(state.inverse_masses.par_iter())
            .filter(|(_, inv_m)| **inv_m != 0.0)
            .for_each(|(((x, v), delta), _)| {
                *x += *delta;
                *v = *delta * inv_dt;
            });

        params.hard_wall.apply(
            &self.drude_pairs,
            &mut state.positions,
            &mut state.velocities,
            &state.inverse_masses,
            dt,
        );
    }

    fn second_half(&mut self, state: &mut ParticleState, extra_force: &[Vector], params: &StepParameters) {
        Self::kick(state, extra_force, 0.5 * params.step_size);

        self.constraints.constrain_velocities(
            &state.positions,
            &mut state.velocities,
            &state.inverse_masses,
            params.constraint_tolerance,
        );

        state.time += params.step_size;
        state.step_count += 1;
    }

    fn name(&self) -> &str {
        "Velocity Verlet"
    }

    fn order(&self) -> usize {
        2
    }
}
