//! Periodic cosine acceleration for viscosity measurements
//!
//! Every particle is driven along x by `a(z) = A·cos(k·z)` with
//! `k = 2π/Lz`. The resulting streaming profile `vMax·cos(k·z)` is removed
//! around thermostat evaluations so the thermostat never damps the shear.
//! The inverse viscosity follows from linear response:
//! `1/η = vMax·V/(M·A) · k²`.

use super::ForceModifier;
use crate::config::IntegratorConfig;
use crate::physics::context::ParticleState;
use crate::physics::extra_force::ExtraForceAccumulator;
use crate::physics::math::{Scalar, TWO_PI};
use rayon::prelude::*;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodicPerturbation {
    v_max: Scalar,
    bias_removed: bool,
}

fn wave_number(state: &ParticleState) -> Scalar {
    if state.periodic_box.z == 0.0 {
        0.0
    } else {
        TWO_PI / state.periodic_box.z
    }
}

impl PeriodicPerturbation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Amplitude of the streaming profile as of the last bias calculation.
    pub fn v_max(&self) -> Scalar {
        self.v_max
    }

    /// `2·Σ m·vₓ·cos(k·z) / Σ m`
    pub fn compute_velocity_bias(&mut self, state: &ParticleState) -> Scalar {
        let total_mass = state.total_mass();
        if total_mass == 0.0 {
            self.v_max = 0.0;
            return 0.0;
        }
        let k = wave_number(state);
        let weighted: Scalar = state
            .masses
            .par_iter()
            .zip(state.velocities.par_iter())
            .zip(state.positions.par_iter())
            .map(|((m, v), x)| m * v.x * libm::cos(k * x.z))
            .sum();
        self.v_max = 2.0 * weighted / total_mass;
        self.v_max
    }

    fn shift_profile(&self, state: &mut ParticleState, sign: Scalar) {
        let k = wave_number(state);
        let amplitude = sign * self.v_max;
        state
            .velocities
            .par_iter_mut()
            .zip(state.positions.par_iter())
            .zip(state.inverse_masses.par_iter())
            .filter(|(_, inv_m)| **inv_m != 0.0)
            .for_each(|((v, x), _)| v.x += amplitude * libm::cos(k * x.z));
    }

    /// Subtracts `vMax·cos(k·z)` from every vₓ.
    pub fn remove_velocity_bias(&mut self, state: &mut ParticleState) {
        self.shift_profile(state, -1.0);
        self.bias_removed = true;
    }

    /// Adds back the profile removed by [`Self::remove_velocity_bias`].
    pub fn restore_velocity_bias(&mut self, state: &mut ParticleState) {
        if self.bias_removed {
            self.shift_profile(state, 1.0);
            self.bias_removed = false;
        }
    }

    /// `[vMax, 1/η]` from the current velocities.
    pub fn viscosity(&mut self, state: &ParticleState, acceleration: Scalar) -> [Scalar; 2] {
        let v_max = self.compute_velocity_bias(state);
        let total_mass = state.total_mass();
        if acceleration == 0.0 || total_mass == 0.0 {
            return [v_max, 0.0];
        }
        let k = wave_number(state);
        let inverse_viscosity = v_max * state.box_volume() / total_mass / acceleration * k * k;
        [v_max, inverse_viscosity]
    }
}

impl ForceModifier for PeriodicPerturbation {
    fn name(&self) -> &str {
        "periodic_perturbation"
    }

    fn apply_force(&mut self, state: &ParticleState, config: &IntegratorConfig, forces: &mut ExtraForceAccumulator<'_>) {
        let acceleration = config.cos_acceleration;
        if acceleration == 0.0 {
            return;
        }
        let k = wave_number(state);
        forces
            .forces_mut()
            .par_iter_mut()
            .zip(state.masses.par_iter())
            .zip(state.positions.par_iter())
            .for_each(|((f, m), x)| f.x += m * acceleration * libm::cos(k * x.z));
    }

    fn summary(&self, config: &IntegratorConfig) -> String {
        format!("Periodic perturbation: cosine acceleration = {} nm/ps²", config.cos_acceleration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::extra_force::ExtraForce;
    use crate::physics::math::Vector;

    /// Particles spread along z carrying exactly the cosine profile.
    fn streaming_state(v_max: Scalar) -> ParticleState {
        let n = 40;
        let lz = 4.0;
        let positions: Vec<Vector> = (0..n)
            .map(|i| Vector::new(0.0, 0.0, lz * i as Scalar / n as Scalar))
            .collect();
        let velocities = positions
            .iter()
            .map(|x| Vector::new(v_max * libm::cos(TWO_PI * x.z / lz), 0.3, 0.0))
            .collect();
        ParticleState {
            positions,
            velocities,
            forces: vec![Vector::ZERO; n],
            masses: vec![2.0; n],
            inverse_masses: vec![0.5; n],
            charges: vec![0.0; n],
            periodic_box: Vector::new(2.0, 2.0, lz),
            time: 0.0,
            step_count: 0,
        }
    }

    #[test]
    fn test_bias_recovers_profile_amplitude() {
        let state = streaming_state(0.7);
        let mut perturbation = PeriodicPerturbation::new();
        assert!((perturbation.compute_velocity_bias(&state) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_remove_then_restore_is_identity() {
        let mut state = streaming_state(0.7);
        let original = state.velocities.clone();
        let mut perturbation = PeriodicPerturbation::new();

        perturbation.compute_velocity_bias(&state);
        perturbation.remove_velocity_bias(&mut state);
        assert!(state.velocities.iter().all(|v| v.x.abs() < 1e-12));

        perturbation.restore_velocity_bias(&mut state);
        for (a, b) in state.velocities.iter().zip(&original) {
            assert!((*a - *b).length() < 1e-12);
        }
    }

    #[test]
    fn test_cosine_force_profile() {
        let state = streaming_state(0.0);
        let config = IntegratorConfig {
            cos_acceleration: 0.5,
            ..Default::default()
        };
        let mut perturbation = PeriodicPerturbation::new();
        let mut extra = ExtraForce::new(state.num_particles());
        perturbation.apply_force(&state, &config, &mut extra.begin_accumulation());

        // z = 0 gets the full push, z = Lz/2 the full pull
        assert!((extra.forces()[0].x - 1.0).abs() < 1e-12);
        assert!((extra.forces()[20].x + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_viscosity_formula() {
        let state = streaming_state(0.7);
        let mut perturbation = PeriodicPerturbation::new();
        let [v_max, inv_vis] = perturbation.viscosity(&state, 0.05);

        let k = TWO_PI / 4.0;
        let expected = 0.7 * 16.0 / 80.0 / 0.05 * k * k;
        assert!((v_max - 0.7).abs() < 1e-12);
        assert!((inv_vis - expected).abs() < 1e-9);
    }
}
