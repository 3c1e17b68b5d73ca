//! Langevin thermostat on normal particles and Drude pair normal modes

use super::ForceModifier;
use crate::config::IntegratorConfig;
use crate::physics::context::ParticleState;
use crate::physics::extra_force::ExtraForceAccumulator;
use crate::physics::math::{BOLTZ, Scalar, reduced_mass};
use crate::physics::topology::{DrudePair, ThermostatPartition};
use crate::resources::SharedRng;

/// Friction plus Gaussian noise satisfying fluctuation-dissipation.
///
/// Free particles feel `−γ·m·v + sqrt(2·kB·T·γ·m/dt)·ξ`. A Drude pair is
/// thermostatted in its normal modes: the pair COM at the real temperature
/// with friction `γ`, the core/shell displacement at the Drude temperature
/// with friction `γ_d`.
#[derive(Debug, Clone)]
pub struct LangevinThermostat {
    normal_particles: Vec<usize>,
    pairs: Vec<DrudePair>,
    num_residues: usize,
    rng: SharedRng,
}

impl LangevinThermostat {
    pub fn new(partition: &ThermostatPartition, seed: u64) -> Self {
        Self {
            normal_particles: partition.normal_particles.clone(),
            pairs: partition.pairs.clone(),
            num_residues: partition.residues.len(),
            rng: SharedRng::from_seed(seed),
        }
    }

    pub fn num_normal_particles(&self) -> usize {
        self.normal_particles.len()
    }

    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }
}

/// Noise amplitude `sqrt(2·kB·T·γ·m/dt)`, zero for a degenerate step.
fn noise_scale(temperature: Scalar, friction: Scalar, mass: Scalar, step_size: Scalar) -> Scalar {
    if step_size <= 0.0 {
        return 0.0;
    }
    libm::sqrt(2.0 * BOLTZ * temperature * friction / step_size) * libm::sqrt(mass)
}

impl ForceModifier for LangevinThermostat {
    fn name(&self) -> &str {
        "langevin"
    }

    fn apply_force(&mut self, state: &ParticleState, config: &IntegratorConfig, forces: &mut ExtraForceAccumulator<'_>) {
        let dt = config.step_size;

        for &p in &self.normal_particles {
            let mass = state.masses[p];
            if mass == 0.0 {
                continue;
            }
            let scale = noise_scale(config.temperature, config.friction, mass, dt);
            let f = state.velocities[p] * (-config.friction * mass) + self.rng.gaussian_vector() * scale;
            forces.add(p, f);
        }

        for pair in &self.pairs {
            let (mc, ms) = (state.masses[pair.core], state.masses[pair.shell]);
            let total = mc + ms;
            if mc == 0.0 || ms == 0.0 {
                continue;
            }
            let mu = reduced_mass(mc, ms);
            let (vc, vs) = (state.velocities[pair.core], state.velocities[pair.shell]);
            let v_com = (vc * mc + vs * ms) / total;
            let v_rel = vs - vc;

            let com_scale = noise_scale(config.temperature, config.friction, total, dt);
            let rel_scale = noise_scale(config.drude_temperature, config.drude_friction, mu, dt);
            let f_com = v_com * (-config.friction * total) + self.rng.gaussian_vector() * com_scale;
            let f_rel = v_rel * (-config.drude_friction * mu) + self.rng.gaussian_vector() * rel_scale;

            forces.add(pair.core, f_com * (mc / total) - f_rel);
            forces.add(pair.shell, f_com * (ms / total) + f_rel);
        }
    }

    fn summary(&self, config: &IntegratorConfig) -> String {
        format!(
            "Langevin thermostat: {} molecules, {} normal particles, {} Drude pairs, T = {} K, friction = {} /ps, Drude T = {} K, Drude friction = {} /ps, seed = {}",
            self.num_residues,
            self.normal_particles.len(),
            self.pairs.len(),
            config.temperature,
            config.friction,
            config.drude_temperature,
            config.drude_friction,
            config.random_seed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::extra_force::ExtraForce;
    use crate::physics::math::Vector;

    fn partition() -> ThermostatPartition {
        ThermostatPartition {
            particles: vec![0, 1, 2],
            residues: vec![0, 1],
            normal_particles: vec![0],
            pairs: vec![DrudePair::new(1, 2)],
        }
    }

    fn state() -> ParticleState {
        ParticleState {
            positions: vec![Vector::ZERO; 3],
            velocities: vec![Vector::X, Vector::Y, Vector::Z],
            forces: vec![Vector::ZERO; 3],
            masses: vec![12.0, 15.6, 0.4],
            inverse_masses: vec![1.0 / 12.0, 1.0 / 15.6, 1.0 / 0.4],
            charges: vec![0.0; 3],
            periodic_box: Vector::splat(2.0),
            time: 0.0,
            step_count: 0,
        }
    }

    #[test]
    fn test_zero_temperature_is_pure_friction() {
        let config = IntegratorConfig {
            temperature: 0.0,
            drude_temperature: 0.0,
            ..Default::default()
        };
        let mut langevin = LangevinThermostat::new(&partition(), 3);
        let mut extra = ExtraForce::new(3);
        langevin.apply_force(&state(), &config, &mut extra.begin_accumulation());

        let f = extra.forces();
        assert!((f[0] - Vector::X * (-config.friction * 12.0)).length() < 1e-12);
        // Friction on the pair sums to the COM friction
        let v_com = (Vector::Y * 15.6 + Vector::Z * 0.4) / 16.0;
        assert!((f[1] + f[2] - v_com * (-config.friction * 16.0)).length() < 1e-12);
    }

    #[test]
    fn test_same_seed_same_noise() {
        let config = IntegratorConfig::default();
        let mut a = LangevinThermostat::new(&partition(), 11);
        let mut b = LangevinThermostat::new(&partition(), 11);
        let (mut fa, mut fb) = (ExtraForce::new(3), ExtraForce::new(3));

        a.apply_force(&state(), &config, &mut fa.begin_accumulation());
        b.apply_force(&state(), &config, &mut fb.begin_accumulation());
        assert_eq!(fa.forces(), fb.forces());
    }
}
