//! Uniform external electric field on electrolyte particles

use super::ForceModifier;
use crate::config::IntegratorConfig;
use crate::physics::context::ParticleState;
use crate::physics::extra_force::ExtraForceAccumulator;
use crate::physics::math::{AVOGADRO, FIELD_TO_VOLTS_PER_NM};

#[derive(Debug, Clone, PartialEq)]
pub struct ElectricField {
    particles: Vec<usize>,
}

impl ElectricField {
    pub fn new(particles: &[usize]) -> Self {
        Self {
            particles: particles.to_vec(),
        }
    }

    pub fn particles(&self) -> &[usize] {
        &self.particles
    }
}

impl ForceModifier for ElectricField {
    fn name(&self) -> &str {
        "electric_field"
    }

    fn apply_force(&mut self, state: &ParticleState, config: &IntegratorConfig, forces: &mut ExtraForceAccumulator<'_>) {
        let strength = config.electric_field * AVOGADRO;
        if strength == 0.0 {
            return;
        }
        let axis = config.electric_field_axis.unit();
        for &p in &self.particles {
            forces.add(p, axis * (state.charges[p] * strength));
        }
    }

    fn summary(&self, config: &IntegratorConfig) -> String {
        format!(
            "Electric field: {} particles, {:?} axis, {} V/nm",
            self.particles.len(),
            config.electric_field_axis,
            config.electric_field * FIELD_TO_VOLTS_PER_NM,
        )
    }
}
