//! Pluggable per-step modifiers of the Drude integrator
//!
//! Each modifier is selected at bind time when the particle set it acts on
//! is non-empty. The periodic perturbation follows `cos_acceleration` and is
//! re-synced before every batch of steps. The extra-force modifiers run in a fixed order
//! (Langevin, electric field, periodic perturbation) through
//! [`ForceModifier`].

use crate::config::IntegratorConfig;
use crate::errors::{DrudeError, Result};
use crate::physics::context::ParticleState;
use crate::physics::extra_force::ExtraForceAccumulator;
use crate::physics::topology::Topology;

pub mod electric_field;
pub mod image_charge;
pub mod langevin;
pub mod periodic;

pub use electric_field::ElectricField;
pub use image_charge::ImageCharge;
pub use langevin::LangevinThermostat;
pub use periodic::PeriodicPerturbation;

/// A modifier contributing to the auxiliary force buffer.
pub trait ForceModifier: Send + Sync {
    fn name(&self) -> &str;

    /// Adds this modifier's forces for the current (half-step) state.
    fn apply_force(&mut self, state: &ParticleState, config: &IntegratorConfig, forces: &mut ExtraForceAccumulator<'_>);

    /// One-line description logged at bind time.
    fn summary(&self, config: &IntegratorConfig) -> String;
}

/// Langevin dynamics and the periodic perturbation are mutually exclusive.
pub fn check_periodic_conflict(topology: &Topology, config: &IntegratorConfig) -> Result<()> {
    if config.cos_acceleration != 0.0 && !topology.langevin().is_empty() {
        return Err(DrudeError::conflict(
            "the Langevin thermostat cannot be combined with the periodic perturbation",
        ));
    }
    Ok(())
}

/// The modifiers active for one binding.
#[derive(Debug, Clone, Default)]
pub struct ModifierSet {
    pub langevin: Option<LangevinThermostat>,
    pub electric_field: Option<ElectricField>,
    pub periodic: Option<PeriodicPerturbation>,
    pub image_charge: Option<ImageCharge>,
}

impl ModifierSet {
    pub fn select(topology: &Topology, config: &IntegratorConfig) -> Self {
        let langevin = topology.langevin();
        Self {
            langevin: (!langevin.is_empty()).then(|| LangevinThermostat::new(langevin, config.random_seed)),
            electric_field: (!topology.electrolyte().is_empty()).then(|| ElectricField::new(topology.electrolyte())),
            periodic: (config.cos_acceleration != 0.0).then(PeriodicPerturbation::new),
            image_charge: (!topology.image_pairs().is_empty()).then(|| ImageCharge::new(topology.image_pairs())),
        }
    }

    /// Adds or drops the periodic perturbation to match `cos_acceleration`.
    /// Returns true when the set changed.
    pub fn sync_periodic(&mut self, topology: &Topology, config: &IntegratorConfig) -> Result<bool> {
        check_periodic_conflict(topology, config)?;
        match (config.cos_acceleration != 0.0, self.periodic.is_some()) {
            (true, false) => {
                self.periodic = Some(PeriodicPerturbation::new());
                Ok(true)
            }
            (false, true) => {
                self.periodic = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Extra-force modifiers in application order.
    pub fn force_modifiers_mut(&mut self) -> impl Iterator<Item = &mut dyn ForceModifier> {
        let langevin: Option<&mut dyn ForceModifier> = self.langevin.as_mut().map(|m| m as &mut dyn ForceModifier);
        let electric: Option<&mut dyn ForceModifier> = self.electric_field.as_mut().map(|m| m as &mut dyn ForceModifier);
        let periodic: Option<&mut dyn ForceModifier> = self.periodic.as_mut().map(|m| m as &mut dyn ForceModifier);
        langevin.into_iter().chain(electric).chain(periodic)
    }

    pub fn force_modifiers(&self) -> impl Iterator<Item = &dyn ForceModifier> {
        let langevin: Option<&dyn ForceModifier> = self.langevin.as_ref().map(|m| m as &dyn ForceModifier);
        let electric: Option<&dyn ForceModifier> = self.electric_field.as_ref().map(|m| m as &dyn ForceModifier);
        let periodic: Option<&dyn ForceModifier> = self.periodic.as_ref().map(|m| m as &dyn ForceModifier);
        langevin.into_iter().chain(electric).chain(periodic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::topology::{ImagePair, RoleAssignments};

    #[test]
    fn test_modifiers_follow_particle_sets() {
        let masses = vec![1.0, 1.0, 0.0];
        let molecules = vec![vec![0], vec![1], vec![2]];
        let assignments = RoleAssignments {
            langevin: vec![1],
            electrolyte: vec![0],
            image_pairs: vec![ImagePair { image: 2, parent: 0 }],
        };
        let topology = Topology::classify(&masses, &molecules, &[], &assignments).unwrap();
        let mut set = ModifierSet::select(&topology, &IntegratorConfig::default());

        assert!(set.langevin.is_some());
        assert!(set.electric_field.is_some());
        assert!(set.periodic.is_none());
        assert!(set.image_charge.is_some());

        let names: Vec<String> = set.force_modifiers_mut().map(|m| m.name().to_string()).collect();
        assert_eq!(names, vec!["langevin", "electric_field"]);
    }

    #[test]
    fn test_periodic_follows_acceleration() {
        let topology = Topology::classify(&[1.0], &[vec![0]], &[], &RoleAssignments::default()).unwrap();
        let mut config = IntegratorConfig::default();
        let mut set = ModifierSet::select(&topology, &config);

        assert!(!set.sync_periodic(&topology, &config).unwrap());
        config.cos_acceleration = 0.5;
        assert!(set.sync_periodic(&topology, &config).unwrap());
        assert!(set.periodic.is_some());
        assert!(!set.sync_periodic(&topology, &config).unwrap());

        config.cos_acceleration = 0.0;
        assert!(set.sync_periodic(&topology, &config).unwrap());
        assert!(set.periodic.is_none());
    }

    #[test]
    fn test_periodic_rejected_with_langevin() {
        let assignments = RoleAssignments {
            langevin: vec![0],
            ..Default::default()
        };
        let topology = Topology::classify(&[1.0], &[vec![0]], &[], &assignments).unwrap();
        let mut set = ModifierSet::select(&topology, &IntegratorConfig::default());
        let config = IntegratorConfig {
            cos_acceleration: 0.5,
            ..Default::default()
        };

        assert!(matches!(
            set.sync_periodic(&topology, &config),
            Err(DrudeError::ConfigurationConflict(_))
        ));
        assert!(set.periodic.is_none());
    }

    #[test]
    fn test_nothing_selected_for_plain_system() {
        let topology = Topology::classify(&[1.0], &[vec![0]], &[], &RoleAssignments::default()).unwrap();
        let set = ModifierSet::select(&topology, &IntegratorConfig::default());
        assert!(set.force_modifiers().next().is_none());
        assert!(set.image_charge.is_none());
    }
}
