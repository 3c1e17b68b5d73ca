//! Velocity-Verlet integrator for polarizable systems
//!
//! [`DrudeVerletIntegrator`] is bound to one [`SimulationContext`]. Binding
//! classifies particles, counts degrees of freedom, initialises the
//! Nose-Hoover chains and selects the active modifiers; every step then runs
//! the same fixed sequence:
//!
//! 1. refresh conservative forces if the context reports a state change
//! 2. Nose-Hoover half step (periodic bias removed around it)
//! 3. first half of velocity Verlet, image positions
//! 4. conservative forces at the new positions, then Langevin, electric
//!    field and periodic forces into the auxiliary buffer
//! 5. second half of velocity Verlet
//! 6. Nose-Hoover half step

use crate::config::{Axis, IntegratorConfig};
use crate::errors::{DrudeError, Result};
use crate::physics::context::{ContextId, ParticleState, SimulationContext};
use crate::physics::dof::{DegreesOfFreedom, DofInputs, TemperatureGroup, count_degrees_of_freedom};
use crate::physics::extra_force::ExtraForce;
use crate::physics::forces::{DrudeForce, Force};
use crate::physics::integrators::{ConstraintSolver, DrudeHardWall, Integrator, StepParameters, VelocityVerlet};
use crate::physics::math::Scalar;
use crate::physics::modifiers::{ForceModifier, ModifierSet, check_periodic_conflict};
use crate::physics::nose_hoover::{GroupValues, NoseHooverThermostat};
use crate::physics::topology::{ImagePair, RoleAssignments, Topology};
use bevy::log::{debug, info};

/// Lifecycle of an integrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegratorPhase {
    Unbound,
    /// Bound, no step taken since binding
    Bound,
    Stepping,
}

/// Everything computed at bind time plus the per-step scratch state.
#[derive(Debug)]
struct Binding {
    context_id: ContextId,
    topology: Topology,
    dof: DegreesOfFreedom,
    thermostat: Option<NoseHooverThermostat>,
    stepper: VelocityVerlet,
    modifiers: ModifierSet,
    extra_force: ExtraForce,
    has_stepped: bool,
}

impl Binding {
    /// Nose-Hoover half step with the periodic streaming profile removed.
    fn apply_thermostat(&mut self, state: &mut ParticleState, config: &IntegratorConfig) {
        let Some(thermostat) = self.thermostat.as_mut() else {
            return;
        };
        if let Some(periodic) = self.modifiers.periodic.as_mut() {
            periodic.compute_velocity_bias(state);
            periodic.remove_velocity_bias(state);
        }
        if config.debug_enabled {
            debug!("Nose-Hoover: group kinetic energies and velocity scaling");
        }
        let scales = thermostat.apply(state, config.step_size, config.loops_per_step);
        if config.debug_enabled {
            debug!("Nose-Hoover scale factors: {:?}", scales);
        }
        if let Some(periodic) = self.modifiers.periodic.as_mut() {
            periodic.restore_velocity_bias(state);
        }
    }
}

/// Velocity-Verlet integrator with Nose-Hoover chains, Langevin dynamics,
/// image charges, an external field and cosine-acceleration shear.
#[derive(Debug)]
pub struct DrudeVerletIntegrator {
    config: IntegratorConfig,
    langevin_particles: Vec<usize>,
    electrolyte_particles: Vec<usize>,
    image_pairs: Vec<ImagePair>,
    binding: Option<Binding>,
    forces_valid: bool,
}

impl DrudeVerletIntegrator {
    /// Creates an integrator; every other setting starts at its default.
    ///
    /// # Arguments
    /// * `temperature` - Target temperature of atoms and molecular COM motion (K)
    /// * `frequency` - Coupling frequency of the atom thermostat (1/ps)
    /// * `drude_temperature` - Target temperature of core/shell relative motion (K)
    /// * `drude_frequency` - Coupling frequency of the Drude thermostat (1/ps)
    /// * `step_size` - Integration step (ps)
    /// * `num_nh_chains` - Length of every Nose-Hoover chain
    /// * `loops_per_step` - Chain sub-steps per half step
    /// * `use_com_temp_group` - Thermostat molecular COM motion separately
    pub fn new(
        temperature: Scalar,
        frequency: Scalar,
        drude_temperature: Scalar,
        drude_frequency: Scalar,
        step_size: Scalar,
        num_nh_chains: usize,
        loops_per_step: usize,
        use_com_temp_group: bool,
    ) -> Self {
        Self::from_config(IntegratorConfig {
            temperature,
            frequency,
            drude_temperature,
            drude_frequency,
            step_size,
            num_nh_chains,
            loops_per_step,
            use_com_temp_group,
            ..Default::default()
        })
    }

    pub fn from_config(config: IntegratorConfig) -> Self {
        Self {
            config,
            langevin_particles: Vec::new(),
            electrolyte_particles: Vec::new(),
            image_pairs: Vec::new(),
            binding: None,
            forces_valid: false,
        }
    }

    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    pub fn phase(&self) -> IntegratorPhase {
        match &self.binding {
            None => IntegratorPhase::Unbound,
            Some(binding) if binding.has_stepped => IntegratorPhase::Stepping,
            Some(_) => IntegratorPhase::Bound,
        }
    }

    /// Whether the cached conservative forces can be reused by the next step.
    pub fn forces_valid(&self) -> bool {
        self.forces_valid
    }

    /// Registers an image particle; returns the number of registered pairs.
    pub fn add_image_pair(&mut self, image: usize, parent: usize) -> usize {
        self.image_pairs.push(ImagePair { image, parent });
        self.image_pairs.len()
    }

    /// Moves a particle from the Nose-Hoover to the Langevin thermostat.
    /// Returns the number of Langevin particles.
    pub fn add_langevin_particle(&mut self, particle: usize) -> usize {
        self.langevin_particles.push(particle);
        self.langevin_particles.len()
    }

    /// Exposes a particle to the external electric field.
    /// Returns the number of electrolyte particles.
    pub fn add_electrolyte_particle(&mut self, particle: usize) -> usize {
        self.electrolyte_particles.push(particle);
        self.electrolyte_particles.len()
    }

    pub fn image_pairs(&self) -> &[ImagePair] {
        &self.image_pairs
    }

    pub fn langevin_particles(&self) -> &[usize] {
        &self.langevin_particles
    }

    pub fn electrolyte_particles(&self) -> &[usize] {
        &self.electrolyte_particles
    }

    /// Attaches the integrator to `context`.
    ///
    /// Binding again to the same context redoes the classification and
    /// resets the thermostat chains; binding to another context while bound
    /// is a [`DrudeError::BindingConflict`].
    pub fn bind<C: SimulationContext + ?Sized>(&mut self, context: &C) -> Result<()> {
        if let Some(binding) = &self.binding {
            if binding.context_id != context.id() {
                return Err(DrudeError::BindingConflict);
            }
        }

        let drude_force = find_drude_force(context.forces())?;
        if drude_force.is_none() && self.config.use_com_temp_group {
            return Err(DrudeError::conflict(
                "the center-of-mass temperature group requires a Drude force",
            ));
        }

        let num_particles = context.num_particles();
        let masses: Vec<Scalar> = (0..num_particles).map(|i| context.particle_mass(i)).collect();
        let drude_pairs = drude_force.map(DrudeForce::pairs).unwrap_or_default();
        let assignments = RoleAssignments {
            langevin: self.langevin_particles.clone(),
            electrolyte: self.electrolyte_particles.clone(),
            image_pairs: self.image_pairs.clone(),
        };
        let topology = Topology::classify(&masses, &context.molecules(), &drude_pairs, &assignments)?;

        check_periodic_conflict(&topology, &self.config)?;

        let constraints: Vec<_> = (0..context.num_constraints())
            .map(|i| context.constraint_parameters(i))
            .collect();
        for c in &constraints {
            for index in [c.particle1, c.particle2] {
                if index >= num_particles {
                    return Err(DrudeError::ParticleIndex {
                        index,
                        count: num_particles,
                    });
                }
            }
        }
        let has_motion_remover = context
            .forces()
            .iter()
            .any(|f| matches!(f, Force::CenterOfMassMotionRemover { .. }));

        let dof = count_degrees_of_freedom(
            &topology,
            DofInputs {
                constraints: &constraints,
                has_drude_force: drude_force.is_some(),
                has_motion_remover,
                use_com_temp_group: self.config.use_com_temp_group,
            },
        )?;

        let thermostat =
            (!topology.nose_hoover().is_empty()).then(|| NoseHooverThermostat::new(&topology, dof, &self.config));
        let modifiers = ModifierSet::select(&topology, &self.config);
        let stepper = VelocityVerlet::new(
            ConstraintSolver::new(constraints),
            topology.drude_pairs().to_vec(),
            num_particles,
        );

        let binding = Binding {
            context_id: context.id(),
            topology,
            dof,
            thermostat,
            stepper,
            modifiers,
            extra_force: ExtraForce::new(num_particles),
            has_stepped: false,
        };
        log_binding(&binding, &self.config);

        self.binding = Some(binding);
        self.forces_valid = false;
        Ok(())
    }

    /// Detaches from the bound context, if any.
    pub fn unbind(&mut self) {
        self.binding = None;
        self.forces_valid = false;
    }

    fn bound_to<C: SimulationContext + ?Sized>(&self, context: &C) -> Result<()> {
        match &self.binding {
            None => Err(DrudeError::UnboundUsage),
            Some(binding) if binding.context_id != context.id() => Err(DrudeError::BindingConflict),
            Some(_) => Ok(()),
        }
    }

    /// Advances the bound context by `steps` full steps.
    pub fn step<C: SimulationContext + ?Sized>(&mut self, context: &mut C, steps: usize) -> Result<()> {
        self.bound_to(context)?;
        let config = &self.config;
        let Some(binding) = self.binding.as_mut() else {
            return Err(DrudeError::UnboundUsage);
        };

        if binding.modifiers.sync_periodic(&binding.topology, config)? {
            match &binding.modifiers.periodic {
                Some(periodic) => info!("{}", periodic.summary(config)),
                None => info!("Periodic perturbation disabled"),
            }
        }

        for _ in 0..steps {
            if context.update_context_state() {
                self.forces_valid = false;
            }
            if !self.forces_valid {
                if config.debug_enabled {
                    debug!("Recomputing invalidated forces");
                }
                context.calc_forces_and_energy(true, false);
                self.forces_valid = true;
            }

            binding.apply_thermostat(context.state_mut(), config);

            let params = StepParameters {
                step_size: config.step_size,
                constraint_tolerance: config.constraint_tolerance,
                hard_wall: DrudeHardWall::new(config.max_drude_distance, config.drude_temperature),
            };
            if config.debug_enabled {
                debug!("First-half velocity Verlet integration");
            }
            binding
                .stepper
                .first_half(context.state_mut(), binding.extra_force.forces(), &params);

            if let Some(images) = &binding.modifiers.image_charge {
                if config.debug_enabled {
                    debug!("Updating image positions");
                }
                images.update_positions(context.state_mut(), config.mirror_location);
            }

            context.calc_forces_and_energy(true, false);
            self.forces_valid = true;

            {
                // Zeroed every step, so a dropped modifier leaves no stale force
                let mut forces = binding.extra_force.begin_accumulation();
                let state = context.state();
                for modifier in binding.modifiers.force_modifiers_mut() {
                    if config.debug_enabled {
                        debug!("Applying {} force", modifier.name());
                    }
                    modifier.apply_force(state, config, &mut forces);
                }
            }

            if config.debug_enabled {
                debug!("Second-half velocity Verlet integration");
            }
            binding
                .stepper
                .second_half(context.state_mut(), binding.extra_force.forces(), &params);

            binding.apply_thermostat(context.state_mut(), config);
            binding.has_stepped = true;
        }
        Ok(())
    }

    /// Total kinetic energy `½·Σ m·v²`. Invalidates cached forces.
    pub fn compute_kinetic_energy<C: SimulationContext + ?Sized>(&mut self, context: &C) -> Result<Scalar> {
        self.bound_to(context)?;
        self.forces_valid = false;
        Ok(context.state().kinetic_energy())
    }

    /// Potential energy of the context. Invalidates cached forces.
    pub fn compute_potential_energy<C: SimulationContext + ?Sized>(&mut self, context: &mut C) -> Result<Scalar> {
        self.bound_to(context)?;
        self.forces_valid = false;
        Ok(context.calc_forces_and_energy(true, true))
    }

    /// `[vMax, 1/η]` of the periodic perturbation; zeros when it is inactive.
    /// An acceleration set after binding activates on the next [`Self::step`].
    pub fn viscosity<C: SimulationContext + ?Sized>(&mut self, context: &C) -> [Scalar; 2] {
        if self.config.cos_acceleration == 0.0 || self.bound_to(context).is_err() {
            return [0.0, 0.0];
        }
        let acceleration = self.config.cos_acceleration;
        match self.binding.as_mut().and_then(|b| b.modifiers.periodic.as_mut()) {
            Some(periodic) => periodic.viscosity(context.state(), acceleration),
            None => [0.0, 0.0],
        }
    }

    pub fn topology(&self) -> Option<&Topology> {
        self.binding.as_ref().map(|b| &b.topology)
    }

    pub fn degrees_of_freedom(&self) -> Option<DegreesOfFreedom> {
        self.binding.as_ref().map(|b| b.dof)
    }

    pub fn thermostat(&self) -> Option<&NoseHooverThermostat> {
        self.binding.as_ref().and_then(|b| b.thermostat.as_ref())
    }

    pub fn modifiers(&self) -> Option<&ModifierSet> {
        self.binding.as_ref().map(|b| &b.modifiers)
    }

    pub fn num_residues(&self) -> usize {
        self.topology().map_or(0, Topology::num_residues)
    }

    pub fn residue_inverse_mass(&self, resid: usize) -> Option<Scalar> {
        self.topology().and_then(|t| t.residue_inverse_mass(resid))
    }

    pub fn particle_residue(&self, particle: usize) -> Option<usize> {
        self.topology().and_then(|t| t.particle_residue(particle))
    }

    /// Instantaneous temperature of each group after the last thermostat
    /// application; zeros without Nose-Hoover particles.
    pub fn group_temperatures(&self) -> GroupValues {
        self.thermostat()
            .map_or([0.0; 3], NoseHooverThermostat::group_temperatures)
    }
}

/// Single-pass lookup of the polarization force.
fn find_drude_force(forces: &[Force]) -> Result<Option<&DrudeForce>> {
    let mut found = None;
    for force in forces {
        if let Force::Drude(drude) = force {
            if found.is_some() {
                return Err(DrudeError::MultipleForceDefinition);
            }
            found = Some(drude);
        }
    }
    Ok(found)
}

fn log_binding(binding: &Binding, config: &IntegratorConfig) {
    let topology = &binding.topology;
    info!(
        "Drude {} integrator (order {}): {} particles in {} molecules, {} Drude pairs, {} constraints, step size {} ps",
        binding.stepper.name(),
        binding.stepper.order(),
        topology.num_particles(),
        topology.num_residues(),
        topology.drude_pairs().len(),
        binding.stepper.constraints().len(),
        config.step_size,
    );
    if config.max_drude_distance > 0.0 {
        info!("Drude hard wall at {} nm", config.max_drude_distance);
    }

    if let Some(thermostat) = &binding.thermostat {
        info!(
            "Nose-Hoover thermostat: {} / {} molecules, {} normal particles, {} Drude pairs, T = {} K, Drude T = {} K, {} chains, {} loops per step",
            thermostat.num_residues(),
            topology.num_residues(),
            thermostat.num_normal_particles(),
            thermostat.num_pairs(),
            config.temperature,
            config.drude_temperature,
            config.num_nh_chains,
            config.loops_per_step,
        );
        for group in TemperatureGroup::ALL {
            let chain = thermostat.chain(group);
            info!(
                "  {} group: DOF = {}, NkbT = {}, etaMass[0] = {}",
                group,
                binding.dof.get(group),
                chain.ke2_target(),
                chain.eta_mass().first().copied().unwrap_or_default(),
            );
        }
    }

    for modifier in binding.modifiers.force_modifiers() {
        info!("{}", modifier.summary(config));
    }
    if let Some(images) = &binding.modifiers.image_charge {
        info!("{}", images.summary(config.mirror_location));
    }
}

macro_rules! config_accessors {
    ($($field:ident, $setter:ident: $ty:ty;)*) => {
        impl DrudeVerletIntegrator {
            $(
                pub fn $field(&self) -> $ty {
                    self.config.$field
                }

                pub fn $setter(&mut self, value: $ty) {
                    self.config.$field = value;
                }
            )*
        }
    };
}

config_accessors! {
    temperature, set_temperature: Scalar;
    frequency, set_frequency: Scalar;
    drude_temperature, set_drude_temperature: Scalar;
    drude_frequency, set_drude_frequency: Scalar;
    step_size, set_step_size: Scalar;
    num_nh_chains, set_num_nh_chains: usize;
    loops_per_step, set_loops_per_step: usize;
    use_com_temp_group, set_use_com_temp_group: bool;
    friction, set_friction: Scalar;
    drude_friction, set_drude_friction: Scalar;
    constraint_tolerance, set_constraint_tolerance: Scalar;
    max_drude_distance, set_max_drude_distance: Scalar;
    random_seed, set_random_seed: u64;
    mirror_location, set_mirror_location: Scalar;
    electric_field, set_electric_field: Scalar;
    electric_field_axis, set_electric_field_axis: Axis;
    cos_acceleration, set_cos_acceleration: Scalar;
    debug_enabled, set_debug_enabled: bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::context::{Context, System};
    use crate::physics::math::Vector;

    fn free_atoms(n: usize) -> Context {
        let mut system = System::new();
        for _ in 0..n {
            system.add_particle(10.0, 0.0);
        }
        Context::new(system, vec![Vector::ZERO; n]).unwrap()
    }

    #[test]
    fn test_defaults() {
        let integrator = DrudeVerletIntegrator::new(300.0, 10.0, 1.0, 200.0, 0.001, 3, 1, false);
        assert_eq!(integrator.friction(), 5.0);
        assert_eq!(integrator.drude_friction(), 20.0);
        assert_eq!(integrator.constraint_tolerance(), 1e-5);
        assert_eq!(integrator.max_drude_distance(), 0.0);
        assert_eq!(integrator.random_seed(), 0);
        assert_eq!(integrator.cos_acceleration(), 0.0);
        assert!(!integrator.debug_enabled());
        assert_eq!(integrator.phase(), IntegratorPhase::Unbound);
    }

    #[test]
    fn test_setters_round_trip() {
        let mut integrator = DrudeVerletIntegrator::from_config(IntegratorConfig::default());
        integrator.set_mirror_location(1.5);
        integrator.set_electric_field_axis(Axis::X);
        integrator.set_loops_per_step(4);
        assert_eq!(integrator.mirror_location(), 1.5);
        assert_eq!(integrator.electric_field_axis(), Axis::X);
        assert_eq!(integrator.config().loops_per_step, 4);
    }

    #[test]
    fn test_step_before_bind_fails() {
        let mut integrator = DrudeVerletIntegrator::from_config(IntegratorConfig::default());
        let mut context = free_atoms(2);
        assert!(matches!(integrator.step(&mut context, 1), Err(DrudeError::UnboundUsage)));
    }

    #[test]
    fn test_phase_progression() {
        let mut integrator = DrudeVerletIntegrator::from_config(IntegratorConfig::default());
        let mut context = free_atoms(2);
        integrator.bind(&context).unwrap();
        assert_eq!(integrator.phase(), IntegratorPhase::Bound);

        integrator.step(&mut context, 1).unwrap();
        assert_eq!(integrator.phase(), IntegratorPhase::Stepping);
        assert_eq!(context.state().step_count, 1);
    }

    #[test]
    fn test_energy_queries_invalidate_forces() {
        let mut integrator = DrudeVerletIntegrator::from_config(IntegratorConfig::default());
        let mut context = free_atoms(2);
        integrator.bind(&context).unwrap();
        integrator.step(&mut context, 1).unwrap();
        assert!(integrator.forces_valid());

        integrator.compute_kinetic_energy(&context).unwrap();
        assert!(!integrator.forces_valid());

        integrator.step(&mut context, 1).unwrap();
        integrator.compute_potential_energy(&mut context).unwrap();
        assert!(!integrator.forces_valid());
    }

    #[test]
    fn test_viscosity_is_zero_without_perturbation() {
        let mut integrator = DrudeVerletIntegrator::from_config(IntegratorConfig::default());
        let context = free_atoms(2);
        integrator.bind(&context).unwrap();
        assert_eq!(integrator.viscosity(&context), [0.0, 0.0]);
    }
}
