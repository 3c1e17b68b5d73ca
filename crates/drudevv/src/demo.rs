//! Demo system for the driver binary: a box of polarizable diatomics
//!
//! Each molecule is two cores joined by a harmonic bond (or a constraint),
//! and every core carries a Drude shell. There are no intermolecular forces,
//! so the box is an ideal gas of polarizable rotors; it exercises every
//! code path of the integrator without a full force field.

use crate::config::{SimulationConfig, SystemConfig};
use crate::errors::Result;
use crate::integrator::DrudeVerletIntegrator;
use crate::physics::context::{Context, SimulationContext, System};
use crate::physics::dof::TemperatureGroup;
use crate::physics::forces::{DrudeForce, Force, HarmonicBondForce};
use crate::physics::math::{Scalar, Vector};
use crate::resources::SharedRng;
use bevy::log::info;

/// Particle layout of one molecule: `[core, shell, core, shell]`.
pub const PARTICLES_PER_MOLECULE: usize = 4;

/// Builds the system and lattice positions described by `config`.
pub fn build_system(config: &SystemConfig) -> (System, Vec<Vector>) {
    let mut system = System::new();
    system.set_periodic_box(Vector::splat(config.box_size));

    let mut bonds = HarmonicBondForce::new();
    let mut drude = DrudeForce::new();
    let mut positions = Vec::new();

    let n = config.molecules_per_edge;
    let spacing = config.box_size / n.max(1) as Scalar;
    let half_bond = Vector::new(0.5 * config.bond_length, 0.0, 0.0);

    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                let center = Vector::new(i as Scalar + 0.5, j as Scalar + 0.5, k as Scalar + 0.5) * spacing;
                let mut cores = [0; 2];
                for (slot, offset) in [-half_bond, half_bond].into_iter().enumerate() {
                    let core = system.add_particle(config.core_mass, -config.shell_charge);
                    let shell = system.add_particle(config.shell_mass, config.shell_charge);
                    drude.add_particle(core, shell, config.shell_charge, config.polarizability);
                    positions.push(center + offset);
                    positions.push(center + offset);
                    cores[slot] = core;
                }
                if config.constrain_bonds {
                    system.add_constraint(cores[0], cores[1], config.bond_length);
                } else {
                    bonds.add_bond(cores[0], cores[1], config.bond_length, config.bond_force_constant);
                }
            }
        }
    }

    system.add_force(Force::HarmonicBond(bonds));
    system.add_force(Force::Drude(drude));
    if config.remove_com_motion_every > 0 {
        system.add_force(Force::CenterOfMassMotionRemover {
            frequency: config.remove_com_motion_every,
        });
    }
    (system, positions)
}

/// A bound context/integrator pair ready to run.
#[derive(Debug)]
pub struct Simulation {
    pub context: Context,
    pub integrator: DrudeVerletIntegrator,
}

/// Snapshot logged at every report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub step: u64,
    pub time: Scalar,
    pub kinetic_energy: Scalar,
    pub potential_energy: Scalar,
    pub group_temperatures: [Scalar; 3],
    pub viscosity: [Scalar; 2],
}

impl Simulation {
    /// Builds the demo system, draws initial velocities and binds.
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        let (system, positions) = build_system(&config.system);
        let mut context = Context::new(system, positions)?;
        let mut integrator = DrudeVerletIntegrator::from_config(config.integrator.clone());

        for i in 0..context.num_particles() {
            if config.system.langevin {
                integrator.add_langevin_particle(i);
            }
            if config.system.electrolyte {
                integrator.add_electrolyte_particle(i);
            }
        }

        let mut rng = SharedRng::from_seed(config.integrator.random_seed);
        context.set_velocities_to_temperature(config.integrator.temperature, &mut rng);
        // Shells start riding on their cores
        let mut velocities = context.state().velocities.clone();
        for molecule in velocities.chunks_mut(2) {
            if let [core, shell] = molecule {
                *shell = *core;
            }
        }
        context.set_velocities(velocities)?;
        context.state_mut().remove_center_of_mass_motion();

        integrator.bind(&context)?;
        Ok(Self { context, integrator })
    }

    pub fn report(&mut self) -> Result<Report> {
        let kinetic_energy = self.integrator.compute_kinetic_energy(&self.context)?;
        let potential_energy = self.integrator.compute_potential_energy(&mut self.context)?;
        let state = self.context.state();
        Ok(Report {
            step: state.step_count,
            time: state.time,
            kinetic_energy,
            potential_energy,
            group_temperatures: self.integrator.group_temperatures(),
            viscosity: self.integrator.viscosity(&self.context),
        })
    }

    /// Runs `steps` steps, logging a report every `report_interval` steps.
    pub fn run(&mut self, steps: usize, report_interval: usize) -> Result<Report> {
        let interval = report_interval.clamp(1, steps.max(1));
        let mut remaining = steps;
        while remaining > 0 {
            let chunk = interval.min(remaining);
            self.integrator.step(&mut self.context, chunk)?;
            remaining -= chunk;
            log_report(&self.report()?, self.integrator.cos_acceleration() != 0.0);
        }
        self.report()
    }
}

fn log_report(report: &Report, show_viscosity: bool) {
    let [atom, com, drude] = [
        TemperatureGroup::Atom,
        TemperatureGroup::CenterOfMass,
        TemperatureGroup::Drude,
    ]
    .map(|group| report.group_temperatures[group.index()]);
    info!(
        "step {:>8}  t = {:.3} ps  KE = {:.3}  PE = {:.3} kJ/mol  T(atom) = {:.2} K  T(com) = {:.2} K  T(drude) = {:.2} K",
        report.step, report.time, report.kinetic_energy, report.potential_energy, atom, com, drude
    );
    if show_viscosity {
        let [v_max, inverse_viscosity] = report.viscosity;
        let viscosity = if inverse_viscosity != 0.0 { 1.0 / inverse_viscosity } else { 0.0 };
        info!(
            "         vMax = {:.5} nm/ps  1/η = {:.5}  η = {:.5} cP",
            v_max, inverse_viscosity, viscosity
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_layout() {
        let config = SystemConfig {
            molecules_per_edge: 2,
            ..Default::default()
        };
        let (system, positions) = build_system(&config);

        assert_eq!(system.num_particles(), 8 * PARTICLES_PER_MOLECULE);
        assert_eq!(positions.len(), system.num_particles());
        assert_eq!(system.molecules().len(), 8);
        // Neutral molecules
        let charge: Scalar = (0..4).map(|i| system.particle_charge(i)).sum();
        assert!(charge.abs() < 1e-12);
    }

    #[test]
    fn test_constrained_demo_has_constraints() {
        let config = SystemConfig {
            molecules_per_edge: 1,
            constrain_bonds: true,
            ..Default::default()
        };
        let (system, _) = build_system(&config);
        assert_eq!(system.constraints().len(), 1);
    }

    #[test]
    fn test_short_run_stays_finite() {
        let mut config = SimulationConfig::default();
        config.system.molecules_per_edge = 2;
        config.integrator.random_seed = 5;
        let mut simulation = Simulation::new(&config).unwrap();

        let report = simulation.run(50, 25).unwrap();
        assert_eq!(report.step, 50);
        assert!(report.kinetic_energy.is_finite());
        assert!(report.group_temperatures.iter().all(|t| t.is_finite() && *t >= 0.0));
    }
}
