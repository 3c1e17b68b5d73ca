//! Simulation context: the integrator's view of the system being simulated
//!
//! [`SimulationContext`] is everything the integrator consumes from the
//! outside world. [`Context`] is the reference implementation the driver and
//! the tests run against: a [`System`] description plus the mutable
//! [`ParticleState`].

use crate::errors::{DrudeError, Result};
use crate::physics::forces::Force;
use crate::physics::math::{Scalar, Vector, inverse_mass};
use crate::resources::SharedRng;
use rayon::prelude::*;
use std::sync::Arc;

/// Identity of a context, used to enforce exclusive binding.
///
/// Each context owns a distinct allocation; a binding keeps a clone, so the
/// identity cannot be reused while the integrator still refers to it.
#[derive(Debug, Clone, Default)]
pub struct ContextId(Arc<()>);

impl PartialEq for ContextId {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ContextId {}

/// A holonomic distance constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    pub particle1: usize,
    pub particle2: usize,
    pub distance: Scalar,
}

/// Per-particle dynamical state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleState {
    pub positions: Vec<Vector>,
    pub velocities: Vec<Vector>,
    /// Conservative forces from the last evaluation
    pub forces: Vec<Vector>,
    pub masses: Vec<Scalar>,
    /// Zero for massless particles
    pub inverse_masses: Vec<Scalar>,
    pub charges: Vec<Scalar>,
    /// Edge lengths of the orthorhombic periodic box (nm)
    pub periodic_box: Vector,
    pub time: Scalar,
    pub step_count: u64,
}

impl ParticleState {
    pub fn num_particles(&self) -> usize {
        self.positions.len()
    }

    /// `½·Σ m·|v|²`
    pub fn kinetic_energy(&self) -> Scalar {
        0.5 * self
            .masses
            .par_iter()
            .zip(self.velocities.par_iter())
            .map(|(m, v)| m * v.length_squared())
            .sum::<Scalar>()
    }

    pub fn box_volume(&self) -> Scalar {
        self.periodic_box.x * self.periodic_box.y * self.periodic_box.z
    }

    pub fn total_mass(&self) -> Scalar {
        self.masses.iter().sum()
    }

    /// Mass-weighted mean velocity of the whole system.
    pub fn center_of_mass_velocity(&self) -> Vector {
        let total = self.total_mass();
        if total == 0.0 {
            return Vector::ZERO;
        }
        let momentum = self
            .masses
            .iter()
            .zip(&self.velocities)
            .fold(Vector::ZERO, |acc, (m, v)| acc + *v * *m);
        momentum / total
    }

    /// Subtracts the COM velocity from every massive particle.
    pub fn remove_center_of_mass_motion(&mut self) {
        let vcom = self.center_of_mass_velocity();
        self.velocities
            .par_iter_mut()
            .zip(self.masses.par_iter())
            .filter(|(_, m)| **m != 0.0)
            .for_each(|(v, _)| *v -= vcom);
    }
}

/// The operations the integrator needs from a simulation context.
pub trait SimulationContext {
    fn id(&self) -> ContextId;

    /// Connected molecules as ordered particle lists.
    fn molecules(&self) -> Vec<Vec<usize>>;

    fn num_particles(&self) -> usize;

    fn particle_mass(&self, index: usize) -> Scalar;

    fn num_constraints(&self) -> usize;

    fn constraint_parameters(&self, index: usize) -> Constraint;

    /// The system's force registry.
    fn forces(&self) -> &[Force];

    /// Recomputes conservative forces into `state().forces`, returning the
    /// potential energy when `include_energy` is set (zero otherwise).
    fn calc_forces_and_energy(&mut self, include_forces: bool, include_energy: bool) -> Scalar;

    /// True when external state changed since the last call, invalidating
    /// cached forces.
    fn update_context_state(&mut self) -> bool;

    fn state(&self) -> &ParticleState;

    fn state_mut(&mut self) -> &mut ParticleState;
}

/// Static description of a simulated system.
#[derive(Debug, Default)]
pub struct System {
    masses: Vec<Scalar>,
    charges: Vec<Scalar>,
    constraints: Vec<Constraint>,
    forces: Vec<Force>,
    periodic_box: Vector,
}

impl System {
    pub fn new() -> Self {
        Self {
            periodic_box: Vector::splat(2.0),
            ..Default::default()
        }
    }

    pub fn add_particle(&mut self, mass: Scalar, charge: Scalar) -> usize {
        self.masses.push(mass);
        self.charges.push(charge);
        self.masses.len() - 1
    }

    pub fn num_particles(&self) -> usize {
        self.masses.len()
    }

    pub fn particle_mass(&self, index: usize) -> Scalar {
        self.masses[index]
    }

    pub fn particle_charge(&self, index: usize) -> Scalar {
        self.charges[index]
    }

    pub fn add_constraint(&mut self, particle1: usize, particle2: usize, distance: Scalar) -> usize {
        self.constraints.push(Constraint {
            particle1,
            particle2,
            distance,
        });
        self.constraints.len() - 1
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn add_force(&mut self, force: Force) -> usize {
        self.forces.push(force);
        self.forces.len() - 1
    }

    pub fn forces(&self) -> &[Force] {
        &self.forces
    }

    pub fn set_periodic_box(&mut self, edges: Vector) {
        self.periodic_box = edges;
    }

    pub fn periodic_box(&self) -> Vector {
        self.periodic_box
    }

    /// Connected components of the bond, Drude-pair and constraint graph,
    /// ordered by their lowest particle index.
    pub fn molecules(&self) -> Vec<Vec<usize>> {
        let count = self.num_particles();
        let mut parent: Vec<usize> = (0..count).collect();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        let edges = self
            .constraints
            .iter()
            .map(|c| (c.particle1, c.particle2))
            .chain(self.forces.iter().flat_map(|f| f.bonded_pairs()));
        for (a, b) in edges {
            if a >= count || b >= count {
                continue;
            }
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra != rb {
                // Keep the lowest index as the root
                let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
                parent[hi] = lo;
            }
        }

        let mut molecules: Vec<Vec<usize>> = Vec::new();
        let mut slot = vec![usize::MAX; count];
        for i in 0..count {
            let root = find(&mut parent, i);
            if slot[root] == usize::MAX {
                slot[root] = molecules.len();
                molecules.push(Vec::new());
            }
            molecules[slot[root]].push(i);
        }
        molecules
    }
}

/// Reference context owning a [`System`] and its particle state.
#[derive(Debug)]
pub struct Context {
    id: ContextId,
    system: System,
    molecules: Vec<Vec<usize>>,
    state: ParticleState,
    state_changed: bool,
}

impl Context {
    pub fn new(system: System, positions: Vec<Vector>) -> Result<Self> {
        let count = system.num_particles();
        if positions.len() != count {
            return Err(DrudeError::conflict(format!(
                "{} positions given for a system of {count} particles",
                positions.len()
            )));
        }
        let constraint_pairs = system.constraints.iter().map(|c| (c.particle1, c.particle2));
        let force_pairs = system.forces.iter().flat_map(Force::bonded_pairs);
        for (a, b) in constraint_pairs.chain(force_pairs) {
            for index in [a, b] {
                if index >= count {
                    return Err(DrudeError::ParticleIndex { index, count });
                }
            }
        }
        let state = ParticleState {
            positions,
            velocities: vec![Vector::ZERO; count],
            forces: vec![Vector::ZERO; count],
            masses: system.masses.clone(),
            inverse_masses: system.masses.iter().map(|&m| inverse_mass(m)).collect(),
            charges: system.charges.clone(),
            periodic_box: system.periodic_box,
            time: 0.0,
            step_count: 0,
        };
        let molecules = system.molecules();
        Ok(Self {
            id: ContextId::default(),
            system,
            molecules,
            state,
            state_changed: false,
        })
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn set_positions(&mut self, positions: Vec<Vector>) -> Result<()> {
        if positions.len() != self.state.num_particles() {
            return Err(DrudeError::conflict("position count does not match the system"));
        }
        self.state.positions = positions;
        self.state_changed = true;
        Ok(())
    }

    pub fn set_velocities(&mut self, velocities: Vec<Vector>) -> Result<()> {
        if velocities.len() != self.state.num_particles() {
            return Err(DrudeError::conflict("velocity count does not match the system"));
        }
        self.state.velocities = velocities;
        Ok(())
    }

    pub fn set_periodic_box(&mut self, edges: Vector) {
        self.state.periodic_box = edges;
        self.state_changed = true;
    }

    /// Draws Maxwell-Boltzmann velocities at `temperature` and removes the
    /// net momentum. Massless particles stay at rest.
    pub fn set_velocities_to_temperature(&mut self, temperature: Scalar, rng: &mut SharedRng) {
        let kbt = crate::physics::math::BOLTZ * temperature;
        for (v, &inv_m) in self.state.velocities.iter_mut().zip(&self.state.inverse_masses) {
            *v = if inv_m == 0.0 {
                Vector::ZERO
            } else {
                rng.gaussian_vector() * libm::sqrt(kbt * inv_m)
            };
        }
        self.state.remove_center_of_mass_motion();
    }

    /// Potential energy at the current positions.
    pub fn potential_energy(&mut self) -> Scalar {
        self.calc_forces_and_energy(true, true)
    }

    fn motion_remover_frequency(&self) -> Option<u64> {
        self.system.forces.iter().find_map(|force| match force {
            Force::CenterOfMassMotionRemover { frequency } => Some(*frequency),
            _ => None,
        })
    }
}

impl SimulationContext for Context {
    fn id(&self) -> ContextId {
        self.id.clone()
    }

    fn molecules(&self) -> Vec<Vec<usize>> {
        self.molecules.clone()
    }

    fn num_particles(&self) -> usize {
        self.system.num_particles()
    }

    fn particle_mass(&self, index: usize) -> Scalar {
        self.system.particle_mass(index)
    }

    fn num_constraints(&self) -> usize {
        self.system.constraints.len()
    }

    fn constraint_parameters(&self, index: usize) -> Constraint {
        self.system.constraints[index]
    }

    fn forces(&self) -> &[Force] {
        &self.system.forces
    }

    fn calc_forces_and_energy(&mut self, include_forces: bool, include_energy: bool) -> Scalar {
        if include_forces {
            if let Some(frequency) = self.motion_remover_frequency() {
                if frequency > 0 && self.state.step_count % frequency == 0 {
                    self.state.remove_center_of_mass_motion();
                }
            }
        }

        // The buffer is rewritten even for energy-only queries
        let mut forces = vec![Vector::ZERO; self.state.num_particles()];
        let mut energy = 0.0;
        for force in &self.system.forces {
            energy += force.evaluate(&self.state.positions, &mut forces);
        }
        self.state.forces = forces;

        if include_energy { energy } else { 0.0 }
    }

    fn update_context_state(&mut self) -> bool {
        std::mem::take(&mut self.state_changed)
    }

    fn state(&self) -> &ParticleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ParticleState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::forces::{DrudeForce, HarmonicBondForce};

    fn diatomic_with_shell() -> System {
        let mut system = System::new();
        system.add_particle(12.0, 0.0);
        system.add_particle(16.0, 1.0);
        system.add_particle(0.4, -1.0);
        system.add_particle(1.0, 0.0);

        let mut bonds = HarmonicBondForce::new();
        bonds.add_bond(0, 1, 0.12, 1000.0);
        system.add_force(Force::HarmonicBond(bonds));

        let mut drude = DrudeForce::new();
        drude.add_particle(1, 2, -1.0, 0.001);
        system.add_force(Force::Drude(drude));
        system
    }

    #[test]
    fn test_molecules_follow_bonds_and_drude_pairs() {
        let system = diatomic_with_shell();
        assert_eq!(system.molecules(), vec![vec![0, 1, 2], vec![3]]);
    }

    #[test]
    fn test_constraints_join_molecules() {
        let mut system = diatomic_with_shell();
        system.add_constraint(3, 0, 0.1);
        assert_eq!(system.molecules(), vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn test_context_ids_are_unique() {
        let a = Context::new(System::new(), vec![]).unwrap();
        let b = Context::new(System::new(), vec![]).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.id());
    }

    #[test]
    fn test_position_update_is_reported_once() {
        let mut context = Context::new(diatomic_with_shell(), vec![Vector::ZERO; 4]).unwrap();
        assert!(!context.update_context_state());

        context.set_positions(vec![Vector::X; 4]).unwrap();
        assert!(context.update_context_state());
        assert!(!context.update_context_state());
    }

    #[test]
    fn test_out_of_range_bond_is_rejected() {
        let mut system = diatomic_with_shell();
        let mut bonds = HarmonicBondForce::new();
        bonds.add_bond(3, 9, 0.1, 500.0);
        system.add_force(Force::HarmonicBond(bonds));

        let result = Context::new(system, vec![Vector::ZERO; 4]);
        assert!(matches!(result, Err(DrudeError::ParticleIndex { index: 9, count: 4 })));
    }

    #[test]
    fn test_out_of_range_constraint_is_rejected() {
        let mut system = diatomic_with_shell();
        system.add_constraint(0, 4, 0.1);
        assert!(matches!(
            Context::new(system, vec![Vector::ZERO; 4]),
            Err(DrudeError::ParticleIndex { index: 4, count: 4 })
        ));
    }

    #[test]
    fn test_mismatched_positions_are_rejected() {
        assert!(Context::new(diatomic_with_shell(), vec![Vector::ZERO; 3]).is_err());
    }

    #[test]
    fn test_maxwell_boltzmann_velocities_have_no_net_momentum() {
        let mut system = System::new();
        for _ in 0..200 {
            system.add_particle(10.0, 0.0);
        }
        system.add_particle(0.0, 0.0);
        let mut context = Context::new(system, vec![Vector::ZERO; 201]).unwrap();
        let mut rng = SharedRng::from_seed(7);
        context.set_velocities_to_temperature(300.0, &mut rng);

        assert!(context.state().center_of_mass_velocity().length() < 1e-10);
        assert_eq!(context.state().velocities[200], Vector::ZERO);

        // 2·KE / (3N·kB) should land near the requested temperature
        let ke = context.state().kinetic_energy();
        let temperature = 2.0 * ke / (3.0 * 200.0 * crate::physics::math::BOLTZ);
        assert!((temperature - 300.0).abs() < 60.0);
    }

    #[test]
    fn test_motion_remover_acts_during_force_evaluation() {
        let mut system = System::new();
        system.add_particle(1.0, 0.0);
        system.add_particle(1.0, 0.0);
        system.add_force(Force::CenterOfMassMotionRemover { frequency: 1 });
        let mut context = Context::new(system, vec![Vector::ZERO, Vector::X]).unwrap();
        context
            .set_velocities(vec![Vector::new(1.0, 0.0, 0.0), Vector::new(3.0, 0.0, 0.0)])
            .unwrap();

        context.calc_forces_and_energy(true, false);
        let v = &context.state().velocities;
        assert!((v[0].x + 1.0).abs() < 1e-12);
        assert!((v[1].x - 1.0).abs() < 1e-12);
    }
}
