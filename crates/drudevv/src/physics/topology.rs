//! Particle and residue classification
//!
//! Built once at bind time from the context's molecules, the Drude pairs of
//! the polarization force and the roles registered on the integrator. The
//! result is immutable until the integrator is rebound.

use crate::errors::{DrudeError, Result};
use crate::physics::math::{Scalar, inverse_mass};
use std::collections::BTreeSet;

/// A Drude oscillator: a light shell harmonically bound to its core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrudePair {
    pub core: usize,
    pub shell: usize,
}

impl DrudePair {
    pub fn new(core: usize, shell: usize) -> Self {
        Self { core, shell }
    }
}

/// An image particle mirrored from its parent across the conducting plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImagePair {
    pub image: usize,
    pub parent: usize,
}

/// Role flags of a single particle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticleRoles {
    pub nose_hoover: bool,
    pub langevin: bool,
    pub drude_core: bool,
    pub drude_shell: bool,
    pub image: bool,
    pub image_parent: bool,
    pub electrolyte: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    pub particles: Vec<usize>,
    pub mass: Scalar,
    /// Zero for a massless residue
    pub inverse_mass: Scalar,
}

/// Role memberships registered on the integrator before binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleAssignments {
    pub langevin: Vec<usize>,
    pub electrolyte: Vec<usize>,
    pub image_pairs: Vec<ImagePair>,
}

/// A thermostatted subset split into free particles and Drude pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThermostatPartition {
    pub particles: Vec<usize>,
    pub residues: Vec<usize>,
    /// Members not belonging to any of `pairs`, ascending
    pub normal_particles: Vec<usize>,
    pub pairs: Vec<DrudePair>,
}

impl ThermostatPartition {
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    masses: Vec<Scalar>,
    particle_residue: Vec<usize>,
    residues: Vec<Residue>,
    roles: Vec<ParticleRoles>,
    drude_pairs: Vec<DrudePair>,
    nose_hoover: ThermostatPartition,
    langevin: ThermostatPartition,
    image_pairs: Vec<ImagePair>,
    electrolyte: Vec<usize>,
}

fn check_index(index: usize, count: usize) -> Result<usize> {
    if index < count {
        Ok(index)
    } else {
        Err(DrudeError::ParticleIndex { index, count })
    }
}

impl Topology {
    /// Classifies every particle of the system.
    ///
    /// A particle is Nose-Hoover thermostatted iff it is neither a Langevin
    /// nor an image particle. Fails when a residue would be driven by both
    /// thermostats, or when the molecules do not cover every particle
    /// exactly once.
    pub fn classify(
        masses: &[Scalar],
        molecules: &[Vec<usize>],
        drude_pairs: &[DrudePair],
        assignments: &RoleAssignments,
    ) -> Result<Self> {
        let count = masses.len();

        let mut membership: Vec<Option<usize>> = vec![None; count];
        for (resid, molecule) in molecules.iter().enumerate() {
            for &particle in molecule {
                let slot = &mut membership[check_index(particle, count)?];
                if let Some(previous) = slot {
                    return Err(DrudeError::conflict(format!(
                        "particle {particle} belongs to molecules {previous} and {resid}"
                    )));
                }
                *slot = Some(resid);
            }
        }
        let particle_residue = membership
            .iter()
            .enumerate()
            .map(|(particle, resid)| {
                resid.ok_or_else(|| {
                    DrudeError::conflict(format!("particle {particle} is not part of any molecule"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let residues = molecules
            .iter()
            .map(|molecule| {
                let mass: Scalar = molecule.iter().map(|&p| masses[p]).sum();
                Residue {
                    particles: molecule.clone(),
                    mass,
                    inverse_mass: inverse_mass(mass),
                }
            })
            .collect();

        let mut roles = vec![ParticleRoles::default(); count];
        for &particle in &assignments.langevin {
            roles[check_index(particle, count)?].langevin = true;
        }
        for &particle in &assignments.electrolyte {
            roles[check_index(particle, count)?].electrolyte = true;
        }
        for pair in &assignments.image_pairs {
            roles[check_index(pair.image, count)?].image = true;
            roles[check_index(pair.parent, count)?].image_parent = true;
        }
        for pair in drude_pairs {
            roles[check_index(pair.core, count)?].drude_core = true;
            roles[check_index(pair.shell, count)?].drude_shell = true;
        }
        for role in &mut roles {
            role.nose_hoover = !role.langevin && !role.image;
        }

        let nose_hoover = partition(&roles, &particle_residue, drude_pairs, |r| r.nose_hoover);
        let langevin = partition(&roles, &particle_residue, drude_pairs, |r| r.langevin);

        let nh_residues: BTreeSet<usize> = nose_hoover.residues.iter().copied().collect();
        if let Some(&resid) = langevin.residues.iter().find(|r| nh_residues.contains(r)) {
            return Err(DrudeError::conflict(format!(
                "molecule {resid} is coupled to both the Nose-Hoover and the Langevin thermostat"
            )));
        }

        let electrolyte = (0..count).filter(|&i| roles[i].electrolyte).collect();

        Ok(Self {
            masses: masses.to_vec(),
            particle_residue,
            residues,
            roles,
            drude_pairs: drude_pairs.to_vec(),
            nose_hoover,
            langevin,
            image_pairs: assignments.image_pairs.clone(),
            electrolyte,
        })
    }

    pub fn num_particles(&self) -> usize {
        self.masses.len()
    }

    pub fn num_residues(&self) -> usize {
        self.residues.len()
    }

    pub fn mass(&self, particle: usize) -> Scalar {
        self.masses[particle]
    }

    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    pub fn particle_residue(&self, particle: usize) -> Option<usize> {
        self.particle_residue.get(particle).copied()
    }

    pub fn residue_inverse_mass(&self, resid: usize) -> Option<Scalar> {
        self.residues.get(resid).map(|r| r.inverse_mass)
    }

    pub fn roles(&self, particle: usize) -> ParticleRoles {
        self.roles.get(particle).copied().unwrap_or_default()
    }

    pub fn is_nose_hoover(&self, particle: usize) -> bool {
        self.roles(particle).nose_hoover
    }

    pub fn drude_pairs(&self) -> &[DrudePair] {
        &self.drude_pairs
    }

    pub fn nose_hoover(&self) -> &ThermostatPartition {
        &self.nose_hoover
    }

    pub fn langevin(&self) -> &ThermostatPartition {
        &self.langevin
    }

    pub fn image_pairs(&self) -> &[ImagePair] {
        &self.image_pairs
    }

    pub fn electrolyte(&self) -> &[usize] {
        &self.electrolyte
    }
}

/// Collects the particles selected by `member`, the residues they live in
/// (first-appearance order) and the normal/pair split. A pair joins the
/// partition when its core does.
fn partition(
    roles: &[ParticleRoles],
    particle_residue: &[usize],
    drude_pairs: &[DrudePair],
    member: impl Fn(&ParticleRoles) -> bool,
) -> ThermostatPartition {
    let particles: Vec<usize> = (0..roles.len()).filter(|&i| member(&roles[i])).collect();

    let mut residues = Vec::new();
    let mut seen = BTreeSet::new();
    for &particle in &particles {
        let resid = particle_residue[particle];
        if seen.insert(resid) {
            residues.push(resid);
        }
    }

    let mut normal: BTreeSet<usize> = particles.iter().copied().collect();
    let mut pairs = Vec::new();
    for pair in drude_pairs {
        if member(&roles[pair.core]) {
            normal.remove(&pair.core);
            normal.remove(&pair.shell);
            pairs.push(*pair);
        }
    }

    ThermostatPartition {
        particles,
        residues,
        normal_particles: normal.into_iter().collect(),
        pairs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_polarizable_atoms() -> (Vec<Scalar>, Vec<Vec<usize>>, Vec<DrudePair>) {
        // Molecule 0: core 0 + shell 1 + plain atom 2; molecule 1: core 3 + shell 4
        let masses = vec![15.6, 0.4, 1.0, 15.6, 0.4];
        let molecules = vec![vec![0, 1, 2], vec![3, 4]];
        let pairs = vec![DrudePair::new(0, 1), DrudePair::new(3, 4)];
        (masses, molecules, pairs)
    }

    #[test]
    fn test_residue_masses_sum_members() {
        let (masses, molecules, pairs) = two_polarizable_atoms();
        let topology = Topology::classify(&masses, &molecules, &pairs, &RoleAssignments::default()).unwrap();

        assert_eq!(topology.num_residues(), 2);
        assert!((topology.residues()[0].mass - 17.0).abs() < 1e-12);
        assert!((topology.residue_inverse_mass(1).unwrap() - 1.0 / 16.0).abs() < 1e-12);
        assert_eq!(topology.particle_residue(2), Some(0));
        assert_eq!(topology.particle_residue(9), None);
    }

    #[test]
    fn test_everything_is_nose_hoover_by_default() {
        let (masses, molecules, pairs) = two_polarizable_atoms();
        let topology = Topology::classify(&masses, &molecules, &pairs, &RoleAssignments::default()).unwrap();

        let nh = topology.nose_hoover();
        assert_eq!(nh.particles, vec![0, 1, 2, 3, 4]);
        assert_eq!(nh.residues, vec![0, 1]);
        assert_eq!(nh.normal_particles, vec![2]);
        assert_eq!(nh.pairs, pairs);
        assert!(topology.langevin().is_empty());
        assert!(topology.roles(1).drude_shell);
    }

    #[test]
    fn test_langevin_molecule_is_split_out() {
        let (masses, molecules, pairs) = two_polarizable_atoms();
        let assignments = RoleAssignments {
            langevin: vec![3, 4],
            ..Default::default()
        };
        let topology = Topology::classify(&masses, &molecules, &pairs, &assignments).unwrap();

        assert_eq!(topology.nose_hoover().residues, vec![0]);
        assert_eq!(topology.langevin().residues, vec![1]);
        assert_eq!(topology.langevin().pairs, vec![DrudePair::new(3, 4)]);
        assert!(topology.langevin().normal_particles.is_empty());
    }

    #[test]
    fn test_mixed_thermostats_on_one_molecule_conflict() {
        let (masses, molecules, pairs) = two_polarizable_atoms();
        let assignments = RoleAssignments {
            langevin: vec![2],
            ..Default::default()
        };
        let result = Topology::classify(&masses, &molecules, &pairs, &assignments);
        assert!(matches!(result, Err(DrudeError::ConfigurationConflict(_))));
    }

    #[test]
    fn test_image_particles_are_not_thermostatted() {
        let masses = vec![1.0, 0.0];
        let molecules = vec![vec![0], vec![1]];
        let assignments = RoleAssignments {
            image_pairs: vec![ImagePair { image: 1, parent: 0 }],
            ..Default::default()
        };
        let topology = Topology::classify(&masses, &molecules, &[], &assignments).unwrap();

        assert!(topology.is_nose_hoover(0));
        assert!(topology.roles(0).image_parent);
        assert!(!topology.is_nose_hoover(1));
        assert_eq!(topology.residue_inverse_mass(1), Some(0.0));
    }

    #[test]
    fn test_uncovered_particle_is_rejected() {
        let masses = vec![1.0, 1.0];
        let molecules = vec![vec![0]];
        let result = Topology::classify(&masses, &molecules, &[], &RoleAssignments::default());
        assert!(matches!(result, Err(DrudeError::ConfigurationConflict(_))));
    }

    #[test]
    fn test_out_of_range_role_is_rejected() {
        let masses = vec![1.0];
        let molecules = vec![vec![0]];
        let assignments = RoleAssignments {
            electrolyte: vec![5],
            ..Default::default()
        };
        let result = Topology::classify(&masses, &molecules, &[], &assignments);
        assert!(matches!(result, Err(DrudeError::ParticleIndex { index: 5, count: 1 })));
    }
}
