//! Typed force registry of a [`System`](super::context::System)
//!
//! The integrator discovers the polarization model and the COM-motion
//! remover by matching on [`Force`] variants once, at bind time. Conservative
//! force evaluation itself belongs to the context; the evaluators here exist
//! so the reference context can drive complete simulations.

use crate::physics::math::{ONE_4PI_EPS0, Scalar, Vector};
use crate::physics::topology::DrudePair;

/// An external conservative force evaluator.
pub trait ForceTerm: Send + Sync {
    fn name(&self) -> &str;

    /// Adds this term's forces into `forces` and returns its potential energy.
    fn evaluate(&self, positions: &[Vector], forces: &mut [Vector]) -> Scalar;

    /// Particle pairs this term binds into one molecule.
    fn bonded_pairs(&self) -> Vec<(usize, usize)> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicBond {
    pub particle1: usize,
    pub particle2: usize,
    /// Equilibrium length (nm)
    pub length: Scalar,
    /// kJ/(mol·nm²)
    pub k: Scalar,
}

/// `E = ½·k·(r − r₀)²` per bond.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarmonicBondForce {
    bonds: Vec<HarmonicBond>,
}

impl HarmonicBondForce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bond(&mut self, particle1: usize, particle2: usize, length: Scalar, k: Scalar) -> usize {
        self.bonds.push(HarmonicBond {
            particle1,
            particle2,
            length,
            k,
        });
        self.bonds.len() - 1
    }

    pub fn bonds(&self) -> &[HarmonicBond] {
        &self.bonds
    }
}

impl ForceTerm for HarmonicBondForce {
    fn name(&self) -> &str {
        "harmonic_bond"
    }

    fn evaluate(&self, positions: &[Vector], forces: &mut [Vector]) -> Scalar {
        let mut energy = 0.0;
        for bond in &self.bonds {
            let delta = positions[bond.particle2] - positions[bond.particle1];
            let r = delta.length();
            let dr = r - bond.length;
            energy += 0.5 * bond.k * dr * dr;
            if r > 0.0 {
                let f = delta * (bond.k * dr / r);
                forces[bond.particle1] += f;
                forces[bond.particle2] -= f;
            }
        }
        energy
    }

    fn bonded_pairs(&self) -> Vec<(usize, usize)> {
        self.bonds.iter().map(|b| (b.particle1, b.particle2)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrudeParticle {
    pub core: usize,
    pub shell: usize,
    /// Shell charge (e)
    pub charge: Scalar,
    /// Isotropic polarizability (nm³)
    pub polarizability: Scalar,
}

impl DrudeParticle {
    /// Harmonic spring binding the shell to its core, `k = q²/(4πε₀·α)`.
    pub fn spring_constant(&self) -> Scalar {
        if self.polarizability == 0.0 {
            0.0
        } else {
            ONE_4PI_EPS0 * self.charge * self.charge / self.polarizability
        }
    }
}

/// Isotropic Drude polarization: every shell is tied to its core by a spring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrudeForce {
    particles: Vec<DrudeParticle>,
}

impl DrudeForce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_particle(&mut self, core: usize, shell: usize, charge: Scalar, polarizability: Scalar) -> usize {
        self.particles.push(DrudeParticle {
            core,
            shell,
            charge,
            polarizability,
        });
        self.particles.len() - 1
    }

    pub fn particles(&self) -> &[DrudeParticle] {
        &self.particles
    }

    pub fn pairs(&self) -> Vec<DrudePair> {
        self.particles
            .iter()
            .map(|p| DrudePair::new(p.core, p.shell))
            .collect()
    }
}

impl ForceTerm for DrudeForce {
    fn name(&self) -> &str {
        "drude"
    }

    fn evaluate(&self, positions: &[Vector], forces: &mut [Vector]) -> Scalar {
        let mut energy = 0.0;
        for particle in &self.particles {
            let k = particle.spring_constant();
            let delta = positions[particle.shell] - positions[particle.core];
            energy += 0.5 * k * delta.length_squared();
            forces[particle.shell] -= delta * k;
            forces[particle.core] += delta * k;
        }
        energy
    }

    fn bonded_pairs(&self) -> Vec<(usize, usize)> {
        self.particles.iter().map(|p| (p.core, p.shell)).collect()
    }
}

/// Entries of a system's force list.
pub enum Force {
    HarmonicBond(HarmonicBondForce),
    Drude(DrudeForce),
    /// Removes the mass-weighted mean velocity every `frequency` steps.
    CenterOfMassMotionRemover { frequency: u64 },
    Custom(Box<dyn ForceTerm>),
}

impl Force {
    pub fn name(&self) -> &str {
        match self {
            Force::HarmonicBond(force) => force.name(),
            Force::Drude(force) => force.name(),
            Force::CenterOfMassMotionRemover { .. } => "cm_motion_remover",
            Force::Custom(force) => force.name(),
        }
    }

    /// Conservative evaluation; the motion remover contributes nothing here.
    pub fn evaluate(&self, positions: &[Vector], forces: &mut [Vector]) -> Scalar {
        match self {
            Force::HarmonicBond(force) => force.evaluate(positions, forces),
            Force::Drude(force) => force.evaluate(positions, forces),
            Force::CenterOfMassMotionRemover { .. } => 0.0,
            Force::Custom(force) => force.evaluate(positions, forces),
        }
    }

    pub fn bonded_pairs(&self) -> Vec<(usize, usize)> {
        match self {
            Force::HarmonicBond(force) => force.bonded_pairs(),
            Force::Drude(force) => force.bonded_pairs(),
            Force::CenterOfMassMotionRemover { .. } => Vec::new(),
            Force::Custom(force) => force.bonded_pairs(),
        }
    }
}

impl std::fmt::Debug for Force {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Force::CenterOfMassMotionRemover { frequency } => {
                write!(f, "Force::CenterOfMassMotionRemover {{ frequency: {frequency} }}")
            }
            other => write!(f, "Force::{}", other.name()),
        }
    }
}
