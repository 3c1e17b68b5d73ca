//! Auxiliary force buffer for stochastic and external forces
//!
//! Conservative forces live in the context and can be invalidated from the
//! outside; Langevin, electric-field and cosine-acceleration forces are
//! stored here instead. Writes go through an [`ExtraForceAccumulator`],
//! which can only be obtained by zeroing the buffer first.

use crate::physics::math::Vector;
use rayon::prelude::*;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraForce {
    forces: Vec<Vector>,
}

impl ExtraForce {
    pub fn new(num_particles: usize) -> Self {
        Self {
            forces: vec![Vector::ZERO; num_particles],
        }
    }

    pub fn forces(&self) -> &[Vector] {
        &self.forces
    }

    /// Zeroes the buffer and hands out the step's single writer.
    pub fn begin_accumulation(&mut self) -> ExtraForceAccumulator<'_> {
        self.forces.par_iter_mut().for_each(|f| *f = Vector::ZERO);
        ExtraForceAccumulator {
            forces: &mut self.forces,
        }
    }
}

/// Exclusive write access to a freshly zeroed [`ExtraForce`].
#[derive(Debug)]
pub struct ExtraForceAccumulator<'a> {
    forces: &'a mut [Vector],
}

impl ExtraForceAccumulator<'_> {
    #[inline]
    pub fn add(&mut self, particle: usize, force: Vector) {
        self.forces[particle] += force;
    }

    pub fn forces_mut(&mut self) -> &mut [Vector] {
        self.forces
    }

    pub fn forces(&self) -> &[Vector] {
        self.forces
    }
}
