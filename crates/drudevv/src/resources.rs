//! Shared random stream for the stochastic modifiers

use crate::physics::math::Scalar;
use bevy::prelude::{Deref, DerefMut};
use rand::Rng;
use rand_chacha::{ChaCha8Rng, rand_core::SeedableRng};
use rand_distr::StandardNormal;

/// Seedable random stream owned by a bound integrator.
///
/// Seed 0 is an ordinary seed: two integrators with the same seed draw the
/// same sequence.
#[derive(Deref, DerefMut, Debug, Clone, PartialEq)]
pub struct SharedRng(pub ChaCha8Rng);

impl SharedRng {
    pub fn from_seed(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }

    /// One standard normal variate.
    #[inline]
    pub fn gaussian(&mut self) -> Scalar {
        self.0.sample(StandardNormal)
    }

    /// Three independent standard normal variates.
    #[inline]
    pub fn gaussian_vector(&mut self) -> crate::physics::math::Vector {
        crate::physics::math::Vector::new(self.gaussian(), self.gaussian(), self.gaussian())
    }
}

impl Default for SharedRng {
    fn default() -> Self {
        Self(ChaCha8Rng::from_rng(&mut rand::rng()))
    }
}
