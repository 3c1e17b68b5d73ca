//! Numeric precision policy and physical constants
//!
//! Every physics routine in the crate computes in [`Scalar`] and [`Vector`];
//! switching precision means changing these two aliases and nothing else.
//! Units follow the usual MD convention: nm, ps, amu, kJ/mol, K and e.

/// Scalar type for physics calculations (f64 for precision)
pub type Scalar = f64;

/// 3D vector type for positions, velocities, and forces
pub type Vector = bevy::math::DVec3;

/// Boltzmann constant in kJ/(mol·K)
pub const BOLTZ: Scalar = 0.008_314_462_618;

/// Avogadro constant, converts per-particle kJ/(nm·e) into kJ/(mol·nm·e)
pub const AVOGADRO: Scalar = 6.022_140_76e23;

/// Coulomb prefactor 1/(4πε₀) in kJ·nm/(mol·e²)
pub const ONE_4PI_EPS0: Scalar = 138.935_456;

/// Converts a field stored as kJ/(nm·e) per particle into V/nm, for reporting
pub const FIELD_TO_VOLTS_PER_NM: Scalar = 6.241_509_629_152_651e21;

pub const TWO_PI: Scalar = 2.0 * core::f64::consts::PI;

/// Inverse of a mass, with massless (virtual) particles mapped to zero.
#[inline]
pub fn inverse_mass(mass: Scalar) -> Scalar {
    if mass == 0.0 { 0.0 } else { 1.0 / mass }
}

/// Reduced mass of a two-body pair. Zero when either body is massless.
#[inline]
pub fn reduced_mass(m1: Scalar, m2: Scalar) -> Scalar {
    let total = m1 + m2;
    if m1 == 0.0 || m2 == 0.0 || total == 0.0 {
        0.0
    } else {
        m1 * m2 / total
    }
}

/// Sums per-item contributions across the rayon pool.
///
/// Floating-point addition is not associative, so the result may differ from
/// a sequential sum in the last bits; callers compare with a relative
/// tolerance (see `tests::test_parallel_sum_matches_sequential_within_tolerance`).
pub fn parallel_sum<T, F>(items: &[T], f: F) -> Scalar
where
    T: Sync,
    F: Fn(&T) -> Scalar + Sync + Send,
{
    use rayon::prelude::*;
    items.par_iter().map(f).sum()
}
