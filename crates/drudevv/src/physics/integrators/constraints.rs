//! Holonomic distance constraints: SHAKE on positions, RATTLE on velocities

use crate::physics::context::Constraint;
use crate::physics::math::{Scalar, Vector};
use bevy::log::warn;

pub const MAX_CONSTRAINT_ITERATIONS: usize = 150;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSolver {
    constraints: Vec<Constraint>,
}

impl ConstraintSolver {
    pub fn new(constraints: Vec<Constraint>) -> Self {
        Self { constraints }
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Corrects the step displacements so that `positions + deltas` satisfy
    /// every constraint within `tolerance` (relative, on squared lengths).
    ///
    /// Returns whether the iteration converged.
    pub fn constrain_positions(
        &self,
        positions: &[Vector],
        deltas: &mut [Vector],
        inverse_masses: &[Scalar],
        tolerance: Scalar,
    ) -> bool {
        if self.constraints.is_empty() {
            return true;
        }

        for _ in 0..MAX_CONSTRAINT_ITERATIONS {
            let mut converged = true;
            for c in &self.constraints {
                let (i, j) = (c.particle1, c.particle2);
                let inv_sum = inverse_masses[i] + inverse_masses[j];
                if inv_sum == 0.0 {
                    continue;
                }
                let d2 = c.distance * c.distance;
                let r_old = positions[i] - positions[j];
                let r_new = r_old + deltas[i] - deltas[j];
                let diff = d2 - r_new.length_squared();
                if diff.abs() <= 2.0 * tolerance * d2 {
                    continue;
                }
                converged = false;

                let rr = r_old.dot(r_new);
                if rr == 0.0 {
                    continue;
                }
                let g = diff / (2.0 * rr * inv_sum);
                deltas[i] += r_old * (g * inverse_masses[i]);
                deltas[j] -= r_old * (g * inverse_masses[j]);
            }
            if converged {
                return true;
            }
        }

        warn!(
            "SHAKE did not converge within {} iterations ({} constraints)",
            MAX_CONSTRAINT_ITERATIONS,
            self.constraints.len()
        );
        false
    }

    /// Removes the relative velocity along every constrained bond.
    pub fn constrain_velocities(
        &self,
        positions: &[Vector],
        velocities: &mut [Vector],
        inverse_masses: &[Scalar],
        tolerance: Scalar,
    ) -> bool {
        if self.constraints.is_empty() {
            return true;
        }

        for _ in 0..MAX_CONSTRAINT_ITERATIONS {
            let mut converged = true;
            for c in &self.constraints {
                let (i, j) = (c.particle1, c.particle2);
                let inv_sum = inverse_masses[i] + inverse_masses[j];
                let r = positions[i] - positions[j];
                let r2 = r.length_squared();
                if inv_sum == 0.0 || r2 == 0.0 {
                    continue;
                }
                let rv = r.dot(velocities[i] - velocities[j]);
                if rv.abs() <= tolerance * r2 {
                    continue;
                }
                converged = false;

                let g = -rv / (r2 * inv_sum);
                velocities[i] += r * (g * inverse_masses[i]);
                velocities[j] -= r * (g * inverse_masses[j]);
            }
            if converged {
                return true;
            }
        }

        warn!(
            "RATTLE did not converge within {} iterations ({} constraints)",
            MAX_CONSTRAINT_ITERATIONS,
            self.constraints.len()
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rod() -> ConstraintSolver {
        ConstraintSolver::new(vec![Constraint {
            particle1: 0,
            particle2: 1,
            distance: 0.1,
        }])
    }

    #[test]
    fn test_shake_restores_bond_length() {
        let positions = vec![Vector::ZERO, Vector::new(0.1, 0.0, 0.0)];
        let mut deltas = vec![Vector::new(-0.01, 0.002, 0.0), Vector::new(0.01, 0.0, 0.0)];
        let inverse_masses = vec![1.0, 0.5];

        assert!(rod().constrain_positions(&positions, &mut deltas, &inverse_masses, 1e-8));
        let r = (positions[0] + deltas[0] - positions[1] - deltas[1]).length();
        assert!((r - 0.1).abs() < 1e-8);
    }

    #[test]
    fn test_shake_conserves_momentum() {
        let positions = vec![Vector::ZERO, Vector::new(0.1, 0.0, 0.0)];
        let mut deltas = vec![Vector::new(-0.01, 0.0, 0.0), Vector::new(0.01, 0.0, 0.0)];
        let inverse_masses = vec![1.0, 0.25];
        rod().constrain_positions(&positions, &mut deltas, &inverse_masses, 1e-10);

        let p = deltas[0] / inverse_masses[0] + deltas[1] / inverse_masses[1];
        assert!(p.length() < 1e-12);
    }

    #[test]
    fn test_rattle_removes_bond_velocity() {
        let positions = vec![Vector::ZERO, Vector::new(0.1, 0.0, 0.0)];
        let mut velocities = vec![Vector::new(1.0, 1.0, 0.0), Vector::new(-1.0, 0.0, 0.0)];
        let inverse_masses = vec![1.0, 1.0];

        assert!(rod().constrain_velocities(&positions, &mut velocities, &inverse_masses, 1e-10));
        assert!((velocities[0].x - velocities[1].x).abs() < 1e-9);
        // Perpendicular motion is untouched
        assert_eq!(velocities[0].y, 1.0);
    }

    #[test]
    fn test_massless_pair_is_skipped() {
        let positions = vec![Vector::ZERO, Vector::new(0.2, 0.0, 0.0)];
        let mut deltas = vec![Vector::ZERO; 2];
        assert!(rod().constrain_positions(&positions, &mut deltas, &[0.0, 0.0], 1e-8));
        assert_eq!(deltas, vec![Vector::ZERO; 2]);
    }
}
