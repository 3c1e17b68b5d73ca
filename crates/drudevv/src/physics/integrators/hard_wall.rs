//! Hard wall on the core/shell separation of Drude pairs
//!
//! A shell that strays farther than the wall distance from its core is put
//! back inside and its bond-direction velocity is reflected with a thermal
//! magnitude set by the Drude temperature.

use crate::physics::math::{BOLTZ, Scalar, Vector};
use crate::physics::topology::DrudePair;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrudeHardWall {
    pub max_distance: Scalar,
    /// `sqrt(kB·T_drude)`
    pub thermal_scale: Scalar,
}

impl DrudeHardWall {
    pub fn new(max_distance: Scalar, drude_temperature: Scalar) -> Self {
        Self {
            max_distance,
            thermal_scale: libm::sqrt(BOLTZ * drude_temperature),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_distance > 0.0
    }

    /// Applies the wall to every pair, returning how many bounced.
    pub fn apply(
        &self,
        pairs: &[DrudePair],
        positions: &mut [Vector],
        velocities: &mut [Vector],
        inverse_masses: &[Scalar],
        step_size: Scalar,
    ) -> usize {
        if !self.is_enabled() {
            return 0;
        }
        let mut bounced = 0;
        for pair in pairs {
            if self.bounce(*pair, positions, velocities, inverse_masses, step_size) {
                bounced += 1;
            }
        }
        bounced
    }

    fn bounce(
        &self,
        pair: DrudePair,
        positions: &mut [Vector],
        velocities: &mut [Vector],
        inverse_masses: &[Scalar],
        dt: Scalar,
    ) -> bool {
        let (shell, core) = (pair.shell, pair.core);
        let delta = positions[shell] - positions[core];
        let r = delta.length();
        if r <= self.max_distance || r == 0.0 {
            return false;
        }
        let inv_ms = inverse_masses[shell];
        if inv_ms == 0.0 {
            return false;
        }

        let dir = delta / r;
        let overshoot = r - self.max_distance;
        let v_shell = velocities[shell];
        let mut dot_shell = v_shell.dot(dir);
        let perp_shell = v_shell - dir * dot_shell;
        let v_bond = self.thermal_scale * libm::sqrt(inv_ms);

        let inv_mc = inverse_masses[core];
        if inv_mc == 0.0 {
            // Massless core: only the shell moves
            let mut dt_hit = dt;
            if dot_shell != 0.0 {
                dt_hit = (overshoot / dot_shell.abs()).min(dt);
            }
            dot_shell = -signum_or(dot_shell, 1.0) * v_bond;
            positions[shell] += dir * (-overshoot + dt_hit * dot_shell);
            velocities[shell] = perp_shell + dir * dot_shell;
            return true;
        }

        let ms = 1.0 / inv_ms;
        let mc = 1.0 / inv_mc;
        let inv_total = 1.0 / (ms + mc);

        let v_core = velocities[core];
        let mut dot_core = v_core.dot(dir);
        let perp_core = v_core - dir * dot_core;

        let v_com = (ms * dot_shell + mc * dot_core) * inv_total;
        dot_shell -= v_com;
        dot_core -= v_com;

        let mut dt_hit = dt;
        if dot_shell != dot_core {
            dt_hit = (overshoot / (dot_shell - dot_core).abs()).min(dt);
        }

        // Shell reflects inward (−dir), core toward the shell (+dir)
        dot_shell = -signum_or(dot_shell, 1.0) * v_bond * mc * inv_total;
        dot_core = -signum_or(dot_core, -1.0) * v_bond * ms * inv_total;

        let dr_shell = -overshoot * mc * inv_total + dt_hit * dot_shell;
        let dr_core = overshoot * ms * inv_total + dt_hit * dot_core;

        positions[shell] += dir * dr_shell;
        positions[core] += dir * dr_core;
        velocities[shell] = perp_shell + dir * (dot_shell + v_com);
        velocities[core] = perp_core + dir * (dot_core + v_com);
        true
    }
}

/// Sign of `x`, or `fallback` when `x` is zero.
fn signum_or(x: Scalar, fallback: Scalar) -> Scalar {
    if x == 0.0 { fallback } else { x.signum() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_inside_wall_is_untouched() {
        let wall = DrudeHardWall::new(0.02, 1.0);
        let mut positions = vec![Vector::ZERO, Vector::new(0.01, 0.0, 0.0)];
        let mut velocities = vec![Vector::ZERO, Vector::X];
        let n = wall.apply(&[DrudePair::new(0, 1)], &mut positions, &mut velocities, &[0.1, 2.5], 0.001);
        assert_eq!(n, 0);
        assert_eq!(velocities[1], Vector::X);
    }

    #[test]
    fn test_escaping_shell_is_pulled_back_inside() {
        let wall = DrudeHardWall::new(0.02, 1.0);
        let mut positions = vec![Vector::ZERO, Vector::new(0.025, 0.0, 0.0)];
        let mut velocities = vec![Vector::ZERO, Vector::new(3.0, 1.0, 0.0)];
        let inverse_masses = [1.0 / 15.6, 1.0 / 0.4];

        let n = wall.apply(&[DrudePair::new(0, 1)], &mut positions, &mut velocities, &inverse_masses, 0.001);
        assert_eq!(n, 1);

        let r = (positions[1] - positions[0]).length();
        assert!(r <= 0.02 + 1e-12);
        // Relative motion along the bond now points inward
        assert!((velocities[1] - velocities[0]).x < 0.0);
        // Perpendicular component survives
        assert_eq!(velocities[1].y, 1.0);
    }

    #[test]
    fn test_bounce_conserves_pair_momentum_along_bond() {
        let wall = DrudeHardWall::new(0.02, 1.0);
        let mut positions = vec![Vector::ZERO, Vector::new(0.0, 0.03, 0.0)];
        let mut velocities = vec![Vector::new(0.0, -0.5, 0.0), Vector::new(0.0, 4.0, 0.0)];
        let (mc, ms) = (15.6, 0.4);
        let before = velocities[0] * mc + velocities[1] * ms;

        wall.apply(&[DrudePair::new(0, 1)], &mut positions, &mut velocities, &[1.0 / mc, 1.0 / ms], 0.001);
        let after = velocities[0] * mc + velocities[1] * ms;
        assert!((after - before).length() < 1e-9);
    }

    #[test]
    fn test_massless_core_only_moves_shell() {
        let wall = DrudeHardWall::new(0.02, 1.0);
        let mut positions = vec![Vector::ZERO, Vector::new(0.0, 0.0, 0.03)];
        let mut velocities = vec![Vector::ZERO, Vector::new(0.0, 0.0, 2.0)];

        wall.apply(&[DrudePair::new(0, 1)], &mut positions, &mut velocities, &[0.0, 2.5], 0.001);
        assert_eq!(positions[0], Vector::ZERO);
        assert!(positions[1].z <= 0.02 + 1e-12);
        assert!(velocities[1].z < 0.0);
    }
}
