//! Degree-of-freedom accounting per temperature group

use crate::errors::{DrudeError, Result};
use crate::physics::context::Constraint;
use crate::physics::math::Scalar;
use crate::physics::topology::Topology;
use std::fmt;

/// Independently thermostatted partitions of the Nose-Hoover subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemperatureGroup {
    /// Real atoms and the COM motion of Drude pairs
    Atom,
    /// Molecular center-of-mass motion
    CenterOfMass,
    /// Relative core/shell motion
    Drude,
}

impl TemperatureGroup {
    pub const ALL: [TemperatureGroup; 3] = [
        TemperatureGroup::Atom,
        TemperatureGroup::CenterOfMass,
        TemperatureGroup::Drude,
    ];

    pub fn index(self) -> usize {
        match self {
            TemperatureGroup::Atom => 0,
            TemperatureGroup::CenterOfMass => 1,
            TemperatureGroup::Drude => 2,
        }
    }
}

impl fmt::Display for TemperatureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemperatureGroup::Atom => "atom",
            TemperatureGroup::CenterOfMass => "com",
            TemperatureGroup::Drude => "drude",
        };
        f.write_str(name)
    }
}

/// DOF of each temperature group. Fractional values arise from the COM
/// correction of individual atoms.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DegreesOfFreedom([Scalar; 3]);

impl DegreesOfFreedom {
    pub fn get(&self, group: TemperatureGroup) -> Scalar {
        self.0[group.index()]
    }

    pub fn total(&self) -> Scalar {
        self.0.iter().sum()
    }

    fn add(&mut self, group: TemperatureGroup, amount: Scalar) {
        self.0[group.index()] += amount;
    }
}

/// What the accountant needs to know about the system besides its topology.
#[derive(Debug, Clone, Copy)]
pub struct DofInputs<'a> {
    pub constraints: &'a [Constraint],
    pub has_drude_force: bool,
    pub has_motion_remover: bool,
    pub use_com_temp_group: bool,
}

/// Counts the thermodynamic DOF of every temperature group.
///
/// Requesting COM grouping without a Drude force is a configuration
/// conflict. Negative totals are clamped to zero.
pub fn count_degrees_of_freedom(topology: &Topology, inputs: DofInputs<'_>) -> Result<DegreesOfFreedom> {
    use TemperatureGroup::*;

    if inputs.use_com_temp_group && !inputs.has_drude_force {
        return Err(DrudeError::conflict(
            "the center-of-mass temperature group requires a Drude force",
        ));
    }

    let mut dof = DegreesOfFreedom::default();

    for &particle in &topology.nose_hoover().particles {
        let mass = topology.mass(particle);
        if mass == 0.0 {
            continue;
        }
        dof.add(Atom, 3.0);
        if inputs.use_com_temp_group {
            let resid = topology.particle_residue(particle).unwrap_or_default();
            let residue_inverse_mass = topology.residue_inverse_mass(resid).unwrap_or_default();
            dof.add(Atom, -3.0 * mass * residue_inverse_mass);
        }
    }

    for _ in &topology.nose_hoover().pairs {
        dof.add(Atom, -3.0);
        dof.add(Drude, 3.0);
    }

    for constraint in inputs.constraints {
        if topology.is_nose_hoover(constraint.particle1) || topology.is_nose_hoover(constraint.particle2) {
            dof.add(Atom, -1.0);
        }
    }

    if inputs.use_com_temp_group {
        dof.add(CenterOfMass, 3.0 * topology.nose_hoover().residues.len() as Scalar);
    }

    if inputs.has_motion_remover {
        let group = if inputs.use_com_temp_group { CenterOfMass } else { Atom };
        dof.add(group, -3.0);
    }

    for value in &mut dof.0 {
        *value = value.max(0.0);
    }
    Ok(dof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::topology::{DrudePair, RoleAssignments};

    fn inputs(constraints: &[Constraint]) -> DofInputs<'_> {
        DofInputs {
            constraints,
            has_drude_force: true,
            has_motion_remover: false,
            use_com_temp_group: false,
        }
    }

    #[test]
    fn test_free_atoms_have_three_dof_each() {
        let masses = vec![1.0; 10];
        let molecules: Vec<Vec<usize>> = (0..10).map(|i| vec![i]).collect();
        let topology = Topology::classify(&masses, &molecules, &[], &RoleAssignments::default()).unwrap();

        let dof = count_degrees_of_freedom(&topology, inputs(&[])).unwrap();
        assert_eq!(dof.get(TemperatureGroup::Atom), 30.0);
        assert_eq!(dof.get(TemperatureGroup::Drude), 0.0);
    }

    #[test]
    fn test_drude_pair_moves_three_dof() {
        let masses = vec![15.6, 0.4];
        let molecules = vec![vec![0, 1]];
        let pairs = vec![DrudePair::new(0, 1)];
        let topology = Topology::classify(&masses, &molecules, &pairs, &RoleAssignments::default()).unwrap();

        let dof = count_degrees_of_freedom(&topology, inputs(&[])).unwrap();
        assert_eq!(dof.get(TemperatureGroup::Atom), 3.0);
        assert_eq!(dof.get(TemperatureGroup::Drude), 3.0);
    }

    #[test]
    fn test_com_group_takes_molecular_translation() {
        let masses = vec![12.0, 16.0];
        let molecules = vec![vec![0, 1]];
        let topology = Topology::classify(&masses, &molecules, &[], &RoleAssignments::default()).unwrap();
        let constraints = [Constraint {
            particle1: 0,
            particle2: 1,
            distance: 0.113,
        }];

        let dof = count_degrees_of_freedom(
            &topology,
            DofInputs {
                use_com_temp_group: true,
                has_motion_remover: true,
                ..inputs(&constraints)
            },
        )
        .unwrap();

        // 6 − 3 (COM) − 1 (constraint) internal, 3 − 3 (remover) COM
        assert!((dof.get(TemperatureGroup::Atom) - 2.0).abs() < 1e-12);
        assert_eq!(dof.get(TemperatureGroup::CenterOfMass), 0.0);
    }

    #[test]
    fn test_com_group_without_drude_force_conflicts() {
        let masses = vec![1.0];
        let topology = Topology::classify(&masses, &[vec![0]], &[], &RoleAssignments::default()).unwrap();
        let result = count_degrees_of_freedom(
            &topology,
            DofInputs {
                has_drude_force: false,
                use_com_temp_group: true,
                ..inputs(&[])
            },
        );
        assert!(matches!(result, Err(DrudeError::ConfigurationConflict(_))));
    }

    #[test]
    fn test_dof_is_clamped_at_zero() {
        let masses = vec![1.0];
        let topology = Topology::classify(&masses, &[vec![0]], &[], &RoleAssignments::default()).unwrap();
        let constraints = [
            Constraint {
                particle1: 0,
                particle2: 0,
                distance: 0.0,
            };
            5
        ];
        let dof = count_degrees_of_freedom(&topology, inputs(&constraints)).unwrap();
        assert_eq!(dof.get(TemperatureGroup::Atom), 0.0);
    }

    #[test]
    fn test_massless_particles_carry_no_dof() {
        let masses = vec![1.0, 0.0];
        let topology =
            Topology::classify(&masses, &[vec![0], vec![1]], &[], &RoleAssignments::default()).unwrap();
        let dof = count_degrees_of_freedom(&topology, inputs(&[])).unwrap();
        assert_eq!(dof.get(TemperatureGroup::Atom), 3.0);
    }
}
