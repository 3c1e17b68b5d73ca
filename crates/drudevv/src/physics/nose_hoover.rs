//! Nose-Hoover chain thermostat over the three temperature groups
//!
//! [`NoseHooverChain`] advances one chain of extended variables and returns
//! the velocity scaling factor for its group. [`NoseHooverThermostat`] owns
//! a chain per [`TemperatureGroup`], measures the group kinetic energies of
//! the Nose-Hoover subsystem and applies the scaling to the particles.

use crate::config::IntegratorConfig;
use crate::physics::context::ParticleState;
use crate::physics::dof::{DegreesOfFreedom, TemperatureGroup};
use crate::physics::math::{BOLTZ, Scalar, Vector, parallel_sum};
use crate::physics::topology::{DrudePair, Topology};
use rayon::prelude::*;

/// Extended thermostat variables of one temperature group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoseHooverChain {
    eta: Vec<Scalar>,
    /// One slot longer than the chain; the last entry stays zero
    eta_dot: Vec<Scalar>,
    eta_dot_dot: Vec<Scalar>,
    eta_mass: Vec<Scalar>,
    kbt: Scalar,
    ke2_target: Scalar,
}

impl NoseHooverChain {
    /// Chain for a group with `dof` degrees of freedom coupled at
    /// `frequency` to a bath of energy `kbt`.
    pub fn new(num_chains: usize, dof: Scalar, kbt: Scalar, frequency: Scalar) -> Self {
        let q = if frequency == 0.0 { 0.0 } else { kbt / (frequency * frequency) };
        let mut chain = Self {
            eta: vec![0.0; num_chains],
            eta_dot: vec![0.0; num_chains + 1],
            eta_dot_dot: vec![0.0; num_chains],
            eta_mass: vec![q; num_chains],
            kbt,
            ke2_target: dof * kbt,
        };
        if let Some(first) = chain.eta_mass.first_mut() {
            *first = dof * q;
        }
        for ich in 1..num_chains {
            if chain.eta_mass[ich] != 0.0 {
                chain.eta_dot_dot[ich] = (chain.eta_mass[ich - 1] * chain.eta_dot[ich - 1] * chain.eta_dot[ich - 1]
                    - kbt)
                    / chain.eta_mass[ich];
            }
        }
        chain
    }

    /// Builds a chain from explicit state, for callers that manage the
    /// extended variables themselves.
    pub fn from_parts(
        eta: Vec<Scalar>,
        eta_dot: Vec<Scalar>,
        eta_dot_dot: Vec<Scalar>,
        eta_mass: Vec<Scalar>,
        kbt: Scalar,
        ke2_target: Scalar,
    ) -> Self {
        let mut eta_dot = eta_dot;
        eta_dot.resize(eta.len() + 1, 0.0);
        Self {
            eta,
            eta_dot,
            eta_dot_dot,
            eta_mass,
            kbt,
            ke2_target,
        }
    }

    pub fn len(&self) -> usize {
        self.eta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eta.is_empty()
    }

    pub fn eta(&self) -> &[Scalar] {
        &self.eta
    }

    pub fn eta_dot(&self) -> &[Scalar] {
        &self.eta_dot
    }

    pub fn eta_dot_dot(&self) -> &[Scalar] {
        &self.eta_dot_dot
    }

    pub fn eta_mass(&self) -> &[Scalar] {
        &self.eta_mass
    }

    pub fn kbt(&self) -> Scalar {
        self.kbt
    }

    /// `DOF·kB·T` of the group
    pub fn ke2_target(&self) -> Scalar {
        self.ke2_target
    }

    /// Advances the chain by one full step of length `step_size` split into
    /// `loops` sub-steps, given the group's current `2·KE`. Returns the
    /// factor the group velocities must be multiplied by.
    ///
    /// A chain whose innermost mass is not positive is inert: the factor is
    /// exactly 1 and the state is left untouched.
    pub fn propagate(&mut self, ke2: Scalar, step_size: Scalar, loops: usize) -> Scalar {
        let mut factor = 1.0;
        let n = self.eta.len();
        if n == 0 || loops == 0 || self.eta_mass[0] <= 0.0 {
            return factor;
        }

        let dt2 = step_size / loops as Scalar / 2.0;
        let dt4 = dt2 / 2.0;
        let dt8 = dt4 / 2.0;

        self.eta_dot_dot[0] = (ke2 - self.ke2_target) / self.eta_mass[0];
        for _ in 0..loops {
            // Inward half-kicks; `expfac` of link 0 is reused below
            let mut expfac = 1.0;
            for ich in (0..n).rev() {
                expfac = libm::exp(-dt8 * self.eta_dot[ich + 1]);
                self.eta_dot[ich] *= expfac;
                self.eta_dot[ich] += self.eta_dot_dot[ich] * dt4;
                self.eta_dot[ich] *= expfac;
            }

            factor *= libm::exp(-dt2 * self.eta_dot[0]);

            for ich in 0..n {
                self.eta[ich] += dt2 * self.eta_dot[ich];
            }

            self.eta_dot_dot[0] = (ke2 * factor * factor - self.ke2_target) / self.eta_mass[0];
            self.eta_dot[0] *= expfac;
            self.eta_dot[0] += self.eta_dot_dot[0] * dt4;
            self.eta_dot[0] *= expfac;

            for ich in 1..n {
                expfac = libm::exp(-dt8 * self.eta_dot[ich + 1]);
                self.eta_dot[ich] *= expfac;
                self.eta_dot_dot[ich] = (self.eta_mass[ich - 1] * self.eta_dot[ich - 1] * self.eta_dot[ich - 1]
                    - self.kbt)
                    / self.eta_mass[ich];
                self.eta_dot[ich] += self.eta_dot_dot[ich] * dt4;
                self.eta_dot[ich] *= expfac;
            }
        }
        factor
    }
}

/// Per-group values, indexed by [`TemperatureGroup::index`].
pub type GroupValues = [Scalar; 3];

/// Nose-Hoover thermostat of every NH-coupled particle.
#[derive(Debug, Clone)]
pub struct NoseHooverThermostat {
    normal_particles: Vec<usize>,
    pairs: Vec<DrudePair>,
    /// Members and inverse mass of each NH residue
    residues: Vec<(Vec<usize>, Scalar)>,
    /// Slot in `residues` for every particle of an NH residue
    residue_slot: Vec<Option<usize>>,
    use_com_temp_group: bool,
    dof: DegreesOfFreedom,
    chains: [NoseHooverChain; 3],
    com_velocities: Vec<Vector>,
    kinetic_energies: GroupValues,
}

impl NoseHooverThermostat {
    pub fn new(topology: &Topology, dof: DegreesOfFreedom, config: &IntegratorConfig) -> Self {
        let nh = topology.nose_hoover();
        let mut residue_slot = vec![None; topology.num_particles()];
        let residues: Vec<(Vec<usize>, Scalar)> = nh
            .residues
            .iter()
            .enumerate()
            .map(|(slot, &resid)| {
                let residue = &topology.residues()[resid];
                for &p in &residue.particles {
                    residue_slot[p] = Some(slot);
                }
                (residue.particles.clone(), residue.inverse_mass)
            })
            .collect();

        let real_kbt = BOLTZ * config.temperature;
        let drude_kbt = BOLTZ * config.drude_temperature;
        let chains = TemperatureGroup::ALL.map(|group| {
            let (kbt, frequency) = match group {
                TemperatureGroup::Drude => (drude_kbt, config.drude_frequency),
                _ => (real_kbt, config.frequency),
            };
            NoseHooverChain::new(config.num_nh_chains, dof.get(group), kbt, frequency)
        });

        Self {
            normal_particles: nh.normal_particles.clone(),
            pairs: nh.pairs.clone(),
            com_velocities: vec![Vector::ZERO; residues.len()],
            residues,
            residue_slot,
            use_com_temp_group: config.use_com_temp_group,
            dof,
            chains,
            kinetic_energies: [0.0; 3],
        }
    }

    pub fn degrees_of_freedom(&self) -> DegreesOfFreedom {
        self.dof
    }

    pub fn chain(&self, group: TemperatureGroup) -> &NoseHooverChain {
        &self.chains[group.index()]
    }

    pub fn num_residues(&self) -> usize {
        self.residues.len()
    }

    pub fn num_normal_particles(&self) -> usize {
        self.normal_particles.len()
    }

    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }

    /// `2·KE` of each group as of the last measurement, after scaling.
    pub fn kinetic_energies(&self) -> GroupValues {
        self.kinetic_energies
    }

    /// Instantaneous temperature of each group; zero for groups without DOF.
    pub fn group_temperatures(&self) -> GroupValues {
        TemperatureGroup::ALL.map(|group| {
            let dof = self.dof.get(group);
            if dof > 0.0 {
                self.kinetic_energies[group.index()] / (dof * BOLTZ)
            } else {
                0.0
            }
        })
    }

    fn com_velocity_of(&self, particle: usize) -> Vector {
        if !self.use_com_temp_group {
            return Vector::ZERO;
        }
        self.residue_slot[particle]
            .map(|slot| self.com_velocities[slot])
            .unwrap_or(Vector::ZERO)
    }

    /// Measures `2·KE` of every temperature group.
    pub fn compute_group_kinetic_energies(&mut self, state: &ParticleState) -> GroupValues {
        let mut ke2 = [0.0; 3];

        if self.use_com_temp_group {
            self.com_velocities = self
                .residues
                .par_iter()
                .map(|(members, inv_mass)| {
                    members
                        .iter()
                        .fold(Vector::ZERO, |acc, &p| acc + state.velocities[p] * state.masses[p])
                        * *inv_mass
                })
                .collect();
            ke2[TemperatureGroup::CenterOfMass.index()] = self
                .residues
                .par_iter()
                .zip(self.com_velocities.par_iter())
                .map(|((_, inv_mass), vcom)| {
                    if *inv_mass == 0.0 {
                        0.0
                    } else {
                        vcom.length_squared() / inv_mass
                    }
                })
                .sum::<Scalar>();
        }

        let this = &*self;
        let normal = parallel_sum(&this.normal_particles, |&p| {
            let u = state.velocities[p] - this.com_velocity_of(p);
            state.masses[p] * u.length_squared()
        });

        let (pair_com, pair_rel): (Scalar, Scalar) = this
            .pairs
            .par_iter()
            .map(|pair| {
                let (mc, ms) = (state.masses[pair.core], state.masses[pair.shell]);
                let total = mc + ms;
                if total == 0.0 {
                    return (0.0, 0.0);
                }
                let uc = state.velocities[pair.core] - this.com_velocity_of(pair.core);
                let us = state.velocities[pair.shell] - this.com_velocity_of(pair.shell);
                let ucom = (uc * mc + us * ms) / total;
                let urel = us - uc;
                (total * ucom.length_squared(), mc * ms / total * urel.length_squared())
            })
            .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));

        ke2[TemperatureGroup::Atom.index()] = normal + pair_com;
        ke2[TemperatureGroup::Drude.index()] = pair_rel;

        self.kinetic_energies = ke2;
        ke2
    }

    /// Propagates each group's chain from the last measured kinetic energies
    /// and rescales the NH velocities. Returns the per-group factors.
    pub fn scale_velocities(&mut self, state: &mut ParticleState, step_size: Scalar, loops: usize) -> GroupValues {
        let mut scales = [1.0; 3];
        for group in TemperatureGroup::ALL {
            let i = group.index();
            scales[i] = self.chains[i].propagate(self.kinetic_energies[i], step_size, loops);
            self.kinetic_energies[i] *= scales[i] * scales[i];
        }

        let s_atom = scales[TemperatureGroup::Atom.index()];
        let s_com = scales[TemperatureGroup::CenterOfMass.index()];
        let s_drude = scales[TemperatureGroup::Drude.index()];

        for &p in &self.normal_particles {
            if state.inverse_masses[p] == 0.0 {
                continue;
            }
            let vcom = self.com_velocity_of(p);
            let u = state.velocities[p] - vcom;
            state.velocities[p] = vcom * s_com + u * s_atom;
        }

        for pair in &self.pairs {
            let (mc, ms) = (state.masses[pair.core], state.masses[pair.shell]);
            let total = mc + ms;
            if total == 0.0 {
                continue;
            }
            let vcom_c = self.com_velocity_of(pair.core);
            let vcom_s = self.com_velocity_of(pair.shell);
            let uc = state.velocities[pair.core] - vcom_c;
            let us = state.velocities[pair.shell] - vcom_s;
            let ucom = (uc * mc + us * ms) / total * s_atom;
            let urel = (us - uc) * s_drude;
            if mc != 0.0 {
                state.velocities[pair.core] = vcom_c * s_com + ucom - urel * (ms / total);
            }
            if ms != 0.0 {
                state.velocities[pair.shell] = vcom_s * s_com + ucom + urel * (mc / total);
            }
        }

        scales
    }

    /// One full thermostat application: measure, propagate, scale.
    pub fn apply(&mut self, state: &mut ParticleState, step_size: Scalar, loops: usize) -> GroupValues {
        self.compute_group_kinetic_energies(state);
        self.scale_velocities(state, step_size, loops)
    }
}
