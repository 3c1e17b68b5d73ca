//! Physics of the Drude integrator: context, forces, classification,
//! thermostats and time stepping

pub mod context;
pub mod dof;
pub mod extra_force;
pub mod forces;
pub mod integrators;
pub mod math;
pub mod modifiers;
pub mod nose_hoover;
pub mod topology;
