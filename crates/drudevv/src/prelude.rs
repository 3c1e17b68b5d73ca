//! drudevv prelude module
//!
//! Re-exports the types most programs driving the integrator need.

pub use crate::config::{Axis, IntegratorConfig, RunConfig, SimulationConfig, SystemConfig};
pub use crate::errors::{DrudeError, Result};
pub use crate::integrator::{DrudeVerletIntegrator, IntegratorPhase};
pub use crate::physics::context::{Constraint, Context, ParticleState, SimulationContext, System};
pub use crate::physics::dof::{DegreesOfFreedom, TemperatureGroup};
pub use crate::physics::forces::{DrudeForce, Force, ForceTerm, HarmonicBondForce};
pub use crate::physics::math::{BOLTZ, Scalar, Vector};
pub use crate::physics::topology::{DrudePair, ImagePair};
pub use crate::resources::SharedRng;
