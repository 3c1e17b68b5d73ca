//! Error types for drudevv.

use thiserror::Error;

/// Every failure the integrator can surface.
///
/// All variants are fatal for the call that raised them; nothing is retried.
/// Numerical degeneracies (zero DOF, zero chain mass) are not errors.
#[derive(Debug, Error)]
pub enum DrudeError {
    /// The integrator is already bound to a different context.
    #[error("This integrator is already bound to a different context")]
    BindingConflict,

    /// The system carries more than one Drude polarization force.
    #[error("The system contains multiple Drude forces")]
    MultipleForceDefinition,

    /// Mutually incompatible settings were detected at bind time.
    #[error("Configuration conflict: {0}")]
    ConfigurationConflict(String),

    /// Stepping or querying before the integrator was bound.
    #[error("This integrator is not bound to a context")]
    UnboundUsage,

    /// A particle index outside the system.
    #[error("Particle index {index} out of range for a system of {count} particles")]
    ParticleIndex { index: usize, count: usize },

    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to serialize configuration: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DrudeError {
    pub fn conflict(message: impl Into<String>) -> Self {
        DrudeError::ConfigurationConflict(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DrudeError>;
