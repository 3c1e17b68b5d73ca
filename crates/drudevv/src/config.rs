//! Integrator and driver configuration
//!
//! `IntegratorConfig` carries every tunable of the integrator with the stock
//! defaults. `SimulationConfig` wraps it for the driver binary together with
//! the demo system shape and run length.

use crate::errors::Result;
use crate::physics::math::{Scalar, Vector};
use bevy::log::{info, warn};
use drudevv_macros::ConfigDefaults;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Cartesian axis an external field acts along.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    pub fn unit(self) -> Vector {
        match self {
            Axis::X => Vector::X,
            Axis::Y => Vector::Y,
            Axis::Z => Vector::Z,
        }
    }
}

#[derive(ConfigDefaults, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct IntegratorConfig {
    /// Target temperature of real atoms and molecular COM motion (K)
    #[default(300.0)]
    pub temperature: Scalar,

    /// Nose-Hoover coupling frequency for real atoms (1/ps)
    #[default(10.0)]
    pub frequency: Scalar,

    /// Target temperature of Drude relative motion (K)
    #[default(1.0)]
    pub drude_temperature: Scalar,

    /// Nose-Hoover coupling frequency for Drude relative motion (1/ps)
    #[default(200.0)]
    pub drude_frequency: Scalar,

    /// Integration step (ps)
    #[default(0.001)]
    pub step_size: Scalar,

    #[default(3)]
    pub num_nh_chains: usize,

    /// Sub-iterations of the chain propagation per step
    #[default(1)]
    pub loops_per_step: usize,

    /// Thermostat molecular COM motion as its own temperature group
    #[default(false)]
    pub use_com_temp_group: bool,

    /// Langevin friction for real atoms (1/ps)
    #[default(5.0)]
    pub friction: Scalar,

    /// Langevin friction for Drude relative motion (1/ps)
    #[default(20.0)]
    pub drude_friction: Scalar,

    #[default(1e-5)]
    pub constraint_tolerance: Scalar,

    /// Hard-wall limit on core/shell separation (nm), 0 disables
    #[default(0.0)]
    pub max_drude_distance: Scalar,

    #[default(0)]
    pub random_seed: u64,

    /// z coordinate of the image-charge mirror plane (nm)
    #[default(0.0)]
    pub mirror_location: Scalar,

    /// External field strength, kJ/(nm·e) per particle
    #[default(0.0)]
    pub electric_field: Scalar,

    #[default(Axis::Z)]
    pub electric_field_axis: Axis,

    /// Amplitude of the periodic cosine acceleration (nm/ps²), 0 disables
    #[default(0.0)]
    pub cos_acceleration: Scalar,

    #[default(false)]
    pub debug_enabled: bool,
}

/// Shape of the demo system the driver builds.
#[derive(ConfigDefaults, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SystemConfig {
    /// Molecules per box edge; the box holds `molecules_per_edge³` molecules
    #[default(4)]
    pub molecules_per_edge: usize,

    /// Cubic box edge (nm)
    #[default(2.0)]
    pub box_size: Scalar,

    #[default(15.6)]
    pub core_mass: Scalar,

    #[default(0.4)]
    pub shell_mass: Scalar,

    /// Drude shell charge (e)
    #[default(-1.2)]
    pub shell_charge: Scalar,

    /// Atomic polarizability (nm³)
    #[default(0.001)]
    pub polarizability: Scalar,

    #[default(0.12)]
    pub bond_length: Scalar,

    /// kJ/(mol·nm²)
    #[default(250_000.0)]
    pub bond_force_constant: Scalar,

    /// Constrain the core-core bond instead of a harmonic spring
    #[default(false)]
    pub constrain_bonds: bool,

    /// Thermostat the whole system with Langevin dynamics instead of Nose-Hoover
    #[default(false)]
    pub langevin: bool,

    /// Mark every particle as electrolyte for the external field
    #[default(true)]
    pub electrolyte: bool,

    #[default(0)]
    pub remove_com_motion_every: u64,
}

#[derive(ConfigDefaults, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    #[default(10_000)]
    pub steps: usize,

    #[default(1_000)]
    pub report_interval: usize,
}

#[derive(ConfigDefaults, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    #[default(IntegratorConfig::default())]
    pub integrator: IntegratorConfig,

    #[default(SystemConfig::default())]
    pub system: SystemConfig,

    #[default(RunConfig::default())]
    pub run: RunConfig,
}

impl SimulationConfig {
    /// Environment variables `DRUDEVV_<SECTION>__<FIELD>` override file values.
    pub const ENV_PREFIX: &'static str = "DRUDEVV";

    /// Layered load: defaults, then the TOML file (if present), then environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::from(path.as_ref().to_path_buf()).required(false))
            .add_source(
                config::Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load configuration, falling back to defaults if it cannot be read
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config file {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Default location in the platform configuration directory.
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "drudevv", "drudevv")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn load_from_user_config() -> Self {
        match Self::user_config_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::load_or_default(path)
            }
            _ => Self::default(),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}
