//! Command line interface for the drudevv driver

use clap::Parser;
use drudevv::config::SimulationConfig;

/// drudevv - velocity-Verlet dynamics of polarizable molecules
#[derive(Parser, Debug)]
#[command(
    version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")"),
    about,
    long_about = None
)]
pub struct Args {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Number of steps to run (overrides config file)
    #[arg(short = 'n', long, value_name = "COUNT")]
    pub steps: Option<usize>,

    /// Random seed for velocities and Langevin noise
    #[arg(short = 's', long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Target temperature in K (overrides config file)
    #[arg(short = 't', long, value_name = "KELVIN")]
    pub temperature: Option<f64>,

    /// Use the Langevin thermostat instead of Nose-Hoover chains
    #[arg(short = 'l', long)]
    pub langevin: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

/// Loads configuration from file or defaults, then applies command-line overrides
pub fn load_and_apply_config(args: &Args) -> SimulationConfig {
    let mut config = if let Some(config_path) = &args.config {
        println!("Loading configuration from: {config_path}");
        SimulationConfig::load_or_default(config_path)
    } else {
        SimulationConfig::load_from_user_config()
    };

    if let Some(steps) = args.steps {
        println!("Overriding step count to: {steps}");
        config.run.steps = steps;
    }

    if let Some(seed) = args.seed {
        println!("Using random seed: {seed}");
        config.integrator.random_seed = seed;
    }

    if let Some(temperature) = args.temperature {
        println!("Overriding temperature to: {temperature} K");
        config.integrator.temperature = temperature;
    }

    if args.langevin {
        println!("Using the Langevin thermostat");
        config.system.langevin = true;
    }

    config
}
