mod cli;

use bevy::app::App;
use bevy::log::{Level, LogPlugin, error, info};
use clap::Parser;
use drudevv::demo::Simulation;
use drudevv::physics::context::SimulationContext;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = cli::Args::parse();

    App::new().add_plugins(LogPlugin {
        level: if args.verbose { Level::DEBUG } else { Level::INFO },
        ..Default::default()
    });

    let mut config = cli::load_and_apply_config(&args);
    if args.verbose {
        config.integrator.debug_enabled = true;
    }

    if args.print_config {
        return match config.to_toml() {
            Ok(toml) => {
                println!("{toml}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        };
    }

    let result = Simulation::new(&config).and_then(|mut simulation| {
        info!(
            "Running {} steps of {} ps ({} particles)",
            config.run.steps,
            config.integrator.step_size,
            simulation.context.num_particles()
        );
        simulation.run(config.run.steps, config.run.report_interval)
    });

    match result {
        Ok(report) => {
            info!("Finished at t = {:.3} ps after {} steps", report.time, report.step);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
