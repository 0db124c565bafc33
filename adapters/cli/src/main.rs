#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless Garrison session.

mod scenario;
mod session;

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use garrison_system_pathfinding as pathfinding;
use garrison_system_unit_control as unit_control;
use log::info;

use crate::{scenario::Scenario, session::Session};

/// Command-line arguments for the Garrison simulation.
#[derive(Debug, Parser)]
#[command(name = "garrison", about = "Runs a scripted Garrison board headlessly")]
struct CliArgs {
    /// JSON scenario to replay; the built-in skirmish runs when omitted.
    #[arg(long, value_name = "PATH")]
    scenario: Option<PathBuf>,
    /// Simulated milliseconds advanced by a single wait tick.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
    /// Milliseconds a unit of speed 1 needs for one step.
    #[arg(long, default_value_t = 100)]
    step_ms: u64,
    /// Maximum predecessor links followed while rebuilding a path.
    #[arg(long, default_value_t = 100)]
    max_path_steps: usize,
}

/// Entry point for the Garrison command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CliArgs::parse();

    let scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::skirmish(),
    };
    let config = unit_control::Config::new(Duration::from_millis(args.step_ms))
        .with_path_config(pathfinding::Config::new(args.max_path_steps));

    let mut session = Session::new(&scenario, config, Duration::from_millis(args.tick_ms));
    info!(
        "running {} actions on a {}x{} board",
        scenario.actions.len(),
        scenario.columns,
        scenario.rows
    );
    session.run(&scenario)?;
    println!("{}", session.render());
    Ok(())
}
