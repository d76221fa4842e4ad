use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Optimize the scenario once and print the plan.
    #[clap(name = "optimize")]
    Optimize(Box<OptimizeArgs>),

    /// Keep optimizing the scenario every quarter and print the decisions till interrupted.
    #[clap(name = "run")]
    Run(Box<RunArgs>),
}

#[derive(Parser)]
pub struct InputArgs {
    /// Scenario with the forecasts, prices, and battery state.
    #[clap(long, env = "SCENARIO")]
    pub scenario: PathBuf,

    /// Optimizer and handler settings, defaults are used when omitted.
    #[clap(long, env = "SETTINGS")]
    pub settings: Option<PathBuf>,
}

#[derive(Parser)]
pub struct OptimizeArgs {
    #[clap(flatten)]
    pub input: InputArgs,
}

#[derive(Parser)]
pub struct RunArgs {
    #[clap(flatten)]
    pub input: InputArgs,

    /// Device cycle in seconds.
    #[clap(long = "cycle-secs", default_value = "1", env = "CYCLE_SECS")]
    pub cycle_secs: u64,
}

impl RunArgs {
    pub const fn cycle(&self) -> Duration {
        Duration::from_secs(self.cycle_secs)
    }
}
