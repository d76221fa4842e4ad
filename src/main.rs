#![allow(clippy::doc_markdown)]

mod cli;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use chrono::Local;
use clap::{Parser, crate_version};
use ess_dispatch::{
    core::{
        context::Context,
        mode::ModeCombinations,
        optimizer::{Optimizer, Outcome},
        pool,
    },
    handler::{self, ScheduleHandler, ess::EssHandler},
    prelude::*,
    provider::InputProvider,
    runner::Scheduler,
    scenario::Scenario,
    settings::Settings,
    tables::{build_diagnostics_table, build_plan_table},
};
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command, InputArgs, OptimizeArgs, RunArgs};

fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .without_time()
        .compact()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    info!(version = crate_version!(), "starting…");

    match Args::parse().command {
        Command::Optimize(args) => optimize(&args)?,
        Command::Run(args) => run(&args)?,
    }

    info!("done!");
    Ok(())
}

struct Input {
    scenario: Arc<Scenario>,
    settings: Settings,
    ess: Arc<EssHandler>,
    handlers: Vec<Arc<dyn ScheduleHandler>>,
}

impl Input {
    fn read(args: &InputArgs) -> Result<Self> {
        let scenario = Arc::new(Scenario::read_from(&args.scenario)?);
        let settings = args.settings.as_deref().map_or_else(|| Ok(Settings::default()), Settings::read_from)?;
        let ess = Arc::new(EssHandler::new(settings.ess.clone(), settings.optimizer.battery_modes));
        let mut handlers: Vec<Arc<dyn ScheduleHandler>> = vec![Arc::clone(&ess) as _];
        handlers.extend(scenario.load_handlers());
        Ok(Self { scenario, settings, ess, handlers })
    }
}

#[instrument(skip_all)]
fn optimize(args: &OptimizeArgs) -> Result {
    let input = Input::read(&args.input)?;
    let now = Local::now();
    let combinations = Arc::new(ModeCombinations::build(
        handler::describe(&input.handlers),
        &input.settings.optimizer.forbidden,
    ));
    let context = Context::builder()
        .snapshot(&input.scenario.snapshot(now)?)
        .settings(&input.settings.optimizer)
        .combinations(combinations)
        .build()?;
    let pool = pool::build()?;
    let interrupt = AtomicBool::new(false);

    let (outcome, diagnostics) = Optimizer::builder()
        .context(&context)
        .settings(&input.settings.optimizer)
        .maybe_pool(pool.as_ref())
        .interrupt(&interrupt)
        .now(now)
        .build()
        .run()?;
    let (Outcome::Optimized(result) | Outcome::Skipped(result)) = outcome else {
        bail!("the optimization has been interrupted");
    };
    println!("{}", build_plan_table(&result));
    println!("{}", build_diagnostics_table(&diagnostics));
    Ok(())
}

#[instrument(skip_all)]
fn run(args: &RunArgs) -> Result {
    let input = Input::read(&args.input)?;
    let state_of_charge = input.scenario.battery.state_of_charge.unwrap_or_default();

    let should_terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&should_terminate))?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&should_terminate))?;

    let handle = Scheduler::builder()
        .provider(Arc::clone(&input.scenario) as Arc<dyn InputProvider>)
        .handlers(input.handlers)
        .settings(input.settings.optimizer)
        .build()
        .spawn()?;

    while !should_terminate.load(Ordering::Relaxed) {
        let now = Local::now();
        let set_point = input.ess.run(now, state_of_charge);
        let modes = handle.current_modes(now);
        info!(?set_point, ?modes, "decision");
        thread::sleep(args.cycle());
    }

    info!("terminating…");
    if let Some(diagnostics) = handle.diagnostics() {
        println!("{}", build_diagnostics_table(&diagnostics));
    }
    handle.shutdown()
}
