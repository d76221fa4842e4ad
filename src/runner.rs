//! Background run-loop that keeps the published schedule up to date.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use chrono::{DateTime, Local};
use parking_lot::{Condvar, Mutex, RwLock};
use rayon::ThreadPool;

use crate::{
    core::{
        context::Context,
        deadline::{QUARTER, round_down_to_quarter},
        error::InputUnavailable,
        mode::{AppliedMode, ModeCombinations},
        optimizer::{Diagnostics, Optimizer, Outcome},
        pool,
        solution::SimulationResult,
    },
    handler::{self, ScheduleHandler},
    prelude::*,
    provider::InputProvider,
    query::{History, ScheduleRow, window},
    settings::OptimizerSettings,
};

/// State shared between the run-loop and its readers.
#[derive(Default)]
struct Shared {
    result: RwLock<Arc<SimulationResult>>,
    diagnostics: RwLock<Option<Diagnostics>>,
    history: Mutex<History>,

    /// Stops the running optimization at the next generation.
    interrupt: AtomicBool,

    shutdown: AtomicBool,
    is_woken: Mutex<bool>,
    wakeup: Condvar,
}

impl Shared {
    fn current(&self) -> Arc<SimulationResult> {
        Arc::clone(&self.result.read())
    }

    fn publish(&self, result: Arc<SimulationResult>) {
        *self.result.write() = result;
    }

    fn wake(&self) {
        *self.is_woken.lock() = true;
        self.wakeup.notify_all();
    }

    /// Sleep until the timeout or a wake-up, whichever comes first.
    ///
    /// Returns `true` when woken up or shutting down.
    fn sleep(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut is_woken = self.is_woken.lock();
        while !*is_woken
            && !self.is_shutting_down()
            && !self.wakeup.wait_until(&mut is_woken, deadline).timed_out()
        {}
        std::mem::take(&mut *is_woken) || self.is_shutting_down()
    }

    /// Forget the pending interrupt and wake-up before a fresh cycle.
    ///
    /// The interrupt survives when the shutdown has already been requested.
    fn rearm(&self) {
        self.interrupt.store(false, Ordering::SeqCst);
        *self.is_woken.lock() = false;
        if self.is_shutting_down() {
            self.interrupt.store(true, Ordering::SeqCst);
        }
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

enum Cycle {
    Completed,
    Interrupted,

    /// The inputs stayed unavailable, retry at the next quarter.
    GaveUp,
}

#[derive(bon::Builder)]
pub struct Scheduler {
    provider: Arc<dyn InputProvider>,

    #[builder(default)]
    handlers: Vec<Arc<dyn ScheduleHandler>>,

    settings: OptimizerSettings,
}

impl Scheduler {
    /// Publish the default schedule and start the run-loop thread.
    pub fn spawn(self) -> Result<SchedulerHandle> {
        let shared = Arc::new(Shared::default());
        shared.publish(Arc::new(SimulationResult::with_defaults(&self.combinations())));
        let pool = pool::build()?;

        let thread = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("optimizer".to_owned())
                .spawn(move || self.run(&shared, pool.as_ref()))
                .context("failed to spawn the optimizer thread")?
        };
        Ok(SchedulerHandle { shared, thread: Some(thread) })
    }

    fn run(&self, shared: &Shared, pool: Option<&ThreadPool>) {
        info!(n_handlers = self.handlers.len(), "started");
        let mut is_cold_start = true;

        while !shared.is_shutting_down() {
            shared.rearm();
            match self.cycle(shared, pool, is_cold_start) {
                Ok(Cycle::Completed) => {
                    is_cold_start = false;
                    shared.sleep(till_next_quarter(Local::now()));
                }
                Ok(Cycle::Interrupted) => {
                    info!("restarting the cycle");
                }
                Ok(Cycle::GaveUp) => {
                    shared.sleep(till_next_quarter(Local::now()));
                }
                Err(error) => {
                    error!("cycle failed: {error:#}");
                    shared.sleep(self.settings.retry_delay());
                }
            }
        }

        info!("stopped");
    }

    #[instrument(skip_all)]
    fn cycle(&self, shared: &Shared, pool: Option<&ThreadPool>, is_cold_start: bool) -> Result<Cycle> {
        let combinations = Arc::new(self.combinations());
        let Some(context) = self.build_context(shared, &combinations, is_cold_start)? else {
            return Ok(Cycle::GaveUp);
        };

        let (outcome, diagnostics) = Optimizer::builder()
            .context(&context)
            .settings(&self.settings)
            .maybe_pool(pool)
            .interrupt(&shared.interrupt)
            .now(Local::now())
            .build()
            .run()?;
        let mut result = match outcome {
            Outcome::Optimized(result) | Outcome::Skipped(result) => result,
            Outcome::Interrupted => return Ok(Cycle::Interrupted),
        };

        let now = Local::now();
        result.keep_active_step(&shared.current(), now);
        let result = Arc::new(result);
        shared.publish(Arc::clone(&result));
        *shared.diagnostics.write() = Some(diagnostics);
        info!(n_steps = result.steps.len(), total_cost = %result.total_cost(), "published");

        for handler in &self.handlers {
            handler.apply(&result.schedule_of(handler.id()));
        }
        shared.history.lock().record(&result, now);
        Ok(Cycle::Completed)
    }

    /// Build the context, retrying while the inputs are unavailable.
    ///
    /// Gives up after the configured number of attempts during the cold start,
    /// or on shutdown. A reschedule during the retry delay retries at once.
    fn build_context(
        &self,
        shared: &Shared,
        combinations: &Arc<ModeCombinations>,
        is_cold_start: bool,
    ) -> Result<Option<Context>> {
        let mut n_attempts = 0;
        loop {
            let previous = Some(shared.current()).filter(|previous| !previous.is_empty());
            let context = self.provider.snapshot(Local::now()).and_then(|snapshot| {
                Context::builder()
                    .snapshot(&snapshot)
                    .settings(&self.settings)
                    .combinations(Arc::clone(combinations))
                    .maybe_previous(previous)
                    .build()
            });
            match context {
                Ok(context) => return Ok(Some(context)),
                Err(error) if InputUnavailable::is_cause_of(&error) => {
                    n_attempts += 1;
                    warn!(n_attempts, is_cold_start, "{error:#}");
                    shared.publish(Arc::new(SimulationResult::empty()));
                    if is_cold_start && n_attempts >= self.settings.cold_start_attempts {
                        warn!("giving up till the next quarter");
                        return Ok(None);
                    }
                    if shared.sleep(self.settings.retry_delay()) {
                        if shared.is_shutting_down() {
                            return Ok(None);
                        }
                        shared.rearm();
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn combinations(&self) -> ModeCombinations {
        ModeCombinations::build(handler::describe(&self.handlers), &self.settings.forbidden)
    }
}

fn till_next_quarter(now: DateTime<Local>) -> Duration {
    (round_down_to_quarter(now) + QUARTER - now).to_std().unwrap_or_default()
}

/// Reader side of a running [`Scheduler`].
///
/// Dropping the handle stops the run-loop.
pub struct SchedulerHandle {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn current(&self) -> Arc<SimulationResult> {
        self.shared.current()
    }

    /// Modes that must be applied right now.
    pub fn current_modes(&self, now: DateTime<Local>) -> Vec<AppliedMode> {
        self.current().modes_at(now).map(<[AppliedMode]>::to_vec).unwrap_or_default()
    }

    /// Abort the running optimization and start a new cycle.
    pub fn trigger_reschedule(&self) {
        info!("rescheduling…");
        self.shared.interrupt.store(true, Ordering::SeqCst);
        self.shared.wake();
    }

    /// Diagnostics of the last published optimization.
    pub fn diagnostics(&self) -> Option<Diagnostics> {
        *self.shared.diagnostics.read()
    }

    pub fn query(&self, now: DateTime<Local>) -> Vec<ScheduleRow> {
        let result = self.current();
        window(&self.shared.history.lock(), &result, now)
    }

    pub fn shutdown(mut self) -> Result {
        self.stop()
    }

    fn stop(&mut self) -> Result {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.interrupt.store(true, Ordering::SeqCst);
        self.shared.wake();
        thread.join().map_err(|_| anyhow::anyhow!("the optimizer thread panicked"))
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            error!("{error:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use enumset::EnumSet;

    use super::*;
    use crate::{
        core::context::fixtures::snapshot,
        handler::ess::EssHandler,
        provider::InputSnapshot,
        settings::EssSettings,
    };

    #[derive(Default)]
    struct TestProvider {
        n_calls: AtomicUsize,

        /// Number of the first calls that miss the battery telemetry.
        n_unavailable: usize,

        latency: Duration,
    }

    impl TestProvider {
        fn unavailable(n_unavailable: usize) -> Self {
            Self { n_unavailable, ..Self::default() }
        }

        fn n_calls(&self) -> usize {
            self.n_calls.load(Ordering::Relaxed)
        }
    }

    impl InputProvider for TestProvider {
        fn snapshot(&self, now: DateTime<Local>) -> Result<InputSnapshot> {
            let n_calls = self.n_calls.fetch_add(1, Ordering::Relaxed);
            thread::sleep(self.latency);
            let prices = [10.0, 10.0, 10.0, 90.0, 90.0, 90.0, 50.0, 50.0];
            let mut snapshot = snapshot(now, &[0; 8], &[2_000; 8], &prices);
            if n_calls < self.n_unavailable {
                snapshot.battery = None;
            }
            Ok(snapshot)
        }
    }

    fn settings() -> OptimizerSettings {
        OptimizerSettings {
            max_generations: Some(5),
            seed: Some(42),
            retry_delay_secs: 0,
            cold_start_attempts: 2,
            ..OptimizerSettings::default()
        }
    }

    fn wait_for(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(30);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn publishes_and_applies() {
        let ess = Arc::new(EssHandler::new(EssSettings::default(), EnumSet::all()));
        let handle = Scheduler::builder()
            .provider(Arc::new(TestProvider::default()))
            .handlers(vec![Arc::clone(&ess) as Arc<dyn ScheduleHandler>])
            .settings(settings())
            .build()
            .spawn()
            .unwrap();
        wait_for(|| handle.diagnostics().is_some());

        let now = Local::now();
        assert_eq!(handle.current().steps.len(), 8);
        let modes = handle.current_modes(now);
        assert_eq!(modes.len(), 1);
        assert_eq!(modes[0].handler, "ess0");
        assert_eq!(ess.mode_at(now).as_str(), modes[0].mode);
        assert_eq!(handle.query(now).len(), 8);
        handle.shutdown().unwrap();
    }

    #[test]
    fn battery_defaults_to_balancing() {
        let provider = Arc::new(TestProvider::unavailable(usize::MAX));
        let ess = Arc::new(EssHandler::new(EssSettings::default(), EnumSet::all()));
        let scheduler = Scheduler::builder()
            .provider(provider)
            .handlers(vec![ess as Arc<dyn ScheduleHandler>])
            .settings(settings())
            .build();
        let defaults = SimulationResult::with_defaults(&scheduler.combinations()).defaults;
        assert_eq!(defaults, [AppliedMode { handler: "ess0".to_owned(), mode: "BALANCING".to_owned() }]);
    }

    #[test]
    fn unavailable_inputs_publish_empty() {
        let provider = Arc::new(TestProvider::unavailable(usize::MAX));
        let ess = Arc::new(EssHandler::new(EssSettings::default(), EnumSet::all()));
        let handle = Scheduler::builder()
            .provider(Arc::clone(&provider) as Arc<dyn InputProvider>)
            .handlers(vec![ess as Arc<dyn ScheduleHandler>])
            .settings(settings())
            .build()
            .spawn()
            .unwrap();
        wait_for(|| provider.n_calls() >= 2);
        wait_for(|| handle.current().defaults.is_empty());

        assert!(handle.current().is_empty());
        assert!(handle.diagnostics().is_none());
        assert!(handle.current_modes(Local::now()).is_empty());
        handle.shutdown().unwrap();
    }

    #[test]
    fn reschedule_starts_new_cycle() {
        let provider = Arc::new(TestProvider::default());
        let handle = Scheduler::builder()
            .provider(Arc::clone(&provider) as Arc<dyn InputProvider>)
            .settings(settings())
            .build()
            .spawn()
            .unwrap();
        wait_for(|| handle.diagnostics().is_some());
        let n_calls = provider.n_calls();

        handle.trigger_reschedule();
        wait_for(|| provider.n_calls() > n_calls);
        handle.shutdown().unwrap();
    }

    #[test]
    fn reschedule_skips_retry_delay() {
        let provider = Arc::new(TestProvider::unavailable(1));
        let handle = Scheduler::builder()
            .provider(Arc::clone(&provider) as Arc<dyn InputProvider>)
            .settings(OptimizerSettings { retry_delay_secs: 600, cold_start_attempts: 10, ..settings() })
            .build()
            .spawn()
            .unwrap();
        wait_for(|| provider.n_calls() >= 1);

        handle.trigger_reschedule();
        wait_for(|| handle.diagnostics().is_some());
        assert_eq!(provider.n_calls(), 2);
        handle.shutdown().unwrap();
    }

    #[test]
    fn reschedule_during_pass_runs_one_extra_cycle() {
        let provider = Arc::new(TestProvider { latency: Duration::from_millis(500), ..TestProvider::default() });
        let handle = Scheduler::builder()
            .provider(Arc::clone(&provider) as Arc<dyn InputProvider>)
            .settings(settings())
            .build()
            .spawn()
            .unwrap();
        wait_for(|| provider.n_calls() >= 1);

        handle.trigger_reschedule();
        wait_for(|| handle.diagnostics().is_some());
        thread::sleep(Duration::from_secs(2));
        assert_eq!(provider.n_calls(), 2);
        handle.shutdown().unwrap();
    }

    #[test]
    fn rearm_forgets_pending_wakeup() {
        let shared = Shared::default();
        shared.interrupt.store(true, Ordering::Relaxed);
        shared.wake();
        shared.rearm();
        assert!(!shared.interrupt.load(Ordering::Relaxed));
        assert!(!shared.sleep(Duration::ZERO));
    }

    #[test]
    fn wakeup_interrupts_sleep() {
        let shared = Shared::default();
        shared.wake();
        assert!(shared.sleep(Duration::from_secs(60)));
        assert!(!shared.sleep(Duration::ZERO));

        shared.shutdown.store(true, Ordering::SeqCst);
        shared.rearm();
        assert!(shared.interrupt.load(Ordering::SeqCst));
        assert!(shared.sleep(Duration::from_secs(60)));
    }
}
