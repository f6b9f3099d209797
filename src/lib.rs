//! # Parkload
//!
//! Parkload load tests vehicle parking services. Each simulated user repeatedly parks
//! and unparks vehicles against a parking service's HTTP API, checking that every
//! request returns `200 OK` and remembering which vehicles it parked so it can unpark
//! them later.
//!
//! The crate is two layers:
//!  - a small load test engine: a [`LoadTest`] ramps virtual users up and down
//!    following a [`TestPlan`](./test_plan/struct.TestPlan.html), each
//!    [`VirtualUser`](./user/struct.VirtualUser.html) runs a
//!    [`Scenario`](./scenario/trait.Scenario.html) in its own tokio task, and all
//!    request and check results are aggregated into [`Metrics`](./metrics/struct.Metrics.html).
//!  - the [`ParkingScenario`](./parking/struct.ParkingScenario.html), which chooses between
//!    parking (40% of iterations) and unparking (60%) and tracks a per-user FIFO queue of
//!    parked vehicle numbers.
//!
//! ## Running the parking load test
//!
//! The bundled binary runs the parking scenario against `http://localhost:8080` with a
//! test plan that ramps up to 50 users over 2 minutes, holds for 5 minutes, and ramps
//! back down over 2 minutes:
//!
//! ```bash
//! $ cargo run --release -- --host http://parking.local -v
//! ```
//!
//! The host can also be set with the `PARKLOAD_HOST` environment variable, and the
//! ramp profile replaced with `--test-plan "10,30s;10,1m;0,10s"`.
//!
//! ## Using the engine from code
//!
//! ```rust,no_run
//! use parkload::prelude::*;
//!
//! fn main() -> Result<(), LoadTestError> {
//!     LoadTest::initialize()?
//!         .set_scenario(ParkingScenario::default())
//!         .set_default(LoadTestDefault::Host, "http://localhost:8080")?
//!         .set_default(LoadTestDefault::TestPlan, "5,10s;5,30s;0,5s")?
//!         .execute()?
//!         .print();
//!
//!     Ok(())
//! }
//! ```

#[macro_use]
extern crate log;

pub mod config;
pub mod logger;
pub mod metrics;
pub mod parking;
pub mod prelude;
pub mod scenario;
pub mod test_plan;
pub mod user;
pub mod util;

use chrono::prelude::*;
use gumdrop::Options;
use lazy_static::lazy_static;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::{fmt, io, time};

use crate::config::{Configuration, Defaults};
use crate::logger::{LoggerHandle, LoggerTx};
use crate::metrics::{Metric, Metrics};
use crate::scenario::Scenario;
use crate::test_plan::{TestPlan, TestPlanHistory, TestPlanStepAction};
use crate::user::{UserCommand, VirtualUser};

// Shared with the ctrl-c handler, which can only be installed once per process.
lazy_static! {
    static ref CANCELED: RwLock<bool> = RwLock::new(false);
}

/// Type-erased launcher that runs the registered [`Scenario`] for one
/// [`VirtualUser`] until it is told to exit.
pub(crate) type UserFunction = Arc<
    dyn Fn(VirtualUser, flume::Receiver<UserCommand>) -> Pin<Box<dyn Future<Output = ()> + Send>>
        + Send
        + Sync,
>;

// Applies the final configuration to the registered scenario, then wraps it in a
// UserFunction.
type ScenarioBuilder =
    Box<dyn FnOnce(&Configuration) -> Result<UserFunction, LoadTestError> + Send>;

/// An enumeration of all errors a [`LoadTest`] can return.
#[derive(Debug)]
pub enum LoadTestError {
    /// Wraps a [`std::io::Error`].
    Io(io::Error),
    /// Wraps a [`reqwest::Error`].
    Reqwest(reqwest::Error),
    /// Wraps a [`tokio::task::JoinError`].
    TokioJoin(tokio::task::JoinError),
    /// Failed to parse a hostname.
    InvalidHost {
        /// The invalid hostname that caused this error.
        host: String,
        /// An optional explanation of the error.
        detail: String,
        /// Wraps a [`url::ParseError`].
        parse_error: url::ParseError,
    },
    /// Invalid option or value specified, may only be invalid in context.
    InvalidOption {
        /// The invalid option that caused this error, may be only invalid in context.
        option: String,
        /// The invalid value that caused this error, may be only invalid in context.
        value: String,
        /// An optional explanation of the error.
        detail: String,
    },
    /// [`LoadTest`] has no [`Scenario`] registered.
    NoScenario {
        /// An optional explanation of the error.
        detail: String,
    },
}
impl LoadTestError {
    fn describe(&self) -> &str {
        match *self {
            LoadTestError::Io(_) => "io::Error",
            LoadTestError::Reqwest(_) => "reqwest::Error",
            LoadTestError::TokioJoin(_) => "tokio::task::JoinError",
            LoadTestError::InvalidHost { .. } => "failed to parse hostname",
            LoadTestError::InvalidOption { .. } => "invalid option or value specified",
            LoadTestError::NoScenario { .. } => "no scenario registered",
        }
    }
}

impl fmt::Display for LoadTestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LoadTestError::Io(ref source) => {
                write!(f, "LoadTestError: {} ({})", self.describe(), source)
            }
            LoadTestError::Reqwest(ref source) => {
                write!(f, "LoadTestError: {} ({})", self.describe(), source)
            }
            LoadTestError::TokioJoin(ref source) => {
                write!(f, "LoadTestError: {} ({})", self.describe(), source)
            }
            LoadTestError::InvalidHost {
                ref host,
                ref parse_error,
                ..
            } => write!(
                f,
                "LoadTestError: {} {} ({})",
                self.describe(),
                host,
                parse_error
            ),
            LoadTestError::InvalidOption {
                ref option,
                ref value,
                ref detail,
            } => write!(
                f,
                "LoadTestError: {} {}={:?}: {}",
                self.describe(),
                option,
                value,
                detail
            ),
            LoadTestError::NoScenario { ref detail } => {
                write!(f, "LoadTestError: {}: {}", self.describe(), detail)
            }
        }
    }
}

impl std::error::Error for LoadTestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            LoadTestError::Io(ref source) => Some(source),
            LoadTestError::Reqwest(ref source) => Some(source),
            LoadTestError::TokioJoin(ref source) => Some(source),
            LoadTestError::InvalidHost {
                ref parse_error, ..
            } => Some(parse_error),
            _ => None,
        }
    }
}

/// Auto-convert Reqwest errors.
impl From<reqwest::Error> for LoadTestError {
    fn from(err: reqwest::Error) -> LoadTestError {
        LoadTestError::Reqwest(err)
    }
}

/// Auto-convert IO errors.
impl From<io::Error> for LoadTestError {
    fn from(err: io::Error) -> LoadTestError {
        LoadTestError::Io(err)
    }
}

/// Auto-convert TokioJoin errors.
impl From<tokio::task::JoinError> for LoadTestError {
    fn from(err: tokio::task::JoinError) -> LoadTestError {
        LoadTestError::TokioJoin(err)
    }
}

/// A [`LoadTest`] moves through the following phases, driven by its
/// [`TestPlan`](./test_plan/struct.TestPlan.html).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttackPhase {
    /// No load test is running.
    Idle,
    /// [`VirtualUser`]s are launching.
    Increase,
    /// The number of running [`VirtualUser`]s is held steady.
    Maintain,
    /// [`VirtualUser`]s are being told to exit.
    Decrease,
    /// All [`VirtualUser`]s are stopping and the load test is exiting.
    Shutdown,
}

/// Internal run state for a load test in progress.
struct LoadTestRunState {
    /// Subtracted from the time spent sleeping to avoid drift in regular events.
    drift_timer: tokio::time::Instant,
    /// Unbounded sender cloned into every [`VirtualUser`] to send metrics to the parent.
    all_users_metrics_tx: flume::Sender<Metric>,
    /// Unbounded receiver used by the parent to collect metrics.
    metrics_rx: flume::Receiver<Metric>,
    /// Request logger task, if enabled.
    logger_handle: LoggerHandle,
    /// Sender cloned into every [`VirtualUser`] to reach the request logger, if enabled.
    all_users_logger_tx: LoggerTx,
    /// Tasks of all running [`VirtualUser`]s, in launch order.
    users: Vec<tokio::task::JoinHandle<()>>,
    /// Control channels of all running [`VirtualUser`]s, aligned with `users`.
    user_channels: Vec<flume::Sender<UserCommand>>,
    /// Users told to exit during a decrease step, joined when the step completes.
    stopping_users: Vec<tokio::task::JoinHandle<()>>,
    /// Users launched or stopped during the current test plan step.
    step_changed_users: usize,
    /// Running count of launched users, used to number them.
    launched_users: usize,
    /// Timer tracking when to display running metrics, if enabled.
    running_metrics_timer: time::Instant,
}

/// Global internal state for the load test.
pub struct LoadTest {
    /// Configures the registered scenario and builds its UserFunction.
    scenario_builder: Option<ScenarioBuilder>,
    /// Name of the registered scenario.
    scenario_name: String,
    /// Optional default values for run-time options.
    defaults: Defaults,
    /// Configuration object holding options set when launching the load test.
    configuration: Configuration,
    /// The ramp profile this load test follows.
    test_plan: TestPlan,
    /// Which phase the load test is currently operating in.
    attack_phase: AttackPhase,
    /// When the current test plan step started.
    step_started: Option<time::Instant>,
    /// When the load test started.
    started: Option<time::Instant>,
    /// All metrics merged together.
    metrics: Metrics,
}
impl LoadTest {
    /// Load configuration from the command line and initialize a [`LoadTest`].
    ///
    /// # Example
    /// ```rust
    /// use parkload::prelude::*;
    ///
    /// let load_test = LoadTest::initialize();
    /// ```
    pub fn initialize() -> Result<LoadTest, LoadTestError> {
        Ok(LoadTest::initialize_with_config(
            Configuration::parse_args_default_or_exit(),
        ))
    }

    /// Initialize a [`LoadTest`] with an already loaded configuration.
    ///
    /// # Example
    /// ```rust
    /// use parkload::config::Configuration;
    /// use parkload::LoadTest;
    ///
    /// let load_test = LoadTest::initialize_with_config(Configuration::default());
    /// ```
    pub fn initialize_with_config(configuration: Configuration) -> LoadTest {
        LoadTest {
            scenario_builder: None,
            scenario_name: String::new(),
            defaults: Defaults::default(),
            configuration,
            test_plan: TestPlan::new(),
            attack_phase: AttackPhase::Idle,
            step_started: None,
            started: None,
            metrics: Metrics::default(),
        }
    }

    /// Register the [`Scenario`] every [`VirtualUser`] runs.
    ///
    /// Each user gets its own state from [`Scenario::on_start`], which is then passed
    /// into every iteration that user runs. [`Scenario::configure`] is called with the
    /// final configuration when the load test executes.
    pub fn set_scenario<S: Scenario>(mut self, mut scenario: S) -> Self {
        self.scenario_name = scenario.name().to_string();
        self.scenario_builder = Some(Box::new(
            move |configuration: &Configuration| -> Result<UserFunction, LoadTestError> {
                scenario.configure(configuration)?;
                let scenario = Arc::new(scenario);
                let user_function: UserFunction = Arc::new(
                    move |user: VirtualUser, receiver: flume::Receiver<UserCommand>| {
                        Box::pin(user::user_main(scenario.clone(), user, receiver))
                            as Pin<Box<dyn Future<Output = ()> + Send>>
                    },
                );
                Ok(user_function)
            },
        ));
        self
    }

    // Change from one attack_phase to another.
    fn set_attack_phase(&mut self, run_state: &mut LoadTestRunState, phase: AttackPhase) {
        if self.attack_phase == phase {
            return;
        }

        // The drift timer starts at 0 any time the phase is changed.
        run_state.drift_timer = tokio::time::Instant::now();

        info!("entering LoadTest phase: {:?}", &phase);
        self.attack_phase = phase;
    }

    /// Execute the [`LoadTest`], returning the collected [`Metrics`].
    ///
    /// Builds a multi-threaded tokio runtime and blocks until the test plan completes,
    /// every user finishes its configured iterations, or ctrl-c is pressed.
    pub fn execute(mut self) -> Result<Metrics, LoadTestError> {
        if self.configuration.version {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            std::process::exit(0);
        }

        let build_user_function = match self.scenario_builder.take() {
            Some(builder) => builder,
            None => {
                return Err(LoadTestError::NoScenario {
                    detail: "A scenario must be registered with LoadTest::set_scenario()."
                        .to_string(),
                })
            }
        };

        // Apply defaults and precedence, then reject inconsistent options.
        self.configuration.configure(&self.defaults);
        self.configuration.validate()?;
        self.validate_host()?;
        let user_function = build_user_function(&self.configuration)?;
        info!(
            "running {} scenario against {}",
            self.scenario_name, self.configuration.host
        );

        self.test_plan = TestPlan::build(&self.configuration);
        if self.test_plan.steps.is_empty() {
            return Err(LoadTestError::InvalidOption {
                option: "--test-plan".to_string(),
                value: "".to_string(),
                detail: "The test plan must have at least one step.".to_string(),
            });
        }
        info!(
            "test plan: {:?} ({} users total)",
            self.test_plan.steps,
            self.test_plan.total_users()
        );

        let rt = tokio::runtime::Runtime::new()?;
        self = rt.block_on(self.start_attack(user_function))?;

        Ok(self.metrics)
    }

    // Returns Ok(()) if the configured host is valid.
    fn validate_host(&self) -> Result<(), LoadTestError> {
        if self.configuration.host.is_empty() {
            return Err(LoadTestError::InvalidOption {
                option: "--host".to_string(),
                value: "".to_string(),
                detail: "A host must be defined via the --host option, the PARKLOAD_HOST environment variable, or LoadTest.set_default().".to_string(),
            });
        }
        util::is_valid_host(&self.configuration.host)?;
        Ok(())
    }

    // Create a LoadTestRunState and do all initialization required to start.
    async fn initialize_attack(&mut self) -> Result<LoadTestRunState, LoadTestError> {
        trace!("initialize_attack");

        let (all_users_metrics_tx, metrics_rx): (flume::Sender<Metric>, flume::Receiver<Metric>) =
            flume::unbounded();

        let (logger_handle, all_users_logger_tx) = self.configuration.setup_request_logger().await?;

        util::setup_ctrlc_handler();

        self.metrics = Metrics::default();
        self.metrics.display_metrics =
            !self.configuration.no_metrics && !self.configuration.no_print_metrics;
        self.started = Some(time::Instant::now());
        self.metrics.started = Some(Local::now());

        Ok(LoadTestRunState {
            drift_timer: tokio::time::Instant::now(),
            all_users_metrics_tx,
            metrics_rx,
            logger_handle,
            all_users_logger_tx,
            users: Vec::new(),
            user_channels: Vec::new(),
            stopping_users: Vec::new(),
            step_changed_users: 0,
            launched_users: 0,
            running_metrics_timer: time::Instant::now(),
        })
    }

    /// The number of users active when the current step started.
    fn step_starting_users(&self) -> usize {
        if self.test_plan.current == 0 {
            0
        } else {
            self.test_plan.steps[self.test_plan.current - 1].0
        }
    }

    /// Milliseconds into the current step when the next user should be launched or
    /// stopped, given how many already were.
    fn next_user_change_ms(changed: usize, total: usize, duration: usize) -> usize {
        if total == 0 {
            return duration;
        }
        // Round up so that the user is never changed early.
        let next = (changed as u128 * duration as u128 + total as u128 - 1) / total as u128;
        next.min(duration as u128) as usize
    }

    // Launch a single VirtualUser in its own tokio task.
    fn spawn_user(
        &mut self,
        run_state: &mut LoadTestRunState,
        user_function: &UserFunction,
    ) -> Result<(), LoadTestError> {
        // Users are numbered from 1 as they're human-visible in the logs.
        run_state.launched_users += 1;
        let mut user = VirtualUser::new(
            run_state.launched_users,
            &self.configuration.host,
            &self.configuration,
        )?;
        user.channel_to_parent = Some(run_state.all_users_metrics_tx.clone());
        user.logger = run_state.all_users_logger_tx.clone();

        let (parent_sender, user_receiver): (
            flume::Sender<UserCommand>,
            flume::Receiver<UserCommand>,
        ) = flume::unbounded();
        run_state.user_channels.push(parent_sender);
        run_state
            .users
            .push(tokio::spawn(user_function(user, user_receiver)));

        self.metrics.users = self.metrics.users.max(run_state.users.len());
        Ok(())
    }

    // Tell the most recently launched VirtualUser to exit.
    fn stop_user(&mut self, run_state: &mut LoadTestRunState) {
        if let (Some(sender), Some(handle)) = (run_state.user_channels.pop(), run_state.users.pop())
        {
            if let Err(e) = sender.send(UserCommand::Exit) {
                info!("failed to tell user to exit: {}", e);
            }
            run_state.stopping_users.push(handle);
        }
    }

    // Launch VirtualUsers evenly across the current step's duration.
    async fn increase_attack(
        &mut self,
        run_state: &mut LoadTestRunState,
        user_function: &UserFunction,
    ) -> Result<(), LoadTestError> {
        let (target, duration) = self.test_plan.steps[self.test_plan.current];
        let total = target.saturating_sub(self.step_starting_users());
        let elapsed = self.step_elapsed_ms();

        let due = if duration == 0 {
            total
        } else {
            (total * elapsed / duration + 1).min(total)
        };
        while run_state.step_changed_users < due {
            self.spawn_user(run_state, user_function)?;
            run_state.step_changed_users += 1;
        }

        if run_state.step_changed_users >= total && elapsed >= duration {
            info!("launched {} users...", run_state.users.len());
            self.advance_test_plan(run_state);
            return Ok(());
        }

        let next = if run_state.step_changed_users < total {
            LoadTest::next_user_change_ms(run_state.step_changed_users, total, duration)
        } else {
            duration
        };
        self.sleep_until_step_ms(next, elapsed).await;
        Ok(())
    }

    // Stop VirtualUsers evenly across the current step's duration.
    async fn decrease_attack(&mut self, run_state: &mut LoadTestRunState) -> Result<(), LoadTestError> {
        let (target, duration) = self.test_plan.steps[self.test_plan.current];
        let total = self.step_starting_users().saturating_sub(target);
        let elapsed = self.step_elapsed_ms();

        let due = if duration == 0 {
            total
        } else {
            (total * elapsed / duration + 1).min(total)
        };
        while run_state.step_changed_users < due {
            self.stop_user(run_state);
            run_state.step_changed_users += 1;
        }

        if run_state.step_changed_users >= total && elapsed >= duration {
            let stopping = std::mem::take(&mut run_state.stopping_users);
            debug!("waiting for {} users to exit", stopping.len());
            futures::future::join_all(stopping).await;
            info!("{} users still running...", run_state.users.len());
            self.advance_test_plan(run_state);
            return Ok(());
        }

        let next = if run_state.step_changed_users < total {
            LoadTest::next_user_change_ms(run_state.step_changed_users, total, duration)
        } else {
            duration
        };
        self.sleep_until_step_ms(next, elapsed).await;
        Ok(())
    }

    // Hold the current number of VirtualUsers until the step ends. Past the final step
    // the users are held until the load test is canceled or the iterations complete.
    async fn maintain_attack(&mut self, run_state: &mut LoadTestRunState) {
        if self.test_plan.current < self.test_plan.steps.len() {
            let duration = self.test_plan.steps[self.test_plan.current].1;
            if self.step_elapsed_ms() >= duration {
                self.advance_test_plan(run_state);
                return;
            }
        }

        // Run the parent loop twice per second.
        run_state.drift_timer =
            util::sleep_minus_drift(time::Duration::from_millis(500), run_state.drift_timer).await;
    }

    fn step_elapsed_ms(&self) -> usize {
        self.step_started
            .map(|started| started.elapsed().as_millis() as usize)
            .unwrap_or(0)
    }

    // Sleep until `next` milliseconds into the step, waking at least every 500ms so
    // metrics keep flowing and ctrl-c is noticed.
    async fn sleep_until_step_ms(&self, next: usize, elapsed: usize) {
        let delay = next.saturating_sub(elapsed).min(500);
        if delay > 0 {
            tokio::time::sleep(time::Duration::from_millis(delay as u64)).await;
        }
    }

    // Tell all remaining VirtualUsers to exit, wait for them, and flush all output.
    async fn stop_attack(&mut self, run_state: &mut LoadTestRunState) -> Result<(), LoadTestError> {
        info!("stopping after {} seconds...", self.metrics.duration);
        for (index, send_to_user) in run_state.user_channels.iter().enumerate() {
            match send_to_user.send(UserCommand::Exit) {
                Ok(_) => {
                    debug!("telling user {} to exit", index + 1);
                }
                Err(e) => {
                    info!("failed to tell user {} to exit: {}", index + 1, e);
                }
            }
        }
        info!("waiting for users to exit");

        let mut users = std::mem::take(&mut run_state.users);
        users.append(&mut run_state.stopping_users);
        futures::future::join_all(users).await;
        run_state.user_channels.clear();
        debug!("all users exited");

        // If the logger task is enabled, tell it to flush and exit.
        if let Some(logger_tx) = run_state.all_users_logger_tx.take() {
            if let Err(e) = logger_tx.send(None) {
                warn!("unexpected error telling logger to exit: {}", e);
            }
        }
        if let Some(logger) = run_state.logger_handle.take() {
            logger.await??;
        }

        self.receive_metrics(run_state);
        self.update_duration();
        if self.metrics.history.last().map(|step| &step.action) != Some(&TestPlanStepAction::Finished)
        {
            self.metrics
                .history
                .push(TestPlanHistory::step(TestPlanStepAction::Finished, 0));
        }
        self.metrics.final_metrics = true;

        Ok(())
    }

    // All users have completed their configured iterations.
    fn iterations_complete(&self, run_state: &LoadTestRunState) -> bool {
        self.configuration.iterations > 0
            && self.attack_phase != AttackPhase::Increase
            && !run_state.users.is_empty()
            && run_state.users.iter().all(|user| user.is_finished())
    }

    // Called internally to run the load test from start to finish.
    async fn start_attack(mut self, user_function: UserFunction) -> Result<LoadTest, LoadTestError> {
        let mut run_state = self.initialize_attack().await?;

        // Enter the first test plan step.
        self.enter_test_plan_step(&mut run_state);

        loop {
            match self.attack_phase {
                AttackPhase::Idle => {
                    // Only reachable if the test plan could not be started.
                    self.set_attack_phase(&mut run_state, AttackPhase::Shutdown);
                }
                AttackPhase::Increase => {
                    self.increase_attack(&mut run_state, &user_function).await?;
                }
                AttackPhase::Maintain => {
                    self.maintain_attack(&mut run_state).await;
                }
                AttackPhase::Decrease => {
                    self.decrease_attack(&mut run_state).await?;
                }
                AttackPhase::Shutdown => {
                    self.stop_attack(&mut run_state).await?;
                    break;
                }
            }

            self.update_duration();
            self.receive_metrics(&mut run_state);

            if let Some(running_metrics) = self.configuration.running_metrics {
                if util::timer_expired(run_state.running_metrics_timer, running_metrics) {
                    run_state.running_metrics_timer = time::Instant::now();
                    self.metrics.print_running();
                }
            }

            if self.attack_phase != AttackPhase::Shutdown {
                if CANCELED.read().map(|c| *c).unwrap_or(false) {
                    self.cancel_test_plan(&mut run_state);
                } else if self.iterations_complete(&run_state) {
                    info!(
                        "all users completed {} iterations",
                        self.configuration.iterations
                    );
                    self.set_attack_phase(&mut run_state, AttackPhase::Shutdown);
                }
            }
        }

        Ok(self)
    }

    // Record the cancellation and shut down as quickly as possible.
    fn cancel_test_plan(&mut self, run_state: &mut LoadTestRunState) {
        self.metrics.history.push(TestPlanHistory::step(
            TestPlanStepAction::Canceling,
            run_state.users.len(),
        ));
        self.set_attack_phase(run_state, AttackPhase::Shutdown);
    }

    // Drain all metrics sent by VirtualUsers so far.
    fn receive_metrics(&mut self, run_state: &mut LoadTestRunState) {
        while let Ok(metric) = run_state.metrics_rx.try_recv() {
            self.metrics.record(metric);
        }
    }

    fn update_duration(&mut self) {
        if let Some(started) = self.started {
            self.metrics.duration = started.elapsed().as_secs() as usize;
        }
    }
}
