//! Test plan structures and functions.
//!
//! Internally every load test is a series of test plan steps, each moving the number of
//! running users to a target over a time span.

use chrono::prelude::*;
use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;
use std::str::FromStr;
use std::time;

use crate::config::Configuration;
use crate::util;
use crate::{AttackPhase, LoadTest, LoadTestError, LoadTestRunState};

lazy_static! {
    // Each step of a test plan must be in the format "{users},{timespan}", white space is ignored.
    static ref TEST_PLAN_STEP: Regex =
        Regex::new(r"^\s*(\d+)\s*,\s*(\d+|((\d+?)h)?((\d+?)m)?((\d+?)s)?)\s*$")
            .expect("test plan regex is valid");
}

/// A ramp profile: a series of steps each indicating a number of users and a number of
/// milliseconds to reach that number in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPlan {
    /// Ordered `(users, milliseconds)` steps.
    pub steps: Vec<(usize, usize)>,
    // Which step of the test plan is currently running.
    pub(crate) current: usize,
}

/// Load tests launched using `--users`, `--startup-time`, `--hatch-rate`, and/or `--run-time` are
/// automatically converted to a test plan.
impl TestPlan {
    /// Create a new, empty TestPlan structure.
    pub fn new() -> TestPlan {
        TestPlan {
            steps: Vec::new(),
            current: 0,
        }
    }

    /// Build a test plan from current configuration.
    pub fn build(configuration: &Configuration) -> TestPlan {
        if let Some(test_plan) = configuration.test_plan.as_ref() {
            return TestPlan {
                steps: test_plan.steps.clone(),
                current: 0,
            };
        }

        let mut steps: Vec<(usize, usize)> = Vec::new();
        if let Some(users) = configuration.users {
            let startup_ms =
                util::parse_timespan(&configuration.startup_time).saturating_mul(1_000);
            if startup_ms > 0 {
                steps.push((users, startup_ms));
            } else {
                // Launch users at --hatch-rate users per second.
                let hatch_rate = util::get_hatch_rate(configuration.hatch_rate.clone());
                let ms_per_user = 1.0 / hatch_rate * 1_000.0;
                steps.push((users, (ms_per_user * users as f32) as usize));
            }

            // Hold the users for --run-time, then shut down as quickly as possible.
            let run_ms =
                util::parse_timespan(&configuration.run_time).saturating_mul(1_000);
            if run_ms > 0 {
                steps.push((users, run_ms));
                steps.push((0, 0));
            }
        }

        TestPlan { steps, current: 0 }
    }

    /// The total number of users launched over the whole test plan.
    ///
    /// # Example
    /// ```rust
    /// use parkload::test_plan::TestPlan;
    ///
    /// let test_plan: TestPlan = "10,1m;5,1m;20,1m;0,30s".parse().unwrap();
    /// assert_eq!(test_plan.total_users(), 25);
    /// ```
    pub fn total_users(&self) -> usize {
        let mut total_users: usize = 0;
        let mut previous: usize = 0;
        for step in &self.steps {
            if step.0 > previous {
                total_users += step.0 - previous;
            }
            previous = step.0
        }
        total_users
    }
}

impl Default for TestPlan {
    fn default() -> Self {
        TestPlan::new()
    }
}

/// Convert `"users,timespan;users,timespan"` formatted test plans to a [`TestPlan`].
///
/// Users are represented simply as an integer.
///
/// Time span can be specified as an integer, indicating seconds. Or can use integers together
/// with one or more of "h", "m", and "s", in that order, indicating "hours", "minutes", and
/// "seconds". Valid formats include: 20, 20s, 3m, 2h, 1h20m, 3h30m10s, etc.
impl FromStr for TestPlan {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut steps: Vec<(usize, usize)> = Vec::new();
        for line in s.split(';') {
            let step = TEST_PLAN_STEP.captures(line).and_then(|cap| {
                let users = cap[1].parse::<usize>().ok()?;
                Some((users, util::parse_timespan(&cap[2]).saturating_mul(1_000)))
            });
            match step {
                Some(step) => steps.push(step),
                None => {
                    // Logger isn't initialized yet, provide helpful debug output.
                    eprintln!("ERROR: invalid --test-plan value: '{}'", line);
                    eprintln!("  Expected format: --test-plan \"{{users}},{{timespan}};{{users}},{{timespan}}\"");
                    eprintln!("    {{users}} must be an integer, ie \"50\"");
                    eprintln!("    {{timespan}} can be integer seconds or \"30s\", \"2m\", \"1h\", \"1h30m\", etc");
                    return Err(LoadTestError::InvalidOption {
                        option: "--test-plan".to_string(),
                        value: line.to_string(),
                        detail: "invalid --test-plan value.".to_string(),
                    });
                }
            }
        }
        Ok(TestPlan { steps, current: 0 })
    }
}

/// A test plan is a series of steps performing one of the following actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestPlanStepAction {
    /// A test plan step that is increasing the number of users.
    Increasing,
    /// A test plan step that is maintaining the number of users.
    Maintaining,
    /// A test plan step that is decreasing the number of users.
    Decreasing,
    /// A test plan step that is canceling all users.
    Canceling,
    /// The final step indicating that the load test is finished.
    Finished,
}

/// A historical record of a single test plan step.
#[derive(Clone, Debug)]
pub struct TestPlanHistory {
    /// What action happened in this step.
    pub action: TestPlanStepAction,
    /// A timestamp of when the step started.
    pub timestamp: DateTime<Utc>,
    /// The number of users when the step started.
    pub users: usize,
}
impl TestPlanHistory {
    /// A helper to record a new test plan step in the historical record.
    pub(crate) fn step(action: TestPlanStepAction, users: usize) -> TestPlanHistory {
        TestPlanHistory {
            action,
            timestamp: Utc::now(),
            users,
        }
    }
}

impl LoadTest {
    // Advance the active load test to the next test plan step.
    pub(crate) fn advance_test_plan(&mut self, run_state: &mut LoadTestRunState) {
        self.test_plan.current += 1;
        self.enter_test_plan_step(run_state);
    }

    // Start the current test plan step, choosing the attack phase that reaches its target.
    pub(crate) fn enter_test_plan_step(&mut self, run_state: &mut LoadTestRunState) {
        // Record the instant this new step starts, for use with timers.
        self.step_started = Some(time::Instant::now());
        run_state.step_changed_users = 0;

        let previous = self.step_starting_users();

        // Past the final step: shut down if it left 0 users, otherwise hold them until canceled.
        if self.test_plan.current >= self.test_plan.steps.len() {
            let last = self.test_plan.steps.last().map(|step| step.0).unwrap_or(0);
            if last == 0 {
                self.set_attack_phase(run_state, AttackPhase::Shutdown);
            } else {
                self.set_attack_phase(run_state, AttackPhase::Maintain);
            }
            return;
        }

        let action = match previous.cmp(&self.test_plan.steps[self.test_plan.current].0) {
            Ordering::Less => {
                self.set_attack_phase(run_state, AttackPhase::Increase);
                TestPlanStepAction::Increasing
            }
            Ordering::Greater => {
                self.set_attack_phase(run_state, AttackPhase::Decrease);
                TestPlanStepAction::Decreasing
            }
            Ordering::Equal => {
                self.set_attack_phase(run_state, AttackPhase::Maintain);
                TestPlanStepAction::Maintaining
            }
        };
        debug!(
            "test plan step {}: {:?} from {} users",
            self.test_plan.current + 1,
            action,
            previous
        );

        self.metrics
            .history
            .push(TestPlanHistory::step(action, previous));
    }
}
