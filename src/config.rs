//! Functions and structures related to configuring a load test.
//!
//! A load test can be configured at run time by passing in the options and flags defined by
//! the [`Configuration`] structure, or programmatically with [`DefaultType::set_default`].
//!
//! Values are chosen in the following order: command line option, then environment (only
//! `PARKLOAD_HOST` for the host), then a programmatic default, then a built-in default.

use gumdrop::Options;
use simplelog::*;
use std::fmt;
use std::path::PathBuf;

use crate::logger::LogFormat;
use crate::test_plan::TestPlan;
use crate::util;
use crate::{LoadTest, LoadTestError};

/// Environment variable consulted for the host when `--host` isn't set.
pub const HOST_ENV: &str = "PARKLOAD_HOST";

/// Runtime options available when launching a load test.
///
/// Custom defaults can be programmatically set for most of these options using
/// [`DefaultType::set_default`].
#[derive(Options, Debug, Clone, Default)]
#[options(
    help = r#"Parkload simulates users parking and unparking vehicles against a parking service.

The following runtime options are available when launching a load test:"#
)]
pub struct Configuration {
    /// Displays this help
    #[options(short = "h")]
    pub help: bool,
    /// Prints version information
    #[options(short = "V", help = "Prints version information\n")]
    pub version: bool,

    /// Defines host to load test (ie http://localhost:8080)
    #[options(short = "H")]
    pub host: String,
    /// Sets concurrent users (default: 1)
    #[options(short = "u")]
    pub users: Option<usize>,
    /// Sets per-second user hatch rate (default: 1)
    #[options(short = "r", meta = "RATE")]
    pub hatch_rate: Option<String>,
    /// Starts users for up to (30s, 20m, 3h, 1h30m, etc)
    #[options(short = "s", meta = "TIME")]
    pub startup_time: String,
    /// Stops load test after (30s, 20m, 3h, 1h30m, etc)
    #[options(short = "t", meta = "TIME")]
    pub run_time: String,
    /// Defines a ramp profile ("50,2m;50,5m;0,2m")
    #[options(no_short, meta = "\"TESTPLAN\"")]
    pub test_plan: Option<TestPlan>,
    /// Sets how many times each user runs the scenario then exits
    #[options(no_short)]
    pub iterations: usize,
    /// Sets per-request timeout, in seconds (default: none)
    #[options(no_short, meta = "VALUE", help = "Sets per-request timeout, in seconds (default: none)\n\nScenario:")]
    pub timeout: Option<String>,

    /// Sets the share of iterations that park a vehicle (default: 0.4)
    #[options(no_short, meta = "RATIO")]
    pub park_ratio: Option<f64>,
    /// Sets the pause after each iteration (default: 1s)
    #[options(no_short, meta = "TIME", help = "Sets the pause after each iteration (default: 1s)\n\nLogging:")]
    pub pause: String,

    /// Enables log file and sets name
    #[options(short = "G", meta = "NAME")]
    pub log_file: String,
    /// Increases log file level (-g, -gg, etc)
    #[options(short = "g", count)]
    pub log_level: u8,
    /// Decreases verbosity (-q, -qq, etc)
    #[options(count, short = "q")]
    pub quiet: u8,
    /// Increases verbosity (-v, -vv, etc)
    #[options(count, short = "v", help = "Increases verbosity (-v, -vv, etc)\n\nMetrics:")]
    pub verbose: u8,

    /// How often to optionally print running metrics, in seconds
    #[options(no_short, meta = "TIME")]
    pub running_metrics: Option<usize>,
    /// Doesn't track metrics
    #[options(no_short)]
    pub no_metrics: bool,
    /// Doesn't display metrics at end of load test
    #[options(no_short)]
    pub no_print_metrics: bool,
    /// Sets request log file name
    #[options(short = "R", meta = "NAME")]
    pub request_log: String,
    /// Sets request log format (json, csv, raw)
    #[options(no_short, meta = "FORMAT")]
    pub request_format: Option<LogFormat>,
}

/// Optional default values for run-time options.
///
/// These custom defaults can be configured using [`DefaultType::set_default()`].
#[derive(Clone, Debug, Default)]
pub(crate) struct Defaults {
    /// An optional default host to run this load test against.
    pub host: Option<String>,
    /// An optional default number of users to simulate.
    pub users: Option<usize>,
    /// An optional default number of users to start per second.
    pub hatch_rate: Option<String>,
    /// An optional default number of seconds for the test to start.
    pub startup_time: Option<usize>,
    /// An optional default number of seconds for the test to run.
    pub run_time: Option<usize>,
    /// An optional default test plan.
    pub test_plan: Option<TestPlan>,
    /// An optional default number of iterations per user.
    pub iterations: Option<usize>,
    /// An optional default number of seconds to timeout requests.
    pub timeout: Option<String>,
    /// An optional default log file level.
    pub log_level: Option<u8>,
    /// An optional default for the log file name.
    pub log_file: Option<String>,
    /// An optional default value for quiet level.
    pub quiet: Option<u8>,
    /// An optional default value for verbosity level.
    pub verbose: Option<u8>,
    /// An optional default for printing running metrics.
    pub running_metrics: Option<usize>,
    /// An optional default for not tracking metrics.
    pub no_metrics: Option<bool>,
    /// An optional default for not displaying metrics at the end of the load test.
    pub no_print_metrics: Option<bool>,
    /// An optional default for the request log file name.
    pub request_log: Option<String>,
    /// An optional default for the request log file format.
    pub request_format: Option<LogFormat>,
}

/// All [`Configuration`] options that can be programmatically configured with a custom
/// default.
#[derive(Debug)]
pub enum LoadTestDefault {
    /// An optional default host to run this load test against.
    Host,
    /// An optional default number of users to simulate.
    Users,
    /// An optional default number of users to start per second.
    HatchRate,
    /// An optional default number of seconds for the test to start up.
    StartupTime,
    /// An optional default number of seconds for the test to run.
    RunTime,
    /// An optional default test plan.
    TestPlan,
    /// An optional default number of iterations per user.
    Iterations,
    /// An optional default timeout for all requests, in seconds.
    Timeout,
    /// An optional default log file level.
    LogLevel,
    /// An optional default for the log file name.
    LogFile,
    /// An optional default value for quiet level.
    Quiet,
    /// An optional default value for verbosity level.
    Verbose,
    /// An optional default for printing running metrics.
    RunningMetrics,
    /// An optional default for not tracking metrics.
    NoMetrics,
    /// An optional default for not displaying metrics at end of load test.
    NoPrintMetrics,
    /// An optional default for the request log file name.
    RequestLog,
    /// An optional default for the request log file format.
    RequestFormat,
}

// Error returned when a default is set with a value of the wrong type.
fn wrong_type(key: &LoadTestDefault, value: &dyn fmt::Debug, expected: &str, received: &str) -> LoadTestError {
    LoadTestError::InvalidOption {
        option: format!("LoadTestDefault::{:?}", key),
        value: format!("{:?}", value),
        detail: format!(
            "set_default(LoadTestDefault::{:?}, {:?}) expected {} value, received {}",
            key, value, expected, received
        ),
    }
}

/// Most run-time options can be programmatically configured with custom defaults.
///
/// The following options can be configured with a custom default using a `&str`:
///  - [`LoadTestDefault::Host`]
///  - [`LoadTestDefault::HatchRate`]
///  - [`LoadTestDefault::TestPlan`]
///  - [`LoadTestDefault::Timeout`]
///  - [`LoadTestDefault::LogFile`]
///  - [`LoadTestDefault::RequestLog`]
///
/// The following options can be configured with a custom default using a `usize` integer:
///  - [`LoadTestDefault::Users`]
///  - [`LoadTestDefault::StartupTime`]
///  - [`LoadTestDefault::RunTime`]
///  - [`LoadTestDefault::Iterations`]
///  - [`LoadTestDefault::LogLevel`]
///  - [`LoadTestDefault::Quiet`]
///  - [`LoadTestDefault::Verbose`]
///  - [`LoadTestDefault::RunningMetrics`]
///
/// The following flags can be configured with a custom default using a `bool`:
///  - [`LoadTestDefault::NoMetrics`]
///  - [`LoadTestDefault::NoPrintMetrics`]
///
/// The following option can be configured with a custom default using a [`LogFormat`]:
///  - [`LoadTestDefault::RequestFormat`]
pub trait DefaultType<T>: Sized {
    /// Sets a [`LoadTestDefault`] to the provided value.
    ///
    /// # Example
    /// ```rust
    /// use parkload::prelude::*;
    ///
    /// fn main() -> Result<(), LoadTestError> {
    ///     LoadTest::initialize()?
    ///         .set_default(LoadTestDefault::Host, "http://localhost:8080")?
    ///         // Do not display info level logs while the test runs.
    ///         .set_default(LoadTestDefault::Quiet, 1)?
    ///         // Log all requests made during the test to `parkload-request.log`.
    ///         .set_default(LoadTestDefault::RequestLog, "parkload-request.log")?;
    ///
    ///     Ok(())
    /// }
    /// ```
    fn set_default(self, key: LoadTestDefault, value: T) -> Result<Self, LoadTestError>;
}
impl DefaultType<&str> for LoadTest {
    /// Sets [`LoadTestDefault`] to a [`&str`] value.
    fn set_default(mut self, key: LoadTestDefault, value: &str) -> Result<Self, LoadTestError> {
        match key {
            LoadTestDefault::Host => {
                self.defaults.host = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            LoadTestDefault::HatchRate => self.defaults.hatch_rate = Some(value.to_string()),
            LoadTestDefault::TestPlan => self.defaults.test_plan = Some(value.parse()?),
            LoadTestDefault::Timeout => self.defaults.timeout = Some(value.to_string()),
            LoadTestDefault::LogFile => self.defaults.log_file = Some(value.to_string()),
            LoadTestDefault::RequestLog => self.defaults.request_log = Some(value.to_string()),
            LoadTestDefault::Users
            | LoadTestDefault::StartupTime
            | LoadTestDefault::RunTime
            | LoadTestDefault::Iterations
            | LoadTestDefault::LogLevel
            | LoadTestDefault::Quiet
            | LoadTestDefault::Verbose
            | LoadTestDefault::RunningMetrics => {
                return Err(wrong_type(&key, &value, "usize", "&str"))
            }
            LoadTestDefault::NoMetrics | LoadTestDefault::NoPrintMetrics => {
                return Err(wrong_type(&key, &value, "bool", "&str"))
            }
            LoadTestDefault::RequestFormat => {
                return Err(wrong_type(&key, &value, "LogFormat", "&str"))
            }
        }
        Ok(self)
    }
}
impl DefaultType<usize> for LoadTest {
    /// Sets [`LoadTestDefault`] to a [`usize`] value.
    fn set_default(mut self, key: LoadTestDefault, value: usize) -> Result<Self, LoadTestError> {
        match key {
            LoadTestDefault::Users => self.defaults.users = Some(value),
            LoadTestDefault::StartupTime => self.defaults.startup_time = Some(value),
            LoadTestDefault::RunTime => self.defaults.run_time = Some(value),
            LoadTestDefault::Iterations => self.defaults.iterations = Some(value),
            LoadTestDefault::LogLevel => self.defaults.log_level = Some(value as u8),
            LoadTestDefault::Quiet => self.defaults.quiet = Some(value as u8),
            LoadTestDefault::Verbose => self.defaults.verbose = Some(value as u8),
            LoadTestDefault::RunningMetrics => self.defaults.running_metrics = Some(value),
            LoadTestDefault::Host
            | LoadTestDefault::HatchRate
            | LoadTestDefault::TestPlan
            | LoadTestDefault::Timeout
            | LoadTestDefault::LogFile
            | LoadTestDefault::RequestLog => {
                return Err(wrong_type(&key, &value, "&str", "usize"))
            }
            LoadTestDefault::NoMetrics | LoadTestDefault::NoPrintMetrics => {
                return Err(wrong_type(&key, &value, "bool", "usize"))
            }
            LoadTestDefault::RequestFormat => {
                return Err(wrong_type(&key, &value, "LogFormat", "usize"))
            }
        }
        Ok(self)
    }
}
impl DefaultType<bool> for LoadTest {
    /// Sets [`LoadTestDefault`] to a [`bool`] value.
    fn set_default(mut self, key: LoadTestDefault, value: bool) -> Result<Self, LoadTestError> {
        match key {
            LoadTestDefault::NoMetrics => self.defaults.no_metrics = Some(value),
            LoadTestDefault::NoPrintMetrics => self.defaults.no_print_metrics = Some(value),
            LoadTestDefault::Host
            | LoadTestDefault::HatchRate
            | LoadTestDefault::TestPlan
            | LoadTestDefault::Timeout
            | LoadTestDefault::LogFile
            | LoadTestDefault::RequestLog => {
                return Err(wrong_type(&key, &value, "&str", "bool"))
            }
            LoadTestDefault::Users
            | LoadTestDefault::StartupTime
            | LoadTestDefault::RunTime
            | LoadTestDefault::Iterations
            | LoadTestDefault::LogLevel
            | LoadTestDefault::Quiet
            | LoadTestDefault::Verbose
            | LoadTestDefault::RunningMetrics => {
                return Err(wrong_type(&key, &value, "usize", "bool"))
            }
            LoadTestDefault::RequestFormat => {
                return Err(wrong_type(&key, &value, "LogFormat", "bool"))
            }
        }
        Ok(self)
    }
}
impl DefaultType<LogFormat> for LoadTest {
    /// Sets [`LoadTestDefault`] to a [`LogFormat`] value.
    fn set_default(mut self, key: LoadTestDefault, value: LogFormat) -> Result<Self, LoadTestError> {
        match key {
            LoadTestDefault::RequestFormat => self.defaults.request_format = Some(value),
            LoadTestDefault::NoMetrics | LoadTestDefault::NoPrintMetrics => {
                return Err(wrong_type(&key, &value, "bool", "LogFormat"))
            }
            LoadTestDefault::Host
            | LoadTestDefault::HatchRate
            | LoadTestDefault::TestPlan
            | LoadTestDefault::Timeout
            | LoadTestDefault::LogFile
            | LoadTestDefault::RequestLog => {
                return Err(wrong_type(&key, &value, "&str", "LogFormat"))
            }
            LoadTestDefault::Users
            | LoadTestDefault::StartupTime
            | LoadTestDefault::RunTime
            | LoadTestDefault::Iterations
            | LoadTestDefault::LogLevel
            | LoadTestDefault::Quiet
            | LoadTestDefault::Verbose
            | LoadTestDefault::RunningMetrics => {
                return Err(wrong_type(&key, &value, "usize", "LogFormat"))
            }
        }
        Ok(self)
    }
}

/// Used internally to configure [`Configuration`] values based on precedence rules.
#[derive(Debug, Clone)]
pub(crate) struct ConfigValue<'a, T> {
    /// The optional value to set.
    pub(crate) value: Option<T>,
    /// Skip this value if true.
    pub(crate) filter: bool,
    /// An optional INFO level log message.
    pub(crate) message: &'a str,
}

// Return the first value that is set and not filtered.
fn get_value<T: fmt::Debug>(values: Vec<ConfigValue<T>>) -> Option<T> {
    for value in values {
        if let Some(v) = value.value {
            if value.filter {
                continue;
            }
            if !value.message.is_empty() {
                info!("{} = {:?}", value.message, v)
            }
            return Some(v);
        }
    }
    None
}

impl Configuration {
    /// Implement precedence rules for all [`Configuration`] values.
    pub(crate) fn configure(&mut self, defaults: &Defaults) {
        self.quiet = get_value(vec![
            ConfigValue {
                value: Some(self.quiet),
                filter: self.quiet == 0,
                message: "",
            },
            ConfigValue {
                value: defaults.quiet,
                filter: false,
                message: "",
            },
        ])
        .unwrap_or(0);

        self.verbose = get_value(vec![
            ConfigValue {
                value: Some(self.verbose),
                filter: self.verbose == 0,
                message: "",
            },
            ConfigValue {
                value: defaults.verbose,
                filter: false,
                message: "",
            },
        ])
        .unwrap_or(0);

        self.log_level = get_value(vec![
            ConfigValue {
                value: Some(self.log_level),
                filter: self.log_level == 0,
                message: "",
            },
            ConfigValue {
                value: defaults.log_level,
                filter: false,
                message: "",
            },
        ])
        .unwrap_or(0);

        self.log_file = get_value(vec![
            ConfigValue {
                value: Some(self.log_file.to_string()),
                filter: self.log_file.is_empty(),
                message: "",
            },
            ConfigValue {
                value: defaults.log_file.clone(),
                filter: false,
                message: "",
            },
        ])
        .unwrap_or_default();

        // Everything below is logged, so set up the logger first.
        self.initialize_logger();

        self.host = get_value(vec![
            // Use --host if set.
            ConfigValue {
                value: Some(self.host.to_string()),
                filter: self.host.is_empty(),
                message: "host",
            },
            // Otherwise use the environment if set.
            ConfigValue {
                value: std::env::var(HOST_ENV).ok(),
                filter: std::env::var(HOST_ENV).map(|h| h.is_empty()).unwrap_or(true),
                message: HOST_ENV,
            },
            // Otherwise use the programmatic default if set.
            ConfigValue {
                value: defaults.host.clone(),
                filter: false,
                message: "host",
            },
        ])
        .unwrap_or_default();

        // Simple load test options on the command line replace a default test plan.
        let simple_options = self.users.is_some()
            || self.hatch_rate.is_some()
            || !self.startup_time.is_empty()
            || !self.run_time.is_empty();

        // Configure `test_plan` before `users` so users doesn't get a default with a test plan.
        self.test_plan = get_value(vec![
            ConfigValue {
                value: self.test_plan.clone(),
                filter: false,
                message: "test_plan",
            },
            ConfigValue {
                value: defaults.test_plan.clone(),
                filter: simple_options,
                message: "test_plan",
            },
        ]);

        self.users = get_value(vec![
            ConfigValue {
                value: self.users,
                filter: false,
                message: "users",
            },
            ConfigValue {
                value: defaults.users,
                filter: self.test_plan.is_some(),
                message: "users",
            },
            // Without a test plan, run a single user.
            ConfigValue {
                value: Some(1),
                filter: self.test_plan.is_some(),
                message: "users",
            },
        ]);

        self.hatch_rate = get_value(vec![
            ConfigValue {
                value: self.hatch_rate.clone(),
                filter: false,
                message: "hatch_rate",
            },
            ConfigValue {
                value: defaults.hatch_rate.clone(),
                filter: self.test_plan.is_some() || !self.startup_time.is_empty(),
                message: "hatch_rate",
            },
        ]);

        self.startup_time = get_value(vec![
            ConfigValue {
                value: Some(self.startup_time.to_string()),
                filter: self.startup_time.is_empty(),
                message: "startup_time",
            },
            ConfigValue {
                value: defaults.startup_time.map(|s| s.to_string()),
                filter: self.test_plan.is_some() || self.hatch_rate.is_some(),
                message: "startup_time",
            },
        ])
        .unwrap_or_else(|| "0".to_string());

        self.run_time = get_value(vec![
            ConfigValue {
                value: Some(self.run_time.to_string()),
                filter: self.run_time.is_empty(),
                message: "run_time",
            },
            ConfigValue {
                value: defaults.run_time.map(|r| r.to_string()),
                filter: self.test_plan.is_some(),
                message: "run_time",
            },
        ])
        .unwrap_or_else(|| "0".to_string());

        self.iterations = get_value(vec![
            ConfigValue {
                value: Some(self.iterations),
                filter: self.iterations == 0,
                message: "iterations",
            },
            ConfigValue {
                value: defaults.iterations,
                filter: false,
                message: "iterations",
            },
        ])
        .unwrap_or(0);

        self.timeout = get_value(vec![
            ConfigValue {
                value: self.timeout.clone(),
                filter: false,
                message: "timeout",
            },
            ConfigValue {
                value: defaults.timeout.clone(),
                filter: false,
                message: "timeout",
            },
        ]);

        self.running_metrics = get_value(vec![
            ConfigValue {
                value: self.running_metrics,
                filter: false,
                message: "running_metrics",
            },
            ConfigValue {
                value: defaults.running_metrics,
                filter: false,
                message: "running_metrics",
            },
        ]);

        self.no_metrics = get_value(vec![
            ConfigValue {
                value: Some(true),
                filter: !self.no_metrics,
                message: "no_metrics",
            },
            ConfigValue {
                value: defaults.no_metrics,
                filter: false,
                message: "no_metrics",
            },
        ])
        .unwrap_or(false);

        self.no_print_metrics = get_value(vec![
            ConfigValue {
                value: Some(true),
                filter: !self.no_print_metrics,
                message: "no_print_metrics",
            },
            ConfigValue {
                value: defaults.no_print_metrics,
                filter: false,
                message: "no_print_metrics",
            },
        ])
        .unwrap_or(false);

        self.request_log = get_value(vec![
            ConfigValue {
                value: Some(self.request_log.to_string()),
                filter: self.request_log.is_empty(),
                message: "request_log",
            },
            ConfigValue {
                value: defaults.request_log.clone(),
                filter: false,
                message: "request_log",
            },
        ])
        .unwrap_or_default();

        self.request_format = get_value(vec![
            ConfigValue {
                value: self.request_format.clone(),
                filter: false,
                message: "request_format",
            },
            ConfigValue {
                value: defaults.request_format.clone(),
                filter: false,
                message: "request_format",
            },
            ConfigValue {
                value: Some(LogFormat::Json),
                filter: false,
                message: "",
            },
        ]);
    }

    /// Validate that the configuration is internally consistent.
    pub(crate) fn validate(&self) -> Result<(), LoadTestError> {
        // Can't set both --verbose and --quiet.
        if self.verbose > 0 && self.quiet > 0 {
            return Err(LoadTestError::InvalidOption {
                option: "--verbose".to_string(),
                value: self.verbose.to_string(),
                detail: "--verbose can not be set with --quiet.".to_string(),
            });
        }

        // If set, hatch rate must be a positive number.
        if let Some(hatch_rate) = self.hatch_rate.as_ref() {
            match util::get_float_from_string(Some(hatch_rate.to_string())) {
                Some(rate) if rate > 0.0 => (),
                _ => {
                    return Err(LoadTestError::InvalidOption {
                        option: "--hatch-rate".to_string(),
                        value: hatch_rate.to_string(),
                        detail: "--hatch-rate must be a number greater than 0.".to_string(),
                    });
                }
            }
        }

        // If set, timeout must be greater than zero and fit in a Duration.
        if let Some(timeout) = self.timeout.as_ref() {
            match util::get_float_from_string(Some(timeout.to_string())) {
                Some(seconds)
                    if seconds > 0.0 && std::time::Duration::try_from_secs_f32(seconds).is_ok() => {}
                _ => {
                    return Err(LoadTestError::InvalidOption {
                        option: "--timeout".to_string(),
                        value: timeout.to_string(),
                        detail: "--timeout must be a finite number of seconds greater than 0."
                            .to_string(),
                    });
                }
            }
        }

        if !self.pause.is_empty() && util::parse_duration(&self.pause).is_none() {
            return Err(LoadTestError::InvalidOption {
                option: "--pause".to_string(),
                value: self.pause.to_string(),
                detail: "--pause must be a time span such as 1s, 500ms or 1m30s.".to_string(),
            });
        }

        if let Some(users) = self.users.as_ref() {
            if users == &0 {
                return Err(LoadTestError::InvalidOption {
                    option: "--users".to_string(),
                    value: users.to_string(),
                    detail: "--users must be set to at least 1.".to_string(),
                });
            }
        }

        // Startup time can't be set with hatch rate.
        if self.startup_time != "0" && self.hatch_rate.is_some() {
            return Err(LoadTestError::InvalidOption {
                option: "--startup-time".to_string(),
                value: self.startup_time.to_string(),
                detail: "--startup-time can not be set with --hatch-rate.".to_string(),
            });
        }

        // A test plan replaces all the simple load test options.
        if self.test_plan.is_some() {
            let conflict = if let Some(users) = self.users {
                Some(("--users", users.to_string()))
            } else if self.startup_time != "0" {
                Some(("--startup-time", self.startup_time.to_string()))
            } else if self.run_time != "0" {
                Some(("--run-time", self.run_time.to_string()))
            } else {
                self.hatch_rate
                    .as_ref()
                    .map(|hatch_rate| ("--hatch-rate", hatch_rate.to_string()))
            };
            if let Some((option, value)) = conflict {
                return Err(LoadTestError::InvalidOption {
                    option: option.to_string(),
                    value,
                    detail: format!("{} can not be set with --test-plan.", option),
                });
            }
        }

        // Iterations end the load test on their own.
        if self.iterations > 0 && self.run_time != "0" {
            return Err(LoadTestError::InvalidOption {
                option: "--iterations".to_string(),
                value: self.iterations.to_string(),
                detail: "--iterations can not be set with --run-time.".to_string(),
            });
        }

        if self.no_metrics && self.running_metrics.is_some() {
            return Err(LoadTestError::InvalidOption {
                option: "--running-metrics".to_string(),
                value: format!("{:?}", self.running_metrics),
                detail: "--running-metrics can not be set with --no-metrics.".to_string(),
            });
        }

        if let Some(park_ratio) = self.park_ratio {
            if !(0.0..=1.0).contains(&park_ratio) {
                return Err(LoadTestError::InvalidOption {
                    option: "--park-ratio".to_string(),
                    value: park_ratio.to_string(),
                    detail: "--park-ratio must be between 0 and 1.".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Initialize the logger which writes to standard out and optionally to a log file.
    pub(crate) fn initialize_logger(&self) {
        let debug_level = match self.verbose {
            0 => match self.quiet {
                0 => LevelFilter::Info,
                1 => LevelFilter::Warn,
                _ => LevelFilter::Error,
            },
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        let log_level = match self.log_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        let mut loggers: Vec<Box<dyn SharedLogger>> =
            vec![SimpleLogger::new(debug_level, Config::default())];

        let log_file: Option<PathBuf> = if !self.log_file.is_empty() {
            Some(PathBuf::from(&self.log_file))
        } else {
            None
        };
        if let Some(log_to_file) = log_file.as_ref() {
            match std::fs::File::create(log_to_file) {
                Ok(file) => loggers.push(WriteLogger::new(log_level, Config::default(), file)),
                Err(e) => eprintln!(
                    "ERROR: failed to create log file {}: {}",
                    log_to_file.display(),
                    e
                ),
            }
        }

        match CombinedLogger::init(loggers) {
            Ok(_) => (),
            Err(e) => {
                info!("failed to initialize CombinedLogger: {}", e);
            }
        }
        if let Some(log_to_file) = log_file {
            info!("Writing to log file: {}", log_to_file.display());
        }

        info!("Output verbosity level: {}", debug_level);
        info!("Logfile verbosity level: {}", log_level);
    }
}
