//! Optional metrics collected and aggregated during load tests.
//!
//! By default, [`VirtualUser`](../user/struct.VirtualUser.html)s send a [`Metric`] to the
//! parent for every request they make, every check they record, and every iteration they
//! complete. The parent aggregates these into [`Metrics`], which is returned by
//! [`LoadTest::execute`](../struct.LoadTest.html#method.execute) and can be displayed with
//! [`Metrics::print`].
//!
//! Metrics collection can be disabled with the `--no-metrics` run-time option.

use chrono::prelude::*;
use itertools::Itertools;
use num_format::{Locale, ToFormattedString};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::test_plan::TestPlanHistory;
use crate::util;

/// Each [`VirtualUser`](../user/struct.VirtualUser.html) sends metrics to the parent
/// through an unbounded flume channel.
#[derive(Debug, Clone)]
pub enum Metric {
    /// A completed (or failed) HTTP request.
    Request(RequestMetric),
    /// A named pass/fail check.
    Check(CheckMetric),
    /// A completed scenario iteration.
    Iteration(IterationMetric),
}

/// The metrics collected for each request made by a
/// [`VirtualUser`](../user/struct.VirtualUser.html).
#[derive(Debug, Clone, Serialize)]
pub struct RequestMetric {
    /// How many milliseconds the user had been running when the request was made.
    pub elapsed: u64,
    /// The method being used (ie, POST).
    pub method: String,
    /// The name of the request, for example `POST /vehicle/park`.
    pub name: String,
    /// The full URL that was requested.
    pub url: String,
    /// How many milliseconds the request took.
    pub response_time: u64,
    /// The HTTP response code, or 0 if no response was received.
    pub status_code: u16,
    /// Whether or not the request returned a 2xx status code.
    pub success: bool,
    /// Which user made the request.
    pub user: usize,
    /// The error caused by this request, if any.
    pub error: String,
}
impl RequestMetric {
    pub(crate) fn new(method: &str, name: &str, url: &str, elapsed: u128, user: usize) -> Self {
        RequestMetric {
            elapsed: elapsed as u64,
            method: method.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            response_time: 0,
            status_code: 0,
            success: false,
            user,
            error: "".to_string(),
        }
    }

    // Record how long the request took.
    pub(crate) fn set_response_time(&mut self, response_time: u128) {
        self.response_time = response_time as u64;
    }
}

/// The result of a single named check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckMetric {
    /// The check name, for example `park status is 200`.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Which user recorded the check.
    pub user: usize,
}

/// Sent each time a user completes an iteration of its scenario.
#[derive(Debug, Clone, Serialize)]
pub struct IterationMetric {
    /// Which user ran the iteration.
    pub user: usize,
    /// How many milliseconds the iteration took, excluding the pause.
    pub run_time: u64,
    /// Whether the iteration returned without error.
    pub success: bool,
}

/// Metrics collected about a named request, (for example `POST /vehicle/park`).
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct RequestMetricAggregate {
    /// The request name for which metrics are being collected.
    pub name: String,
    /// Per-response-time counters, tracking how often requests returned with this response time.
    ///
    /// All response times below 100ms are stored without any rounding. Response times between
    /// 100 and 500ms are rounded to the nearest 10ms. Response times between 500 and
    /// 1000ms are rounded to the nearest 100ms. Response times larger than 1000ms are rounded to
    /// the nearest 1000ms.
    pub response_times: BTreeMap<usize, usize>,
    /// The shortest response time seen so far, not rounded, `None` until the first response.
    pub min_response_time: Option<usize>,
    /// The longest response time seen so far, not rounded.
    pub max_response_time: usize,
    /// Total combined response times seen so far.
    pub total_response_time: usize,
    /// Total number of response times seen so far.
    pub response_time_counter: usize,
    /// Per-status-code counters, 0 counts requests that received no response.
    pub status_code_counts: BTreeMap<u16, usize>,
    /// Total number of times this request returned a 2xx status code.
    pub success_count: usize,
    /// Total number of times this request failed.
    pub fail_count: usize,
}
impl RequestMetricAggregate {
    /// Create a new RequestMetricAggregate object.
    pub(crate) fn new(name: &str) -> Self {
        trace!("new request: {}", name);
        RequestMetricAggregate {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Track response time.
    pub(crate) fn set_response_time(&mut self, response_time: u64) {
        let response_time_usize = response_time as usize;

        self.min_response_time = update_min_time(self.min_response_time, response_time_usize);
        self.max_response_time = update_max_time(self.max_response_time, response_time_usize);
        self.total_response_time += response_time_usize;
        self.response_time_counter += 1;

        // Round the response time so similar times are combined together.
        let rounded_response_time = if response_time < 100 {
            response_time_usize
        } else if response_time < 500 {
            ((response_time as f64 / 10.0).round() * 10.0) as usize
        } else if response_time < 1000 {
            ((response_time as f64 / 100.0).round() * 100.0) as usize
        } else {
            ((response_time as f64 / 1000.0).round() * 1000.0) as usize
        };

        *self.response_times.entry(rounded_response_time).or_insert(0) += 1;
    }

    /// Increment counter for status code, creating new counter if first time seeing status code.
    pub(crate) fn set_status_code(&mut self, status_code: u16) {
        *self.status_code_counts.entry(status_code).or_insert(0) += 1;
    }

    fn record(&mut self, request: &RequestMetric) {
        self.set_response_time(request.response_time);
        self.set_status_code(request.status_code);
        if request.success {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
    }
}

/// Pass and fail counts for a named check.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct CheckMetricAggregate {
    /// How many times the check passed.
    pub pass_count: usize,
    /// How many times the check failed.
    pub fail_count: usize,
}
impl CheckMetricAggregate {
    /// Passed checks as a percentage of all checks.
    pub fn pass_rate(&self) -> f32 {
        let total = self.pass_count + self.fail_count;
        if total == 0 {
            0.0
        } else {
            self.pass_count as f32 / total as f32 * 100.0
        }
    }
}

/// Metrics returned when a [`LoadTest`](../struct.LoadTest.html) completes.
///
/// # Example
/// ```rust,no_run
/// use parkload::prelude::*;
///
/// fn main() -> Result<(), LoadTestError> {
///     let metrics = LoadTest::initialize()?
///         .set_scenario(ParkingScenario::default())
///         .set_default(LoadTestDefault::Host, "http://localhost:8080")?
///         .set_default(LoadTestDefault::Iterations, 5)?
///         .execute()?;
///
///     if let Some(check) = metrics.checks.get("park status is 200") {
///         println!("{} parks succeeded", check.pass_count);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    /// When the load test started.
    pub started: Option<DateTime<Local>>,
    /// How many seconds the load test ran.
    pub duration: usize,
    /// The maximum number of users running at the same time.
    pub users: usize,
    /// Total number of iterations completed by all users.
    pub iterations: usize,
    /// Iterations that returned an error.
    pub failed_iterations: usize,
    /// Request aggregates, keyed by request name.
    pub requests: BTreeMap<String, RequestMetricAggregate>,
    /// Check aggregates, keyed by check name.
    pub checks: BTreeMap<String, CheckMetricAggregate>,
    /// Each test plan step the load test went through.
    pub history: Vec<TestPlanHistory>,
    /// Whether the final metrics are displayed by [`Metrics::print`].
    pub display_metrics: bool,
    /// Set once the load test has finished.
    pub final_metrics: bool,
}
impl Metrics {
    /// Aggregate a single metric sent by a user.
    pub(crate) fn record(&mut self, metric: Metric) {
        match metric {
            Metric::Request(request) => {
                self.requests
                    .entry(request.name.clone())
                    .or_insert_with(|| RequestMetricAggregate::new(&request.name))
                    .record(&request);
            }
            Metric::Check(check) => {
                let aggregate = self.checks.entry(check.name).or_default();
                if check.passed {
                    aggregate.pass_count += 1;
                } else {
                    aggregate.fail_count += 1;
                }
            }
            Metric::Iteration(iteration) => {
                self.iterations += 1;
                if !iteration.success {
                    self.failed_iterations += 1;
                }
            }
        }
    }

    /// Consumes and displays metrics from a completed load test.
    pub fn print(&self) {
        if self.display_metrics {
            info!("printing final metrics after {} seconds...", self.duration);
            print!("{}", self);
        }
    }

    /// Displays metrics while a load test is running.
    pub(crate) fn print_running(&self) {
        info!(
            "printing running metrics after {} seconds...",
            self.duration
        );

        // Include a blank line after printing running metrics.
        println!("{}", self);
    }

    fn fmt_requests(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === PER REQUEST METRICS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} | {:>8} | {:>7}",
            "Name", "# reqs", "# fails", "req/s", "fail/s"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        let mut aggregate_fail_count = 0;
        let mut aggregate_total_count = 0;
        for (request_key, request) in self.requests.iter() {
            let total_count = request.success_count + request.fail_count;
            self.fmt_request_row(fmt, request_key, total_count, request.fail_count)?;
            aggregate_total_count += total_count;
            aggregate_fail_count += request.fail_count;
        }
        if self.requests.len() > 1 {
            writeln!(
                fmt,
                " -------------------------+---------------+----------------+----------+--------"
            )?;
            self.fmt_request_row(
                fmt,
                "Aggregated",
                aggregate_total_count,
                aggregate_fail_count,
            )?;
        }

        Ok(())
    }

    fn fmt_request_row(
        &self,
        fmt: &mut fmt::Formatter<'_>,
        name: &str,
        total_count: usize,
        fail_count: usize,
    ) -> fmt::Result {
        let fail_percent = if fail_count > 0 {
            fail_count as f32 / total_count as f32 * 100.0
        } else {
            0.0
        };
        // Compress 100.0 and 0.0 to 100 and 0 respectively to save width.
        let fails = if fail_percent as usize == 100 || fail_percent as usize == 0 {
            format!("{} ({}%)", format_number(fail_count), fail_percent as usize)
        } else {
            format!("{} ({:.1}%)", format_number(fail_count), fail_percent)
        };
        let (reqs_per_second, fails_per_second) =
            per_second_calculations(self.duration, total_count, fail_count);
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} | {:>8.reqs_p$} | {:>7.fails_p$}",
            util::truncate_string(name, 24),
            format_number(total_count),
            fails,
            reqs_per_second,
            fails_per_second,
            reqs_p = determine_precision(reqs_per_second),
            fails_p = determine_precision(fails_per_second),
        )
    }

    fn fmt_response_times(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requests.is_empty() {
            return Ok(());
        }

        let mut aggregate_response_times: BTreeMap<usize, usize> = BTreeMap::new();
        let mut aggregate_total_response_time: usize = 0;
        let mut aggregate_response_time_counter: usize = 0;
        let mut aggregate_min_response_time: Option<usize> = None;
        let mut aggregate_max_response_time: usize = 0;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>11} | {:>10} | {:>11} | {:>10}",
            "Name", "Avg (ms)", "Min", "Max", "Median"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for (request_key, request) in self.requests.iter() {
            aggregate_response_times =
                merge_times(aggregate_response_times, &request.response_times);
            aggregate_total_response_time += request.total_response_time;
            aggregate_response_time_counter += request.response_time_counter;
            if let Some(min_response_time) = request.min_response_time {
                aggregate_min_response_time =
                    update_min_time(aggregate_min_response_time, min_response_time);
            }
            aggregate_max_response_time =
                update_max_time(aggregate_max_response_time, request.max_response_time);

            fmt_response_time_row(
                fmt,
                request_key,
                &request.response_times,
                request.total_response_time,
                request.response_time_counter,
                request.min_response_time.unwrap_or(0),
                request.max_response_time,
            )?;
        }
        if self.requests.len() > 1 {
            writeln!(
                fmt,
                " -------------------------+-------------+------------+-------------+-----------"
            )?;
            fmt_response_time_row(
                fmt,
                "Aggregated",
                &aggregate_response_times,
                aggregate_total_response_time,
                aggregate_response_time_counter,
                aggregate_min_response_time.unwrap_or(0),
                aggregate_max_response_time,
            )?;
        }

        Ok(())
    }

    fn fmt_status_codes(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requests.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        writeln!(fmt, " {:<24} | {:>51} ", "Name", "Status codes")?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        let mut aggregated_status_code_counts: BTreeMap<u16, usize> = BTreeMap::new();
        for (request_key, request) in self.requests.iter() {
            for (status_code, count) in &request.status_code_counts {
                *aggregated_status_code_counts.entry(*status_code).or_insert(0) += count;
            }
            writeln!(
                fmt,
                " {:<24} | {:>51}",
                util::truncate_string(request_key, 24),
                prepare_status_codes(&request.status_code_counts),
            )?;
        }
        writeln!(
            fmt,
            " -------------------------+----------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>51} ",
            "Aggregated",
            prepare_status_codes(&aggregated_status_code_counts)
        )?;

        Ok(())
    }

    fn fmt_checks(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.checks.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === CHECKS ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} | {:>19}",
            "Name", "# pass", "# fail", "pass rate"
        )?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for (check_key, check) in self.checks.iter() {
            writeln!(
                fmt,
                " {:<24} | {:>13} | {:>14} | {:>18.2}%",
                util::truncate_string(check_key, 24),
                format_number(check.pass_count),
                format_number(check.fail_count),
                check.pass_rate(),
            )?;
        }
        writeln!(
            fmt,
            " -------------------------+---------------+----------------+--------------------"
        )?;
        writeln!(
            fmt,
            " {:<24} | {:>13} | {:>14} |",
            "Iterations",
            format_number(self.iterations - self.failed_iterations),
            format_number(self.failed_iterations),
        )?;

        Ok(())
    }

    fn fmt_history(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only include the test plan history in the final metrics.
        if !self.final_metrics || self.history.is_empty() {
            return Ok(());
        }

        writeln!(
            fmt,
            "\n === TEST PLAN ===\n ------------------------------------------------------------------------------"
        )?;
        writeln!(fmt, " {:<24} | {:>25} | {:>23}", "Action", "Started", "Users")?;
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        for step in &self.history {
            writeln!(
                fmt,
                " {:<24} | {:>25} | {:>23}",
                format!("{:?}", step.action),
                step.timestamp
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
                format_number(step.users),
            )?;
        }
        writeln!(
            fmt,
            " ------------------------------------------------------------------------------"
        )?;
        if let Some(started) = self.started {
            writeln!(
                fmt,
                " Started {}, ran {} seconds with at most {} users",
                started.format("%Y-%m-%d %H:%M:%S"),
                format_number(self.duration),
                format_number(self.users),
            )?;
        }

        Ok(())
    }
}

/// Implement format trait to allow displaying metrics.
impl fmt::Display for Metrics {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_requests(fmt)?;
        self.fmt_response_times(fmt)?;
        self.fmt_status_codes(fmt)?;
        self.fmt_checks(fmt)?;
        self.fmt_history(fmt)
    }
}

fn fmt_response_time_row(
    fmt: &mut fmt::Formatter<'_>,
    name: &str,
    response_times: &BTreeMap<usize, usize>,
    total_response_time: usize,
    response_time_counter: usize,
    min_response_time: usize,
    max_response_time: usize,
) -> fmt::Result {
    let average = match response_time_counter {
        0 => 0.0,
        _ => total_response_time as f32 / response_time_counter as f32,
    };
    writeln!(
        fmt,
        " {:<24} | {:>11.avg_precision$} | {:>10} | {:>11} | {:>10}",
        util::truncate_string(name, 24),
        average,
        format_number(min_response_time),
        format_number(max_response_time),
        format_number(util::median(
            response_times,
            response_time_counter,
            min_response_time,
            max_response_time
        )),
        avg_precision = determine_precision(average),
    )
}

/// Helper to calculate requests and fails per seconds.
pub(crate) fn per_second_calculations(duration: usize, total: usize, fail: usize) -> (f32, f32) {
    if duration == 0 {
        (0.0, 0.0)
    } else {
        (
            total as f32 / duration as f32,
            fail as f32 / duration as f32,
        )
    }
}

fn determine_precision(value: f32) -> usize {
    if value < 1000.0 {
        2
    } else {
        0
    }
}

/// Format large number in locale appropriate style.
pub(crate) fn format_number(number: usize) -> String {
    number.to_formatted_string(&Locale::en)
}

/// Merge together two sets of rounded response times.
pub(crate) fn merge_times(
    mut global_response_times: BTreeMap<usize, usize>,
    local_response_times: &BTreeMap<usize, usize>,
) -> BTreeMap<usize, usize> {
    for (response_time, count) in local_response_times {
        *global_response_times.entry(*response_time).or_insert(0) += count;
    }
    global_response_times
}

/// A helper function to update the global minimum time based on local time.
pub(crate) fn update_min_time(global_min: Option<usize>, min: usize) -> Option<usize> {
    Some(global_min.map_or(min, |global_min| global_min.min(min)))
}

/// A helper function to update the global maximum time based on local time.
pub(crate) fn update_max_time(global_max: usize, max: usize) -> usize {
    global_max.max(max)
}

/// Helper to format status code counts, for example `3 [200], 1 [500]`.
pub(crate) fn prepare_status_codes(status_code_counts: &BTreeMap<u16, usize>) -> String {
    status_code_counts
        .iter()
        .map(|(status_code, count)| format!("{} [{}]", format_number(*count), status_code))
        .join(", ")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_plan::TestPlanStepAction;

    fn request(name: &str, response_time: u64, status_code: u16) -> RequestMetric {
        let mut request = RequestMetric::new("POST", name, "http://localhost:8080/", 0, 1);
        request.set_response_time(response_time as u128);
        request.status_code = status_code;
        request.success = (200..300).contains(&status_code);
        request
    }

    #[test]
    fn max_response_time() {
        let mut max_response_time = 99;
        max_response_time = update_max_time(max_response_time, 101);
        assert_eq!(max_response_time, 101);
        max_response_time = update_max_time(max_response_time, 1);
        assert_eq!(max_response_time, 101);
    }

    #[test]
    fn min_response_time() {
        let mut min_response_time = Some(11);
        min_response_time = update_min_time(min_response_time, 9);
        assert_eq!(min_response_time, Some(9));
        min_response_time = update_min_time(min_response_time, 22);
        assert_eq!(min_response_time, Some(9));
        assert_eq!(update_min_time(None, 5), Some(5));
        // A 0ms response is a real minimum.
        min_response_time = update_min_time(min_response_time, 0);
        assert_eq!(min_response_time, Some(0));
        assert_eq!(update_min_time(min_response_time, 3), Some(0));
    }

    #[test]
    fn response_time_merge() {
        let mut global: BTreeMap<usize, usize> = BTreeMap::new();
        global.insert(1, 1);
        let mut local: BTreeMap<usize, usize> = BTreeMap::new();
        local.insert(1, 2);
        local.insert(250, 1);
        let merged = merge_times(global, &local);
        assert_eq!(merged.get(&1), Some(&3));
        assert_eq!(merged.get(&250), Some(&1));
    }

    #[test]
    fn response_time_rounding() {
        let mut aggregate = RequestMetricAggregate::new("POST /vehicle/park");
        aggregate.set_response_time(42);
        aggregate.set_response_time(144);
        aggregate.set_response_time(567);
        aggregate.set_response_time(1_678);
        assert_eq!(aggregate.min_response_time, Some(42));
        assert_eq!(aggregate.max_response_time, 1_678);
        assert_eq!(aggregate.total_response_time, 42 + 144 + 567 + 1_678);
        assert_eq!(aggregate.response_time_counter, 4);
        let rounded: Vec<usize> = aggregate.response_times.keys().cloned().collect();
        assert_eq!(rounded, vec![42, 140, 600, 2_000]);
    }

    #[test]
    fn zero_response_time() {
        let mut aggregate = RequestMetricAggregate::new("POST /vehicle/unpark");
        assert_eq!(aggregate.min_response_time, None);
        aggregate.set_response_time(5);
        aggregate.set_response_time(0);
        aggregate.set_response_time(3);
        assert_eq!(aggregate.min_response_time, Some(0));
        assert_eq!(aggregate.max_response_time, 5);
    }

    #[test]
    fn calculate_per_second() {
        assert_eq!(per_second_calculations(0, 10, 5), (0.0, 0.0));
        let (reqs, fails) = per_second_calculations(10, 100, 20);
        assert!((reqs - 10.0).abs() < f32::EPSILON);
        assert!((fails - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn record_metrics() {
        let mut metrics = Metrics::default();
        metrics.record(Metric::Request(request("POST /vehicle/park", 10, 200)));
        metrics.record(Metric::Request(request("POST /vehicle/park", 20, 500)));
        metrics.record(Metric::Request(request("POST /vehicle/unpark", 5, 0)));
        metrics.record(Metric::Check(CheckMetric {
            name: "park status is 200".to_string(),
            passed: true,
            user: 1,
        }));
        metrics.record(Metric::Check(CheckMetric {
            name: "park status is 200".to_string(),
            passed: false,
            user: 1,
        }));
        metrics.record(Metric::Iteration(IterationMetric {
            user: 1,
            run_time: 30,
            success: true,
        }));

        let park = &metrics.requests["POST /vehicle/park"];
        assert_eq!(park.success_count, 1);
        assert_eq!(park.fail_count, 1);
        assert_eq!(park.status_code_counts.get(&200), Some(&1));
        assert_eq!(park.status_code_counts.get(&500), Some(&1));
        let unpark = &metrics.requests["POST /vehicle/unpark"];
        assert_eq!(unpark.fail_count, 1);
        assert_eq!(unpark.status_code_counts.get(&0), Some(&1));

        let check = &metrics.checks["park status is 200"];
        assert_eq!(check.pass_count, 1);
        assert_eq!(check.fail_count, 1);
        assert!((check.pass_rate() - 50.0).abs() < f32::EPSILON);

        assert_eq!(metrics.iterations, 1);
        assert_eq!(metrics.failed_iterations, 0);
    }

    #[test]
    fn status_codes() {
        let mut counts: BTreeMap<u16, usize> = BTreeMap::new();
        counts.insert(500, 1);
        counts.insert(200, 1_234);
        assert_eq!(prepare_status_codes(&counts), "1,234 [200], 1 [500]");
        assert_eq!(prepare_status_codes(&BTreeMap::new()), "");
    }

    #[test]
    fn display() {
        let mut metrics = Metrics::default();
        assert_eq!(metrics.to_string(), "");

        metrics.record(Metric::Request(request("POST /vehicle/park", 10, 200)));
        metrics.record(Metric::Check(CheckMetric {
            name: "park status is 200".to_string(),
            passed: true,
            user: 1,
        }));
        metrics
            .history
            .push(TestPlanHistory::step(TestPlanStepAction::Finished, 0));
        let running = metrics.to_string();
        assert!(running.contains("PER REQUEST METRICS"));
        assert!(running.contains("POST /vehicle/park"));
        assert!(running.contains("1 [200]"));
        assert!(running.contains("park status is 200"));
        assert!(running.contains("100.00%"));
        assert!(!running.contains("TEST PLAN"));

        metrics.final_metrics = true;
        assert!(metrics.to_string().contains("Finished"));
    }
}
