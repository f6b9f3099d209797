//! Utility functions used by the load test engine and available to scenarios.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time;
use url::Url;

use crate::{LoadTestError, CANCELED};

lazy_static! {
    static ref TIMESPAN: Regex =
        Regex::new(r"((?P<hours>\d+?)h)?((?P<minutes>\d+?)m)?((?P<seconds>\d+?)s)?")
            .expect("timespan regex is valid");
    static ref DURATION: Regex = Regex::new(
        r"^(?:(?P<hours>\d+)h)?(?:(?P<minutes>\d+)m)?(?:(?P<seconds>\d+)s)?(?:(?P<millis>\d+)ms)?$"
    )
    .expect("duration regex is valid");
}

/// Parse a string representing a time span and return the number of seconds.
///
/// Can be specified as an integer, indicating seconds. Or can use integers
/// together with one or more of "h", "m", and "s", in that order, indicating
/// "hours", "minutes", and "seconds".
///
/// Valid formats include: 20, 20s, 3m, 2h, 1h20m, 3h30m10s, etc.
///
/// # Example
/// ```rust
/// use parkload::util;
///
/// // 2 minutes is 120 seconds.
/// assert_eq!(util::parse_timespan("2m"), 120);
///
/// // 1 hour 2 minutes and 3 seconds is 3,723 seconds.
/// assert_eq!(util::parse_timespan("1h2m3s"), 3_723);
///
/// // Invalid value is 0 seconds.
/// assert_eq!(util::parse_timespan("foo"), 0);
/// ```
pub fn parse_timespan(time_str: &str) -> usize {
    if let Ok(seconds) = usize::from_str(time_str) {
        trace!("{} is integer: {} seconds", time_str, seconds);
        return seconds;
    }

    let captures = match TIMESPAN.captures(time_str) {
        Some(captures) => captures,
        None => return 0,
    };
    let component = |name: &str| -> usize {
        captures
            .name(name)
            .and_then(|m| usize::from_str(m.as_str()).ok())
            .unwrap_or(0)
    };
    let hours = component("hours");
    let minutes = component("minutes");
    let seconds = component("seconds");
    let total = hours
        .saturating_mul(60 * 60)
        .saturating_add(minutes.saturating_mul(60))
        .saturating_add(seconds);
    trace!(
        "{} hours {} minutes {} seconds: {} seconds",
        hours,
        minutes,
        seconds,
        total
    );
    total
}

/// Strictly parse a duration, with millisecond precision.
///
/// Accepts an integer number of seconds, or integers followed by "h", "m", "s" and "ms",
/// in that order. Unlike [`parse_timespan`] the whole value must match; anything else,
/// including values too large to represent, returns `None`.
///
/// # Example
/// ```rust
/// use parkload::util;
/// use std::time::Duration;
///
/// assert_eq!(util::parse_duration("500ms"), Some(Duration::from_millis(500)));
/// assert_eq!(util::parse_duration("1m30s"), Some(Duration::from_secs(90)));
/// assert_eq!(util::parse_duration("2"), Some(Duration::from_secs(2)));
/// assert_eq!(util::parse_duration("1.5s"), None);
/// ```
pub fn parse_duration(duration: &str) -> Option<time::Duration> {
    let duration = duration.trim();
    if let Ok(seconds) = u64::from_str(duration) {
        return Some(time::Duration::from_secs(seconds));
    }

    let captures = DURATION.captures(duration)?;
    let mut millis: u64 = 0;
    let mut matched = false;
    for (name, scale) in [
        ("hours", 3_600_000),
        ("minutes", 60_000),
        ("seconds", 1_000),
        ("millis", 1),
    ] {
        if let Some(value) = captures.name(name) {
            let value = u64::from_str(value.as_str()).ok()?;
            millis = millis.checked_add(value.checked_mul(scale)?)?;
            matched = true;
        }
    }
    // An empty value matches with no components.
    if !matched {
        return None;
    }
    Some(time::Duration::from_millis(millis))
}

/// Sleep for a specified duration, minus the time spent doing other things.
///
/// Returns a fresh drift timer to pass into the next call.
pub async fn sleep_minus_drift(
    duration: std::time::Duration,
    drift: tokio::time::Instant,
) -> tokio::time::Instant {
    match duration.checked_sub(drift.elapsed()) {
        Some(delay) if delay.as_nanos() > 0 => tokio::time::sleep(delay).await,
        _ => debug!("sleep_minus_drift: drift was greater than or equal to duration, not sleeping"),
    };
    tokio::time::Instant::now()
}

/// Calculate median for a BTreeMap of response times and their counts.
///
/// The map holds each (rounded) value on the left and the number of occurrences on the
/// right. Rounded values can fall outside the observed range, so the result is clamped
/// to `min` and `max`.
///
/// # Example
/// ```rust
/// use std::collections::BTreeMap;
/// use parkload::util;
///
/// let mut btree: BTreeMap<usize, usize> = BTreeMap::new();
/// btree.insert(7, 5);
/// btree.insert(8, 1);
/// btree.insert(13, 21);
/// btree.insert(19, 44);
/// btree.insert(21, 5);
///
/// assert_eq!(util::median(&btree, 76, 7, 21), 19);
/// ```
pub fn median(
    btree: &BTreeMap<usize, usize>,
    total_elements: usize,
    min: usize,
    max: usize,
) -> usize {
    let mut total_count: usize = 0;
    let half_elements: usize = (total_elements as f64 / 2.0).round() as usize;
    for (value, counter) in btree {
        total_count += counter;
        if total_count >= half_elements {
            return (*value).clamp(min, max.max(min));
        }
    }
    0
}

/// Truncate strings when they're too long to display.
///
/// # Example
/// ```rust
/// use parkload::util;
///
/// assert_eq!(util::truncate_string("this is a long string", 9), "this is..");
/// assert_eq!(util::truncate_string("shorter string", 15), "shorter string");
/// ```
pub fn truncate_string(str_to_truncate: &str, max_length: usize) -> String {
    if str_to_truncate.char_indices().count() > max_length {
        match str_to_truncate.char_indices().nth(max_length.saturating_sub(2)) {
            None => str_to_truncate.to_string(),
            Some((idx, _)) => format!("{}..", &str_to_truncate[..idx]),
        }
    } else {
        str_to_truncate.to_string()
    }
}

/// Determine if a timer expired, with second granularity.
///
/// A `run_time` of 0 disables the timer.
pub fn timer_expired(started: time::Instant, run_time: usize) -> bool {
    run_time > 0 && started.elapsed().as_secs() >= run_time as u64
}

/// Convert optional string to f32, otherwise defaulting to 1.0.
pub fn get_hatch_rate(hatch_rate: Option<String>) -> f32 {
    get_float_from_string(hatch_rate).unwrap_or(1.0)
}

/// Convert optional string to f32, otherwise return None.
///
/// # Example
/// ```rust
/// use parkload::util;
///
/// assert_eq!(util::get_float_from_string(Some(".4".to_string())), Some(0.4));
/// assert_eq!(util::get_float_from_string(Some("1.1.1".to_string())), None);
/// assert_eq!(util::get_float_from_string(None), None);
/// ```
pub fn get_float_from_string(string: Option<String>) -> Option<f32> {
    match string {
        Some(s) => match s.parse::<f32>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("failed to convert {} to float: {}", s, e);
                None
            }
        },
        None => None,
    }
}

/// Helper function to determine if a host can be parsed.
///
/// # Example
/// ```rust
/// use parkload::util;
///
/// assert!(util::is_valid_host("http://localhost:8080").is_ok());
/// // A scheme is required.
/// assert!(util::is_valid_host("parking.local/").is_err());
/// ```
pub fn is_valid_host(host: &str) -> Result<bool, LoadTestError> {
    Url::parse(host).map_err(|parse_error| LoadTestError::InvalidHost {
        host: host.to_string(),
        detail: "Invalid host.".to_string(),
        parse_error,
    })?;
    Ok(true)
}

// Shut down cleanly on the first ctrl-c, exit abruptly on the second.
pub(crate) fn setup_ctrlc_handler() {
    match ctrlc::set_handler(move || {
        if CANCELED.read().map(|c| *c).unwrap_or(true) {
            warn!("caught another ctrl-c, exiting immediately...");
            std::process::exit(1);
        } else {
            warn!("caught ctrl-c, stopping...");
            if let Ok(mut canceled) = CANCELED.write() {
                *canceled = true;
            }
        }
    }) {
        Ok(_) => (),
        Err(e) => {
            // The handler can only be installed once per process, reset the flag for
            // every load test that follows.
            if let Ok(mut canceled) = CANCELED.write() {
                *canceled = false;
            }
            info!("reset ctrl-c handler: {}", e);
        }
    }
}
