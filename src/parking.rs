//! The parking scenario.
//!
//! Every iteration a user either parks a new vehicle or unparks the oldest vehicle it
//! parked earlier. Parking picks a random [`VehicleType`] and a random vehicle number in
//! the `LL-NNNN` format and POSTs them to `/vehicle/park`. Only vehicles the service
//! accepted with `200 OK` are remembered, in a per-user FIFO [`ParkedQueue`]. Unparking
//! takes the oldest vehicle out of the queue and POSTs its number to `/vehicle/unpark`;
//! the vehicle is forgotten whether or not the service accepts the request, and nothing
//! is retried. When the queue is empty an unpark does nothing.
//!
//! Both requests are checked (`park status is 200`, `unpark status is 200`) and failures
//! are logged at error level, including the `debug_error` field the parking service adds
//! to failed park responses.

use async_trait::async_trait;
use http::StatusCode;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::config::Configuration;
use crate::scenario::{IterationResult, Scenario};
use crate::user::VirtualUser;
use crate::util;
use crate::LoadTestError;

/// Path vehicles are parked at.
pub const PARK_PATH: &str = "/vehicle/park";
/// Path vehicles are unparked at.
pub const UNPARK_PATH: &str = "/vehicle/unpark";
/// Share of iterations that park a vehicle, the rest unpark.
pub const DEFAULT_PARK_RATIO: f64 = 0.4;
/// Name of the check recorded for every park request.
pub const PARK_CHECK: &str = "park status is 200";
/// Name of the check recorded for every unpark request.
pub const UNPARK_CHECK: &str = "unpark status is 200";

/// Vehicle categories accepted by the parking service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum VehicleType {
    #[serde(rename = "A")]
    Automobile,
    #[serde(rename = "M")]
    Motorcycle,
    #[serde(rename = "B")]
    Bicycle,
}
impl VehicleType {
    /// Every vehicle type, in the order they're drawn from.
    pub const ALL: [VehicleType; 3] = [
        VehicleType::Automobile,
        VehicleType::Motorcycle,
        VehicleType::Bicycle,
    ];

    /// The single letter code sent to the parking service.
    pub fn code(&self) -> &'static str {
        match self {
            VehicleType::Automobile => "A",
            VehicleType::Motorcycle => "M",
            VehicleType::Bicycle => "B",
        }
    }

    /// Pick a vehicle type uniformly at random.
    pub fn random<R: Rng>(rng: &mut R) -> VehicleType {
        VehicleType::ALL[rng.random_range(0..VehicleType::ALL.len())]
    }
}
impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Generate a random vehicle number: two uppercase letters, a hyphen, and a number
/// from 1000 to 9999, for example `KT-4821`.
pub fn random_vehicle_number<R: Rng>(rng: &mut R) -> String {
    let first = rng.random_range(b'A'..=b'Z') as char;
    let second = rng.random_range(b'A'..=b'Z') as char;
    format!("{}{}-{}", first, second, rng.random_range(1000..=9999))
}

/// Body of a park request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParkRequest {
    pub vehicle_type: VehicleType,
    pub vehicle_number: String,
}
impl ParkRequest {
    /// A park request for a random vehicle.
    pub fn random<R: Rng>(rng: &mut R) -> ParkRequest {
        ParkRequest {
            vehicle_type: VehicleType::random(rng),
            vehicle_number: random_vehicle_number(rng),
        }
    }
}

/// Body of an unpark request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnparkRequest {
    pub vehicle_number: String,
}

/// Vehicles a single user parked successfully and hasn't tried to unpark yet, oldest first.
///
/// The queue is never checked against the parking service, so it can drift from what the
/// service believes is parked.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParkedQueue {
    vehicles: VecDeque<String>,
}
impl ParkedQueue {
    pub fn new() -> Self {
        ParkedQueue::default()
    }

    /// Remember a parked vehicle.
    pub fn push(&mut self, vehicle_number: String) {
        self.vehicles.push_back(vehicle_number);
    }

    /// Take the oldest parked vehicle.
    pub fn pop(&mut self) -> Option<String> {
        self.vehicles.pop_front()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// The oldest parked vehicle.
    pub fn front(&self) -> Option<&String> {
        self.vehicles.front()
    }

    /// The most recently parked vehicle.
    pub fn back(&self) -> Option<&String> {
        self.vehicles.back()
    }

    /// Iterate over parked vehicles, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.vehicles.iter()
    }
}

/// What an iteration does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Park,
    Unpark,
}

/// Choose between parking and unparking with a single uniform draw. The queue is not
/// consulted, so an unpark may be chosen with nothing to unpark.
pub fn select_action<R: Rng>(rng: &mut R, park_ratio: f64) -> Action {
    if rng.random::<f64>() < park_ratio {
        Action::Park
    } else {
        Action::Unpark
    }
}

/// The result of a park or unpark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The vehicle was parked and added to the queue.
    Parked(String),
    /// The vehicle was unparked.
    Unparked(String),
    /// The request failed; holds the logged message.
    Failed(String),
    /// Unpark with an empty queue, no request was made.
    Skipped,
}

/// Build the message logged when parking fails.
///
/// `response` is the parsed response body, `None` when there was no response or the
/// body isn't JSON. A `debug_error` field is appended when it is set to anything but
/// `null`, `false`, `0` or `""`; strings as-is, anything else as JSON. When there's
/// nothing to read the field from (no response, a body that isn't JSON, or a `null`
/// body) that is noted instead.
///
/// # Example
/// ```rust
/// use parkload::parking::park_failure_message;
/// use serde_json::json;
///
/// assert_eq!(
///     park_failure_message("AB-1234", 500, Some(&json!({"debug_error": "lot full"}))),
///     "Park failed for AB-1234 with status 500 | debug_error: lot full"
/// );
/// assert_eq!(
///     park_failure_message("AB-1234", 502, None),
///     "Park failed for AB-1234 with status 502 | failed to parse debug_error"
/// );
/// ```
pub fn park_failure_message(vehicle_number: &str, status: u16, response: Option<&Value>) -> String {
    let message = format!("Park failed for {} with status {}", vehicle_number, status);
    match response {
        None | Some(Value::Null) => format!("{} | failed to parse debug_error", message),
        Some(value) => match value.get("debug_error") {
            Some(Value::String(debug_error)) if !debug_error.is_empty() => {
                format!("{} | debug_error: {}", message, debug_error)
            }
            Some(debug_error) if is_set(debug_error) => {
                format!("{} | debug_error: {}", message, debug_error)
            }
            _ => message,
        },
    }
}

// Whether a JSON value is worth reporting: not null, false, zero or empty.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(set) => *set,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(string) => !string.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Build the message logged when unparking fails.
pub fn unpark_failure_message(vehicle_number: &str, status: u16) -> String {
    format!("Unpark failed for {} with status {}", vehicle_number, status)
}

// NaN fails the range check too.
fn valid_park_ratio(park_ratio: f64) -> Result<f64, LoadTestError> {
    if !(0.0..=1.0).contains(&park_ratio) {
        return Err(LoadTestError::InvalidOption {
            option: "--park-ratio".to_string(),
            value: park_ratio.to_string(),
            detail: "--park-ratio must be between 0 and 1.".to_string(),
        });
    }
    Ok(park_ratio)
}

/// Users randomly park and unpark vehicles.
#[derive(Clone, Debug)]
pub struct ParkingScenario {
    /// Share of iterations that park, from 0 to 1.
    pub park_ratio: f64,
    /// Pause after each iteration.
    pub pause: Duration,
    /// Path vehicles are parked at.
    pub park_path: String,
    /// Path vehicles are unparked at.
    pub unpark_path: String,
}
impl Default for ParkingScenario {
    fn default() -> Self {
        ParkingScenario {
            park_ratio: DEFAULT_PARK_RATIO,
            pause: Duration::from_secs(1),
            park_path: PARK_PATH.to_string(),
            unpark_path: UNPARK_PATH.to_string(),
        }
    }
}
impl ParkingScenario {
    /// Build the scenario from `--park-ratio` and `--pause`, falling back to the defaults.
    ///
    /// [`LoadTest`](crate::LoadTest) does this itself through [`Scenario::configure`],
    /// so this is only needed to inspect the scenario before running it.
    pub fn from_configuration(configuration: &Configuration) -> Result<Self, LoadTestError> {
        let mut scenario = ParkingScenario::default();
        scenario.configure(configuration)?;
        Ok(scenario)
    }

    /// Set the share of iterations that park, from 0 to 1.
    pub fn set_park_ratio(mut self, park_ratio: f64) -> Result<Self, LoadTestError> {
        self.park_ratio = valid_park_ratio(park_ratio)?;
        Ok(self)
    }

    /// Set the pause after each iteration.
    pub fn set_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Park a random vehicle.
    pub async fn park(&self, user: &mut VirtualUser, queue: &mut ParkedQueue) -> Outcome {
        let request = ParkRequest::random(user.rng());
        self.park_vehicle(user, queue, request).await
    }

    /// Park a specific vehicle, adding it to the queue if the service returns `200 OK`.
    pub async fn park_vehicle(
        &self,
        user: &mut VirtualUser,
        queue: &mut ParkedQueue,
        request: ParkRequest,
    ) -> Outcome {
        debug!(
            "user {} parking {} ({})",
            user.index, request.vehicle_number, request.vehicle_type
        );
        let message = match user.post_json(&self.park_path, &request).await {
            Ok(outcome) => {
                if user.check(PARK_CHECK, outcome.status == StatusCode::OK) {
                    queue.push(request.vehicle_number.clone());
                    return Outcome::Parked(request.vehicle_number);
                }
                park_failure_message(
                    &request.vehicle_number,
                    outcome.status.as_u16(),
                    outcome.json::<Value>().ok().as_ref(),
                )
            }
            Err(e) => {
                user.check(PARK_CHECK, false);
                debug!("user {} park request failed: {}", user.index, e);
                park_failure_message(&request.vehicle_number, 0, None)
            }
        };
        error!("{}", message);
        Outcome::Failed(message)
    }

    /// Unpark the oldest parked vehicle, if any. The vehicle leaves the queue before the
    /// request is sent and is not put back if it fails.
    pub async fn unpark(&self, user: &mut VirtualUser, queue: &mut ParkedQueue) -> Outcome {
        let vehicle_number = match queue.pop() {
            Some(vehicle_number) => vehicle_number,
            None => {
                trace!("user {} has nothing to unpark", user.index);
                return Outcome::Skipped;
            }
        };
        debug!("user {} unparking {}", user.index, vehicle_number);

        let request = UnparkRequest { vehicle_number };
        let status = match user.post_json(&self.unpark_path, &request).await {
            Ok(outcome) => outcome.status.as_u16(),
            Err(e) => {
                debug!("user {} unpark request failed: {}", user.index, e);
                0
            }
        };
        if user.check(UNPARK_CHECK, status == StatusCode::OK.as_u16()) {
            return Outcome::Unparked(request.vehicle_number);
        }

        let message = unpark_failure_message(&request.vehicle_number, status);
        error!("{}", message);
        Outcome::Failed(message)
    }
}

#[async_trait]
impl Scenario for ParkingScenario {
    type State = ParkedQueue;

    fn name(&self) -> &str {
        "parking"
    }

    /// Apply `--park-ratio` and `--pause` when they're set.
    fn configure(&mut self, configuration: &Configuration) -> Result<(), LoadTestError> {
        if let Some(park_ratio) = configuration.park_ratio {
            self.park_ratio = valid_park_ratio(park_ratio)?;
        }
        if !configuration.pause.is_empty() {
            let pause = util::parse_duration(&configuration.pause).ok_or_else(|| {
                LoadTestError::InvalidOption {
                    option: "--pause".to_string(),
                    value: configuration.pause.to_string(),
                    detail: "--pause must be a time span such as 1s, 500ms or 1m30s."
                        .to_string(),
                }
            })?;
            self.pause = pause;
        }
        Ok(())
    }

    fn on_start(&self, _user: &VirtualUser) -> ParkedQueue {
        ParkedQueue::new()
    }

    async fn iteration(&self, user: &mut VirtualUser, queue: &mut ParkedQueue) -> IterationResult {
        let outcome = match select_action(user.rng(), self.park_ratio) {
            Action::Park => self.park(user, queue).await,
            Action::Unpark => self.unpark(user, queue).await,
        };
        trace!("user {}: {:?}, {} parked", user.index, outcome, queue.len());
        Ok(())
    }

    fn pause(&self) -> Duration {
        self.pause
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::RequestOutcome;
    use gumdrop::Options;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use regex::Regex;
    use std::collections::HashMap;

    #[test]
    fn vehicle_numbers() {
        let re = Regex::new(r"^[A-Z]{2}-[0-9]{4}$").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10_000 {
            let vehicle_number = random_vehicle_number(&mut rng);
            assert!(re.is_match(&vehicle_number), "{}", vehicle_number);
            let number: usize = vehicle_number[3..].parse().unwrap();
            assert!((1000..=9999).contains(&number));
        }
    }

    #[test]
    fn vehicle_types_are_uniform() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut counts: HashMap<VehicleType, usize> = HashMap::new();
        let samples = 30_000;
        for _ in 0..samples {
            *counts.entry(VehicleType::random(&mut rng)).or_insert(0) += 1;
        }
        assert_eq!(counts.len(), 3);
        for vehicle_type in VehicleType::ALL {
            let share = counts[&vehicle_type] as f64 / samples as f64;
            assert!((share - 1.0 / 3.0).abs() < 0.02, "{}: {}", vehicle_type, share);
        }
    }

    #[test]
    fn action_distribution() {
        let mut rng = StdRng::seed_from_u64(3);
        let samples = 20_000;
        let parks = (0..samples)
            .filter(|_| select_action(&mut rng, DEFAULT_PARK_RATIO) == Action::Park)
            .count();
        let share = parks as f64 / samples as f64;
        assert!((share - 0.4).abs() < 0.02, "park share {}", share);

        assert_eq!(select_action(&mut rng, 0.0), Action::Unpark);
        assert_eq!(select_action(&mut rng, 1.0), Action::Park);
    }

    #[test]
    fn request_bodies() {
        let park = ParkRequest {
            vehicle_type: VehicleType::Motorcycle,
            vehicle_number: "AB-1234".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&park).unwrap(),
            serde_json::json!({"vehicle_type": "M", "vehicle_number": "AB-1234"})
        );
        let unpark = UnparkRequest {
            vehicle_number: "AB-1234".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&unpark).unwrap(),
            serde_json::json!({"vehicle_number": "AB-1234"})
        );
        for vehicle_type in VehicleType::ALL {
            assert_eq!(
                serde_json::to_value(vehicle_type).unwrap(),
                Value::String(vehicle_type.code().to_string())
            );
        }
    }

    #[test]
    fn queue_is_fifo() {
        let mut queue = ParkedQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);

        queue.push("AB-1234".to_string());
        queue.push("CD-5678".to_string());
        queue.push("EF-9012".to_string());
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.front().map(String::as_str), Some("AB-1234"));
        assert_eq!(queue.back().map(String::as_str), Some("EF-9012"));

        assert_eq!(queue.pop().as_deref(), Some("AB-1234"));
        assert_eq!(
            queue.iter().cloned().collect::<Vec<_>>(),
            vec!["CD-5678".to_string(), "EF-9012".to_string()]
        );
    }

    // Parse a response body the way park_vehicle does.
    fn failure_message(status: u16, body: &str) -> String {
        let outcome = RequestOutcome {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
        };
        park_failure_message("AB-1234", status, outcome.json::<Value>().ok().as_ref())
    }

    #[test]
    fn failure_messages() {
        assert_eq!(
            failure_message(500, r#"{"debug_error": "lot full"}"#),
            "Park failed for AB-1234 with status 500 | debug_error: lot full"
        );
        assert_eq!(
            failure_message(409, r#"{"debug_error": 7}"#),
            "Park failed for AB-1234 with status 409 | debug_error: 7"
        );
        assert_eq!(
            failure_message(409, r#"{"debug_error": true}"#),
            "Park failed for AB-1234 with status 409 | debug_error: true"
        );
        assert_eq!(
            failure_message(409, r#"{"debug_error": {"code": 3}}"#),
            r#"Park failed for AB-1234 with status 409 | debug_error: {"code":3}"#
        );

        // Missing or unset values append nothing.
        for body in [
            r#"{"error": "bad request"}"#,
            r#"{"debug_error": null}"#,
            r#"{"debug_error": ""}"#,
            r#"{"debug_error": false}"#,
            r#"{"debug_error": 0}"#,
            r#"{"debug_error": 0.0}"#,
            r#""lot full""#,
            "42",
            "[]",
        ] {
            assert_eq!(
                failure_message(400, body),
                "Park failed for AB-1234 with status 400",
                "{}",
                body
            );
        }

        // Nothing to read debug_error from.
        for body in ["Bad Gateway", "", "null", "<html></html>"] {
            assert_eq!(
                failure_message(502, body),
                "Park failed for AB-1234 with status 502 | failed to parse debug_error",
                "{}",
                body
            );
        }
        assert_eq!(
            park_failure_message("AB-1234", 0, None),
            "Park failed for AB-1234 with status 0 | failed to parse debug_error"
        );
        assert_eq!(
            unpark_failure_message("AB-1234", 404),
            "Unpark failed for AB-1234 with status 404"
        );
    }

    #[test]
    fn scenario_configuration() {
        let scenario = ParkingScenario::default();
        assert!((scenario.park_ratio - 0.4).abs() < f64::EPSILON);
        assert_eq!(scenario.pause, Duration::from_secs(1));
        assert_eq!(scenario.park_path, "/vehicle/park");
        assert_eq!(scenario.unpark_path, "/vehicle/unpark");

        let configuration =
            Configuration::parse_args_default(&["--park-ratio", "0.75", "--pause", "3s"]).unwrap();
        let scenario = ParkingScenario::from_configuration(&configuration).unwrap();
        assert!((scenario.park_ratio - 0.75).abs() < f64::EPSILON);
        assert_eq!(scenario.pause, Duration::from_secs(3));

        let configuration = Configuration::parse_args_default(&["--pause", "0"]).unwrap();
        let scenario = ParkingScenario::from_configuration(&configuration).unwrap();
        assert_eq!(scenario.pause, Duration::ZERO);

        let configuration = Configuration::parse_args_default(&["--pause", "500ms"]).unwrap();
        let scenario = ParkingScenario::from_configuration(&configuration).unwrap();
        assert_eq!(scenario.pause, Duration::from_millis(500));

        for pause in ["5x", "abc", "1.5s", "1s500"] {
            let configuration = Configuration::parse_args_default(&["--pause", pause]).unwrap();
            match ParkingScenario::from_configuration(&configuration) {
                Err(LoadTestError::InvalidOption { option, value, .. }) => {
                    assert_eq!(option, "--pause");
                    assert_eq!(value, pause);
                }
                other => panic!("--pause {} configured {:?}", pause, other),
            }
        }

        let configuration = Configuration::parse_args_default(&["--park-ratio", "2"]).unwrap();
        assert!(ParkingScenario::from_configuration(&configuration).is_err());
        assert!(ParkingScenario::default().set_park_ratio(f64::NAN).is_err());

        // Options left unset keep the values already configured.
        let mut scenario = ParkingScenario::default()
            .set_park_ratio(1.0)
            .unwrap()
            .set_pause(Duration::from_millis(10));
        scenario.configure(&Configuration::default()).unwrap();
        assert!((scenario.park_ratio - 1.0).abs() < f64::EPSILON);
        assert_eq!(scenario.pause, Duration::from_millis(10));
    }
}
