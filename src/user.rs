//! Virtual users and the loop that runs a [`Scenario`] for each of them.

use http::header::CONTENT_TYPE;
use http::StatusCode;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{self, Duration};
use std::{error, fmt};
use url::Url;

use crate::config::Configuration;
use crate::logger::LoggerTx;
use crate::metrics::{CheckMetric, IterationMetric, Metric, RequestMetric};
use crate::scenario::Scenario;
use crate::util;
use crate::LoadTestError;

// Never sleep more than this many milliseconds, so a pausing user exits quickly.
const MAXIMUM_SLEEP_MS: u128 = 500;

/// Commands sent from the parent to running users.
#[derive(Debug, Clone)]
pub enum UserCommand {
    /// Finish the current iteration and exit.
    Exit,
}

/// An enumeration of all errors a single request can return.
///
/// These never stop a user: the request is recorded in metrics and the error is returned
/// to the [`Scenario`] to handle.
#[derive(Debug)]
pub enum TransactionError {
    /// Wraps a [`reqwest::Error`].
    Reqwest(reqwest::Error),
    /// Wraps a [`serde_json::Error`] raised while serializing a request body.
    Serialize(serde_json::Error),
    /// Wraps a [`url::ParseError`] raised while joining a path onto the host.
    Url(url::ParseError),
}
impl TransactionError {
    fn describe(&self) -> &str {
        match *self {
            TransactionError::Reqwest(_) => "reqwest::Error",
            TransactionError::Serialize(_) => "serde_json::Error",
            TransactionError::Url(_) => "url::ParseError",
        }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TransactionError::Reqwest(ref source) => {
                write!(f, "TransactionError: {} ({})", self.describe(), source)
            }
            TransactionError::Serialize(ref source) => {
                write!(f, "TransactionError: {} ({})", self.describe(), source)
            }
            TransactionError::Url(ref source) => {
                write!(f, "TransactionError: {} ({})", self.describe(), source)
            }
        }
    }
}

impl error::Error for TransactionError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            TransactionError::Reqwest(ref source) => Some(source),
            TransactionError::Serialize(ref source) => Some(source),
            TransactionError::Url(ref source) => Some(source),
        }
    }
}

/// Auto-convert Reqwest errors.
impl From<reqwest::Error> for TransactionError {
    fn from(err: reqwest::Error) -> TransactionError {
        TransactionError::Reqwest(err)
    }
}

/// Auto-convert serde_json errors.
impl From<serde_json::Error> for TransactionError {
    fn from(err: serde_json::Error) -> TransactionError {
        TransactionError::Serialize(err)
    }
}

/// Auto-convert url errors.
impl From<url::ParseError> for TransactionError {
    fn from(err: url::ParseError) -> TransactionError {
        TransactionError::Url(err)
    }
}

/// The status and body of a completed request.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    /// The HTTP status code returned by the server.
    pub status: StatusCode,
    /// The response body.
    pub body: String,
}
impl RequestOutcome {
    /// Deserialize the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// A simulated user, running in its own tokio task.
///
/// Each user has its own HTTP client, random number generator and (through its
/// [`Scenario`]) its own state, so users never contend with each other.
#[derive(Debug)]
pub struct VirtualUser {
    /// Which user this is, counting from 1 in launch order.
    pub index: usize,
    /// The host all request paths are joined onto.
    pub base_url: Url,
    /// The HTTP client used for all of this user's requests.
    pub client: reqwest::Client,
    /// Iterations completed so far.
    pub iterations: usize,
    /// A copy of the load test configuration.
    pub config: Configuration,
    /// When the user was launched.
    pub started: time::Instant,
    pub(crate) rng: StdRng,
    /// Channel to the parent, `None` when metrics are not collected.
    pub(crate) channel_to_parent: Option<flume::Sender<Metric>>,
    /// Channel to the request logger, if enabled.
    pub(crate) logger: LoggerTx,
}
impl VirtualUser {
    /// Create a new user, validating the host and building its HTTP client.
    ///
    /// # Example
    /// ```rust
    /// use parkload::config::Configuration;
    /// use parkload::user::VirtualUser;
    ///
    /// let user = VirtualUser::new(1, "http://localhost:8080", &Configuration::default()).unwrap();
    /// assert_eq!(user.build_url("/vehicle/park").unwrap(), "http://localhost:8080/vehicle/park");
    /// ```
    pub fn new(
        index: usize,
        base_url: &str,
        configuration: &Configuration,
    ) -> Result<Self, LoadTestError> {
        trace!("new user {}", index);
        let base_url = Url::parse(base_url).map_err(|parse_error| LoadTestError::InvalidHost {
            host: base_url.to_string(),
            detail: "Invalid host.".to_string(),
            parse_error,
        })?;

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = util::get_float_from_string(configuration.timeout.clone()) {
            let timeout = Duration::try_from_secs_f32(timeout).map_err(|_| {
                LoadTestError::InvalidOption {
                    option: "--timeout".to_string(),
                    value: timeout.to_string(),
                    detail: "--timeout must be a finite number of seconds greater than 0."
                        .to_string(),
                }
            })?;
            builder = builder.timeout(timeout);
        }

        Ok(VirtualUser {
            index,
            base_url,
            client: builder.build()?,
            iterations: 0,
            config: configuration.clone(),
            started: time::Instant::now(),
            rng: StdRng::from_os_rng(),
            channel_to_parent: None,
            logger: None,
        })
    }

    /// Reseed this user's random number generator, making its choices reproducible.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// This user's random number generator.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Join a path onto the host.
    pub fn build_url(&self, path: &str) -> Result<String, TransactionError> {
        Ok(self.base_url.join(path)?.to_string())
    }

    /// POST `body` serialized as JSON to `path`, recording the request in metrics.
    ///
    /// Any response, including non-2xx, is returned as a [`RequestOutcome`]. When the body
    /// can't be read the request is recorded as failed and the outcome keeps the status
    /// with an empty body. Requests that fail before a response is received are recorded
    /// with a status code of 0 and returned as a [`TransactionError`].
    pub async fn post_json<T: Serialize + ?Sized>(
        &mut self,
        path: &str,
        body: &T,
    ) -> Result<RequestOutcome, TransactionError> {
        let url = self.build_url(path)?;
        let payload = serde_json::to_vec(body)?;
        let name = format!("POST {}", path);

        let mut request =
            RequestMetric::new("POST", &name, &url, self.started.elapsed().as_millis(), self.index);
        let started = time::Instant::now();
        let result = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await;

        let outcome = match result {
            Ok(response) => {
                let status = response.status();
                request.status_code = status.as_u16();
                request.success = status.is_success();
                if !request.success {
                    request.error = status.to_string();
                }
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("{:?}: failed to read body: {}", &url, e);
                        request.success = false;
                        request.error = e.to_string();
                        String::new()
                    }
                };
                Ok(RequestOutcome { status, body })
            }
            Err(e) => {
                warn!("{:?}: {}", &url, e);
                request.error = e.to_string();
                Err(TransactionError::Reqwest(e))
            }
        };
        request.set_response_time(started.elapsed().as_millis());

        self.send_request_metric(request);
        outcome
    }

    /// Record a named check, returning whether it passed.
    pub fn check(&self, name: &str, passed: bool) -> bool {
        self.send_to_parent(Metric::Check(CheckMetric {
            name: name.to_string(),
            passed,
            user: self.index,
        }));
        passed
    }

    fn send_request_metric(&self, request: RequestMetric) {
        if let Some(logger) = self.logger.as_ref() {
            if let Err(e) = logger.send(Some(request.clone())) {
                debug!("failed to send request to logger: {}", e);
            }
        }
        self.send_to_parent(Metric::Request(request));
    }

    fn send_to_parent(&self, metric: Metric) {
        if self.config.no_metrics {
            return;
        }
        if let Some(parent) = self.channel_to_parent.as_ref() {
            // Best effort metrics.
            let _ = parent.send(metric);
        }
    }
}

/// Run a [`Scenario`] for one user until told to exit or the configured iterations
/// complete.
pub(crate) async fn user_main<S: Scenario>(
    scenario: Arc<S>,
    mut user: VirtualUser,
    receiver: flume::Receiver<UserCommand>,
) {
    info!("launching user {} from {}...", user.index, scenario.name());

    let mut state = scenario.on_start(&user);

    'iterations: loop {
        let started = time::Instant::now();
        let result = scenario.iteration(&mut user, &mut state).await;
        if let Err(e) = result.as_ref() {
            debug!("user {} iteration failed: {}", user.index, e);
        }
        user.iterations += 1;
        user.send_to_parent(Metric::Iteration(IterationMetric {
            user: user.index,
            run_time: started.elapsed().as_millis() as u64,
            success: result.is_ok(),
        }));

        if user.config.iterations > 0 && user.iterations >= user.config.iterations {
            info!(
                "user {} completed {} iterations",
                user.index, user.iterations
            );
            break;
        }

        // Wake regularly while pausing to notice when the load test shuts down.
        let mut wait_time = scenario.pause().as_millis();
        loop {
            if received_exit(&receiver) {
                break 'iterations;
            }
            if wait_time == 0 {
                break;
            }
            let sleep_time = wait_time.min(MAXIMUM_SLEEP_MS);
            wait_time -= sleep_time;
            tokio::time::sleep(Duration::from_millis(sleep_time as u64)).await;
        }
    }

    info!("exiting user {} from {}...", user.index, scenario.name());
}

// Determine if the parent has sent a UserCommand::Exit message.
fn received_exit(receiver: &flume::Receiver<UserCommand>) -> bool {
    while let Ok(command) = receiver.try_recv() {
        match command {
            UserCommand::Exit => return true,
        }
    }
    // The parent went away.
    receiver.is_disconnected()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn user() -> VirtualUser {
        VirtualUser::new(7, "http://localhost:8080/", &Configuration::default()).unwrap()
    }

    #[test]
    fn new_user() {
        let user = user();
        assert_eq!(user.index, 7);
        assert_eq!(user.iterations, 0);
        assert!(user.channel_to_parent.is_none());
        assert!(user.logger.is_none());

        assert!(VirtualUser::new(1, "localhost", &Configuration::default()).is_err());
    }

    #[test]
    fn request_timeout() {
        let configuration = Configuration {
            timeout: Some("2.5".to_string()),
            ..Default::default()
        };
        assert!(VirtualUser::new(1, "http://localhost:8080", &configuration).is_ok());

        for timeout in ["inf", "1e20", "-1"] {
            let configuration = Configuration {
                timeout: Some(timeout.to_string()),
                ..Default::default()
            };
            match VirtualUser::new(1, "http://localhost:8080", &configuration) {
                Err(LoadTestError::InvalidOption { option, .. }) => assert_eq!(option, "--timeout"),
                other => panic!("--timeout {} built {:?}", timeout, other),
            }
        }
    }

    #[test]
    fn build_url() {
        let user = user();
        assert_eq!(
            user.build_url("/vehicle/park").unwrap(),
            "http://localhost:8080/vehicle/park"
        );
        assert_eq!(
            user.build_url("vehicle/unpark").unwrap(),
            "http://localhost:8080/vehicle/unpark"
        );
        assert_eq!(
            user.build_url("http://other.local/park").unwrap(),
            "http://other.local/park"
        );
    }

    #[test]
    fn seeded_rng() {
        let mut first = user().set_seed(42);
        let mut second = user().set_seed(42);
        let a: Vec<u32> = (0..8).map(|_| first.rng().random()).collect();
        let b: Vec<u32> = (0..8).map(|_| second.rng().random()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn checks_are_sent_to_parent() {
        let (tx, rx) = flume::unbounded();
        let mut user = user();
        user.channel_to_parent = Some(tx);

        assert!(user.check("park status is 200", true));
        assert!(!user.check("park status is 200", false));

        let passed: Vec<bool> = rx
            .try_iter()
            .map(|metric| match metric {
                Metric::Check(check) => {
                    assert_eq!(check.name, "park status is 200");
                    assert_eq!(check.user, 7);
                    check.passed
                }
                other => panic!("unexpected metric: {:?}", other),
            })
            .collect();
        assert_eq!(passed, vec![true, false]);

        // Nothing is sent when metrics are disabled.
        user.config.no_metrics = true;
        user.check("park status is 200", true);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn exit_command() {
        let (tx, rx) = flume::unbounded();
        assert!(!received_exit(&rx));
        tx.send(UserCommand::Exit).unwrap();
        assert!(received_exit(&rx));
        assert!(!received_exit(&rx));
        drop(tx);
        assert!(received_exit(&rx));
    }

    #[test]
    fn outcome_json() {
        let outcome = RequestOutcome {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: r#"{"debug_error": "lot full"}"#.to_string(),
        };
        let value: serde_json::Value = outcome.json().unwrap();
        assert_eq!(value["debug_error"], "lot full");

        let outcome = RequestOutcome {
            status: StatusCode::BAD_GATEWAY,
            body: "<html>bad gateway</html>".to_string(),
        };
        assert!(outcome.json::<serde_json::Value>().is_err());
    }
}
