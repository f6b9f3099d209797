use gumdrop::Options;
use httpmock::MockServer;
use std::io::{self, BufRead};

use parkload::config::Configuration;
use parkload::metrics::Metrics;
use parkload::parking::ParkingScenario;
use parkload::LoadTest;

/// The following options are configured by default, if not set to a custom value:
///  --host <mock-server>
///  --users 1 (unless --test-plan is set)
///  --hatch-rate 1 (unless --test-plan or --startup-time is set)
///  --run-time 1 (unless --test-plan or --iterations is set)
///  --pause 0
pub fn build_configuration(server: &MockServer, custom: Vec<&str>) -> Configuration {
    let mut configuration: Vec<&str> = vec![];
    // Declare server_url here no matter what, so its lifetime is sufficient when needed.
    let server_url = server.base_url();

    configuration.extend_from_slice(&custom);

    if !configuration.contains(&"--host") {
        configuration.extend_from_slice(&["--host", &server_url]);
    }

    let test_plan = configuration.contains(&"--test-plan");

    if !test_plan && !configuration.contains(&"--users") {
        configuration.extend_from_slice(&["--users", "1"]);
    }

    if !test_plan
        && !configuration.contains(&"--hatch-rate")
        && !configuration.contains(&"--startup-time")
    {
        configuration.extend_from_slice(&["--hatch-rate", "1"]);
    }

    if !test_plan && !configuration.contains(&"--run-time") && !configuration.contains(&"--iterations")
    {
        configuration.extend_from_slice(&["--run-time", "1"]);
    }

    // Don't slow tests down with the default 1 second pause.
    if !configuration.contains(&"--pause") {
        configuration.extend_from_slice(&["--pause", "0"]);
    }

    Configuration::parse_args_default(&configuration)
        .expect("failed to parse options and generate a configuration")
}

/// Create a parking LoadTest from the configuration. The scenario picks up
/// --park-ratio and --pause when the load test executes.
pub fn build_load_test(configuration: Configuration) -> LoadTest {
    LoadTest::initialize_with_config(configuration).set_scenario(ParkingScenario::default())
}

/// Run the actual load test, returning the Metrics.
pub fn run_load_test(load_test: LoadTest) -> Metrics {
    load_test.execute().unwrap()
}

/// Helper to count the number of lines in a test artifact.
#[allow(dead_code)]
pub fn file_length(file_name: &str) -> usize {
    if let Ok(file) = std::fs::File::open(std::path::Path::new(file_name)) {
        io::BufReader::new(file).lines().count()
    } else {
        0
    }
}

/// Helper to read all lines of a test artifact.
#[allow(dead_code)]
pub fn file_lines(file_name: &str) -> Vec<String> {
    match std::fs::File::open(std::path::Path::new(file_name)) {
        Ok(file) => io::BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Helper to delete test artifacts, if existing.
#[allow(dead_code)]
pub fn cleanup_files(files: Vec<&str>) {
    for file in files {
        if std::path::Path::new(file).exists() {
            std::fs::remove_file(file).expect("failed to remove file");
        }
    }
}
