use httpmock::{Method::POST, MockServer};
use serial_test::serial;

mod common;

use parkload::logger::CSV_HEADER;
use parkload::parking::PARK_PATH;

const ITERATIONS: usize = 3;

// Run a single user parking ITERATIONS vehicles, logging every request.
fn run_logged_load_test(server: &MockServer, request_log: &str, format: &str) {
    let iterations = ITERATIONS.to_string();
    let configuration = common::build_configuration(
        server,
        vec![
            "--iterations",
            &iterations,
            "--park-ratio",
            "1",
            "--request-log",
            request_log,
            "--request-format",
            format,
        ],
    );
    common::run_load_test(common::build_load_test(configuration));
}

#[test]
#[serial]
/// Requests are logged as one JSON object per line.
fn test_request_log_json() {
    let request_log = "request-log-json.log";
    common::cleanup_files(vec![request_log]);

    let server = MockServer::start();
    let park = server.mock(|when, then| {
        when.method(POST).path(PARK_PATH);
        then.status(200);
    });

    run_logged_load_test(&server, request_log, "json");

    park.assert_hits(ITERATIONS);
    let lines = common::file_lines(request_log);
    assert_eq!(lines.len(), ITERATIONS);
    for line in lines {
        let request: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(request["method"], "POST");
        assert_eq!(request["name"], "POST /vehicle/park");
        assert_eq!(request["status_code"], 200);
        assert_eq!(request["success"], true);
        assert_eq!(request["user"], 1);
        assert!(request["url"].as_str().unwrap().ends_with(PARK_PATH));
    }

    common::cleanup_files(vec![request_log]);
}

#[test]
#[serial]
/// Requests are logged as CSV following a header line.
fn test_request_log_csv() {
    let request_log = "request-log-csv.log";
    common::cleanup_files(vec![request_log]);

    let server = MockServer::start();
    let park = server.mock(|when, then| {
        when.method(POST).path(PARK_PATH);
        then.status(500).body("Internal Server Error");
    });

    run_logged_load_test(&server, request_log, "csv");

    park.assert_hits(ITERATIONS);
    let lines = common::file_lines(request_log);
    assert_eq!(lines.len(), ITERATIONS + 1);
    assert_eq!(lines[0], CSV_HEADER);
    for line in &lines[1..] {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields[1], "POST");
        assert_eq!(fields[2], "POST /vehicle/park");
        assert_eq!(fields[5], "500");
        assert_eq!(fields[6], "false");
        assert_eq!(fields[7], "1");
    }

    common::cleanup_files(vec![request_log]);
}

#[test]
#[serial]
/// Raw request logs hold one line per request.
fn test_request_log_raw() {
    let request_log = "request-log-raw.log";
    common::cleanup_files(vec![request_log]);

    let server = MockServer::start();
    let park = server.mock(|when, then| {
        when.method(POST).path(PARK_PATH);
        then.status(200);
    });

    run_logged_load_test(&server, request_log, "raw");

    park.assert_hits(ITERATIONS);
    assert_eq!(common::file_length(request_log), ITERATIONS);

    common::cleanup_files(vec![request_log]);
}

#[test]
#[serial]
/// Nothing is logged unless a request log is configured.
fn test_no_request_log() {
    let server = MockServer::start();
    let park = server.mock(|when, then| {
        when.method(POST).path(PARK_PATH);
        then.status(200);
    });

    let configuration =
        common::build_configuration(&server, vec!["--iterations", "2", "--park-ratio", "1"]);
    assert!(configuration.request_log.is_empty());
    let metrics = common::run_load_test(common::build_load_test(configuration));

    park.assert_hits(2);
    assert_eq!(metrics.iterations, 2);
}
