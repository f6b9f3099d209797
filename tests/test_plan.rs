use gumdrop::Options;
use std::str::FromStr;

use parkload::config::Configuration;
use parkload::test_plan::TestPlan;
use parkload::LoadTestError;

// Test valid test plan parsing with various formats
#[test]
fn test_valid_test_plan_parsing() {
    // The default parking ramp: up to 50 users over 2 minutes, hold 5 minutes, down over 2.
    let plan = TestPlan::from_str("50,2m;50,5m;0,2m").unwrap();
    assert_eq!(plan.steps, vec![(50, 120_000), (50, 300_000), (0, 120_000)]);
    assert_eq!(plan.total_users(), 50);

    // Integer seconds without suffix
    let plan = TestPlan::from_str("15,45").unwrap();
    assert_eq!(plan.steps, vec![(15, 45_000)]);

    // Hours, minutes and seconds together
    let plan = TestPlan::from_str("10,1h30m10s").unwrap();
    assert_eq!(plan.steps, vec![(10, 5_410_000)]);

    // Hours and minutes
    let plan = TestPlan::from_str("20,1h20m").unwrap();
    assert_eq!(plan.steps, vec![(20, 4_800_000)]);
}

#[test]
fn test_test_plan_whitespace_handling() {
    let plan = TestPlan::from_str("  10  ,  30s  ").unwrap();
    assert_eq!(plan.steps, vec![(10, 30_000)]);

    let plan = TestPlan::from_str("\t5,30s;\n10,1m").unwrap();
    assert_eq!(plan.steps, vec![(5, 30_000), (10, 60_000)]);
}

#[test]
fn test_test_plan_zero_values() {
    let plan = TestPlan::from_str("10,0").unwrap();
    assert_eq!(plan.steps, vec![(10, 0)]);

    let plan = TestPlan::from_str("0,0").unwrap();
    assert_eq!(plan.steps, vec![(0, 0)]);
    assert_eq!(plan.total_users(), 0);
}

#[test]
fn test_test_plan_huge_timespans() {
    // Steps too long to represent saturate instead of overflowing.
    let plan = TestPlan::from_str("1,9999999999999999h").unwrap();
    assert_eq!(plan.steps, vec![(1, usize::MAX)]);

    let configuration = Configuration::parse_args_default(&[
        "--users",
        "1",
        "--hatch-rate",
        "1",
        "--run-time",
        "9999999999999999h",
    ])
    .unwrap();
    assert_eq!(
        TestPlan::build(&configuration).steps,
        vec![(1, 1_000), (1, usize::MAX), (0, 0)]
    );
}

#[test]
fn test_invalid_test_plan_formats() {
    for invalid in [
        "",
        "10",
        "ten,30s",
        "10,30x",
        "10,30s,5",
        "-1,30s",
        "10,2m30",
        "10,30s;",
        "10;30s",
    ] {
        match TestPlan::from_str(invalid) {
            Err(LoadTestError::InvalidOption { option, .. }) => assert_eq!(option, "--test-plan"),
            other => panic!("{:?} parsed as {:?}", invalid, other),
        }
    }
}

#[test]
fn test_total_users_calculation() {
    // Users launched in later steps are added to the total.
    let plan = TestPlan::from_str("10,1m;5,1m;20,1m;0,30s").unwrap();
    assert_eq!(plan.total_users(), 25);

    let plan = TestPlan::from_str("5,10s;10,10s;15,10s;0,10s").unwrap();
    assert_eq!(plan.total_users(), 15);

    assert_eq!(TestPlan::new().total_users(), 0);
}

#[test]
fn test_test_plan_option() {
    let configuration =
        Configuration::parse_args_default(&["--test-plan", "50,2m;50,5m;0,2m"]).unwrap();
    let plan = TestPlan::build(&configuration);
    assert_eq!(plan.steps, vec![(50, 120_000), (50, 300_000), (0, 120_000)]);

    assert!(Configuration::parse_args_default(&["--test-plan", "50;2m"]).is_err());
}

#[test]
fn test_test_plan_from_simple_options() {
    // Startup time launches all users over the given time span.
    let configuration = Configuration::parse_args_default(&[
        "--users",
        "10",
        "--startup-time",
        "20s",
        "--run-time",
        "1m",
    ])
    .unwrap();
    assert_eq!(
        TestPlan::build(&configuration).steps,
        vec![(10, 20_000), (10, 60_000), (0, 0)]
    );

    // Without a run time users run until canceled or out of iterations.
    let configuration =
        Configuration::parse_args_default(&["--users", "4", "--hatch-rate", "2"]).unwrap();
    assert_eq!(TestPlan::build(&configuration).steps, vec![(4, 2_000)]);

    // Nothing configured, nothing to do.
    assert!(TestPlan::build(&Configuration::default()).steps.is_empty());
}
