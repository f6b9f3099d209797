use parkload::prelude::*;

/// Host targeted when neither `--host` nor `PARKLOAD_HOST` is set.
const DEFAULT_HOST: &str = "http://localhost:8080";

/// Ramp up to 50 users over 2 minutes, hold them for 5 minutes, then ramp down over 2 minutes.
const DEFAULT_TEST_PLAN: &str = "50,2m;50,5m;0,2m";

fn main() -> Result<(), LoadTestError> {
    LoadTest::initialize()?
        .set_scenario(ParkingScenario::default())
        .set_default(LoadTestDefault::Host, DEFAULT_HOST)?
        .set_default(LoadTestDefault::TestPlan, DEFAULT_TEST_PLAN)?
        .execute()?
        .print();

    Ok(())
}
