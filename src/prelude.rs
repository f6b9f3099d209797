//! Everything needed to run a load test, imported with `use parkload::prelude::*;`.

pub use async_trait::async_trait;

pub use crate::config::{DefaultType, LoadTestDefault};
pub use crate::logger::LogFormat;
pub use crate::metrics::Metrics;
pub use crate::parking::{ParkedQueue, ParkingScenario};
pub use crate::scenario::{IterationResult, Scenario};
pub use crate::test_plan::{TestPlan, TestPlanStepAction};
pub use crate::user::{RequestOutcome, TransactionError, VirtualUser};
pub use crate::{LoadTest, LoadTestError};
