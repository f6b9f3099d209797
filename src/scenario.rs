//! The seam between the load test engine and the traffic it generates.
//!
//! A [`Scenario`] describes what one [`VirtualUser`] does. When the load test executes,
//! the engine passes the final configuration to [`Scenario::configure`]. It then calls
//! [`Scenario::on_start`] once when a user launches to build that user's private state,
//! then calls [`Scenario::iteration`] over and over with that state, sleeping
//! [`Scenario::pause`] in between, until the user is told to exit.
//!
//! # Example
//! ```rust
//! use parkload::prelude::*;
//! use std::time::Duration;
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl Scenario for Ping {
//!     type State = usize;
//!
//!     fn name(&self) -> &str {
//!         "ping"
//!     }
//!
//!     fn on_start(&self, _user: &VirtualUser) -> usize {
//!         0
//!     }
//!
//!     async fn iteration(&self, user: &mut VirtualUser, pings: &mut usize) -> IterationResult {
//!         let outcome = user.post_json("/ping", &serde_json::json!({})).await?;
//!         if user.check("ping status is 200", outcome.status.as_u16() == 200) {
//!             *pings += 1;
//!         }
//!         Ok(())
//!     }
//!
//!     fn pause(&self) -> Duration {
//!         Duration::from_millis(250)
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::time::Duration;

use crate::config::Configuration;
use crate::user::{TransactionError, VirtualUser};
use crate::LoadTestError;

/// Returned by every [`Scenario::iteration`]; an error is counted as a failed iteration
/// but never stops the user.
pub type IterationResult = Result<(), TransactionError>;

/// Traffic generated by each [`VirtualUser`] of a load test.
#[async_trait]
pub trait Scenario: Send + Sync + 'static {
    /// Per-user state, owned by the user's task and passed into every iteration.
    type State: Send + 'static;

    /// Display name used in logs.
    fn name(&self) -> &str;

    /// Apply scenario options from the final configuration, after defaults and
    /// environment variables have been applied. Called once, before any user launches.
    fn configure(&mut self, _configuration: &Configuration) -> Result<(), LoadTestError> {
        Ok(())
    }

    /// Build the state for a user that is launching.
    fn on_start(&self, user: &VirtualUser) -> Self::State;

    /// Run one iteration for a user.
    async fn iteration(&self, user: &mut VirtualUser, state: &mut Self::State) -> IterationResult;

    /// How long a user pauses after each iteration.
    fn pause(&self) -> Duration {
        Duration::from_secs(1)
    }
}
