//! Campaign dispatch
//!
//! A dispatch execution loads a campaign's message and recipients, sends one
//! envelope per recipient, advances the campaign to `started`, and appends
//! exactly one attempt summarising the result. Recipient failures are
//! isolated: they are counted and logged, never allowed to abort the batch.
//!
//! Executions are entered from two places: the recurring [`DispatchWorker`]
//! (due campaigns only) and the [`ManualTrigger`] (one campaign, window
//! ignored). Both take a short lease on the campaign first so a campaign is
//! never executed twice at the same time.

mod dispatcher;
mod manual;
mod report;
mod tally;
mod worker;

pub use dispatcher::Dispatcher;
pub use manual::ManualTrigger;
pub use report::{DispatchError, DispatchOutcome, DispatchReport, PassSummary};
pub use tally::DeliveryTally;
pub use worker::DispatchWorker;

use chrono::Duration;
use mailshot_common::config::DispatchConfig;

/// Tunables for a dispatcher
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Sender address for every envelope
    pub from_address: String,
    /// Deliveries in flight per campaign
    pub concurrency: usize,
    /// How long an execution may hold a campaign before others may take it
    pub claim_lease: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            from_address: config.from_address.clone(),
            concurrency: config.concurrency.max(1),
            claim_lease: Duration::seconds(config.claim_lease_secs),
        }
    }
}
