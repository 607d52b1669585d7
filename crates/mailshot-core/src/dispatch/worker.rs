//! Recurring dispatch loop

use super::dispatcher::Dispatcher;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

/// Runs a dispatch pass every `interval_secs`
pub struct DispatchWorker {
    dispatcher: Arc<Dispatcher>,
    interval_secs: u64,
}

impl DispatchWorker {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            interval_secs: 60,
        }
    }

    /// Set poll interval
    pub fn with_interval(mut self, secs: u64) -> Self {
        self.interval_secs = secs.max(1);
        self
    }

    /// Run until the task is dropped. A slow pass delays the next one
    /// rather than stacking passes up.
    pub async fn run(&self) {
        let mut ticker = interval(Duration::from_secs(self.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Dispatch worker started (interval: {}s, concurrency: {})",
            self.interval_secs,
            self.dispatcher.settings().concurrency
        );

        loop {
            ticker.tick().await;

            if let Err(e) = self.dispatcher.run_pass().await {
                error!("Error selecting due campaigns: {}", e);
            }
        }
    }
}
