//! Results of dispatch executions and passes

use super::tally::DeliveryTally;
use mailshot_common::types::{AttemptId, CampaignId};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// How a single execution went, from the sender's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Every recipient accepted the message
    FullySent,
    /// Some recipients failed
    PartiallySent,
    /// Nobody was reached, or the execution could not run
    Failed,
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DispatchOutcome::FullySent => "fully_sent",
            DispatchOutcome::PartiallySent => "partially_sent",
            DispatchOutcome::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Result of one dispatch execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub campaign_id: CampaignId,
    /// Attempt written for this execution, if the write succeeded
    pub attempt_id: Option<AttemptId>,
    pub outcome: DispatchOutcome,
    pub succeeded: usize,
    pub failed: usize,
    /// Latest per-recipient transport error
    pub last_error: Option<String>,
    /// Batch-level error that stopped the execution before delivery
    pub error: Option<String>,
}

impl DispatchReport {
    pub(crate) fn delivered(
        campaign_id: CampaignId,
        attempt_id: Option<AttemptId>,
        tally: &DeliveryTally,
    ) -> Self {
        Self {
            campaign_id,
            attempt_id,
            outcome: tally.outcome(),
            succeeded: tally.succeeded(),
            failed: tally.failed(),
            last_error: tally.last_error().map(str::to_string),
            error: None,
        }
    }

    pub(crate) fn aborted(
        campaign_id: CampaignId,
        attempt_id: Option<AttemptId>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            campaign_id,
            attempt_id,
            outcome: DispatchOutcome::Failed,
            succeeded: 0,
            failed: 0,
            last_error: None,
            error: Some(error.into()),
        }
    }

    /// One-line message for whoever pressed "send now"
    pub fn summary(&self) -> String {
        let id = self.campaign_id;
        let last_error = self.last_error.as_deref().unwrap_or("unknown error");

        if let Some(error) = &self.error {
            return format!("Campaign {} could not be sent: {}", id, error);
        }

        match self.outcome {
            DispatchOutcome::FullySent => format!(
                "Campaign {} sent successfully to {} recipient(s)",
                id, self.succeeded
            ),
            DispatchOutcome::PartiallySent => format!(
                "Campaign {} sent with errors: {} succeeded, {} failed. Last error: {}",
                id, self.succeeded, self.failed, last_error
            ),
            DispatchOutcome::Failed if self.failed == 0 => {
                format!("Campaign {} has no recipients; nothing was sent", id)
            }
            DispatchOutcome::Failed => format!(
                "Campaign {} failed for all {} recipient(s). Last error: {}",
                id, self.failed, last_error
            ),
        }
    }
}

/// Counters for one pass over the due campaigns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// Campaigns the selection returned
    pub due: usize,
    /// Executions that ran to the end and wrote an attempt
    pub dispatched: usize,
    /// Campaigns another execution was already holding
    pub skipped: usize,
    /// Executions that could not complete
    pub errors: usize,
}

/// Why a manual send was refused before anything was attempted
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Campaign not found")]
    NotFound,

    #[error("Campaign is completed and can no longer be sent")]
    Completed,

    #[error("Campaign is already being dispatched")]
    InProgress,
}

impl From<DispatchError> for mailshot_common::Error {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotFound => mailshot_common::Error::NotFound(err.to_string()),
            DispatchError::Completed | DispatchError::InProgress => {
                mailshot_common::Error::Conflict(err.to_string())
            }
        }
    }
}
