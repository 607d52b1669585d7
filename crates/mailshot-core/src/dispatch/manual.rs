//! "Send now" for a single campaign

use super::dispatcher::Dispatcher;
use super::report::{DispatchError, DispatchOutcome, DispatchReport};
use mailshot_common::types::CampaignId;
use mailshot_storage::{AccessScope, CampaignStatus, ClaimKind};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs one dispatch execution on demand, regardless of the campaign's
/// time window.
#[derive(Clone)]
pub struct ManualTrigger {
    dispatcher: Arc<Dispatcher>,
}

impl ManualTrigger {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Send campaign `id` now.
    ///
    /// Refusals (not visible, completed, already running) come back as
    /// [`DispatchError`]. Anything that goes wrong once the send is under
    /// way is reported as a failed [`DispatchReport`] instead.
    pub async fn send_now(
        &self,
        scope: &AccessScope,
        id: CampaignId,
    ) -> Result<DispatchReport, DispatchError> {
        info!(campaign_id = %id, "Manual send requested");

        let campaign = match self.dispatcher.find_campaign(scope, id).await {
            Ok(Some(campaign)) => campaign,
            Ok(None) => return Err(DispatchError::NotFound),
            Err(e) => {
                error!(campaign_id = %id, error = %e, "Failed to load campaign for manual send");
                return Ok(DispatchReport::aborted(id, None, e.to_string()));
            }
        };

        if let Err(e) = campaign.status.transition(CampaignStatus::Started) {
            warn!(campaign_id = %id, error = %e, "Manual send refused");
            return Err(DispatchError::Completed);
        }

        let report = match self.dispatcher.dispatch(&campaign, ClaimKind::Manual).await {
            Ok(Some(report)) => report,
            Ok(None) => return Err(self.refusal(scope, id).await),
            Err(e) => {
                error!(campaign_id = %id, error = %e, "Failed to claim campaign for manual send");
                DispatchReport::aborted(id, None, e.to_string())
            }
        };

        match report.outcome {
            DispatchOutcome::FullySent => info!(campaign_id = %id, "{}", report.summary()),
            DispatchOutcome::PartiallySent => warn!(campaign_id = %id, "{}", report.summary()),
            DispatchOutcome::Failed => error!(campaign_id = %id, "{}", report.summary()),
        }

        Ok(report)
    }

    /// Why a claim was refused: completed since the lookup, or held elsewhere
    async fn refusal(&self, scope: &AccessScope, id: CampaignId) -> DispatchError {
        match self.dispatcher.find_campaign(scope, id).await {
            Ok(Some(campaign)) if !campaign.status.is_dispatchable() => DispatchError::Completed,
            Ok(None) => DispatchError::NotFound,
            _ => DispatchError::InProgress,
        }
    }
}
