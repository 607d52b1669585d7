//! Dispatch executions and due passes

use super::report::{DispatchReport, PassSummary};
use super::tally::DeliveryTally;
use super::DispatchSettings;
use crate::clock::{Clock, SystemClock};
use crate::mail::{Envelope, Mailer};
use chrono::SubsecRound;
use futures::stream::{self, StreamExt};
use mailshot_common::types::CampaignId;
use mailshot_common::Result;
use mailshot_storage::{
    AccessScope, Attempt, AttemptRepository, AttemptStatus, Campaign, CampaignRepository,
    CampaignStatus, ClaimKind, Client, DatabasePool, DbAttemptRepository, DbCampaignRepository,
    DbMessageRepository, Message, MessageRepository, NewAttempt,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Sends campaigns and keeps the attempt log
pub struct Dispatcher {
    campaigns: Arc<dyn CampaignRepository>,
    messages: Arc<dyn MessageRepository>,
    attempts: Arc<dyn AttemptRepository>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        messages: Arc<dyn MessageRepository>,
        attempts: Arc<dyn AttemptRepository>,
        mailer: Arc<dyn Mailer>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            campaigns,
            messages,
            attempts,
            mailer,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    /// Dispatcher backed by the database repositories
    pub fn from_pool(
        pool: DatabasePool,
        mailer: Arc<dyn Mailer>,
        settings: DispatchSettings,
    ) -> Self {
        Self::new(
            Arc::new(DbCampaignRepository::new(pool.clone())),
            Arc::new(DbMessageRepository::new(pool.clone())),
            Arc::new(DbAttemptRepository::new(pool)),
            mailer,
            settings,
        )
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Load a campaign visible in `scope`
    pub async fn find_campaign(
        &self,
        scope: &AccessScope,
        id: CampaignId,
    ) -> Result<Option<Campaign>> {
        self.campaigns.get(scope, id).await
    }

    /// One pass: execute every campaign that is due right now.
    ///
    /// Only a failure to select due campaigns fails the pass; problems with
    /// individual campaigns are logged and counted.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let now = self.clock.now();
        let due = self.campaigns.list_due(now).await?;

        let mut summary = PassSummary {
            due: due.len(),
            ..Default::default()
        };

        if due.is_empty() {
            debug!("No campaigns due");
            return Ok(summary);
        }

        info!(count = due.len(), "Dispatching due campaigns");

        for campaign in &due {
            match self.dispatch(campaign, ClaimKind::Scheduled).await {
                Ok(Some(report)) if report.error.is_none() => summary.dispatched += 1,
                Ok(Some(_)) => summary.errors += 1,
                Ok(None) => {
                    debug!(
                        campaign_id = %campaign.id,
                        "Campaign held elsewhere or no longer due, skipping"
                    );
                    summary.skipped += 1;
                }
                Err(e) => {
                    error!(campaign_id = %campaign.id, error = %e, "Failed to claim campaign");
                    summary.errors += 1;
                }
            }
        }

        info!(
            due = summary.due,
            dispatched = summary.dispatched,
            skipped = summary.skipped,
            errors = summary.errors,
            "Dispatch pass finished"
        );

        Ok(summary)
    }

    /// Claim the campaign, execute it, and release the claim.
    ///
    /// The claim re-reads the campaign. A campaign completed since it was
    /// selected is refused, and so is one outside its window when `kind` is
    /// [`ClaimKind::Scheduled`]. Returns `Ok(None)` when the claim is refused;
    /// in that case nothing is sent and no attempt is written.
    pub async fn dispatch(
        &self,
        campaign: &Campaign,
        kind: ClaimKind,
    ) -> Result<Option<DispatchReport>> {
        let now = self.clock.now();
        // Postgres keeps microseconds; the release matches on this value
        let until = (now + self.settings.claim_lease).trunc_subsecs(6);

        let Some(campaign) = self
            .campaigns
            .try_claim(campaign.id, kind, now, until)
            .await?
        else {
            return Ok(None);
        };

        let report = self.execute(&campaign).await;

        match self.campaigns.release_claim(campaign.id, until).await {
            Ok(true) => {}
            Ok(false) => warn!(
                campaign_id = %campaign.id,
                "Campaign claim expired during execution and was taken over"
            ),
            Err(e) => {
                warn!(campaign_id = %campaign.id, error = %e, "Failed to release campaign claim")
            }
        }

        Ok(Some(report))
    }

    /// Run one execution. Always produces a report and, unless the attempt
    /// log itself is unavailable, exactly one attempt.
    async fn execute(&self, campaign: &Campaign) -> DispatchReport {
        let (message, recipients) = match self.load(campaign).await {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(campaign_id = %campaign.id, error = %e, "Dispatch aborted");
                let error = e.to_string();
                let response = format!("dispatch aborted: {}", error);
                let attempt = self.record(campaign, AttemptStatus::Failed, response).await;
                return DispatchReport::aborted(campaign.id, attempt.map(|a| a.id), error);
            }
        };

        info!(
            campaign_id = %campaign.id,
            recipients = recipients.len(),
            "Sending campaign"
        );

        let tally = self.deliver_all(campaign, &message, &recipients).await;
        self.mark_started(campaign).await;

        let attempt = self
            .record(campaign, tally.attempt_status(), tally.server_response())
            .await;

        info!(
            campaign_id = %campaign.id,
            succeeded = tally.succeeded(),
            failed = tally.failed(),
            "Campaign execution finished"
        );

        DispatchReport::delivered(campaign.id, attempt.map(|a| a.id), &tally)
    }

    async fn load(&self, campaign: &Campaign) -> Result<(Message, Vec<Client>)> {
        let message = self
            .messages
            .get(&AccessScope::All, campaign.message_id)
            .await?
            .ok_or_else(|| {
                mailshot_common::Error::NotFound(format!("message {}", campaign.message_id))
            })?;
        let recipients = self.campaigns.recipients(campaign.id).await?;
        Ok((message, recipients))
    }

    /// Send to every recipient, at most `concurrency` at a time. Results are
    /// folded in recipient order, so "last error" is deterministic.
    async fn deliver_all(
        &self,
        campaign: &Campaign,
        message: &Message,
        recipients: &[Client],
    ) -> DeliveryTally {
        let campaign_id = campaign.id;
        let mailer = &self.mailer;
        let from = &self.settings.from_address;

        let delivery: std::pin::Pin<Box<dyn std::future::Future<Output = DeliveryTally> + Send + '_>> =
            Box::pin(stream::iter(recipients)
            .map(move |client| {
                let envelope = Envelope {
                    from: from.clone(),
                    to: client.email.clone(),
                    subject: message.subject.clone(),
                    body: message.body.clone(),
                };
                async move {
                    let result = mailer.send(&envelope).await;
                    (envelope.to, result)
                }
            })
            .buffered(self.settings.concurrency.max(1))
            .fold(DeliveryTally::default(), move |mut tally, (to, result)| async move {
                match result {
                    Ok(()) => {
                        debug!(campaign_id = %campaign_id, to = %to, "Delivered");
                        tally.record_success();
                    }
                    Err(e) => {
                        error!(campaign_id = %campaign_id, to = %to, error = %e, "Delivery failed");
                        tally.record_failure(e.to_string());
                    }
                }
                tally
            }));
        delivery.await
    }

    async fn mark_started(&self, campaign: &Campaign) {
        match self
            .campaigns
            .transition(campaign.id, CampaignStatus::Started)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(
                campaign_id = %campaign.id,
                "Campaign status not advanced; it was completed or removed meanwhile"
            ),
            Err(e) => {
                error!(campaign_id = %campaign.id, error = %e, "Failed to advance campaign status")
            }
        }
    }

    async fn record(
        &self,
        campaign: &Campaign,
        status: AttemptStatus,
        response: String,
    ) -> Option<Attempt> {
        let attempt = NewAttempt::for_campaign(campaign, self.clock.now(), status, response);

        match self.attempts.record(attempt).await {
            Ok(attempt) => Some(attempt),
            Err(e) => {
                error!(campaign_id = %campaign.id, error = %e, "Failed to record attempt");
                None
            }
        }
    }
}
