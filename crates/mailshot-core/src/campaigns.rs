//! Campaign lifecycle outside of dispatch

use mailshot_common::types::{CampaignId, ClientId, MessageId, UserId};
use mailshot_common::{Error, Result};
use mailshot_storage::{
    AccessScope, Campaign, CampaignRepository, ClientRepository, CreateCampaign, DatabasePool,
    DbCampaignRepository, DbClientRepository, DbMessageRepository, MessageRepository,
    UpdateCampaign,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Validated creation, editing, and administrative disable of campaigns
pub struct CampaignManager {
    campaigns: Arc<dyn CampaignRepository>,
    messages: Arc<dyn MessageRepository>,
    clients: Arc<dyn ClientRepository>,
}

impl CampaignManager {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        messages: Arc<dyn MessageRepository>,
        clients: Arc<dyn ClientRepository>,
    ) -> Self {
        Self {
            campaigns,
            messages,
            clients,
        }
    }

    pub fn from_pool(pool: DatabasePool) -> Self {
        Self::new(
            Arc::new(DbCampaignRepository::new(pool.clone())),
            Arc::new(DbMessageRepository::new(pool.clone())),
            Arc::new(DbClientRepository::new(pool)),
        )
    }

    /// Create a campaign in `created` status.
    ///
    /// The window must not be inverted, and the message and every recipient
    /// must be visible to the caller.
    pub async fn create(
        &self,
        scope: &AccessScope,
        owner_id: Option<UserId>,
        mut input: CreateCampaign,
    ) -> Result<Campaign> {
        input.validate()?;
        input.client_ids = dedup(input.client_ids);

        self.check_message(scope, input.message_id).await?;
        self.check_clients(scope, &input.client_ids).await?;

        let campaign = self.campaigns.create(owner_id, input).await?;
        info!(campaign_id = %campaign.id, "Campaign created");
        Ok(campaign)
    }

    /// Edit window, message, or recipients. Status is not editable.
    pub async fn update(
        &self,
        scope: &AccessScope,
        id: CampaignId,
        mut input: UpdateCampaign,
    ) -> Result<Option<Campaign>> {
        let Some(current) = self.campaigns.get(scope, id).await? else {
            return Ok(None);
        };

        input.validate_against(&current)?;

        if let Some(message_id) = input.message_id {
            self.check_message(scope, message_id).await?;
        }
        if let Some(client_ids) = input.client_ids.take() {
            let client_ids = dedup(client_ids);
            self.check_clients(scope, &client_ids).await?;
            input.client_ids = Some(client_ids);
        }

        self.campaigns.update(scope, id, input).await
    }

    /// Force every selected campaign to `completed`.
    ///
    /// Campaigns outside `scope` are silently left alone. No attempt is
    /// written. Returns how many campaigns were updated.
    pub async fn disable(&self, scope: &AccessScope, ids: &[CampaignId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let updated = self.campaigns.complete_many(scope, ids).await?;
        info!(requested = ids.len(), updated, "Campaigns disabled");
        Ok(updated)
    }

    async fn check_message(&self, scope: &AccessScope, id: MessageId) -> Result<()> {
        match self.messages.get(scope, id).await? {
            Some(_) => Ok(()),
            None => Err(Error::Validation(format!("Unknown message: {}", id))),
        }
    }

    async fn check_clients(&self, scope: &AccessScope, ids: &[ClientId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let visible = self.clients.count_visible(scope, ids).await?;
        if visible != ids.len() as i64 {
            return Err(Error::Validation(format!(
                "{} of {} recipients are unknown",
                ids.len() as i64 - visible,
                ids.len()
            )));
        }
        Ok(())
    }
}

fn dedup(ids: Vec<ClientId>) -> Vec<ClientId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
