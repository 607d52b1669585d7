//! In-memory repositories for dispatcher and manager tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailshot_common::types::{CampaignId, ClientId, MessageId, UserId};
use mailshot_common::{Error, Result};
use mailshot_storage::{
    AccessScope, Attempt, AttemptCounts, AttemptRepository, AttemptStatus, Campaign,
    CampaignRepository, CampaignStatus, ClaimKind, Client, ClientRepository, CreateCampaign,
    CreateClient, CreateMessage, Message, MessageRepository, NewAttempt, UpdateCampaign,
    UpdateClient, UpdateMessage,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct State {
    clients: HashMap<ClientId, Client>,
    messages: HashMap<MessageId, Message>,
    campaigns: HashMap<CampaignId, Campaign>,
    recipients: HashMap<CampaignId, Vec<ClientId>>,
    attempts: Vec<Attempt>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    /// Make `recipients` fail, simulating an unreadable recipient set
    pub fail_recipients: AtomicBool,
    /// Make `list_due` fail
    pub fail_list_due: AtomicBool,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_client(&self, owner_id: Option<UserId>, email: &str) -> Client {
        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: email.to_string(),
            comment: None,
            owner_id,
            created_at: now,
            updated_at: now,
        };
        self.state().clients.insert(client.id, client.clone());
        client
    }

    pub fn add_message(&self, owner_id: Option<UserId>) -> Message {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            subject: "Spring sale".to_string(),
            body: "Everything must go".to_string(),
            owner_id,
            created_at: now,
            updated_at: now,
        };
        self.state().messages.insert(message.id, message.clone());
        message
    }

    pub fn add_campaign(
        &self,
        owner_id: Option<UserId>,
        message_id: MessageId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        clients: &[&Client],
    ) -> Campaign {
        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            start_time,
            end_time,
            status: CampaignStatus::Created,
            message_id,
            owner_id,
            claimed_until: None,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state();
        state.campaigns.insert(campaign.id, campaign.clone());
        state
            .recipients
            .insert(campaign.id, clients.iter().map(|c| c.id).collect());
        campaign
    }

    pub fn campaign(&self, id: CampaignId) -> Campaign {
        self.state().campaigns[&id].clone()
    }

    pub fn set_status(&self, id: CampaignId, status: CampaignStatus) {
        if let Some(campaign) = self.state().campaigns.get_mut(&id) {
            campaign.status = status;
        }
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.state().attempts.clone()
    }
}

#[async_trait]
impl ClientRepository for MemoryStore {
    async fn create(&self, owner_id: Option<UserId>, input: CreateClient) -> Result<Client> {
        let mut client = self.add_client(owner_id, &input.email);
        client.full_name = input.full_name;
        client.comment = input.comment;
        self.state().clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn get(&self, scope: &AccessScope, id: ClientId) -> Result<Option<Client>> {
        Ok(self
            .state()
            .clients
            .get(&id)
            .filter(|c| scope.permits(c.owner_id))
            .cloned())
    }

    async fn list(&self, scope: &AccessScope, limit: i64, offset: i64) -> Result<Vec<Client>> {
        let mut clients: Vec<Client> = self
            .state()
            .clients
            .values()
            .filter(|c| scope.permits(c.owner_id))
            .cloned()
            .collect();
        clients.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(page(clients, limit, offset))
    }

    async fn update(
        &self,
        scope: &AccessScope,
        id: ClientId,
        input: UpdateClient,
    ) -> Result<Option<Client>> {
        let mut state = self.state();
        let Some(client) = state
            .clients
            .get_mut(&id)
            .filter(|c| scope.permits(c.owner_id))
        else {
            return Ok(None);
        };
        if let Some(email) = input.email {
            client.email = email;
        }
        if let Some(full_name) = input.full_name {
            client.full_name = full_name;
        }
        if input.comment.is_some() {
            client.comment = input.comment;
        }
        Ok(Some(client.clone()))
    }

    async fn delete(&self, scope: &AccessScope, id: ClientId) -> Result<bool> {
        let mut state = self.state();
        let visible = state
            .clients
            .get(&id)
            .is_some_and(|c| scope.permits(c.owner_id));
        if visible {
            state.clients.remove(&id);
            for ids in state.recipients.values_mut() {
                ids.retain(|c| *c != id);
            }
        }
        Ok(visible)
    }

    async fn count_visible(&self, scope: &AccessScope, ids: &[ClientId]) -> Result<i64> {
        let state = self.state();
        Ok(ids
            .iter()
            .filter_map(|id| state.clients.get(id))
            .filter(|c| scope.permits(c.owner_id))
            .count() as i64)
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn create(&self, owner_id: Option<UserId>, input: CreateMessage) -> Result<Message> {
        let mut message = self.add_message(owner_id);
        message.subject = input.subject;
        message.body = input.body;
        self.state().messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn get(&self, scope: &AccessScope, id: MessageId) -> Result<Option<Message>> {
        Ok(self
            .state()
            .messages
            .get(&id)
            .filter(|m| scope.permits(m.owner_id))
            .cloned())
    }

    async fn list(&self, scope: &AccessScope, limit: i64, offset: i64) -> Result<Vec<Message>> {
        let messages: Vec<Message> = self
            .state()
            .messages
            .values()
            .filter(|m| scope.permits(m.owner_id))
            .cloned()
            .collect();
        Ok(page(messages, limit, offset))
    }

    async fn update(
        &self,
        scope: &AccessScope,
        id: MessageId,
        input: UpdateMessage,
    ) -> Result<Option<Message>> {
        let mut state = self.state();
        let Some(message) = state
            .messages
            .get_mut(&id)
            .filter(|m| scope.permits(m.owner_id))
        else {
            return Ok(None);
        };
        if let Some(subject) = input.subject {
            message.subject = subject;
        }
        if let Some(body) = input.body {
            message.body = body;
        }
        Ok(Some(message.clone()))
    }

    async fn delete(&self, scope: &AccessScope, id: MessageId) -> Result<bool> {
        let mut state = self.state();
        let visible = state
            .messages
            .get(&id)
            .is_some_and(|m| scope.permits(m.owner_id));
        if visible {
            state.messages.remove(&id);
        }
        Ok(visible)
    }
}

#[async_trait]
impl CampaignRepository for MemoryStore {
    async fn create(&self, owner_id: Option<UserId>, input: CreateCampaign) -> Result<Campaign> {
        let campaign = self.add_campaign(
            owner_id,
            input.message_id,
            input.start_time,
            input.end_time,
            &[],
        );
        self.state()
            .recipients
            .insert(campaign.id, input.client_ids);
        Ok(campaign)
    }

    async fn get(&self, scope: &AccessScope, id: CampaignId) -> Result<Option<Campaign>> {
        Ok(self
            .state()
            .campaigns
            .get(&id)
            .filter(|c| scope.permits(c.owner_id))
            .cloned())
    }

    async fn list(
        &self,
        scope: &AccessScope,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>> {
        let mut campaigns: Vec<Campaign> = self
            .state()
            .campaigns
            .values()
            .filter(|c| scope.permits(c.owner_id))
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        campaigns.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(page(campaigns, limit, offset))
    }

    async fn update(
        &self,
        scope: &AccessScope,
        id: CampaignId,
        input: UpdateCampaign,
    ) -> Result<Option<Campaign>> {
        let mut state = self.state();
        let Some(campaign) = state
            .campaigns
            .get_mut(&id)
            .filter(|c| scope.permits(c.owner_id))
        else {
            return Ok(None);
        };
        if let Some(start_time) = input.start_time {
            campaign.start_time = start_time;
        }
        if let Some(end_time) = input.end_time {
            campaign.end_time = end_time;
        }
        if let Some(message_id) = input.message_id {
            campaign.message_id = message_id;
        }
        campaign.updated_at = Utc::now();
        let updated = campaign.clone();
        if let Some(client_ids) = input.client_ids {
            state.recipients.insert(id, client_ids);
        }
        Ok(Some(updated))
    }

    async fn delete(&self, scope: &AccessScope, id: CampaignId) -> Result<bool> {
        let mut state = self.state();
        let visible = state
            .campaigns
            .get(&id)
            .is_some_and(|c| scope.permits(c.owner_id));
        if visible {
            state.campaigns.remove(&id);
            state.recipients.remove(&id);
            state.attempts.retain(|a| a.campaign_id != id);
        }
        Ok(visible)
    }

    async fn recipients(&self, id: CampaignId) -> Result<Vec<Client>> {
        if self.fail_recipients.load(Ordering::SeqCst) {
            return Err(Error::Database("recipient set unreadable".to_string()));
        }
        let state = self.state();
        let mut clients: Vec<Client> = state
            .recipients
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|client_id| state.clients.get(client_id))
            .cloned()
            .collect();
        clients.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(clients)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        if self.fail_list_due.load(Ordering::SeqCst) {
            return Err(Error::Database("connection refused".to_string()));
        }
        let mut due: Vec<Campaign> = self
            .state()
            .campaigns
            .values()
            .filter(|c| c.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|c| c.created_at);
        Ok(due)
    }

    async fn transition(&self, id: CampaignId, to: CampaignStatus) -> Result<bool> {
        let mut state = self.state();
        match state.campaigns.get_mut(&id) {
            Some(campaign) => match campaign.status.transition(to) {
                Ok(next) => {
                    campaign.status = next;
                    Ok(true)
                }
                Err(_) => Ok(false),
            },
            None => Ok(false),
        }
    }

    async fn complete_many(&self, scope: &AccessScope, ids: &[CampaignId]) -> Result<u64> {
        let mut state = self.state();
        let mut updated = 0;
        for id in ids {
            if let Some(campaign) = state
                .campaigns
                .get_mut(id)
                .filter(|c| scope.permits(c.owner_id))
            {
                campaign.status = CampaignStatus::Completed;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn try_claim(
        &self,
        id: CampaignId,
        kind: ClaimKind,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<Campaign>> {
        let mut state = self.state();
        match state.campaigns.get_mut(&id) {
            Some(campaign)
                if campaign.claimed_until.map_or(true, |t| t < now)
                    && campaign.status.is_dispatchable()
                    && (!kind.enforces_window() || campaign.in_window(now)) =>
            {
                campaign.claimed_until = Some(until);
                Ok(Some(campaign.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn release_claim(&self, id: CampaignId, until: DateTime<Utc>) -> Result<bool> {
        match self.state().campaigns.get_mut(&id) {
            Some(campaign) if campaign.claimed_until == Some(until) => {
                campaign.claimed_until = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl AttemptRepository for MemoryStore {
    async fn record(&self, attempt: NewAttempt) -> Result<Attempt> {
        let mut state = self.state();
        let campaign = state
            .campaigns
            .get(&attempt.campaign_id())
            .ok_or_else(|| Error::Validation("unknown campaign".to_string()))?;
        let attempt = Attempt {
            id: Uuid::new_v4(),
            attempt_time: attempt.attempt_time(),
            status: attempt.status(),
            server_response: Some(attempt.server_response().to_string()),
            campaign_id: campaign.id,
            owner_id: campaign.owner_id,
        };
        state.attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn list_for_campaign(
        &self,
        scope: &AccessScope,
        campaign_id: CampaignId,
    ) -> Result<Vec<Attempt>> {
        let mut attempts: Vec<Attempt> = self
            .state()
            .attempts
            .iter()
            .filter(|a| a.campaign_id == campaign_id && scope.permits(a.owner_id))
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.attempt_time.cmp(&a.attempt_time));
        Ok(attempts)
    }

    async fn count_by_status(&self, scope: &AccessScope) -> Result<AttemptCounts> {
        let state = self.state();
        let visible = state.attempts.iter().filter(|a| scope.permits(a.owner_id));
        let mut counts = AttemptCounts::default();
        for attempt in visible {
            match attempt.status {
                AttemptStatus::Success => counts.success += 1,
                AttemptStatus::Failed => counts.failed += 1,
            }
            counts.total += 1;
        }
        Ok(counts)
    }

    async fn latest_per_campaign(&self, scope: &AccessScope) -> Result<Vec<Attempt>> {
        let mut latest: HashMap<CampaignId, Attempt> = HashMap::new();
        for attempt in self
            .state()
            .attempts
            .iter()
            .filter(|a| scope.permits(a.owner_id))
        {
            match latest.get(&attempt.campaign_id) {
                Some(seen) if seen.attempt_time >= attempt.attempt_time => {}
                _ => {
                    latest.insert(attempt.campaign_id, attempt.clone());
                }
            }
        }
        Ok(latest.into_values().collect())
    }

    async fn list_between(
        &self,
        scope: &AccessScope,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Attempt>> {
        let mut attempts: Vec<Attempt> = self
            .state()
            .attempts
            .iter()
            .filter(|a| scope.permits(a.owner_id))
            .filter(|a| a.attempt_time >= from && a.attempt_time <= to)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.attempt_time.cmp(&a.attempt_time));
        Ok(attempts)
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}
