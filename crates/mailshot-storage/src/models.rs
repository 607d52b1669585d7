//! Database models

use chrono::{DateTime, Utc};
use mailshot_common::types::{AttemptId, CampaignId, ClientId, MessageId, UserId};
use mailshot_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

/// Error raised when a stored status string is not recognised
#[derive(Debug, Error)]
#[error("Invalid status value: {0}")]
pub struct InvalidStatus(pub String);

/// User model. Only what ownership and authorization need.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

/// Client (recipient) model
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub email: String,
    pub full_name: String,
    pub comment: Option<String>,
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create client input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClient {
    pub email: String,
    pub full_name: String,
    pub comment: Option<String>,
}

/// Update client input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateClient {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub comment: Option<String>,
}

/// Message template model
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub subject: String,
    pub body: String,
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create message input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessage {
    pub subject: String,
    pub body: String,
}

/// Update message input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMessage {
    pub subject: Option<String>,
    pub body: Option<String>,
}

/// Campaign status.
///
/// Moves forward only: `created -> started -> completed`. `started` means the
/// campaign has been dispatched at least once, so `started -> started` is a
/// legal re-dispatch. `completed` is terminal and may be re-applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Created,
    Started,
    Completed,
}

impl CampaignStatus {
    pub const ALL: [CampaignStatus; 3] = [
        CampaignStatus::Created,
        CampaignStatus::Started,
        CampaignStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Created => "created",
            CampaignStatus::Started => "started",
            CampaignStatus::Completed => "completed",
        }
    }

    /// Transition table
    pub fn can_transition_to(self, to: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, to),
            (Created, Started)
                | (Created, Completed)
                | (Started, Started)
                | (Started, Completed)
                | (Completed, Completed)
        )
    }

    /// Apply a transition, rejecting anything the table forbids
    pub fn transition(self, to: CampaignStatus) -> Result<CampaignStatus> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(Error::Conflict(format!(
                "Invalid campaign status transition: {} -> {}",
                self, to
            )))
        }
    }

    /// States from which `self` is reachable in one step
    pub fn sources(self) -> Vec<CampaignStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(self))
            .collect()
    }

    /// Whether a campaign in this state may be picked up by the dispatcher
    pub fn is_dispatchable(self) -> bool {
        matches!(self, CampaignStatus::Created | CampaignStatus::Started)
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "created" => Ok(CampaignStatus::Created),
            "started" => Ok(CampaignStatus::Started),
            "completed" => Ok(CampaignStatus::Completed),
            _ => Err(InvalidStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for CampaignStatus {
    type Error = InvalidStatus;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Campaign model
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: CampaignStatus,
    pub message_id: MessageId,
    pub owner_id: Option<UserId>,
    pub claimed_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Whether `now` falls inside the send window (both ends inclusive)
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    /// Due for dispatch: dispatchable status and inside the window
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_dispatchable() && self.in_window(now)
    }
}

/// Create campaign input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub message_id: MessageId,
    #[serde(default)]
    pub client_ids: Vec<ClientId>,
}

impl CreateCampaign {
    /// Reject windows that end before they start
    pub fn validate(&self) -> Result<()> {
        validate_window(self.start_time, self.end_time)
    }
}

/// Update campaign input. Status is not editable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCampaign {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub message_id: Option<MessageId>,
    pub client_ids: Option<Vec<ClientId>>,
}

impl UpdateCampaign {
    /// Validate the window that results from applying this update to `current`
    pub fn validate_against(&self, current: &Campaign) -> Result<()> {
        validate_window(
            self.start_time.unwrap_or(current.start_time),
            self.end_time.unwrap_or(current.end_time),
        )
    }
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if end < start {
        return Err(Error::Validation(format!(
            "end_time {} is before start_time {}",
            end, start
        )));
    }
    Ok(())
}

/// Attempt status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "success",
            AttemptStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttemptStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(AttemptStatus::Success),
            "failed" => Ok(AttemptStatus::Failed),
            _ => Err(InvalidStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for AttemptStatus {
    type Error = InvalidStatus;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Dispatch attempt model. One row per dispatch execution of a campaign.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub attempt_time: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: AttemptStatus,
    pub server_response: Option<String>,
    pub campaign_id: CampaignId,
    pub owner_id: Option<UserId>,
}

/// Attempt to be written.
///
/// The owner is copied from the campaign and cannot be supplied separately;
/// the database insert re-derives it from `campaigns.owner_id` as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttempt {
    campaign_id: CampaignId,
    owner_id: Option<UserId>,
    attempt_time: DateTime<Utc>,
    status: AttemptStatus,
    server_response: String,
}

impl NewAttempt {
    pub fn for_campaign(
        campaign: &Campaign,
        attempt_time: DateTime<Utc>,
        status: AttemptStatus,
        server_response: impl Into<String>,
    ) -> Self {
        Self {
            campaign_id: campaign.id,
            owner_id: campaign.owner_id,
            attempt_time,
            status,
            server_response: server_response.into(),
        }
    }

    pub fn campaign_id(&self) -> CampaignId {
        self.campaign_id
    }

    pub fn owner_id(&self) -> Option<UserId> {
        self.owner_id
    }

    pub fn attempt_time(&self) -> DateTime<Utc> {
        self.attempt_time
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub fn server_response(&self) -> &str {
        &self.server_response
    }
}

/// Attempt counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptCounts {
    pub success: i64,
    pub failed: i64,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn campaign(status: CampaignStatus) -> Campaign {
        let now = Utc::now();
        Campaign {
            id: Uuid::new_v4(),
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
            status,
            message_id: Uuid::new_v4(),
            owner_id: Some(Uuid::new_v4()),
            claimed_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_transition_table() {
        use CampaignStatus::*;

        assert!(Created.can_transition_to(Started));
        assert!(Created.can_transition_to(Completed));
        assert!(Started.can_transition_to(Started));
        assert!(Started.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Completed));

        assert!(!Created.can_transition_to(Created));
        assert!(!Started.can_transition_to(Created));
        assert!(!Completed.can_transition_to(Started));
        assert!(!Completed.can_transition_to(Created));
    }

    #[test]
    fn test_transition_rejects_backwards() {
        let err = CampaignStatus::Completed
            .transition(CampaignStatus::Started)
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(
            CampaignStatus::Created.transition(CampaignStatus::Started).unwrap(),
            CampaignStatus::Started
        );
    }

    #[test]
    fn test_sources() {
        use CampaignStatus::*;
        assert_eq!(Started.sources(), vec![Created, Started]);
        assert_eq!(Completed.sources(), vec![Created, Started, Completed]);
        assert!(Created.sources().is_empty());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "started".parse::<CampaignStatus>().unwrap(),
            CampaignStatus::Started
        );
        assert!("paused".parse::<CampaignStatus>().is_err());
        assert_eq!(
            AttemptStatus::try_from("failed".to_string()).unwrap(),
            AttemptStatus::Failed
        );
    }

    #[test]
    fn test_is_due() {
        let now = Utc::now();
        let mut c = campaign(CampaignStatus::Created);
        assert!(c.is_due(now));

        c.status = CampaignStatus::Completed;
        assert!(!c.is_due(now));

        let mut c = campaign(CampaignStatus::Started);
        c.start_time = now + Duration::minutes(5);
        assert!(!c.is_due(now));

        // window edges are inclusive
        c.start_time = now;
        c.end_time = now;
        assert!(c.is_due(now));
    }

    #[test]
    fn test_create_campaign_rejects_inverted_window() {
        let now = Utc::now();
        let input = CreateCampaign {
            start_time: now,
            end_time: now - Duration::seconds(1),
            message_id: Uuid::new_v4(),
            client_ids: vec![],
        };
        assert!(matches!(input.validate(), Err(Error::Validation(_))));

        let ok = CreateCampaign {
            end_time: now,
            ..input
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_update_campaign_validates_merged_window() {
        let current = campaign(CampaignStatus::Created);
        let update = UpdateCampaign {
            end_time: Some(current.start_time - Duration::minutes(1)),
            ..Default::default()
        };
        assert!(update.validate_against(&current).is_err());
        assert!(UpdateCampaign::default().validate_against(&current).is_ok());
    }

    #[test]
    fn test_new_attempt_takes_campaign_owner() {
        let c = campaign(CampaignStatus::Started);
        let attempt = NewAttempt::for_campaign(&c, Utc::now(), AttemptStatus::Success, "ok");
        assert_eq!(attempt.owner_id(), c.owner_id);
        assert_eq!(attempt.campaign_id(), c.id);
    }
}
