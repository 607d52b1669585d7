//! Attempt log repository
//!
//! Attempts are append-only: the only write is [`AttemptRepository::record`],
//! called by the dispatcher once per dispatch execution.

use crate::db::{db_err, DatabasePool};
use crate::models::{Attempt, AttemptCounts, NewAttempt};
use crate::scope::AccessScope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailshot_common::types::CampaignId;
use mailshot_common::Result;
use uuid::Uuid;

/// Attempt repository trait
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append an attempt. The owner is taken from the parent campaign.
    async fn record(&self, attempt: NewAttempt) -> Result<Attempt>;

    async fn list_for_campaign(
        &self,
        scope: &AccessScope,
        campaign_id: CampaignId,
    ) -> Result<Vec<Attempt>>;

    async fn count_by_status(&self, scope: &AccessScope) -> Result<AttemptCounts>;

    /// Most recent attempt of every campaign that has one
    async fn latest_per_campaign(&self, scope: &AccessScope) -> Result<Vec<Attempt>>;

    /// Attempts with `from <= attempt_time <= to`, newest first
    async fn list_between(
        &self,
        scope: &AccessScope,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Attempt>>;
}

/// Database attempt repository
pub struct DbAttemptRepository {
    pool: DatabasePool,
}

impl DbAttemptRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptRepository for DbAttemptRepository {
    async fn record(&self, attempt: NewAttempt) -> Result<Attempt> {
        sqlx::query_as::<_, Attempt>(
            r#"
            INSERT INTO attempts (id, attempt_time, status, server_response, campaign_id, owner_id)
            SELECT $1, $2, $3, $4, c.id, c.owner_id
            FROM campaigns c
            WHERE c.id = $5
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(attempt.attempt_time())
        .bind(attempt.status().as_str())
        .bind(attempt.server_response())
        .bind(attempt.campaign_id())
        .fetch_one(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn list_for_campaign(
        &self,
        scope: &AccessScope,
        campaign_id: CampaignId,
    ) -> Result<Vec<Attempt>> {
        sqlx::query_as::<_, Attempt>(
            r#"
            SELECT * FROM attempts
            WHERE campaign_id = $1 AND ($2::uuid IS NULL OR owner_id = $2)
            ORDER BY attempt_time DESC
            "#,
        )
        .bind(campaign_id)
        .bind(scope.owner_filter())
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn count_by_status(&self, scope: &AccessScope) -> Result<AttemptCounts> {
        let (success, failed): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'success'),
                COUNT(*) FILTER (WHERE status = 'failed')
            FROM attempts
            WHERE ($1::uuid IS NULL OR owner_id = $1)
            "#,
        )
        .bind(scope.owner_filter())
        .fetch_one(self.pool.pool())
        .await
        .map_err(db_err)?;

        Ok(AttemptCounts {
            success,
            failed,
            total: success + failed,
        })
    }

    async fn latest_per_campaign(&self, scope: &AccessScope) -> Result<Vec<Attempt>> {
        sqlx::query_as::<_, Attempt>(
            r#"
            SELECT DISTINCT ON (campaign_id) *
            FROM attempts
            WHERE ($1::uuid IS NULL OR owner_id = $1)
            ORDER BY campaign_id, attempt_time DESC
            "#,
        )
        .bind(scope.owner_filter())
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn list_between(
        &self,
        scope: &AccessScope,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Attempt>> {
        sqlx::query_as::<_, Attempt>(
            r#"
            SELECT * FROM attempts
            WHERE ($1::uuid IS NULL OR owner_id = $1)
              AND attempt_time >= $2
              AND attempt_time <= $3
            ORDER BY attempt_time DESC
            "#,
        )
        .bind(scope.owner_filter())
        .bind(from)
        .bind(to)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_err)
    }
}
