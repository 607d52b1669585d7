//! Campaign repository

use crate::db::{db_err, DatabasePool};
use crate::models::{Campaign, CampaignStatus, Client, CreateCampaign, UpdateCampaign};
use crate::scope::AccessScope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailshot_common::types::{CampaignId, ClientId, UserId};
use mailshot_common::Result;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

/// Campaign repository trait
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Insert a campaign and its recipient set. Input is assumed validated.
    async fn create(&self, owner_id: Option<UserId>, input: CreateCampaign) -> Result<Campaign>;

    async fn get(&self, scope: &AccessScope, id: CampaignId) -> Result<Option<Campaign>>;

    async fn list(
        &self,
        scope: &AccessScope,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>>;

    /// Update window, message, or recipients. Status is never touched here.
    async fn update(
        &self,
        scope: &AccessScope,
        id: CampaignId,
        input: UpdateCampaign,
    ) -> Result<Option<Campaign>>;

    async fn delete(&self, scope: &AccessScope, id: CampaignId) -> Result<bool>;

    /// Recipient set of a campaign
    async fn recipients(&self, id: CampaignId) -> Result<Vec<Client>>;

    /// Campaigns with a dispatchable status whose window contains `now`
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>>;

    /// Move a campaign to `to` if its current status is a legal source.
    /// Returns false when the row is missing or the transition is not allowed.
    async fn transition(&self, id: CampaignId, to: CampaignStatus) -> Result<bool>;

    /// Force every visible campaign in `ids` to completed. Returns rows updated.
    async fn complete_many(&self, scope: &AccessScope, ids: &[CampaignId]) -> Result<u64>;

    /// Take the dispatch lease if nobody holds an unexpired one and the
    /// campaign is still dispatchable. Returns the campaign as it stands at
    /// claim time, or `None` when the claim was refused.
    async fn try_claim(
        &self,
        id: CampaignId,
        kind: ClaimKind,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<Campaign>>;

    /// Drop the lease taken with `until`. A lease that has since been taken
    /// over by another execution is left alone; returns whether it was ours.
    async fn release_claim(&self, id: CampaignId, until: DateTime<Utc>) -> Result<bool>;
}

/// Who is asking for the dispatch lease
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    /// A due pass: the campaign must still be inside its window
    Scheduled,
    /// An operator's send now: the window is ignored
    Manual,
}

impl ClaimKind {
    pub fn enforces_window(self) -> bool {
        matches!(self, ClaimKind::Scheduled)
    }
}

/// Database campaign repository
pub struct DbCampaignRepository {
    pool: DatabasePool,
}

impl DbCampaignRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn replace_recipients(
        tx: &mut Transaction<'_, Postgres>,
        id: CampaignId,
        client_ids: &[ClientId],
    ) -> Result<()> {
        sqlx::query("DELETE FROM campaign_clients WHERE campaign_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO campaign_clients (campaign_id, client_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id)
        .bind(client_ids)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}

#[async_trait]
impl CampaignRepository for DbCampaignRepository {
    async fn create(&self, owner_id: Option<UserId>, input: CreateCampaign) -> Result<Campaign> {
        let mut tx = self.pool.pool().begin().await.map_err(db_err)?;
        let id = Uuid::now_v7();

        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (id, start_time, end_time, status, message_id, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.start_time)
        .bind(input.end_time)
        .bind(CampaignStatus::Created.as_str())
        .bind(input.message_id)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        Self::replace_recipients(&mut tx, id, &input.client_ids).await?;
        tx.commit().await.map_err(db_err)?;

        Ok(campaign)
    }

    async fn get(&self, scope: &AccessScope, id: CampaignId) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)",
        )
        .bind(id)
        .bind(scope.owner_filter())
        .fetch_optional(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn list(
        &self,
        scope: &AccessScope,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE ($1::uuid IS NULL OR owner_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY start_time DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(scope.owner_filter())
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn update(
        &self,
        scope: &AccessScope,
        id: CampaignId,
        input: UpdateCampaign,
    ) -> Result<Option<Campaign>> {
        let mut tx = self.pool.pool().begin().await.map_err(db_err)?;

        let updated = sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                start_time = COALESCE($3, start_time),
                end_time = COALESCE($4, end_time),
                message_id = COALESCE($5, message_id),
                updated_at = NOW()
            WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(scope.owner_filter())
        .bind(input.start_time)
        .bind(input.end_time)
        .bind(input.message_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        if updated.is_none() {
            return Ok(None);
        }

        if let Some(client_ids) = &input.client_ids {
            Self::replace_recipients(&mut tx, id, client_ids).await?;
        }
        tx.commit().await.map_err(db_err)?;

        Ok(updated)
    }

    async fn delete(&self, scope: &AccessScope, id: CampaignId) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM campaigns WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)",
        )
        .bind(id)
        .bind(scope.owner_filter())
        .execute(self.pool.pool())
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn recipients(&self, id: CampaignId) -> Result<Vec<Client>> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT c.* FROM clients c
            JOIN campaign_clients cc ON cc.client_id = c.id
            WHERE cc.campaign_id = $1
            ORDER BY c.email ASC
            "#,
        )
        .bind(id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE status IN ('created', 'started')
              AND start_time <= $1
              AND end_time >= $1
            "#,
        )
        .bind(now)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn transition(&self, id: CampaignId, to: CampaignStatus) -> Result<bool> {
        let sources: Vec<String> = to.sources().iter().map(|s| s.to_string()).collect();

        let result = sqlx::query(
            "UPDATE campaigns SET status = $2, updated_at = NOW() WHERE id = $1 AND status = ANY($3)",
        )
        .bind(id)
        .bind(to.as_str())
        .bind(&sources)
        .execute(self.pool.pool())
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn complete_many(&self, scope: &AccessScope, ids: &[CampaignId]) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET status = 'completed', updated_at = NOW()
            WHERE id = ANY($1) AND ($2::uuid IS NULL OR owner_id = $2)
            "#,
        )
        .bind(ids)
        .bind(scope.owner_filter())
        .execute(self.pool.pool())
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected())
    }

    async fn try_claim(
        &self,
        id: CampaignId,
        kind: ClaimKind,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET claimed_until = $3
            WHERE id = $1
              AND (claimed_until IS NULL OR claimed_until < $2)
              AND status IN ('created', 'started')
              AND (NOT $4::boolean OR (start_time <= $2 AND end_time >= $2))
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(until)
        .bind(kind.enforces_window())
        .fetch_optional(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn release_claim(&self, id: CampaignId, until: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE campaigns SET claimed_until = NULL WHERE id = $1 AND claimed_until = $2",
        )
        .bind(id)
        .bind(until)
        .execute(self.pool.pool())
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }
}
