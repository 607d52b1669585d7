//! Client repository

use crate::db::{db_err, DatabasePool};
use crate::models::{Client, CreateClient, UpdateClient};
use crate::scope::AccessScope;
use async_trait::async_trait;
use chrono::Utc;
use mailshot_common::types::{ClientId, UserId};
use mailshot_common::Result;
use uuid::Uuid;

/// Client repository trait
#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn create(&self, owner_id: Option<UserId>, input: CreateClient) -> Result<Client>;
    async fn get(&self, scope: &AccessScope, id: ClientId) -> Result<Option<Client>>;
    async fn list(&self, scope: &AccessScope, limit: i64, offset: i64) -> Result<Vec<Client>>;
    async fn update(
        &self,
        scope: &AccessScope,
        id: ClientId,
        input: UpdateClient,
    ) -> Result<Option<Client>>;
    async fn delete(&self, scope: &AccessScope, id: ClientId) -> Result<bool>;
    /// How many of `ids` exist and are visible in `scope`
    async fn count_visible(&self, scope: &AccessScope, ids: &[ClientId]) -> Result<i64>;
}

/// Database client repository
pub struct DbClientRepository {
    pool: DatabasePool,
}

impl DbClientRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientRepository for DbClientRepository {
    async fn create(&self, owner_id: Option<UserId>, input: CreateClient) -> Result<Client> {
        let now = Utc::now();

        sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (id, email, full_name, comment, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&input.email)
        .bind(&input.full_name)
        .bind(&input.comment)
        .bind(owner_id)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn get(&self, scope: &AccessScope, id: ClientId) -> Result<Option<Client>> {
        sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)",
        )
        .bind(id)
        .bind(scope.owner_filter())
        .fetch_optional(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn list(&self, scope: &AccessScope, limit: i64, offset: i64) -> Result<Vec<Client>> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
            WHERE ($1::uuid IS NULL OR owner_id = $1)
            ORDER BY email ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(scope.owner_filter())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn update(
        &self,
        scope: &AccessScope,
        id: ClientId,
        input: UpdateClient,
    ) -> Result<Option<Client>> {
        sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients SET
                email = COALESCE($3, email),
                full_name = COALESCE($4, full_name),
                comment = COALESCE($5, comment),
                updated_at = NOW()
            WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(scope.owner_filter())
        .bind(&input.email)
        .bind(&input.full_name)
        .bind(&input.comment)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn delete(&self, scope: &AccessScope, id: ClientId) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM clients WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)")
                .bind(id)
                .bind(scope.owner_filter())
                .execute(self.pool.pool())
                .await
                .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_visible(&self, scope: &AccessScope, ids: &[ClientId]) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM clients WHERE id = ANY($1) AND ($2::uuid IS NULL OR owner_id = $2)",
        )
        .bind(ids)
        .bind(scope.owner_filter())
        .fetch_one(self.pool.pool())
        .await
        .map_err(db_err)?;

        Ok(count.0)
    }
}
