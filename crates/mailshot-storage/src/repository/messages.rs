//! Message template repository

use crate::db::{db_err, DatabasePool};
use crate::models::{CreateMessage, Message, UpdateMessage};
use crate::scope::AccessScope;
use async_trait::async_trait;
use chrono::Utc;
use mailshot_common::types::{MessageId, UserId};
use mailshot_common::Result;
use uuid::Uuid;

/// Message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, owner_id: Option<UserId>, input: CreateMessage) -> Result<Message>;
    async fn get(&self, scope: &AccessScope, id: MessageId) -> Result<Option<Message>>;
    async fn list(&self, scope: &AccessScope, limit: i64, offset: i64) -> Result<Vec<Message>>;
    async fn update(
        &self,
        scope: &AccessScope,
        id: MessageId,
        input: UpdateMessage,
    ) -> Result<Option<Message>>;
    async fn delete(&self, scope: &AccessScope, id: MessageId) -> Result<bool>;
}

/// Database message repository
pub struct DbMessageRepository {
    pool: DatabasePool,
}

impl DbMessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for DbMessageRepository {
    async fn create(&self, owner_id: Option<UserId>, input: CreateMessage) -> Result<Message> {
        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, subject, body, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&input.subject)
        .bind(&input.body)
        .bind(owner_id)
        .bind(Utc::now())
        .fetch_one(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn get(&self, scope: &AccessScope, id: MessageId) -> Result<Option<Message>> {
        sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)",
        )
        .bind(id)
        .bind(scope.owner_filter())
        .fetch_optional(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn list(&self, scope: &AccessScope, limit: i64, offset: i64) -> Result<Vec<Message>> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE ($1::uuid IS NULL OR owner_id = $1)
            ORDER BY created_at DESC
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
        id: MessageId,
        input: UpdateMessage,
    ) -> Result<Option<Message>> {
        sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages SET
                subject = COALESCE($3, subject),
                body = COALESCE($4, body),
                updated_at = NOW()
            WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(scope.owner_filter())
        .bind(&input.subject)
        .bind(&input.body)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn delete(&self, scope: &AccessScope, id: MessageId) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM messages WHERE id = $1 AND ($2::uuid IS NULL OR owner_id = $2)",
        )
        .bind(id)
        .bind(scope.owner_filter())
        .execute(self.pool.pool())
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }
}
