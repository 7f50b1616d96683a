//! Canvas link repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use easel_core::{CanvasLink, CanvasLinkRepository, Error, Result};

/// PostgreSQL implementation of CanvasLinkRepository.
pub struct PgCanvasLinkRepository {
    pool: Pool<Postgres>,
}

impl PgCanvasLinkRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CanvasLinkRepository for PgCanvasLinkRepository {
    async fn upsert(&self, shape_id: &str, document_id: Uuid) -> Result<Uuid> {
        // shape_id is unique; re-linking a shape points it at the new document.
        let row = sqlx::query(
            "INSERT INTO canvas_links (id, shape_id, document_id, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (shape_id) DO UPDATE
                 SET document_id = EXCLUDED.document_id
             RETURNING id",
        )
        .bind(Uuid::now_v7())
        .bind(shape_id)
        .bind(document_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.try_get("id").map_err(Error::Database)
    }

    async fn delete(&self, shape_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM canvas_links WHERE shape_id = $1")
            .bind(shape_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_shape_ids(&self, shape_ids: &[String]) -> Result<Vec<CanvasLink>> {
        if shape_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, CanvasLink>(
            "SELECT id, shape_id, document_id, created_at
             FROM canvas_links
             WHERE shape_id = ANY($1)
             ORDER BY created_at ASC",
        )
        .bind(shape_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }
}
