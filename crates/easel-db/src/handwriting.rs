//! Handwriting note repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use sqlx::{Pool, Postgres};
use tracing::debug;
use uuid::Uuid;

use easel_core::{
    ChunkMatch, ChunkRow, Error, HandwritingNote, HandwritingRepository, NewChunk, ParentStatus,
    Result,
};

use crate::chunk_sql;

const TABLE: &str = "handwriting_chunks";
const PARENT_COL: &str = "note_id";
const MATCH_FN: &str = "match_handwriting_chunks";

/// PostgreSQL implementation of HandwritingRepository.
pub struct PgHandwritingRepository {
    pool: Pool<Postgres>,
}

impl PgHandwritingRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HandwritingRepository for PgHandwritingRepository {
    async fn insert(&self, frame_id: &str) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO handwriting_notes (id, frame_id, ocr_text, status, created_at, updated_at)
             VALUES ($1, $2, NULL, $3, $4, $4)",
        )
        .bind(id)
        .bind(frame_id)
        .bind(ParentStatus::Processing.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn set_ocr_text(&self, id: Uuid, text: &str) -> Result<()> {
        sqlx::query(
            "UPDATE handwriting_notes SET ocr_text = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(text)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: ParentStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE handwriting_notes SET status = $2, updated_at = $3
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        let updated = result.rows_affected() > 0;
        if !updated {
            debug!(
                subsystem = "db",
                component = "handwriting",
                note_id = %id,
                to = status.as_str(),
                "Status update rejected (already terminal or missing)"
            );
        }
        Ok(updated)
    }

    async fn find_by_frame_ids(&self, frame_ids: &[String]) -> Result<Vec<HandwritingNote>> {
        if frame_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, HandwritingNote>(
            "SELECT id, frame_id, ocr_text, status, created_at, updated_at
             FROM handwriting_notes
             WHERE frame_id = ANY($1)
             ORDER BY created_at ASC",
        )
        .bind(frame_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn insert_chunks(&self, note_id: Uuid, chunks: &[NewChunk]) -> Result<usize> {
        chunk_sql::insert_chunks(&self.pool, TABLE, PARENT_COL, note_id, chunks).await
    }

    async fn list_chunks(&self, note_id: Uuid, limit: i64) -> Result<Vec<ChunkRow>> {
        chunk_sql::list_chunks(&self.pool, TABLE, PARENT_COL, note_id, limit).await
    }

    async fn match_chunks(
        &self,
        query: &Vector,
        threshold: f64,
        count: i64,
        note_id: Uuid,
    ) -> Result<Vec<ChunkMatch>> {
        chunk_sql::match_chunks(
            &self.pool,
            MATCH_FN,
            PARENT_COL,
            query,
            threshold,
            count,
            note_id,
        )
        .await
    }
}
