//! Typed note repository implementation.
//!
//! Typed notes are keyed by canvas frame: syncing the same frame again
//! updates the row in place and replaces its chunks wholesale.

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use easel_core::{
    ChunkMatch, ChunkRow, Error, NewChunk, ParentStatus, Result, TypedNote, TypedNoteRepository,
};

use crate::chunk_sql;

const TABLE: &str = "typed_note_chunks";
const PARENT_COL: &str = "note_id";
const MATCH_FN: &str = "match_typed_note_chunks";

/// PostgreSQL implementation of TypedNoteRepository.
pub struct PgTypedNoteRepository {
    pool: Pool<Postgres>,
}

impl PgTypedNoteRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TypedNoteRepository for PgTypedNoteRepository {
    async fn upsert(&self, frame_id: &str, full_text: &str) -> Result<Uuid> {
        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO typed_notes (id, frame_id, full_text, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             ON CONFLICT (frame_id) DO UPDATE
                 SET full_text = EXCLUDED.full_text,
                     status = EXCLUDED.status,
                     updated_at = EXCLUDED.updated_at
             RETURNING id",
        )
        .bind(Uuid::now_v7())
        .bind(frame_id)
        .bind(full_text)
        .bind(ParentStatus::Ready.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.try_get("id").map_err(Error::Database)
    }

    async fn find_by_frame_ids(&self, frame_ids: &[String]) -> Result<Vec<TypedNote>> {
        if frame_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, TypedNote>(
            "SELECT id, frame_id, full_text, status, created_at, updated_at
             FROM typed_notes
             WHERE frame_id = ANY($1)
             ORDER BY created_at ASC",
        )
        .bind(frame_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn replace_chunks(&self, note_id: Uuid, chunks: &[NewChunk]) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM typed_note_chunks WHERE note_id = $1")
            .bind(note_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let inserted = if chunks.is_empty() {
            0
        } else {
            chunk_sql::insert_chunks_on(&mut *tx, TABLE, PARENT_COL, note_id, chunks).await?
        };

        tx.commit().await.map_err(Error::Database)?;
        Ok(inserted)
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
