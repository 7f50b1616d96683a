//! Document repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use sqlx::{Pool, Postgres};
use tracing::debug;
use uuid::Uuid;

use easel_core::{
    ChunkMatch, ChunkRow, Document, DocumentRepository, Error, NewChunk, ParentStatus, Result,
};

use crate::chunk_sql;

const TABLE: &str = "document_chunks";
const PARENT_COL: &str = "document_id";
const MATCH_FN: &str = "match_document_chunks";

/// PostgreSQL implementation of DocumentRepository.
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
}

impl PgDocumentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn insert(&self, filename: &str, page_count: i32, size_bytes: i64) -> Result<Uuid> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO documents (id, filename, page_count, size_bytes, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(filename)
        .bind(page_count)
        .bind(size_bytes)
        .bind(ParentStatus::Processing.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>> {
        sqlx::query_as::<_, Document>(
            "SELECT id, filename, page_count, size_bytes, status, created_at
             FROM documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Document>> {
        sqlx::query_as::<_, Document>(
            "SELECT id, filename, page_count, size_bytes, status, created_at
             FROM documents
             ORDER BY created_at DESC
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn set_status(&self, id: Uuid, status: ParentStatus) -> Result<bool> {
        // Guard keeps terminal states immutable.
        let result = sqlx::query(
            "UPDATE documents SET status = $2 WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        let updated = result.rows_affected() > 0;
        if !updated {
            debug!(
                subsystem = "db",
                component = "documents",
                document_id = %id,
                to = status.as_str(),
                "Status update rejected (already terminal or missing)"
            );
        }
        Ok(updated)
    }

    async fn insert_chunks(&self, document_id: Uuid, chunks: &[NewChunk]) -> Result<usize> {
        chunk_sql::insert_chunks(&self.pool, TABLE, PARENT_COL, document_id, chunks).await
    }

    async fn list_chunks(&self, document_id: Uuid, limit: i64) -> Result<Vec<ChunkRow>> {
        chunk_sql::list_chunks(&self.pool, TABLE, PARENT_COL, document_id, limit).await
    }

    async fn match_chunks(
        &self,
        query: &Vector,
        threshold: f64,
        count: i64,
        document_id: Uuid,
    ) -> Result<Vec<ChunkMatch>> {
        chunk_sql::match_chunks(
            &self.pool,
            MATCH_FN,
            PARENT_COL,
            query,
            threshold,
            count,
            document_id,
        )
        .await
    }
}
