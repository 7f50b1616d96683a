//! Shared SQL helpers for the three chunk tables.
//!
//! The document, handwriting, and typed-note chunk tables share one row
//! shape; only the table name, parent column, and match function differ.
//! Table and column names are compile-time constants owned by each
//! repository, never user input.

use pgvector::Vector;
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use easel_core::defaults::CHUNK_INSERT_BATCH;
use easel_core::{ChunkMatch, ChunkRow, Error, NewChunk, Result};

/// Build one multi-row INSERT for a batch of chunks.
fn push_chunk_rows<'a>(
    table: &str,
    parent_col: &str,
    parent_id: Uuid,
    batch: &'a [NewChunk],
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "INSERT INTO {} (id, {}, chunk_index, chunk_text, embedding, metadata) ",
        table, parent_col
    ));
    qb.push_values(batch, |mut b, chunk| {
        b.push_bind(Uuid::now_v7())
            .push_bind(parent_id)
            .push_bind(chunk.chunk_index)
            .push_bind(&chunk.chunk_text)
            .push_bind(chunk.embedding.clone())
            .push_bind(&chunk.metadata);
    });
    qb
}

/// Insert chunks in batches of [`CHUNK_INSERT_BATCH`] rows per statement.
pub(crate) async fn insert_chunks(
    pool: &Pool<Postgres>,
    table: &str,
    parent_col: &str,
    parent_id: Uuid,
    chunks: &[NewChunk],
) -> Result<usize> {
    if chunks.is_empty() {
        return Ok(0);
    }
    for batch in chunks.chunks(CHUNK_INSERT_BATCH) {
        push_chunk_rows(table, parent_col, parent_id, batch)
            .build()
            .execute(pool)
            .await
            .map_err(Error::Database)?;
    }
    Ok(chunks.len())
}

/// Insert chunk batches on an open transaction connection.
pub(crate) async fn insert_chunks_on(
    conn: &mut PgConnection,
    table: &str,
    parent_col: &str,
    parent_id: Uuid,
    chunks: &[NewChunk],
) -> Result<usize> {
    for batch in chunks.chunks(CHUNK_INSERT_BATCH) {
        push_chunk_rows(table, parent_col, parent_id, batch)
            .build()
            .execute(&mut *conn)
            .await
            .map_err(Error::Database)?;
    }
    Ok(chunks.len())
}

/// List a parent's chunks in `chunk_index` order.
pub(crate) async fn list_chunks(
    pool: &Pool<Postgres>,
    table: &str,
    parent_col: &str,
    parent_id: Uuid,
    limit: i64,
) -> Result<Vec<ChunkRow>> {
    let sql = format!(
        "SELECT id, {} AS parent_id, chunk_index, chunk_text, metadata, created_at
         FROM {}
         WHERE {} = $1
         ORDER BY chunk_index ASC
         LIMIT $2",
        parent_col, table, parent_col
    );
    sqlx::query_as::<_, ChunkRow>(&sql)
        .bind(parent_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Error::Database)
}

/// Call a server-side `match_*` function. The function computes
/// `1 - cosine distance` and applies the threshold and parent filter.
pub(crate) async fn match_chunks(
    pool: &Pool<Postgres>,
    function: &str,
    parent_col: &str,
    query: &Vector,
    threshold: f64,
    count: i64,
    parent_id: Uuid,
) -> Result<Vec<ChunkMatch>> {
    let sql = format!(
        "SELECT id, {} AS parent_id, chunk_index, chunk_text, metadata, similarity
         FROM {}($1, $2, $3, $4)",
        parent_col, function
    );
    sqlx::query_as::<_, ChunkMatch>(&sql)
        .bind(query.clone())
        .bind(threshold)
        .bind(count)
        .bind(parent_id)
        .fetch_all(pool)
        .await
        .map_err(Error::Database)
}
