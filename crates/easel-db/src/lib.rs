//! # easel-db
//!
//! PostgreSQL + pgvector persistence layer for easel.
//!
//! One repository per parent kind (documents, handwriting notes, typed
//! notes) plus canvas links; similarity search goes through server-side
//! `match_*` functions so threshold filtering happens next to the index.

mod chunk_sql;
pub mod documents;
pub mod handwriting;
pub mod links;
pub mod pool;
pub mod test_fixtures;
pub mod typed_notes;

pub use documents::PgDocumentRepository;
pub use handwriting::PgHandwritingRepository;
pub use links::PgCanvasLinkRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use typed_notes::PgTypedNoteRepository;

use easel_core::Result;

/// Aggregate handle bundling every repository over one connection pool.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Uploaded PDF documents and their chunks.
    pub documents: std::sync::Arc<PgDocumentRepository>,
    /// Handwriting captures and their chunks.
    pub handwriting: std::sync::Arc<PgHandwritingRepository>,
    /// Typed notes synced from canvas text shapes.
    pub typed_notes: std::sync::Arc<PgTypedNoteRepository>,
    /// Shape → document canvas links.
    pub links: std::sync::Arc<PgCanvasLinkRepository>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            documents: std::sync::Arc::new(PgDocumentRepository::new(pool.clone())),
            handwriting: std::sync::Arc::new(PgHandwritingRepository::new(pool.clone())),
            typed_notes: std::sync::Arc::new(PgTypedNoteRepository::new(pool.clone())),
            links: std::sync::Arc::new(PgCanvasLinkRepository::new(pool.clone())),
            pool,
        }
    }

    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations from the workspace `migrations/` directory.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| easel_core::Error::Internal(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}
