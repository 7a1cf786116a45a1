//! Postgres persistence for the radar pipeline.
//!
//! One `Store` over a `PgPool`. Row-level helpers that must compose inside a
//! transaction take `&mut PgConnection`; multi-step services (merge, split,
//! state transitions) open their own transaction and commit atomically.

pub mod alerts;
pub mod documents;
pub mod error;
pub mod events;
pub mod feedback;
pub mod feeds;
pub mod merge;
pub mod scores;
pub mod snapshots;
pub mod sources;
pub mod split;
pub mod stream;

pub use error::{Result, StoreError};
pub use merge::MergeOutcome;
pub use split::SplitOutcome;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
