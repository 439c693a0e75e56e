use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::indexer::IndexError;
use crate::database::queries::upstream_latest_num;

// The upstream block source, queried only for its latest available block.
// The answer is advisory: a stall or regression must never move a cursor
// backwards, so the watcher treats it as a target, not a truth.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    async fn latest_block(&self) -> Result<i64, IndexError>;
}

// Production source: the `shovel.latest` table maintained by the block
// ingestion service in the same Postgres instance.
pub struct ShovelUpstream {
    pool: Pool<Postgres>,
}

impl ShovelUpstream {
    pub fn new(pool: Pool<Postgres>) -> Self {
        ShovelUpstream { pool }
    }
}

#[async_trait]
impl UpstreamSource for ShovelUpstream {
    async fn latest_block(&self) -> Result<i64, IndexError> {
        let num = upstream_latest_num(&self.pool).await?;
        Ok(num)
    }
}
