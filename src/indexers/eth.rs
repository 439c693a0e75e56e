use async_trait::async_trait;
use log::info;
use sqlx::{Pool, Postgres};

use crate::sync::{IndexError, Indexer};

// Projects native-ETH transfers from the raw trace rows. Trace scans are far
// more expensive than log scans, so this runs on the slow track and is
// allowed to lag the fast cursor.
pub struct EthIndexer;

#[async_trait]
impl Indexer<Pool<Postgres>> for EthIndexer {
    fn name(&self) -> &'static str {
        "eth"
    }

    async fn load(&self, store: &Pool<Postgres>, start: i64, stop: i64) -> Result<(), IndexError> {
        let result = sqlx::query(
            r#"
            INSERT INTO eth_transfers (block_num, trace_idx, from_addr, to_addr, amount)
            SELECT tr.block_num, tr.trace_idx, tr.f, tr.t, tr.v::text
            FROM eth_traces tr
            JOIN names n ON n.addr = tr.f OR n.addr = tr.t
            WHERE tr.block_num BETWEEN $1 AND $2
              AND tr.v > 0
            ON CONFLICT (block_num, trace_idx) DO NOTHING
            "#,
        )
        .bind(start)
        .bind(stop)
        .execute(store)
        .await?;

        info!(
            "slow-indexed {} eth transfers in blocks {} to {}",
            result.rows_affected(),
            start,
            stop
        );
        Ok(())
    }
}
