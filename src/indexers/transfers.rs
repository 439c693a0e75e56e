use async_trait::async_trait;
use log::info;
use sqlx::{Pool, Postgres};

use crate::sync::{IndexError, Indexer};

// Projects ERC-20 transfers where either side is a named account. Runs in
// the second layer: it reads the rows the name indexer wrote for the same
// range, which the layer ordering guarantees are already committed.
pub struct TransferIndexer;

#[async_trait]
impl Indexer<Pool<Postgres>> for TransferIndexer {
    fn name(&self) -> &'static str {
        "transfers"
    }

    async fn load(&self, store: &Pool<Postgres>, start: i64, stop: i64) -> Result<(), IndexError> {
        let result = sqlx::query(
            r#"
            INSERT INTO transfers (block_num, log_idx, from_addr, to_addr, amount)
            SELECT et.block_num, et.log_idx, et.f, et.t, et.v::text
            FROM erc20_transfers et
            JOIN names n ON n.addr = et.f OR n.addr = et.t
            WHERE et.block_num BETWEEN $1 AND $2
            ON CONFLICT (block_num, log_idx) DO NOTHING
            "#,
        )
        .bind(start)
        .bind(stop)
        .execute(store)
        .await?;

        if result.rows_affected() > 0 {
            info!(
                "indexed {} transfers in blocks {} to {}",
                result.rows_affected(),
                start,
                stop
            );
        }
        Ok(())
    }
}
