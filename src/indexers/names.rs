use async_trait::async_trait;
use log::info;
use sqlx::{Pool, Postgres};

use crate::sync::{IndexError, Indexer};

// Projects account-name registrations from the raw registration logs.
// Runs in the first layer: the transfer indexer joins against its rows.
pub struct NameIndexer;

#[async_trait]
impl Indexer<Pool<Postgres>> for NameIndexer {
    fn name(&self) -> &'static str {
        "names"
    }

    async fn load(&self, store: &Pool<Postgres>, start: i64, stop: i64) -> Result<(), IndexError> {
        // ON CONFLICT keeps the first registration and makes re-running a
        // range after a partial failure safe
        let result = sqlx::query(
            r#"
            INSERT INTO names (addr, name, block_num)
            SELECT addr, name, block_num
            FROM name_registrations
            WHERE block_num BETWEEN $1 AND $2
            ON CONFLICT (addr) DO NOTHING
            "#,
        )
        .bind(start)
        .bind(stop)
        .execute(store)
        .await?;

        if result.rows_affected() > 0 {
            info!("indexed {} names in blocks {} to {}", result.rows_affected(), start, stop);
        }
        Ok(())
    }
}
