use sqlx::{Pool, Postgres};

// One-time structural setup for the derived projections. Everything here is
// create-if-not-exists, so running it on every startup is safe.
//
// The raw tables (erc20_transfers, name_registrations, eth_traces) and the
// shovel.latest tip table are owned by the upstream ingestion service; this
// engine only derives from them.
pub async fn migrate(pool: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(
        r#"
        CREATE TABLE IF NOT EXISTS names (
            addr TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            block_num BIGINT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS transfers (
            block_num BIGINT NOT NULL,
            log_idx BIGINT NOT NULL,
            from_addr TEXT NOT NULL,
            to_addr TEXT NOT NULL,
            amount TEXT NOT NULL,
            PRIMARY KEY (block_num, log_idx)
        );
        CREATE TABLE IF NOT EXISTS eth_transfers (
            block_num BIGINT NOT NULL,
            trace_idx BIGINT NOT NULL,
            from_addr TEXT NOT NULL,
            to_addr TEXT NOT NULL,
            amount TEXT NOT NULL,
            PRIMARY KEY (block_num, trace_idx)
        );
        CREATE INDEX IF NOT EXISTS idx_transfers_from ON transfers (from_addr);
        CREATE INDEX IF NOT EXISTS idx_transfers_to ON transfers (to_addr);
        "#,
    )
    .execute(pool)
    .await?;

    // Materialized view over the raw rows, restricted to named accounts
    sqlx::raw_sql(
        r#"
        CREATE MATERIALIZED VIEW IF NOT EXISTS filtered_erc20_transfers AS (SELECT
        et.*
        FROM erc20_transfers et
        JOIN names n ON n.addr = et.f
          OR n.addr = et.t);

        CREATE INDEX IF NOT EXISTS i_block_num ON filtered_erc20_transfers (block_num);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
