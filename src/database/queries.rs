use sqlx::{Pool, Postgres};

use super::super::models::Transfer;

// Queries the latest block number made available by the upstream ingestion
// service
pub async fn upstream_latest_num(pool: &Pool<Postgres>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT num FROM shovel.latest")
        .fetch_one(pool)
        .await
}

// Queries a filtered and paginated list of derived transfers
pub async fn list_transfers(
    pool: &Pool<Postgres>,
    addr: Option<String>,
    limit: Option<i32>,
) -> Result<Vec<Transfer>, sqlx::Error> {
    // Apply pagination limit with default 100, clamped between 1 and 1000
    let limit = limit.unwrap_or(100).clamp(1, 1000);

    // Build a dynamic SQL query with optional filters
    let mut query_builder = sqlx::QueryBuilder::new(
        "SELECT block_num, log_idx, from_addr, to_addr, amount FROM transfers WHERE 1=1",
    );

    // Add filter for either side of the transfer, if specified
    if let Some(a) = addr {
        query_builder.push(" AND (from_addr = ");
        query_builder.push_bind(a.clone());
        query_builder.push(" OR to_addr = ");
        query_builder.push_bind(a);
        query_builder.push(")");
    }

    query_builder.push(" ORDER BY block_num DESC, log_idx DESC LIMIT ");
    query_builder.push_bind(limit);

    query_builder.build_query_as().fetch_all(pool).await
}
