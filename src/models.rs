use serde::{Deserialize, Serialize};

// Latest block fully processed by the fast track, with an estimated timestamp
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatestBlock {
    pub number: i64,
    pub timestamp: i64,
}

// Snapshot of both sync cursors against the upstream tip
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SyncStatus {
    pub fast: i64,
    pub slow: i64,
    pub upstream: i64,
}

// ERC-20 transfer touching a named account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transfer {
    pub block_num: i64,
    pub log_idx: i64,
    pub from_addr: String,
    pub to_addr: String,
    pub amount: String,
}
