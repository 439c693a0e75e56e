use async_trait::async_trait;

pub type IndexError = Box<dyn std::error::Error + Send + Sync>;

// A unit of derived-data ingestion. Given an inclusive block range and a
// handle to the shared store, `load` writes that range's derived rows.
//
// Contract: `load` must be safe to call again with the same or an overlapping
// range after a failed or partial attempt. The watcher retries failed ranges
// verbatim, so non-idempotent writes would double-apply.
//
// Generic over the store handle so the engine can be driven against a mock
// store in tests; production uses `sqlx::PgPool`.
#[async_trait]
pub trait Indexer<S>: Send + Sync {
    // Short name used in logs
    fn name(&self) -> &'static str;

    // Ingests blocks `start..=stop` into the store
    async fn load(&self, store: &S, start: i64, stop: i64) -> Result<(), IndexError>;
}
