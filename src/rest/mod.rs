pub mod routes;

use sqlx::{Pool, Postgres};
use std::sync::Arc;

use crate::sync::Watcher;

// Application state shared across HTTP handlers
pub struct AppState {
    pub watcher: Arc<Watcher<Pool<Postgres>>>,
    pub db_pool: Pool<Postgres>,
}
