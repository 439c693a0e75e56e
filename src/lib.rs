pub mod config;
pub mod database;
pub mod indexers;
pub mod metrics;
pub mod models;
pub mod rest;
pub mod sync;
pub mod utils;

pub use config::Config;
pub use models::{LatestBlock, SyncStatus, Transfer};
pub use rest::AppState;
pub use sync::{IndexError, Indexer, ShovelUpstream, UpstreamSource, Watcher};
