pub mod indexer;
pub mod upstream;
pub mod watcher;

pub use indexer::{IndexError, Indexer};
pub use upstream::{ShovelUpstream, UpstreamSource};
pub use watcher::Watcher;
