pub mod eth;
pub mod names;
pub mod transfers;

pub use eth::EthIndexer;
pub use names::NameIndexer;
pub use transfers::TransferIndexer;
