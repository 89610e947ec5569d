pub mod config;
mod constants;
pub mod error;
pub mod node;
pub mod peers;
pub mod session;
pub mod wire;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::{ConnectionState, NetworkNode, NodeEvent};
pub use peers::PeerSet;
pub use session::{ApplyOutcome, NodeState, PeerSyncSession};
pub use wire::{LedgerState, Snapshot};
