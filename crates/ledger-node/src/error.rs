use ledger_core::{LedgerError, PeerAddress, ValidationError};
use thiserror::Error;

/// Everything that can go wrong at the node boundary. All variants are recoverable.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("received chain rejected: {0}")]
    Validation(#[from] ValidationError),
    #[error("no known peers to send to")]
    EmptyPeerSet,
    #[error("{0} is not a known peer")]
    UnknownPeer(PeerAddress),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed snapshot: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("upstream unavailable")]
    Disconnected,
    #[error("node is already connected or connecting")]
    AlreadyConnected,
}

impl NodeError {
    /// Errors after which the upstream stream can no longer be trusted.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            NodeError::Connection(_)
                | NodeError::Io(_)
                | NodeError::Codec(_)
                | NodeError::Disconnected
        )
    }
}
