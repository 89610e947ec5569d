use crate::{
    wire::{LedgerState, Snapshot},
    NodeError, PeerSet,
};
use ledger_core::Ledger;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// The state shared by the receiver and the command issuer.
///
/// Chain, pending pool and peer set sit behind one lock so that a chain
/// replacement can never interleave with mining or admission.
#[derive(Debug, Default)]
pub struct NodeState {
    pub ledger: Ledger,
    pub peers: PeerSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The snapshot carried no ledger; only the peer set changed.
    PeersOnly,
    /// The received chain was valid but not longer than ours.
    Unchanged,
    Replaced { from: usize, to: usize },
}

impl NodeState {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            peers: PeerSet::new(),
        }
    }

    pub fn snapshot(&self, include_ledger: bool) -> Snapshot {
        Snapshot {
            peers: self.peers.clone(),
            ledger: include_ledger.then(|| LedgerState::from(&self.ledger)),
        }
    }

    /// Replace the peer set, then adopt the received ledger if it is valid and longer.
    ///
    /// An invalid chain leaves ledger and pending pool untouched and is
    /// reported as [`NodeError::Validation`]; the peer set has already been
    /// replaced at that point.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> Result<ApplyOutcome, NodeError> {
        self.peers.replace(snapshot.peers);

        let Some(remote) = snapshot.ledger else {
            return Ok(ApplyOutcome::PeersOnly);
        };
        Ledger::validate(&remote.chain)?;

        let from = self.ledger.len();
        let to = remote.chain.len();
        if self.ledger.replace_chain(remote.chain) {
            self.ledger.set_pending_transactions(remote.pending_transactions);
            Ok(ApplyOutcome::Replaced { from, to })
        } else {
            Ok(ApplyOutcome::Unchanged)
        }
    }
}

#[derive(Clone, Debug)]
pub struct PeerSyncSession {
    state: Arc<Mutex<NodeState>>,
}

impl PeerSyncSession {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            state: Arc::new(Mutex::new(NodeState::new(ledger))),
        }
    }

    pub fn state(&self) -> &Arc<Mutex<NodeState>> {
        &self.state
    }

    pub async fn snapshot(&self, include_ledger: bool) -> Snapshot {
        self.state.lock().await.snapshot(include_ledger)
    }

    pub async fn apply(&self, snapshot: Snapshot) -> Result<ApplyOutcome, NodeError> {
        let mut state = self.state.lock().await;
        match state.apply_snapshot(snapshot) {
            Ok(ApplyOutcome::Replaced { from, to }) => {
                info!(from, to, "adopted longer chain from upstream");
                Ok(ApplyOutcome::Replaced { from, to })
            }
            Err(err) => {
                warn!(%err, "new chain is not valid");
                Err(err)
            }
            outcome => outcome,
        }
    }
}
