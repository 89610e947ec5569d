pub mod address;
pub mod amount;
pub mod constants;
pub mod error;
pub mod ledger;

pub use address::{Account, PeerAddress};
pub use amount::Amount;
pub use error::{LedgerError, ValidationError};
pub use ledger::Ledger;
pub use num_bigint::{BigInt, BigUint};

use constants::{GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub type Hash = [u8; 32];

fn sha256(bytes: &[u8]) -> Hash {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Account,
    pub recipient: Account,
    pub amount: Amount,
}

impl Transaction {
    pub fn new(
        sender: impl Into<Account>,
        recipient: impl Into<Account>,
        amount: impl Into<Amount>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }

    /// Mining reward paid by the network to `miner`.
    pub fn reward(miner: impl Into<Account>, amount: impl Into<Amount>) -> Self {
        Self::new(Account::Network, miner, amount)
    }

    pub fn hash_bytes(&self) -> Vec<u8> {
        let amount = self.amount.to_bytes_be();
        let mut bytes = self.sender.digest_bytes();
        bytes.extend(self.recipient.digest_bytes());
        bytes.extend_from_slice(&(amount.len() as u64).to_le_bytes());
        bytes.extend(amount);
        bytes
    }

    pub fn hash(&self) -> Hash {
        sha256(&self.hash_bytes())
    }
}

/// A sealed batch of transactions linked to its predecessor by hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: Hash,
    pub hash: Hash,
}

impl Block {
    /// Seal `transactions` into a block stamped with the current time.
    pub fn seal(index: u64, previous_hash: Hash, transactions: Vec<Transaction>) -> Self {
        Self::seal_at(index, now_secs(), previous_hash, transactions)
    }

    pub fn seal_at(
        index: u64,
        timestamp: u64,
        previous_hash: Hash,
        transactions: Vec<Transaction>,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            hash: [0u8; 32],
        };
        block.hash = block.compute_hash();
        block
    }

    /// Deterministic so that every node starts from the same block 0.
    pub fn genesis() -> Self {
        Self::seal_at(0, GENESIS_TIMESTAMP, GENESIS_PREVIOUS_HASH, vec![])
    }

    pub fn hash_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + 8 + 32 + 32);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.previous_hash);
        bytes.extend_from_slice(&merkle_root(&self.transactions));
        bytes
    }

    /// Digest recomputed from the block's fields, ignoring the stored `hash`.
    pub fn compute_hash(&self) -> Hash {
        sha256(&self.hash_bytes())
    }

    pub fn has_valid_hash(&self) -> bool {
        self.compute_hash() == self.hash
    }
}

pub fn merkle_root(txs: &[Transaction]) -> Hash {
    if txs.is_empty() {
        return [0u8; 32];
    }
    let mut level: Vec<Hash> = txs.iter().map(Transaction::hash).collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let (a, b) = if pair.len() == 2 {
                (pair[0], pair[1])
            } else {
                (pair[0], pair[0])
            };
            let mut hasher = Sha256::new();
            hasher.update(a);
            hasher.update(b);
            let digest = hasher.finalize();
            let mut out = [0u8; 32];
            out.copy_from_slice(&digest[..]);
            next.push(out);
        }
        level = next;
    }
    level[0]
}
