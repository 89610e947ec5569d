use crate::Amount;
use num_bigint::BigInt;
use thiserror::Error;

/// Structural or hash-link failure found while checking a candidate chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("chain is empty")]
    EmptyChain,
    #[error("block at position {position} carries index {found}")]
    IndexMismatch { position: usize, found: u64 },
    #[error("block {index} does not link to the hash of its predecessor")]
    BrokenLink { index: u64 },
    #[error("block {index} stored hash does not match its contents")]
    HashMismatch { index: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("genesis block already exists")]
    AlreadyInitialized,
    #[error("ledger has no genesis block")]
    Uninitialized,
    #[error("transaction amount must be greater than zero")]
    ZeroAmount,
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: BigInt },
    #[error("invalid chain: {0}")]
    Validation(#[from] ValidationError),
}
