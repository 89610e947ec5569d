use crate::{
    constants::{GENESIS_PREVIOUS_HASH, MINING_REWARD},
    Account, Amount, Block, LedgerError, Transaction, ValidationError,
};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
}

impl Ledger {
    /// An uninitialized ledger. Call [`Ledger::generate_genesis_block`] before anything else.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_genesis() -> Self {
        Self {
            chain: vec![Block::genesis()],
            pending_transactions: vec![],
        }
    }

    /// Append block 0. Fails once the chain holds any block.
    pub fn generate_genesis_block(&mut self) -> Result<&Block, LedgerError> {
        if !self.chain.is_empty() {
            return Err(LedgerError::AlreadyInitialized);
        }
        self.chain.push(Block::genesis());
        Ok(&self.chain[0])
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    /// Overwrite the pending pool wholesale, as adopted from a peer snapshot.
    pub fn set_pending_transactions(&mut self, pending: Vec<Transaction>) {
        self.pending_transactions = pending;
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// Admit `tx` into the pending pool.
    ///
    /// Only mined transactions count towards the sender's balance, so a
    /// sender cannot spend funds that are still pending.
    pub fn new_transaction(&mut self, tx: Transaction) -> Result<(), LedgerError> {
        if self.chain.is_empty() {
            return Err(LedgerError::Uninitialized);
        }
        if tx.amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let available = self.get_balance(&tx.sender);
        if available < BigInt::from(tx.amount.as_biguint().clone()) {
            return Err(LedgerError::InsufficientFunds {
                required: tx.amount,
                available,
            });
        }
        debug!(
            sender = %tx.sender,
            recipient = %tx.recipient,
            amount = %tx.amount,
            "transaction admitted"
        );
        self.pending_transactions.push(tx);
        Ok(())
    }

    /// Received minus sent over mined transactions. The pending pool is ignored.
    pub fn get_balance(&self, account: &Account) -> BigInt {
        let mut balance = BigInt::default();
        for tx in self.chain.iter().flat_map(|b| b.transactions.iter()) {
            let amount = BigInt::from(tx.amount.as_biguint().clone());
            if &tx.recipient == account {
                balance += &amount;
            }
            if &tx.sender == account {
                balance -= &amount;
            }
        }
        balance
    }

    /// Seal the pending pool plus a reward for `miner` into a new block on top of the tail.
    pub fn add_block(&mut self, miner: &Account) -> Result<&Block, LedgerError> {
        let (index, previous_hash) = match self.chain.last() {
            Some(tail) => (tail.index + 1, tail.hash),
            None => return Err(LedgerError::Uninitialized),
        };
        let mut transactions = std::mem::take(&mut self.pending_transactions);
        transactions.push(Transaction::reward(miner.clone(), Amount::from(MINING_REWARD)));
        let block = Block::seal(index, previous_hash, transactions);
        info!(
            index,
            txs = block.transactions.len(),
            hash = %hex::encode(block.hash),
            "mined block"
        );
        self.chain.push(block);
        Ok(&self.chain[self.chain.len() - 1])
    }

    /// Check a candidate chain's structure and hash links, reporting the first failure.
    pub fn validate(chain: &[Block]) -> Result<(), ValidationError> {
        let genesis = chain.first().ok_or(ValidationError::EmptyChain)?;
        if genesis.previous_hash != GENESIS_PREVIOUS_HASH {
            return Err(ValidationError::BrokenLink { index: genesis.index });
        }
        for (position, block) in chain.iter().enumerate() {
            if block.index != position as u64 {
                return Err(ValidationError::IndexMismatch {
                    position,
                    found: block.index,
                });
            }
            if !block.has_valid_hash() {
                return Err(ValidationError::HashMismatch { index: block.index });
            }
            if position > 0 && block.previous_hash != chain[position - 1].compute_hash() {
                return Err(ValidationError::BrokenLink { index: block.index });
            }
        }
        Ok(())
    }

    pub fn is_valid(chain: &[Block]) -> bool {
        Self::validate(chain).is_ok()
    }

    /// Longest chain wins. The caller must have validated `candidate`.
    ///
    /// Returns `true` when the local chain was replaced; ties and shorter
    /// candidates leave it untouched. The pending pool is never modified here.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.chain.len() {
            debug!(
                local = self.chain.len(),
                candidate = candidate.len(),
                "kept local chain"
            );
            return false;
        }
        info!(
            from = self.chain.len(),
            to = candidate.len(),
            "replaced local chain"
        );
        self.chain = candidate;
        true
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.chain {
            writeln!(
                f,
                "#{} ts={} prev={} hash={}",
                block.index,
                block.timestamp,
                hex::encode(block.previous_hash),
                hex::encode(block.hash)
            )?;
            for tx in &block.transactions {
                writeln!(f, "    {} -> {}: {}", tx.sender, tx.recipient, tx.amount)?;
            }
        }
        if !self.pending_transactions.is_empty() {
            writeln!(f, "pending:")?;
            for tx in &self.pending_transactions {
                writeln!(f, "    {} -> {}: {}", tx.sender, tx.recipient, tx.amount)?;
            }
        }
        Ok(())
    }
}
