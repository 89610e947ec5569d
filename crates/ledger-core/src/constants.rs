pub const HASH_SIZE: usize = 32;
/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: [u8; HASH_SIZE] = [0u8; HASH_SIZE];
pub const GENESIS_TIMESTAMP: u64 = 0;
/// Paid from `Account::Network` to the miner of every block after genesis.
pub const MINING_REWARD: u64 = 15;
