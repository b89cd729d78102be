use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::crypto::sha256_hex;
use super::pow::{check_difficulty, meets_difficulty, MiningError};
use super::transaction::Transaction;

/// Previous-hash value carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Genesis timestamp, 2025-09-19T00:00:00Z
const GENESIS_TIMESTAMP_SECS: i64 = 1_758_240_000;

/// Represents a block in the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Timestamp when the block was created
    pub timestamp: DateTime<Utc>,

    /// Ordered list of transactions included in this block
    pub transactions: Vec<Transaction>,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Hash of the current block
    pub hash: String,

    /// Proof of work counter
    pub nonce: u64,
}

/// Hashes a block's contents
///
/// This is the single definition of a block hash: mining, sealing and the
/// integrity check all go through it.
///
/// # Arguments
///
/// * `timestamp` - The block's creation time
/// * `transactions` - The transactions, in block order
/// * `previous_hash` - The hash of the previous block
/// * `nonce` - The proof of work counter
///
/// # Returns
///
/// The SHA-256 hash of the block as a hexadecimal string
pub fn compute_block_hash(
    timestamp: &DateTime<Utc>,
    transactions: &[Transaction],
    previous_hash: &str,
    nonce: u64,
) -> String {
    let block_data = serde_json::json!({
        "timestamp": timestamp,
        "transactions": transactions,
        "previous_hash": previous_hash,
        "nonce": nonce,
    });

    sha256_hex(block_data.to_string().as_bytes())
}

impl Block {
    /// Creates a new, unmined block
    ///
    /// The nonce starts at zero and `hash` holds the matching provisional hash.
    pub fn new(timestamp: DateTime<Utc>, transactions: Vec<Transaction>, previous_hash: String) -> Self {
        let hash = compute_block_hash(&timestamp, &transactions, &previous_hash, 0);

        Block {
            timestamp,
            transactions,
            previous_hash,
            hash,
            nonce: 0,
        }
    }

    /// Creates the genesis block with a fixed timestamp and previous-hash sentinel
    pub fn genesis(transactions: Vec<Transaction>) -> Self {
        let timestamp = DateTime::from_timestamp(GENESIS_TIMESTAMP_SECS, 0).unwrap_or_default();
        Block::new(timestamp, transactions, GENESIS_PREVIOUS_HASH.to_string())
    }

    /// Recomputes the hash from the block's current fields
    pub fn compute_hash(&self) -> String {
        compute_block_hash(&self.timestamp, &self.transactions, &self.previous_hash, self.nonce)
    }

    /// Mines the block
    ///
    /// Increments the nonce until the hash begins with `difficulty` zero
    /// characters. There is no attempt limit: for an unreachable difficulty
    /// this never returns. See [`Block::mine_bounded`] for a capped search.
    pub fn mine(&mut self, difficulty: u32) {
        while !meets_difficulty(&self.hash, difficulty) {
            self.nonce += 1;
            self.hash = self.compute_hash();
        }
    }

    /// Mines the block, giving up after `max_attempts` nonces
    ///
    /// # Arguments
    ///
    /// * `difficulty` - Number of leading zero hex characters required
    /// * `max_attempts` - Attempt cap, or `None` to search until found
    ///
    /// # Returns
    ///
    /// The number of nonces tried past the starting one
    pub fn mine_bounded(&mut self, difficulty: u32, max_attempts: Option<u64>) -> Result<u64, MiningError> {
        check_difficulty(difficulty)?;

        let mut attempts = 0;
        while !meets_difficulty(&self.hash, difficulty) {
            if max_attempts.is_some_and(|max| attempts >= max) {
                return Err(MiningError::Exhausted { difficulty, attempts });
            }
            self.nonce += 1;
            self.hash = self.compute_hash();
            attempts += 1;
        }

        Ok(attempts)
    }

    /// Seals the block with a nonce found elsewhere
    ///
    /// The hash is recomputed here and the nonce is refused unless it meets
    /// `difficulty`; on refusal the block is left unchanged.
    pub fn seal_with_nonce(&mut self, nonce: u64, difficulty: u32) -> Result<(), MiningError> {
        let hash = compute_block_hash(&self.timestamp, &self.transactions, &self.previous_hash, nonce);
        if !meets_difficulty(&hash, difficulty) {
            return Err(MiningError::Rejected { nonce, difficulty });
        }

        self.nonce = nonce;
        self.hash = hash;
        Ok(())
    }

    /// Checks that every transaction in the block is valid
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions
            .iter()
            .all(|transaction| transaction.is_valid().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::{Address, KeyPair};

    fn reward(amount: f64) -> Transaction {
        Transaction::new_mint(Address("recipient".to_string()), amount)
    }

    #[test]
    fn test_new_block() {
        let block = Block::new(Utc::now(), vec![reward(10.0), reward(20.0)], "previous_hash".to_string());

        assert_eq!(block.nonce, 0);
        assert_eq!(block.previous_hash, "previous_hash");
        assert_eq!(block.hash, block.compute_hash());
        assert_eq!(block.hash.len(), 64);
    }

    #[test]
    fn test_hash_depends_on_every_input() {
        let block = Block::new(Utc::now(), vec![reward(10.0), reward(20.0)], "previous_hash".to_string());

        let mut changed = block.clone();
        changed.nonce = 1;
        assert_ne!(changed.compute_hash(), block.hash);

        let mut changed = block.clone();
        changed.previous_hash = "other".to_string();
        assert_ne!(changed.compute_hash(), block.hash);

        let mut changed = block.clone();
        changed.transactions.swap(0, 1);
        assert_ne!(changed.compute_hash(), block.hash);

        let mut changed = block.clone();
        changed.transactions[0].amount = 11.0;
        assert_ne!(changed.compute_hash(), block.hash);

        let mut changed = block.clone();
        changed.timestamp = DateTime::from_timestamp(0, 0).unwrap();
        assert_ne!(changed.compute_hash(), block.hash);
    }

    #[test]
    fn test_genesis_block_is_fixed() {
        let first = Block::genesis(Vec::new());
        let second = Block::genesis(Vec::new());

        assert_eq!(first.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(first.timestamp.to_rfc3339(), "2025-09-19T00:00:00+00:00");
        assert_eq!(first.hash, second.hash);
    }

    #[test]
    fn test_mine_block() {
        let mut block = Block::new(Utc::now(), vec![reward(100.0)], "previous_hash".to_string());
        block.mine(2);

        assert!(block.hash.starts_with("00"));
        assert_eq!(block.hash, block.compute_hash());
    }

    #[test]
    fn test_mine_zero_difficulty_keeps_nonce() {
        let mut block = Block::new(Utc::now(), vec![reward(100.0)], "previous_hash".to_string());
        let provisional = block.hash.clone();
        block.mine(0);

        assert_eq!(block.nonce, 0);
        assert_eq!(block.hash, provisional);
    }

    #[test]
    fn test_mine_empty_block() {
        let mut block = Block::new(Utc::now(), Vec::new(), "previous_hash".to_string());
        block.mine(1);

        assert!(block.hash.starts_with('0'));
    }

    #[test]
    fn test_mine_bounded_gives_up() {
        let mut block = Block::new(Utc::now(), vec![reward(100.0)], "previous_hash".to_string());
        let result = block.mine_bounded(20, Some(10));

        assert_eq!(
            result,
            Err(MiningError::Exhausted {
                difficulty: 20,
                attempts: 10
            })
        );
        assert_eq!(block.nonce, 10);
    }

    #[test]
    fn test_mine_bounded_succeeds() {
        let mut block = Block::new(Utc::now(), vec![reward(100.0)], "previous_hash".to_string());
        let attempts = block.mine_bounded(1, None).unwrap();

        assert_eq!(attempts, block.nonce);
        assert!(block.hash.starts_with('0'));
        assert_eq!(
            block.mine_bounded(65, None),
            Err(MiningError::UnreachableDifficulty(65))
        );
    }

    #[test]
    fn test_seal_with_wrong_nonce_is_rejected() {
        let mut block = Block::new(Utc::now(), vec![reward(100.0)], "previous_hash".to_string());
        let before = block.clone();
        let bad_nonce = (0..)
            .find(|nonce| {
                let hash = compute_block_hash(&block.timestamp, &block.transactions, &block.previous_hash, *nonce);
                !meets_difficulty(&hash, 2)
            })
            .unwrap();

        assert_eq!(
            block.seal_with_nonce(bad_nonce, 2),
            Err(MiningError::Rejected {
                nonce: bad_nonce,
                difficulty: 2
            })
        );
        assert_eq!(block, before);
    }

    #[test]
    fn test_has_valid_transactions() {
        let sender = KeyPair::generate();
        let receiver = KeyPair::generate();

        let mut transfer = Transaction::new(sender.address().clone(), receiver.address().clone(), 5.0);
        transfer.sign(&sender).unwrap();
        let block = Block::new(Utc::now(), vec![transfer.clone(), reward(100.0)], "previous_hash".to_string());
        assert!(block.has_valid_transactions());

        let unsigned = Transaction::new(sender.address().clone(), receiver.address().clone(), 5.0);
        let block = Block::new(Utc::now(), vec![unsigned], "previous_hash".to_string());
        assert!(!block.has_valid_transactions());

        transfer.amount = 50.0;
        let block = Block::new(Utc::now(), vec![reward(100.0), transfer], "previous_hash".to_string());
        assert!(!block.has_valid_transactions());

        let empty = Block::new(Utc::now(), Vec::new(), "previous_hash".to_string());
        assert!(empty.has_valid_transactions());
    }
}
