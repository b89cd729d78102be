use chrono::Utc;
use log::{debug, info, warn};
use thiserror::Error;

use super::block::Block;
use super::crypto::Address;
use super::pow::{self, MiningError};
use super::transaction::{Transaction, TransactionError};
use crate::config::{ConfigError, LedgerConfig};

const GENESIS_MEMO: &str = "Genesis reward for the developer";
const MINER_REWARD_MEMO: &str = "Miner reward";

/// Errors that can occur during ledger operations
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("Cannot add invalid transaction to the chain")]
    InvalidSignature,

    #[error("Insufficient funds: amount {amount} must be less than balance {balance}")]
    InsufficientFunds { amount: f64, balance: f64 },

    #[error("Mining error: {0}")]
    Mining(#[from] MiningError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<ConfigError> for LedgerError {
    fn from(err: ConfigError) -> Self {
        LedgerError::Config(err.to_string())
    }
}

/// First integrity failure found in a chain
///
/// All three checks are evaluated for the failing block, so more than one
/// flag can be set.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "block {index} failed verification (invalid transactions: {invalid_transactions}, \
     tampered: {tampered}, broken link: {broken_link}); block hash {hash}, previous block hash {previous_block_hash}"
)]
pub struct ChainViolation {
    /// Index of the failing block; its predecessor is `index - 1`
    pub index: usize,
    pub hash: String,
    pub previous_block_hash: String,
    pub invalid_transactions: bool,
    pub tampered: bool,
    pub broken_link: bool,
}

/// Verifies a chain of blocks, genesis first
///
/// For every block after the genesis block: all transactions must be valid,
/// the stored hash must match the recomputed one, and `previous_hash` must
/// equal the predecessor's hash. Scanning stops at the first failing block.
pub fn verify_chain(blocks: &[Block]) -> Result<(), ChainViolation> {
    for (offset, pair) in blocks.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);

        let invalid_transactions = !current.has_valid_transactions();
        let tampered = current.hash != current.compute_hash();
        let broken_link = current.previous_hash != previous.hash;

        if invalid_transactions || tampered || broken_link {
            return Err(ChainViolation {
                index: offset + 1,
                hash: current.hash.clone(),
                previous_block_hash: previous.hash.clone(),
                invalid_transactions,
                tampered,
                broken_link,
            });
        }
    }

    Ok(())
}

/// The chain of sealed blocks and the pool of pending transactions
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Sealed blocks, genesis first; never empty
    chain: Vec<Block>,

    /// Admitted transactions waiting for the next block
    pending_transactions: Vec<Transaction>,

    config: LedgerConfig,
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger::with_checked_config(LedgerConfig::default())
    }
}

impl Ledger {
    /// Creates a new ledger with a genesis block
    ///
    /// The configuration is validated first, so no ledger ever mints a
    /// negative or non-finite amount. The genesis block holds the configured
    /// genesis allocation, if any, as a single mint transaction. It is not mined.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Ledger::with_checked_config(config))
    }

    fn with_checked_config(config: LedgerConfig) -> Self {
        let transactions = match &config.genesis {
            Some(allocation) => vec![
                Transaction::new_mint(allocation.address.clone(), allocation.amount).with_memo(GENESIS_MEMO),
            ],
            None => Vec::new(),
        };
        let genesis = Block::genesis(transactions);
        info!("Created genesis block {}", genesis.hash);

        Ledger {
            chain: vec![genesis],
            pending_transactions: Vec::new(),
            config,
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    pub fn mining_reward(&self) -> f64 {
        self.config.mining_reward
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> &Block {
        // `chain` starts with the genesis block and only grows
        &self.chain[self.chain.len() - 1]
    }

    /// Gets the entire chain
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Gets the transactions waiting to be mined
    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    /// Checks whether a transaction may enter the pending pool
    ///
    /// # Returns
    ///
    /// * `Err(MalformedTransaction)` - no sender (mints cannot be submitted),
    ///   empty receiver, or a negative or non-finite amount
    /// * `Err(Transaction(MissingSignature))` - the transfer is unsigned
    /// * `Err(InvalidSignature)` - the signature does not verify
    /// * `Ok(admissible)` - whether `amount` is strictly less than the
    ///   sender's balance on the chain
    pub fn is_transaction_admissible(&self, transaction: &Transaction) -> Result<bool, LedgerError> {
        let sender = match &transaction.sender {
            Some(sender) if !sender.is_empty() => sender,
            _ => {
                return Err(LedgerError::MalformedTransaction(
                    "transactions must have sender and receiver address".to_string(),
                ))
            }
        };

        if transaction.receiver.is_empty() {
            return Err(LedgerError::MalformedTransaction(
                "transactions must have sender and receiver address".to_string(),
            ));
        }

        if !transaction.amount.is_finite() || transaction.amount < 0.0 {
            return Err(LedgerError::MalformedTransaction(format!(
                "amount must be a non-negative number, got {}",
                transaction.amount
            )));
        }

        if !transaction.is_valid()? {
            return Err(LedgerError::InvalidSignature);
        }

        Ok(transaction.amount < self.balance_of(sender))
    }

    /// Adds a transaction to the pending pool
    ///
    /// Inadmissible transactions are rejected with the reason and never queued.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<(), LedgerError> {
        let admissible = match self.is_transaction_admissible(&transaction) {
            Ok(admissible) => admissible,
            Err(err) => {
                warn!("Rejected transaction: {}", err);
                return Err(err);
            }
        };

        if !admissible {
            let balance = transaction
                .sender
                .as_ref()
                .map(|sender| self.balance_of(sender))
                .unwrap_or_default();
            let err = LedgerError::InsufficientFunds {
                amount: transaction.amount,
                balance,
            };
            warn!("Rejected transaction: {}", err);
            return Err(err);
        }

        debug!(
            "Admitted transaction {} to the pending pool",
            transaction.compute_content_hash()
        );
        self.pending_transactions.push(transaction);

        Ok(())
    }

    /// Seals the pending transactions into a new block
    ///
    /// A reward mint for `miner_address` is appended after the pending
    /// transactions, the block is mined against the last block's hash and
    /// appended, and the pending pool is cleared. If mining fails the chain
    /// and the pending pool are left as they were.
    ///
    /// # Returns
    ///
    /// The newly appended block
    pub fn mine_pending_transactions(&mut self, miner_address: &Address) -> Result<&Block, LedgerError> {
        if miner_address.is_empty() {
            return Err(LedgerError::MalformedTransaction(
                "miner address must not be empty".to_string(),
            ));
        }

        let reward = Transaction::new_mint(miner_address.clone(), self.config.mining_reward)
            .with_memo(MINER_REWARD_MEMO);

        let mut transactions = self.pending_transactions.clone();
        transactions.push(reward);

        let mut block = Block::new(Utc::now(), transactions, self.last_block().hash.clone());
        self.seal(&mut block)?;

        info!(
            "Mined block {} with {} transactions (nonce {})",
            block.hash,
            block.transactions.len(),
            block.nonce
        );

        self.chain.push(block);
        self.pending_transactions.clear();

        Ok(self.last_block())
    }

    fn seal(&self, block: &mut Block) -> Result<(), MiningError> {
        let difficulty = self.config.difficulty;
        let max_attempts = self.config.max_mining_attempts;

        if self.config.mining_threads > 1 {
            let nonce = pow::search_parallel(block, difficulty, self.config.mining_threads, max_attempts)?;
            block.seal_with_nonce(nonce, difficulty)
        } else {
            block.mine_bounded(difficulty, max_attempts).map(|_| ())
        }
    }

    /// Computes the balance of an address by replaying the whole chain
    ///
    /// Pending transactions are not counted. Addresses that never appear have
    /// a balance of zero.
    pub fn balance_of(&self, address: &Address) -> f64 {
        let mut balance = 0.0;

        for transaction in self.chain.iter().flat_map(|block| &block.transactions) {
            if transaction.sender.as_ref() == Some(address) {
                balance -= transaction.amount;
            }
            if &transaction.receiver == address {
                balance += transaction.amount;
            }
        }

        balance
    }

    /// Validates the chain
    ///
    /// # Returns
    ///
    /// true if the chain is valid; otherwise the failing block pair is logged
    /// and false is returned
    pub fn is_chain_valid(&self) -> bool {
        match verify_chain(&self.chain) {
            Ok(()) => true,
            Err(violation) => {
                warn!("Chain is not valid: {}", violation);
                false
            }
        }
    }

    /// Dumps the chain, pending pool and parameters as pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, LedgerError> {
        let dump = serde_json::json!({
            "chain": self.chain,
            "pending_transactions": self.pending_transactions,
            "difficulty": self.config.difficulty,
            "mining_reward": self.config.mining_reward,
        });

        serde_json::to_string_pretty(&dump).map_err(|e| LedgerError::Serialization(e.to_string()))
    }
}
