//! A single-node proof-of-work ledger.
//!
//! Signed value transfers are admitted into a pending pool, sealed into
//! hash-chained blocks by proof of work, and balances are derived by
//! replaying the chain.
//!
//! # Example
//!
//! ```rust
//! use pow_ledger::blockchain::{KeyPair, Ledger, Transaction};
//! use pow_ledger::config::LedgerConfig;
//!
//! let miner = KeyPair::generate();
//! let friend = KeyPair::generate();
//! let mut ledger = Ledger::new(LedgerConfig { difficulty: 1, ..LedgerConfig::default() }).unwrap();
//!
//! ledger.mine_pending_transactions(miner.address()).unwrap();
//!
//! let mut transfer = Transaction::new(miner.address().clone(), friend.address().clone(), 10.0);
//! transfer.sign(&miner).unwrap();
//! ledger.add_transaction(transfer).unwrap();
//! ledger.mine_pending_transactions(miner.address()).unwrap();
//!
//! assert_eq!(ledger.balance_of(friend.address()), 10.0);
//! assert!(ledger.is_chain_valid());
//! ```

pub mod blockchain;
pub mod config;
