// Blockchain module
//
// This module contains the ledger engine:
// - Key pairs, addresses and signatures (secp256k1)
// - Transaction structure and signing
// - Block structure and hashing
// - Proof of work search
// - Ledger: chain, pending pool, balances and integrity checks

pub mod block;
pub mod chain;
pub mod crypto;
pub mod pow;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{verify_chain, ChainViolation, Ledger, LedgerError};
pub use crypto::{Address, DigitalSignature, KeyPair};
pub use pow::MiningError;
pub use transaction::{Transaction, TransactionError};
