//! Proof-of-work predicate and the multi-threaded nonce search.

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use thiserror::Error;

use super::block::{compute_block_hash, Block};

/// A SHA-256 hex digest has 64 characters, so no more zeros can be demanded.
pub const MAX_DIFFICULTY: u32 = 64;

/// Nonces tried per worker between checks of the shared stop flag.
const BATCH_SIZE: u64 = 1024;

const NOT_FOUND: u64 = u64::MAX;

/// Errors that can occur while searching for a proof of work
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MiningError {
    #[error("Difficulty {0} can never be met by a 64-character hash")]
    UnreachableDifficulty(u32),

    #[error("No nonce meeting difficulty {difficulty} found within {attempts} attempts")]
    Exhausted { difficulty: u32, attempts: u64 },

    #[error("Nonce {nonce} does not meet difficulty {difficulty}")]
    Rejected { nonce: u64, difficulty: u32 },

    #[error("Failed to start mining workers: {0}")]
    ThreadPool(String),
}

/// Checks whether a hex hash begins with `difficulty` zero characters
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

pub(crate) fn check_difficulty(difficulty: u32) -> Result<(), MiningError> {
    if difficulty > MAX_DIFFICULTY {
        return Err(MiningError::UnreachableDifficulty(difficulty));
    }
    Ok(())
}

/// Takes the next batch of attempts out of the shared budget.
///
/// With a cap the reservations never sum past `max_attempts`, so the search
/// tries exactly that many nonces before giving up.
fn reserve_batch(attempts: &AtomicU64, max_attempts: Option<u64>) -> Option<u64> {
    let max = match max_attempts {
        Some(max) => max,
        None => {
            attempts.fetch_add(BATCH_SIZE, Ordering::Relaxed);
            return Some(BATCH_SIZE);
        }
    };

    attempts
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
            (used < max).then(|| used + BATCH_SIZE.min(max - used))
        })
        .ok()
        .map(|used| BATCH_SIZE.min(max - used))
}

/// Searches the nonce space for `block` on `threads` workers.
///
/// Worker `i` tries nonces `i, i + threads, i + 2 * threads, ...`. The first
/// worker to hit the target raises a shared flag and the rest stop at their
/// next batch boundary. The block itself is not touched: the caller seals it
/// with [`Block::seal_with_nonce`], which re-checks the winning nonce.
pub fn search_parallel(
    block: &Block,
    difficulty: u32,
    threads: usize,
    max_attempts: Option<u64>,
) -> Result<u64, MiningError> {
    check_difficulty(difficulty)?;

    let threads = threads.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| MiningError::ThreadPool(e.to_string()))?;

    let found = AtomicU64::new(NOT_FOUND);
    let attempts = AtomicU64::new(0);
    let stride = threads as u64;

    pool.install(|| {
        (0..stride).into_par_iter().for_each(|worker| {
            let mut nonce = worker;

            loop {
                if found.load(Ordering::Relaxed) != NOT_FOUND {
                    return;
                }
                let batch = match reserve_batch(&attempts, max_attempts) {
                    Some(batch) => batch,
                    None => return,
                };

                for _ in 0..batch {
                    let hash = compute_block_hash(
                        &block.timestamp,
                        &block.transactions,
                        &block.previous_hash,
                        nonce,
                    );
                    if meets_difficulty(&hash, difficulty) {
                        found.fetch_min(nonce, Ordering::Relaxed);
                        return;
                    }
                    nonce = match nonce.checked_add(stride) {
                        Some(next) => next,
                        None => return,
                    };
                }
            }
        });
    });

    match found.load(Ordering::Relaxed) {
        NOT_FOUND => Err(MiningError::Exhausted {
            difficulty,
            attempts: attempts.load(Ordering::Relaxed),
        }),
        nonce => Ok(nonce),
    }
}
