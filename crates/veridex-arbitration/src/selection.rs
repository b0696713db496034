//! # Arbitrator Selection
//!
//! Randomized, exclusion-aware sampling of eligible arbitrators. Selection
//! is a pure function of the registry snapshot, the case's exclusion set,
//! the requested count, and a host-supplied entropy seed — the engine owns
//! no hidden selection state.
//!
//! ## Verifiable draws
//!
//! The host publishes an [`EntropySeed`] per block (recent chain entropy).
//! Draw `i` is `sha256(seed ‖ round ‖ i)` reduced modulo the pool size,
//! skipping repeats until the requested number of distinct arbitrators is
//! accumulated. Any observer holding the seed and the registry snapshot
//! can recompute the selection.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use veridex_core::{AccountId, RoundId};

/// Host-supplied selection entropy, refreshed per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntropySeed([u8; 32]);

impl EntropySeed {
    /// Wrap raw seed bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive a seed from an arbitrary byte string (test convenience and
    /// hosts whose entropy is not already 32 bytes).
    pub fn derive(material: &[u8]) -> Self {
        let digest = Sha256::digest(material);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Access the raw seed bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// One uniform draw: `sha256(seed ‖ round ‖ counter)` reduced modulo
/// `modulus`.
fn draw_index(seed: &EntropySeed, round: RoundId, counter: u64, modulus: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(round.value().to_be_bytes());
    hasher.update(counter.to_be_bytes());
    let digest = hasher.finalize();
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(word) % modulus
}

/// Draw `count` distinct arbitrators from `pool`.
///
/// The pool must be at least `count` long (the caller escalates before
/// getting here otherwise). Repeated draws are skipped; after a bounded
/// number of hash draws the remainder is filled from the first unchosen
/// pool entries, so the function is total for every seed.
pub fn draw_distinct(
    pool: &[AccountId],
    count: u64,
    seed: &EntropySeed,
    round: RoundId,
) -> Vec<AccountId> {
    debug_assert!(pool.len() as u64 >= count);
    let count = count.min(pool.len() as u64) as usize;

    let mut chosen_indices: Vec<usize> = Vec::with_capacity(count);
    let mut counter: u64 = 0;
    // 128 hash draws per slot before the deterministic fallback kicks in.
    let max_draws = (count as u64).saturating_mul(128);

    while chosen_indices.len() < count && counter < max_draws {
        let index = draw_index(seed, round, counter, pool.len() as u64) as usize;
        counter += 1;
        if !chosen_indices.contains(&index) {
            chosen_indices.push(index);
        }
    }

    // Deterministic completion for pathological seeds.
    let mut fill = 0usize;
    while chosen_indices.len() < count {
        if !chosen_indices.contains(&fill) {
            chosen_indices.push(fill);
        }
        fill += 1;
    }

    chosen_indices
        .into_iter()
        .map(|i| pool[i].clone())
        .collect()
}
