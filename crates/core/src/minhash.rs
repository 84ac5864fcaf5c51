//! MinHash signatures over character shingles for near-duplicate detection.
//!
//! Signatures are persisted to the KV store and compared across process
//! restarts, so every part of the computation is deterministic: the base
//! shingle hash comes from SHA-256 and the permutation parameters are drawn
//! from a fixed-seed splitmix64 sequence.

use crate::fingerprint::normalize_text;
use crate::hashing::sha256_u64;

/// Default number of hash permutations per signature.
pub const DEFAULT_NUM_PERM: usize = 128;

/// Character shingle width.
const SHINGLE_SIZE: usize = 3;

/// Mersenne prime used for the universal hash family.
const MERSENNE_PRIME: u64 = (1 << 61) - 1;

/// Hash values are truncated into this range.
const MAX_HASH: u64 = (1 << 32) - 1;

/// Fixed seed for the permutation parameter sequence. Changing it would
/// invalidate every stored signature.
const PERMUTATION_SEED: u64 = 0x5eed_51f7_ca8e_0001;

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// The `(a, b)` parameters of one permutation `h(x) = (a*x + b) mod p`.
fn permutation_params(num_perm: usize) -> Vec<(u64, u64)> {
    let mut state = PERMUTATION_SEED;
    (0..num_perm)
        .map(|_| {
            let a = splitmix64(&mut state) % (MERSENNE_PRIME - 1) + 1;
            let b = splitmix64(&mut state) % MERSENNE_PRIME;
            (a, b)
        })
        .collect()
}

/// Compute a MinHash signature from character 3-grams of the normalized text.
///
/// Text shorter than one shingle yields the all-`MAX_HASH` signature; callers
/// skip the near-duplicate tier for very short messages anyway.
pub fn signature(text: &str, num_perm: usize) -> Vec<u64> {
    let normalized = normalize_text(text);
    let chars: Vec<char> = normalized.chars().collect();
    let params = permutation_params(num_perm);
    let mut sig = vec![MAX_HASH; num_perm];

    for window in chars.windows(SHINGLE_SIZE) {
        let shingle: String = window.iter().collect();
        let base = sha256_u64(shingle.as_bytes()) % MERSENNE_PRIME;
        for (slot, &(a, b)) in sig.iter_mut().zip(&params) {
            let h = ((a as u128 * base as u128 + b as u128) % MERSENNE_PRIME as u128) as u64
                & MAX_HASH;
            if h < *slot {
                *slot = h;
            }
        }
    }

    sig
}

/// Estimate Jaccard similarity from two signatures as the fraction of
/// matching positions. Returns 0.0 for mismatched or empty signatures.
pub fn jaccard_estimate(a: &[u64], b: &[u64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let matches = a.iter().zip(b).filter(|(x, y)| x == y).count();
    matches as f64 / a.len() as f64
}
