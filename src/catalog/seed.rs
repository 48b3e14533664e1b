// Stable seed derivation for motif sampling
// Seeds come from a SHA-256 content hash, so they are identical across runs and platforms

use rand::SeedableRng;
use rand_pcg::Pcg64;
use sha2::{Digest, Sha256};

/// Hash key parts (joined with '|') into a 64-bit seed
///
/// Uses the first eight digest bytes, big-endian.
pub fn stable_seed(parts: &[&str]) -> u64 {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Fresh generator for one selection call
pub fn selection_rng(seed: u64) -> Pcg64 {
    Pcg64::seed_from_u64(seed)
}
