//! Deterministic RNG construction and seed-derivation helpers.

use rand::rngs::StdRng;
use rand::SeedableRng;
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Derives the deterministic seed for a specific substream.
///
/// Substreams are derived by hashing `(master_seed, substream_id)` with
/// SipHash-1-3 keyed with zeros, which is stable across platforms.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}

/// Returns a seeded `StdRng` for the given substream of a master seed.
pub fn substream_rng(master_seed: u64, substream: u64) -> StdRng {
    StdRng::seed_from_u64(derive_substream_seed(master_seed, substream))
}
