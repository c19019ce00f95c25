//! Seeded universal hash families.
//!
//! Both the MinHash permutations and the band hash use functions of the
//! form `(a · x + b) mod c` with `c` prime. Parameters come from a splitmix64
//! stream keyed by the build seed and the stage, so a fixed seed reproduces
//! the same index and the two stages never share coefficients.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Modulus shared by both families: the Mersenne prime 2^31 − 1.
pub const HASH_PRIME: u64 = 2_147_483_647;

/// Which part of the build a parameter set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashStage {
    /// Row permutations for MinHash slots.
    Signature,
    /// Combining a band of slots into a bucket id.
    Banding,
}

impl HashStage {
    fn salt(self) -> u64 {
        match self {
            HashStage::Signature => 0x5349_474E_4154_5552,
            HashStage::Banding => 0x4241_4E44_494E_4721,
        }
    }
}

/// Coefficients `a`, `b` (one pair per function) and the modulus `c`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashParams {
    pub a: Vec<u64>,
    pub b: Vec<u64>,
    pub c: u64,
    pub stage: HashStage,
}

impl HashParams {
    /// Draw `count` hash functions for `stage` from `seed`.
    ///
    /// Multipliers are distinct and non-zero modulo `c`, so each row
    /// permutation is a bijection on `[0, c)`.
    pub fn generate(count: usize, seed: u64, stage: HashStage) -> Self {
        let mut stream = SplitMix64::new(seed ^ stage.salt());
        let mut seen = HashSet::with_capacity(count);
        let mut a = Vec::with_capacity(count);
        while a.len() < count {
            let candidate = 1 + stream.next_u64() % (HASH_PRIME - 1);
            if seen.insert(candidate) {
                a.push(candidate);
            }
        }
        let b = (0..count).map(|_| stream.next_u64() % HASH_PRIME).collect();
        Self {
            a,
            b,
            c: HASH_PRIME,
            stage,
        }
    }

    /// Number of hash functions in the family.
    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    /// Permuted position of `row` under function `p`.
    #[inline]
    pub fn permute(&self, p: usize, row: usize) -> u64 {
        let value = u128::from(self.a[p]) * row as u128 + u128::from(self.b[p]);
        (value % u128::from(self.c)) as u64
    }

    /// Hash a band of signature slots into a bucket id.
    ///
    /// `Σ (a[i] · x[i] + b[i]) mod c` with every term reduced before summing.
    /// The band length must not exceed [`len`](Self::len).
    pub fn combine(&self, band: &[u64]) -> u64 {
        let c = u128::from(self.c);
        let mut acc = 0u128;
        for (i, &x) in band.iter().enumerate() {
            let term = (u128::from(self.a[i]) * u128::from(x) + u128::from(self.b[i])) % c;
            acc = (acc + term) % c;
        }
        acc as u64
    }
}

/// Deterministic 64-bit generator (splitmix64).
#[derive(Debug, Clone)]
pub(crate) struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        splitmix64_finalize(self.state)
    }
}

#[inline]
fn splitmix64_finalize(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_deterministic() {
        let p1 = HashParams::generate(64, 42, HashStage::Signature);
        let p2 = HashParams::generate(64, 42, HashStage::Signature);
        assert_eq!(p1, p2);
    }

    #[test]
    fn stages_draw_independent_coefficients() {
        let sig = HashParams::generate(8, 42, HashStage::Signature);
        let band = HashParams::generate(8, 42, HashStage::Banding);
        assert_ne!(sig.a, band.a);
        assert_ne!(sig.b, band.b);
    }

    #[test]
    fn different_seeds_differ() {
        let p1 = HashParams::generate(16, 1, HashStage::Signature);
        let p2 = HashParams::generate(16, 2, HashStage::Signature);
        assert_ne!(p1.a, p2.a);
    }

    #[test]
    fn coefficients_are_in_range_and_multipliers_distinct() {
        let params = HashParams::generate(256, 7, HashStage::Signature);
        assert_eq!(params.len(), 256);
        assert_eq!(params.c, HASH_PRIME);
        assert!(params.a.iter().all(|&a| a >= 1 && a < HASH_PRIME));
        assert!(params.b.iter().all(|&b| b < HASH_PRIME));
        let unique: HashSet<u64> = params.a.iter().copied().collect();
        assert_eq!(unique.len(), 256);
    }

    #[test]
    fn permute_is_injective_on_small_domain() {
        let params = HashParams::generate(4, 99, HashStage::Signature);
        for p in 0..params.len() {
            let images: HashSet<u64> = (0..1000).map(|row| params.permute(p, row)).collect();
            assert_eq!(images.len(), 1000);
        }
    }

    #[test]
    fn permute_matches_formula() {
        let params = HashParams {
            a: vec![3],
            b: vec![5],
            c: 7,
            stage: HashStage::Signature,
        };
        assert_eq!(params.permute(0, 0), 5);
        assert_eq!(params.permute(0, 1), 1);
        assert_eq!(params.permute(0, 4), 3);
    }

    #[test]
    fn combine_uses_both_vectors() {
        let params = HashParams {
            a: vec![2, 3],
            b: vec![1, 4],
            c: 11,
            stage: HashStage::Banding,
        };
        // (2*5 + 1) + (3*6 + 4) = 11 + 22 = 33 ≡ 0 (mod 11)
        assert_eq!(params.combine(&[5, 6]), 0);
        // (2*1 + 1) + (3*1 + 4) = 10
        assert_eq!(params.combine(&[1, 1]), 10);
    }

    #[test]
    fn combine_handles_sentinel_slots() {
        let params = HashParams::generate(8, 3, HashStage::Banding);
        let bucket = params.combine(&[u64::MAX; 8]);
        assert!(bucket < HASH_PRIME);
    }

    #[test]
    fn splitmix_stream_is_well_distributed() {
        let mut stream = SplitMix64::new(12345);
        let values: HashSet<u64> = (0..100).map(|_| stream.next_u64()).collect();
        assert_eq!(values.len(), 100);
    }
}
