//! Scramble RNG
//!
//! Xorshift128+ seeded through SplitMix64. A scramble is a pure function of
//! its seed, so one logged seed is enough to rebuild a disputed scramble.

use sha2::{Digest, Sha256};

const SEED_DOMAIN: &[u8] = b"CUBE_DUEL_SEED_V1";

/// Seeded Xorshift128+ generator used to draw scramble moves.
///
/// ```
/// use cube_duel::core::rng::ScrambleRng;
///
/// let mut a = ScrambleRng::new(7);
/// let mut b = ScrambleRng::new(7);
/// assert_eq!(a.below(6), b.below(6));
/// ```
#[derive(Clone, Debug)]
pub struct ScrambleRng {
    s0: u64,
    s1: u64,
}

impl ScrambleRng {
    /// Seed the generator. Any seed, including zero, yields a usable state.
    pub fn new(seed: u64) -> Self {
        let mut mix = seed;
        let s0 = splitmix64(&mut mix);
        let s1 = splitmix64(&mut mix);

        // All-zero is a fixed point of xorshift
        if s0 | s1 == 0 {
            return Self { s0: 1, s1: 1 };
        }
        Self { s0, s1 }
    }

    /// Next raw 64-bit output.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let (x, mut y) = (self.s0, self.s1);
        let out = x.wrapping_add(y);

        y ^= x;
        self.s0 = x.rotate_left(24) ^ y ^ (y << 16);
        self.s1 = y.rotate_left(37);
        out
    }

    /// Uniform-enough index in `0..bound`; zero when `bound` is zero.
    #[inline]
    pub fn below(&mut self, bound: usize) -> usize {
        match bound {
            0 => 0,
            n => (self.next_u64() % n as u64) as usize,
        }
    }

    /// Pick one element of a non-empty table.
    pub fn pick<'a, T>(&mut self, table: &'a [T]) -> Option<&'a T> {
        let idx = self.below(table.len());
        table.get(idx)
    }
}

#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Hash a purpose tag and key material into a 64-bit seed.
///
/// Every part is length-prefixed, so `["ab", "c"]` and `["a", "bc"]` map to
/// different seeds.
pub fn derive_seed(purpose: &[u8], material: &[&[u8]]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(SEED_DOMAIN);
    hasher.update(purpose);
    for part in material {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }

    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}
