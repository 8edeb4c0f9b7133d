//! Scramble Generation
//!
//! Produces scrambles in standard cube notation (`R U' F2 Rw 3Fw'`).
//! The duel engine only sees the [`ScrambleGenerator`] trait; the string is
//! opaque to everything except the clients that display it.

use super::rng::{derive_seed, ScrambleRng};

/// Supplies a scramble for a new duel.
pub trait ScrambleGenerator: Send {
    /// Generate a scramble for a cube with `cube_size` layers per side.
    ///
    /// `length` overrides the default move count for the cube size and is
    /// capped at [`MAX_SCRAMBLE_LENGTH`].
    fn generate(&mut self, cube_size: u32, length: Option<u32>) -> String;
}

/// Longest scramble ever produced; longer requests are clamped.
pub const MAX_SCRAMBLE_LENGTH: u32 = 200;

/// Turnable faces, grouped in axis pairs: U/D, L/R, F/B.
const FACES: [char; 6] = ['U', 'D', 'L', 'R', 'F', 'B'];

/// Turn suffixes: quarter clockwise, quarter counter-clockwise, half.
const SUFFIXES: [&str; 3] = ["", "'", "2"];

/// Default number of moves for a cube size.
pub fn default_length(cube_size: u32) -> u32 {
    match cube_size {
        0 | 1 => 0,
        2 => 11,
        3 => 20,
        n => 20 * (n - 2),
    }
}

/// Deepest layer block that can be turned as a wide move.
fn max_depth(cube_size: u32) -> u32 {
    if cube_size >= 4 {
        cube_size / 2
    } else {
        1
    }
}

#[inline]
fn axis(face_idx: usize) -> usize {
    face_idx / 2
}

fn format_move(face: char, depth: u32, suffix: &str) -> String {
    match depth {
        1 => format!("{face}{suffix}"),
        2 => format!("{face}w{suffix}"),
        d => format!("{d}{face}w{suffix}"),
    }
}

/// Random-move scrambler backed by [`ScrambleRng`].
#[derive(Clone, Debug)]
pub struct RandomScrambler {
    rng: ScrambleRng,
}

impl RandomScrambler {
    /// Scrambler with a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ScrambleRng::new(seed),
        }
    }

    /// Scrambler seeded from fresh uuid entropy and the wall clock.
    pub fn from_entropy() -> Self {
        let entropy = uuid::Uuid::new_v4();
        let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let seed = derive_seed(b"scramble", &[entropy.as_bytes(), &now.to_le_bytes()]);
        Self::new(seed)
    }
}

impl ScrambleGenerator for RandomScrambler {
    fn generate(&mut self, cube_size: u32, length: Option<u32>) -> String {
        if cube_size < 2 {
            return String::new();
        }

        let length = length
            .unwrap_or_else(|| default_length(cube_size))
            .min(MAX_SCRAMBLE_LENGTH);
        let depth_limit = max_depth(cube_size);
        let mut moves = Vec::with_capacity(length as usize);
        let mut prev: Option<usize> = None;
        let mut prev_prev: Option<usize> = None;

        while moves.len() < length as usize {
            let face_idx = self.rng.below(FACES.len());

            if prev == Some(face_idx) {
                continue;
            }
            // Three moves in a row on one axis collapse into fewer moves
            if let (Some(p), Some(pp)) = (prev, prev_prev) {
                if axis(p) == axis(face_idx) && axis(pp) == axis(face_idx) {
                    continue;
                }
            }

            let depth = 1 + self.rng.below(depth_limit as usize) as u32;
            let suffix = self.rng.pick(&SUFFIXES).copied().unwrap_or_default();
            moves.push(format_move(FACES[face_idx], depth, suffix));

            prev_prev = prev;
            prev = Some(face_idx);
        }

        moves.join(" ")
    }
}
