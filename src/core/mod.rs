//! Core primitives.
//!
//! Identifiers, the scramble RNG and scramble generation. Nothing in here
//! knows about duels as sessions; the `duel` module builds on these types.

pub mod ids;
pub mod rng;
pub mod scramble;

// Re-export core types
pub use ids::{DuelCode, SessionId};
pub use rng::ScrambleRng;
pub use scramble::{RandomScrambler, ScrambleGenerator};
