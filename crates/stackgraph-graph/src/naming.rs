//! Name and id generation, supplied by the caller.
//!
//! Physical names often carry a random suffix; a seeded generator keeps
//! repeated runs of the same stack producing the same names.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const DIGITS: &[u8] = b"0123456789";
const TOKEN_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub trait NameGenerator: Send {
    /// `k` distinct decimal digits (at most 10).
    fn sample_digits(&mut self, k: usize) -> String;
    /// `k` decimal digits drawn with replacement.
    fn choose_digits(&mut self, k: usize) -> String;
    /// `k` lowercase alphanumeric characters.
    fn token(&mut self, k: usize) -> String;
}

pub struct SeededNames {
    rng: StdRng,
}

impl SeededNames {
    pub const DEFAULT_SEED: u64 = 47;

    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SeededNames {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SEED)
    }
}

impl NameGenerator for SeededNames {
    fn sample_digits(&mut self, k: usize) -> String {
        DIGITS
            .choose_multiple(&mut self.rng, k.min(DIGITS.len()))
            .map(|&b| b as char)
            .collect()
    }

    fn choose_digits(&mut self, k: usize) -> String {
        (0..k)
            .map(|_| DIGITS[self.rng.gen_range(0..DIGITS.len())] as char)
            .collect()
    }

    fn token(&mut self, k: usize) -> String {
        (0..k)
            .map(|_| TOKEN_CHARS[self.rng.gen_range(0..TOKEN_CHARS.len())] as char)
            .collect()
    }
}
