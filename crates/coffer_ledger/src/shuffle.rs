//! # Shuffle Sources
//!
//! Distribution walks accounts in a fresh random order every call so that
//! remainder units do not always land on the same owners. The order comes
//! from an injectable [`ShuffleSource`]; production uses ChaCha8, tests can
//! seed it or substitute a fixed order.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::account::AccountId;

/// Produces a permutation of accounts for one distribution pass.
pub trait ShuffleSource: Send {
    /// Reorders `ids` in place.
    fn shuffle(&mut self, ids: &mut [AccountId]);
}

/// Uniform shuffle driven by a ChaCha8 stream.
#[derive(Clone, Debug)]
pub struct ChaChaShuffle {
    rng: ChaCha8Rng,
}

impl ChaChaShuffle {
    /// Creates a reproducible shuffle from a seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates a shuffle seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }
}

impl ShuffleSource for ChaChaShuffle {
    fn shuffle(&mut self, ids: &mut [AccountId]) {
        ids.shuffle(&mut self.rng);
    }
}

/// Leaves the order untouched. Useful when a test needs to know exactly
/// which account receives the remainder.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedOrder;

impl ShuffleSource for FixedOrder {
    fn shuffle(&mut self, _ids: &mut [AccountId]) {}
}
