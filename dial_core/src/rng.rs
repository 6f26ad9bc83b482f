//! Deterministic, checkpointable random number generation.
//!
//! Every source of randomness in a run derives from the simulator seed.
//! The generator state can be captured as an [`RngCheckpoint`], a plain
//! serializable value, and restored exactly. Backward stepping relies on
//! this: restoring the checkpoint taken before a step makes the replayed
//! step draw the same numbers again.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Explicit snapshot of a ChaCha8 generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RngCheckpoint {
    /// Key the generator was seeded with
    pub seed: [u8; 32],

    /// Stream (nonce) selector
    pub stream: u64,

    /// Position in the keystream, in 32-bit words
    pub word_pos: u128,
}

/// Seeded ChaCha8 generator with checkpoint/restore support.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    inner: ChaCha8Rng,
}

impl DeterministicRng {
    /// Creates a generator from a 64-bit seed.
    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Captures the current generator state.
    pub fn checkpoint(&self) -> RngCheckpoint {
        RngCheckpoint {
            seed: self.inner.get_seed(),
            stream: self.inner.get_stream(),
            word_pos: self.inner.get_word_pos(),
        }
    }

    /// Rebuilds a generator from a checkpoint.
    pub fn restore(checkpoint: &RngCheckpoint) -> Self {
        let mut inner = ChaCha8Rng::from_seed(checkpoint.seed);
        inner.set_stream(checkpoint.stream);
        inner.set_word_pos(checkpoint.word_pos);
        Self { inner }
    }

    /// Draws a seed for a derived generator.
    pub fn draw_seed(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Draws uniformly from `[0, 1)`.
    pub fn draw_unit(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Draws uniformly from `[low, high)`. An empty range yields `low`.
    pub fn draw_range(&mut self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        self.inner.gen_range(low..high)
    }

    /// Draws a random (version 4) UUID.
    pub fn draw_uuid(&mut self) -> Uuid {
        let mut bytes = [0u8; 16];
        self.inner.fill_bytes(&mut bytes);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

impl PartialEq for DeterministicRng {
    fn eq(&self, other: &Self) -> bool {
        self.checkpoint() == other.checkpoint()
    }
}

impl Eq for DeterministicRng {}

impl RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}
