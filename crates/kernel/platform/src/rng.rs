use parking_lot::Mutex;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};

/// Injectable byte-oriented randomness.
pub trait RandomSource: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);

    /// Four bytes read as a little-endian `u32`.
    fn next_u32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        self.fill_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    /// Uniform value in `[0, 1)` derived from [`RandomSource::next_u32`].
    fn next_unit(&self) -> f64 {
        self.next_u32() as f64 / 4_294_967_296.0
    }
}

/// Operating-system entropy.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntropyRng;

impl RandomSource for EntropyRng {
    fn fill_bytes(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Seeded generator; identical seeds yield identical byte sequences.
pub struct SeededRng {
    seed: u64,
    inner: Mutex<StdRng>,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for SeededRng {
    fn fill_bytes(&self, dest: &mut [u8]) {
        self.inner.lock().fill_bytes(dest);
    }
}
