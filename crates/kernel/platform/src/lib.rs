//! Platform sources for the Hive Kernel.
//!
//! Time, randomness and environment are injected rather than read from the
//! host, so every downstream subsystem can run against fixed or seeded
//! variants in tests:
//! - [`Clock`]: `SystemClock` for production, `ManualClock` for virtual time
//! - [`RandomSource`]: `EntropyRng` (OS entropy) or `SeededRng` (reproducible)
//! - [`Environment`]: immutable variable map handed to each tenant
//! - [`AbortController`] / [`AbortSignal`]: one-shot cancellation threaded
//!   through every suspending call

pub mod abort;
pub mod clock;
pub mod env;
pub mod rng;

pub use abort::{sleep_or_abort, AbortController, AbortSignal, Interrupted};
pub use clock::{Clock, ManualClock, SystemClock};
pub use env::Environment;
pub use rng::{EntropyRng, RandomSource, SeededRng};
