use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Injectable time source.
///
/// One instance is shared by every subsystem of a kernel, so swapping in a
/// [`ManualClock`] makes the whole kernel run on virtual time.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin. Never goes backwards.
    fn now_monotonic(&self) -> Duration;

    /// Current wall-clock time.
    fn now_wall(&self) -> DateTime<Utc>;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Host clock backed by `Instant`, `Utc::now` and tokio timers.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now_monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn now_wall(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

struct ManualState {
    elapsed: Duration,
    wall: DateTime<Utc>,
}

/// Virtual clock for deterministic tests.
///
/// Time only moves through [`ManualClock::advance`] or `sleep`, which
/// advances by the requested duration and yields once instead of waiting.
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    /// A clock whose wall time starts at the Unix epoch.
    pub fn new() -> Self {
        Self::starting_at(DateTime::<Utc>::default())
    }

    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(ManualState {
                elapsed: Duration::ZERO,
                wall,
            }),
        }
    }

    /// Move both monotonic and wall time forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        state.elapsed += by;
        if let Ok(delta) = chrono::Duration::from_std(by) {
            state.wall += delta;
        }
    }

    /// Set wall time without touching monotonic time.
    pub fn set_wall(&self, wall: DateTime<Utc>) {
        self.state.lock().wall = wall;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now_monotonic(&self) -> Duration {
        self.state.lock().elapsed
    }

    fn now_wall(&self) -> DateTime<Utc> {
        self.state.lock().wall
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}
