use std::thread;
use std::time::Duration;

/// Cooperative yield point used between readiness polls.
///
/// The pipeline never spins: every poll that comes back "not ready" is
/// followed by one `pause`, which is where a host can feed a watchdog or run
/// other periodic duties before the next poll.
pub trait Scheduler: Send + Sync {
    fn pause(&self, interval: Duration);
}

/// Sleeps the calling thread for the requested interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn pause(&self, interval: Duration) {
        thread::sleep(interval);
    }
}

impl<F> Scheduler for F
where
    F: Fn(Duration) + Send + Sync,
{
    fn pause(&self, interval: Duration) {
        self(interval)
    }
}
