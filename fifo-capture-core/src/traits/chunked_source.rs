use std::time::{Duration, Instant};

use crate::models::error::CaptureError;

use super::scheduler::Scheduler;

/// A bounded hardware data source drained in chunks over a bus.
///
/// Implemented by:
/// - `ArducamFifo` (fifo-capture-arducam), the camera FIFO over SPI
/// - scripted sources in tests
///
/// Call order for one capture:
/// `trigger` → `wait_until_ready` → `prepare` → `read_chunk`… → `release`.
pub trait ChunkedSource: Send {
    /// Tell the source to begin producing data (reset the buffer, start capture).
    fn trigger(&mut self) -> Result<(), CaptureError>;

    /// Sample the completion signal once. Must not block beyond one bus access.
    fn poll_ready(&mut self) -> Result<bool, CaptureError>;

    /// Total number of bytes available.
    ///
    /// Fails with [`CaptureError::InvalidLength`] if the length is zero or
    /// above `max_length`, which guards against a corrupted length register.
    fn prepare(&mut self, max_length: u32) -> Result<u32, CaptureError>;

    /// Fill up to `buf.len()` bytes and return how many were written.
    ///
    /// Blocks only for the bus transaction itself. Returns fewer bytes than
    /// requested only at end-of-stream. Each call claims the shared bus for
    /// its own duration only.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError>;

    /// Best-effort reset after a capture, successful or not.
    fn release(&mut self) {}

    /// Poll [`poll_ready`](Self::poll_ready) until it reports ready or
    /// `deadline` passes, pausing on `scheduler` between polls.
    ///
    /// Returns [`CaptureError::SourceTimeout`] no later than one
    /// `poll_interval` after the deadline.
    fn wait_until_ready(
        &mut self,
        deadline: Instant,
        poll_interval: Duration,
        scheduler: &dyn Scheduler,
    ) -> Result<(), CaptureError> {
        loop {
            if self.poll_ready()? {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(CaptureError::SourceTimeout);
            }
            scheduler.pause(poll_interval.min(deadline - now));
        }
    }
}

/// Shared length check for [`ChunkedSource::prepare`] implementations.
pub fn check_length(length: u32, max_length: u32) -> Result<u32, CaptureError> {
    if length == 0 || length > max_length {
        return Err(CaptureError::InvalidLength(length));
    }
    Ok(length)
}
