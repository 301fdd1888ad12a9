use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::traits::chunked_source::{check_length, ChunkedSource};

/// Counters a [`MemorySource`] keeps while it is driven.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceStats {
    pub triggers: u32,
    pub releases: u32,
    /// Requested length of every `read_chunk` call, in order.
    pub reads: Vec<usize>,
}

/// Replays a byte image as a [`ChunkedSource`].
///
/// Used to feed stored captures back through a pipeline on a host, and to
/// script sources that are slow, never ready, or fail part way.
pub struct MemorySource {
    data: Vec<u8>,
    declared_length: Option<u32>,
    /// `None` never becomes ready.
    ready_after_polls: Option<u32>,
    polls_left: Option<u32>,
    fail_after: Option<usize>,
    read_delay: Duration,
    position: usize,
    stats: Arc<Mutex<SourceStats>>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            declared_length: None,
            ready_after_polls: Some(0),
            polls_left: Some(0),
            fail_after: None,
            read_delay: Duration::ZERO,
            position: 0,
            stats: Arc::new(Mutex::new(SourceStats::default())),
        }
    }

    /// Report `length` from `prepare` instead of the image size.
    pub fn with_declared_length(mut self, length: u32) -> Self {
        self.declared_length = Some(length);
        self
    }

    /// Report not-ready for `polls` polls after each trigger.
    pub fn ready_after(mut self, polls: u32) -> Self {
        self.ready_after_polls = Some(polls);
        self
    }

    pub fn never_ready(mut self) -> Self {
        self.ready_after_polls = None;
        self
    }

    /// Deliver exactly `bytes` bytes, then fail every further read.
    ///
    /// A read that would cross the limit comes back short at the limit.
    pub fn fail_after(mut self, bytes: usize) -> Self {
        self.fail_after = Some(bytes);
        self
    }

    /// Sleep this long in every read.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Handle on the counters; stays valid after the source is moved into a pipeline.
    pub fn stats(&self) -> Arc<Mutex<SourceStats>> {
        Arc::clone(&self.stats)
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl ChunkedSource for MemorySource {
    fn trigger(&mut self) -> Result<(), CaptureError> {
        self.position = 0;
        self.polls_left = self.ready_after_polls;
        self.stats.lock().triggers += 1;
        Ok(())
    }

    fn poll_ready(&mut self) -> Result<bool, CaptureError> {
        match self.polls_left.as_mut() {
            Some(0) => Ok(true),
            Some(n) => {
                *n -= 1;
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn prepare(&mut self, max_length: u32) -> Result<u32, CaptureError> {
        let length = self.declared_length.unwrap_or(self.data.len() as u32);
        check_length(length, max_length)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        self.stats.lock().reads.push(buf.len());
        if !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }
        if let Some(limit) = self.fail_after {
            if self.position >= limit {
                return Err(CaptureError::SourceReadError(format!(
                    "read failed at byte {}",
                    self.position
                )));
            }
        }

        let available = match self.fail_after {
            Some(limit) => limit.min(self.data.len()),
            None => self.data.len(),
        };
        let n = buf.len().min(available.saturating_sub(self.position));
        buf[..n].copy_from_slice(&self.data[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }

    fn release(&mut self) {
        self.stats.lock().releases += 1;
    }
}
