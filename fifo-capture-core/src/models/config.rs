use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Storage sector size the transfer buffers are sized in, by default.
pub const SECTOR_SIZE: usize = 512;

/// Smallest chunk the source is asked for in one bus transaction.
pub const MIN_CHUNK_SIZE: usize = 64;

/// Largest chunk the source is asked for in one bus transaction.
pub const MAX_CHUNK_SIZE: usize = 4096;

/// Chunk sizes are rounded down to a multiple of this.
pub const CHUNK_GRANULARITY: usize = 64;

/// Upper bound on `sector_size * buffer_sectors` for one transfer buffer.
pub const MAX_BUFFER_CAPACITY: usize = 16 * 1024;

/// FIFO depth of the OV2640 Mini 2MP Plus; longer reported lengths are corrupt.
pub const DEFAULT_MAX_LENGTH: u32 = 0x5FFFF;

/// Two-byte start/end markers delimiting a frame inside the raw FIFO contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameMarkers {
    pub start: [u8; 2],
    pub end: [u8; 2],
}

impl FrameMarkers {
    /// JPEG start-of-image / end-of-image markers.
    pub const JPEG: Self = Self {
        start: [0xFF, 0xD8],
        end: [0xFF, 0xD9],
    };
}

/// Configuration for the capture pipeline.
///
/// Read once at the start of every capture; out-of-range values are clamped
/// by [`normalized`](Self::normalized) rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Bytes requested from the source per bus transaction (default: 512).
    pub chunk_size: usize,

    /// Overall deadline for one capture, in milliseconds (default: 5000).
    pub timeout_ms: u64,

    /// Number of sectors per transfer buffer (default: 1).
    pub buffer_sectors: usize,

    /// Sector size in bytes (default: 512).
    pub sector_size: usize,

    /// Interval between readiness polls, in milliseconds (default: 5).
    pub poll_interval_ms: u64,

    /// Largest plausible source length in bytes.
    pub max_length: u32,

    /// Optional frame markers; when set, only the delimited frame is stored.
    pub framing: Option<FrameMarkers>,

    /// Write a JSON metadata sidecar next to file captures (default: false).
    pub write_metadata: bool,
}

impl CaptureConfig {
    /// Strict check, for hosts that want to reject bad settings up front.
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(format!(
                "chunk size {} outside [{}, {}]",
                self.chunk_size, MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
            ));
        }
        if self.chunk_size % CHUNK_GRANULARITY != 0 {
            return Err(format!(
                "chunk size {} is not a multiple of {}",
                self.chunk_size, CHUNK_GRANULARITY
            ));
        }
        if self.timeout_ms == 0 {
            return Err("timeout must be positive".into());
        }
        if self.buffer_sectors == 0 || self.sector_size == 0 {
            return Err("transfer buffer must not be empty".into());
        }
        if self.buffer_capacity() > MAX_BUFFER_CAPACITY {
            return Err(format!(
                "transfer buffer of {} bytes exceeds {}",
                self.buffer_capacity(),
                MAX_BUFFER_CAPACITY
            ));
        }
        if self.max_length == 0 {
            return Err("max length must be positive".into());
        }
        Ok(())
    }

    /// Returns a copy with every field forced into its supported range.
    pub fn normalized(&self) -> Self {
        let chunk_size = self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
        let chunk_size = chunk_size - chunk_size % CHUNK_GRANULARITY;

        let sector_size = self.sector_size.clamp(1, MAX_BUFFER_CAPACITY);
        let buffer_sectors = self
            .buffer_sectors
            .clamp(1, (MAX_BUFFER_CAPACITY / sector_size).max(1));

        Self {
            chunk_size,
            timeout_ms: self.timeout_ms.max(1),
            buffer_sectors,
            sector_size,
            poll_interval_ms: self.poll_interval_ms.max(1),
            max_length: self.max_length.max(1),
            framing: self.framing,
            write_metadata: self.write_metadata,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Size of each of the two transfer buffers in bytes.
    pub fn buffer_capacity(&self) -> usize {
        self.sector_size.saturating_mul(self.buffer_sectors)
    }

    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            timeout_ms: 5000,
            buffer_sectors: 1,
            sector_size: SECTOR_SIZE,
            poll_interval_ms: 5,
            max_length: DEFAULT_MAX_LENGTH,
            framing: None,
            write_metadata: false,
        }
    }
}
