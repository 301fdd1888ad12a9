use std::io::Write;

use crate::models::error::CaptureError;
use crate::traits::chunk_sink::{ChunkSink, SinkControl};

/// Sent before the first capture byte.
pub const PREAMBLE: [u8; 2] = [0xFF, 0xAA];

/// Sent after the last capture byte of a successful transfer.
pub const POSTAMBLE: [u8; 2] = [0xFF, 0xBB];

/// Streams a capture over a byte link (serial console, socket) framed for a
/// host viewer:
///
/// ```text
/// [FF AA] [capture bytes...] [FF BB]
/// ```
///
/// A failed capture never gets its postamble, so the host can tell a
/// truncated transfer from a complete one.
pub struct WireStreamSink<W: Write> {
    writer: W,
    bytes_sent: u64,
}

impl<W: Write> WireStreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bytes_sent: 0,
        }
    }

    /// Capture bytes sent, excluding framing.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn send(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        self.writer
            .write_all(data)
            .map_err(|e| CaptureError::SinkWriteError(format!("stream write failed: {}", e)))
    }
}

impl<W: Write> ChunkSink for WireStreamSink<W> {
    fn begin(&mut self, _total_length: u32) -> Result<(), CaptureError> {
        self.bytes_sent = 0;
        self.send(&PREAMBLE)
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<SinkControl, CaptureError> {
        self.send(chunk)?;
        self.bytes_sent += chunk.len() as u64;
        Ok(SinkControl::Continue)
    }

    fn finalize(&mut self) -> Result<(), CaptureError> {
        self.writer.write_all(&POSTAMBLE).map_err(|e| {
            CaptureError::SinkFinalizeError(format!("postamble write failed: {}", e))
        })?;
        self.writer
            .flush()
            .map_err(|e| CaptureError::SinkFinalizeError(format!("stream flush failed: {}", e)))
    }

    fn abort(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::warn!("stream flush after failed capture: {}", e);
        }
    }
}
