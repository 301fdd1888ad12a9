use crate::models::error::CaptureError;

/// What a sink wants after accepting a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkControl {
    Continue,
    /// Enough data; end the transfer successfully with a partial byte count.
    Stop,
}

/// Consumer of drained bytes: durable storage, a wire stream, or a callback.
///
/// The pipeline calls `begin` once the source length is known, then
/// `write_chunk` for every drained buffer, then exactly one of `finalize`
/// (success) or `abort` (any failure).
pub trait ChunkSink {
    fn begin(&mut self, _total_length: u32) -> Result<(), CaptureError> {
        Ok(())
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<SinkControl, CaptureError>;

    fn finalize(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Roll back whatever `begin` and `write_chunk` produced. Must be idempotent.
    fn abort(&mut self) {}
}

/// Adapts a closure into a [`ChunkSink`].
pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: FnMut(&[u8]) -> SinkControl,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ChunkSink for CallbackSink<F>
where
    F: FnMut(&[u8]) -> SinkControl,
{
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<SinkControl, CaptureError> {
        Ok((self.callback)(chunk))
    }
}
