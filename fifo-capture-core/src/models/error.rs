use thiserror::Error;

/// Errors that can occur while moving a capture from its source to a sink.
///
/// Every variant maps to exactly one [`TransferOutcome`](super::outcome::TransferOutcome).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("source timed out before the deadline")]
    SourceTimeout,

    #[error("source read failed: {0}")]
    SourceReadError(String),

    #[error("invalid source length: {0} bytes")]
    InvalidLength(u32),

    #[error("sink write failed: {0}")]
    SinkWriteError(String),

    #[error("sink finalize failed: {0}")]
    SinkFinalizeError(String),

    #[error("a capture is already in progress")]
    Reentrant,
}
