use super::error::CaptureError;

/// Terminal result of one capture run.
///
/// Produced exactly once per session. The pipeline never retries; a caller
/// that wants "retry once after N seconds" builds that on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The sink accepted `bytes_written` bytes and was finalized.
    ///
    /// Fewer than the source length when a callback sink asked to stop early
    /// or when frame markers trimmed the stream.
    Success { bytes_written: u32 },
    SourceTimeout,
    SourceReadError(String),
    SinkWriteError(String),
    SinkFinalizeError(String),
    InvalidLength(u32),
    Reentrant,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn bytes_written(&self) -> Option<u32> {
        match self {
            Self::Success { bytes_written } => Some(*bytes_written),
            _ => None,
        }
    }

    /// Converts back into a `Result`, for callers that prefer `?`.
    pub fn into_result(self) -> Result<u32, CaptureError> {
        match self {
            Self::Success { bytes_written } => Ok(bytes_written),
            Self::SourceTimeout => Err(CaptureError::SourceTimeout),
            Self::SourceReadError(msg) => Err(CaptureError::SourceReadError(msg)),
            Self::SinkWriteError(msg) => Err(CaptureError::SinkWriteError(msg)),
            Self::SinkFinalizeError(msg) => Err(CaptureError::SinkFinalizeError(msg)),
            Self::InvalidLength(len) => Err(CaptureError::InvalidLength(len)),
            Self::Reentrant => Err(CaptureError::Reentrant),
        }
    }
}

impl From<CaptureError> for TransferOutcome {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::SourceTimeout => Self::SourceTimeout,
            CaptureError::SourceReadError(msg) => Self::SourceReadError(msg),
            CaptureError::InvalidLength(len) => Self::InvalidLength(len),
            CaptureError::SinkWriteError(msg) => Self::SinkWriteError(msg),
            CaptureError::SinkFinalizeError(msg) => Self::SinkFinalizeError(msg),
            CaptureError::Reentrant => Self::Reentrant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_one_to_one() {
        let errors = [
            CaptureError::SourceTimeout,
            CaptureError::SourceReadError("bus".into()),
            CaptureError::InvalidLength(0),
            CaptureError::SinkWriteError("short".into()),
            CaptureError::SinkFinalizeError("rename".into()),
            CaptureError::Reentrant,
        ];

        for error in errors {
            let outcome = TransferOutcome::from(error.clone());
            assert!(!outcome.is_success());
            assert_eq!(outcome.into_result(), Err(error));
        }
    }

    #[test]
    fn success_carries_byte_count() {
        let outcome = TransferOutcome::Success { bytes_written: 1500 };
        assert!(outcome.is_success());
        assert_eq!(outcome.bytes_written(), Some(1500));
        assert_eq!(outcome.into_result(), Ok(1500));
    }
}
