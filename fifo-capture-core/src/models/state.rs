use super::error::CaptureError;

/// Capture pipeline state machine.
///
/// State transitions:
/// ```text
/// idle → triggered → waiting_ready → draining → finalizing → succeeded
///            ↓             ↓             ↓           ↓
///            └─────────────┴──── failed ─┴───────────┘
/// ```
/// `Succeeded` and `Failed` are terminal for a session; the pipeline then
/// returns to `Idle` and accepts the next capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Triggered,
    WaitingReady,
    Draining { transferred: u32, total: u32 },
    Finalizing,
    Succeeded { bytes_written: u32 },
    Failed(CaptureError),
}

impl PipelineState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed(_))
    }

    /// A session is in flight.
    pub fn is_active(&self) -> bool {
        !self.is_idle() && !self.is_terminal()
    }

    /// Short lowercase name, for status lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Triggered => "triggered",
            Self::WaitingReady => "waiting_ready",
            Self::Draining { .. } => "draining",
            Self::Finalizing => "finalizing",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(PipelineState::Idle.is_idle());
        assert!(!PipelineState::Idle.is_active());
        assert!(PipelineState::WaitingReady.is_active());
        assert!(PipelineState::Draining { transferred: 0, total: 10 }.is_active());
        assert!(PipelineState::Succeeded { bytes_written: 1 }.is_terminal());
        assert!(PipelineState::Failed(CaptureError::SourceTimeout).is_terminal());
        assert!(!PipelineState::Failed(CaptureError::SourceTimeout).is_active());
    }
}
