use crate::models::outcome::TransferOutcome;
use crate::models::state::PipelineState;

/// Event delegate for capture pipeline notifications.
///
/// All methods are called synchronously from the capturing context, so
/// implementations should return quickly (push to a display, a console, a
/// queue). A delegate must not start another capture on the same pipeline;
/// such a call is rejected as reentrant.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the pipeline state changes.
    fn on_state_changed(&self, state: &PipelineState);

    /// Human-readable progress or outcome line.
    fn on_status(&self, line: &str);

    /// Called after every chunk drained from the source.
    fn on_progress(&self, _transferred: u32, _total: u32) {}

    /// Called once per capture with its terminal outcome.
    fn on_finished(&self, outcome: &TransferOutcome);
}

/// Delegate that forwards everything to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDelegate;

impl CaptureDelegate for LogDelegate {
    fn on_state_changed(&self, state: &PipelineState) {
        log::debug!("capture state: {}", state.name());
    }

    fn on_status(&self, line: &str) {
        log::info!("{}", line);
    }

    fn on_progress(&self, transferred: u32, total: u32) {
        log::trace!("capture progress: {}/{} bytes", transferred, total);
    }

    fn on_finished(&self, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Success { bytes_written } => {
                log::info!("capture finished: {} bytes", bytes_written)
            }
            other => log::warn!("capture failed: {:?}", other),
        }
    }
}
