use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Details of a successful capture, kept by the pipeline and optionally
/// written as a JSON sidecar next to the stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReport {
    pub id: String,
    pub created_at: String,
    /// Final path for file captures; `None` for callback and stream sinks.
    pub file_path: Option<PathBuf>,
    /// Length the source reported before draining.
    pub total_length: u32,
    /// Bytes accepted by the sink.
    pub bytes_written: u32,
    /// The sink asked to stop before the source was exhausted.
    pub stopped_early: bool,
    /// SHA-256 hex digest of the bytes accepted by the sink.
    pub checksum: String,
    pub elapsed_ms: u64,
}

impl CaptureReport {
    pub fn new(
        file_path: Option<PathBuf>,
        total_length: u32,
        bytes_written: u32,
        stopped_early: bool,
        checksum: String,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            file_path,
            total_length,
            bytes_written,
            stopped_early,
            checksum,
            elapsed_ms,
        }
    }
}
