use std::io::Read;
use std::path::{Path, PathBuf};

use crate::models::capture_report::CaptureReport;
use crate::models::error::CaptureError;

use super::atomic_writer::AtomicFileWriter;
use super::medium::StorageMedium;

/// `{capture_path}` with its extension replaced by `metadata.json`.
pub fn metadata_path_for(capture_path: &Path) -> PathBuf {
    capture_path.with_extension("metadata.json")
}

/// Write a capture report as a JSON sidecar next to the capture, atomically.
pub fn write_metadata<M: StorageMedium>(
    writer: &mut AtomicFileWriter<M>,
    report: &CaptureReport,
    capture_path: &Path,
) -> Result<PathBuf, CaptureError> {
    let metadata_path = metadata_path_for(capture_path);
    let json = serde_json::to_vec_pretty(report)
        .map_err(|e| CaptureError::SinkWriteError(format!("failed to serialize metadata: {}", e)))?;
    writer.write_all_atomic(&metadata_path, &json)?;
    Ok(metadata_path)
}

/// Read a capture report back from its JSON sidecar.
pub fn read_metadata<M: StorageMedium>(
    medium: &M,
    capture_path: &Path,
) -> Result<CaptureReport, CaptureError> {
    let metadata_path = metadata_path_for(capture_path);
    let mut json = String::new();
    medium
        .open(&metadata_path)
        .and_then(|mut file| file.read_to_string(&mut json))
        .map_err(|e| CaptureError::SourceReadError(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| CaptureError::SourceReadError(format!("failed to parse metadata: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::medium::LocalStorage;

    #[test]
    fn round_trips_through_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let capture = dir.path().join("capture.jpg");
        let report = CaptureReport::new(
            Some(capture.clone()),
            1500,
            1500,
            false,
            "ab".repeat(32),
            12,
        );

        let mut writer = AtomicFileWriter::new(LocalStorage);
        let path = write_metadata(&mut writer, &report, &capture).unwrap();

        assert_eq!(path, dir.path().join("capture.metadata.json"));
        assert_eq!(read_metadata(&LocalStorage, &capture).unwrap(), report);
    }

    #[test]
    fn missing_sidecar_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_metadata(&LocalStorage, &dir.path().join("none.jpg"));
        assert!(matches!(result, Err(CaptureError::SourceReadError(_))));
    }
}
