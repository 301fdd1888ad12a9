use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::traits::chunk_sink::{ChunkSink, SinkControl};

use super::medium::StorageMedium;

/// Suffix of the staging artifact written next to the final path.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Suffix of the copy that preserves a previous final file during a copy fallback.
///
/// Ends in `.tmp` like the staging artifact: both names belong to the writer.
pub const BACKUP_SUFFIX: &str = ".bak.tmp";

/// Bounded chunk size for the copy fallback.
pub const COPY_CHUNK_SIZE: usize = 512;

/// `<final_path>.tmp`
pub fn temp_path_for(final_path: &Path) -> PathBuf {
    with_suffix(final_path, TEMP_SUFFIX)
}

/// `<final_path>.bak.tmp`
pub fn backup_path_for(final_path: &Path) -> PathBuf {
    with_suffix(final_path, BACKUP_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// The temp/final path pair for one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub temp_path: PathBuf,
    pub final_path: PathBuf,
}

impl StagedFile {
    pub fn new(final_path: &Path) -> Self {
        Self {
            temp_path: temp_path_for(final_path),
            final_path: final_path.to_path_buf(),
        }
    }
}

/// Writes a byte stream so that the final path only ever shows complete contents.
///
/// ## Lifecycle
///
/// ```text
/// begin(final) ─→ write_chunk()… ─→ finalize() ─→ final complete, temp gone
///       │               │                 │
///       └───────────────┴──── abort() ────┴──→ final untouched, temp gone
/// ```
///
/// `finalize` prefers an atomic rename. When the medium refuses it, the temp
/// file is copied into place in bounded chunks; a previous final file is first
/// preserved as `<final>.bak.tmp` and restored if the copy cannot be verified.
/// If the restore fails too, the partial final file is removed and both the
/// backup and the temp file are left on the medium for recovery.
pub struct AtomicFileWriter<M: StorageMedium> {
    medium: M,
    staged: Option<StagedFile>,
    file: Option<M::File>,
    bytes_written: u64,
    copy_buffer: Box<[u8]>,
}

impl<M: StorageMedium> AtomicFileWriter<M> {
    pub fn new(medium: M) -> Self {
        Self {
            medium,
            staged: None,
            file: None,
            bytes_written: 0,
            copy_buffer: vec![0u8; COPY_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Truncate-create `<final_path>.tmp` for writing.
    ///
    /// A write still staged from an earlier `begin` is rolled back first.
    pub fn begin(&mut self, final_path: &Path) -> Result<(), CaptureError> {
        if let Some(previous) = &self.staged {
            log::warn!(
                "discarding unfinished write to {}",
                previous.final_path.display()
            );
            self.abort();
        }

        let staged = StagedFile::new(final_path);
        let file = self.medium.create(&staged.temp_path).map_err(|e| {
            CaptureError::SinkWriteError(format!(
                "failed to create {}: {}",
                staged.temp_path.display(),
                e
            ))
        })?;

        log::debug!("staging {}", staged.temp_path.display());
        self.file = Some(file);
        self.staged = Some(staged);
        self.bytes_written = 0;
        Ok(())
    }

    /// Append `data` to the temp file.
    ///
    /// A short write is a hard error; it usually means the medium is full.
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::SinkWriteError("no file staged".into()))?;
        if data.is_empty() {
            return Ok(());
        }

        let written = file
            .write(data)
            .map_err(|e| CaptureError::SinkWriteError(format!("write failed: {}", e)))?;
        if written != data.len() {
            return Err(CaptureError::SinkWriteError(format!(
                "short write: {} of {} bytes",
                written,
                data.len()
            )));
        }

        self.bytes_written += written as u64;
        Ok(())
    }

    /// Flush and close the temp file, then move it over the final path.
    ///
    /// Returns the number of bytes committed. On error the temp artifact is
    /// removed and the final path holds what it held before the call. The one
    /// exception is a copy fallback whose restore also failed: see the type docs.
    pub fn finalize(&mut self) -> Result<u64, CaptureError> {
        let result = self.commit();
        if result.is_err() {
            self.abort();
        }
        result
    }

    /// Close and delete the temp artifact. Idempotent; fine without `begin`.
    pub fn abort(&mut self) {
        self.file = None;
        self.bytes_written = 0;

        let Some(staged) = self.staged.take() else {
            return;
        };
        if !self.medium.exists(&staged.temp_path) {
            return;
        }
        match self.medium.remove(&staged.temp_path) {
            Ok(()) => log::debug!("removed {}", staged.temp_path.display()),
            Err(e) => log::error!("failed to remove {}: {}", staged.temp_path.display(), e),
        }
    }

    /// Stage, write and commit `data` in one call.
    pub fn write_all_atomic(&mut self, final_path: &Path, data: &[u8]) -> Result<u64, CaptureError> {
        self.begin(final_path)?;
        for chunk in data.chunks(COPY_CHUNK_SIZE) {
            if let Err(e) = self.write_chunk(chunk) {
                self.abort();
                return Err(e);
            }
        }
        self.finalize()
    }

    /// Bytes appended to the current temp file.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn staged(&self) -> Option<&StagedFile> {
        self.staged.as_ref()
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    fn commit(&mut self) -> Result<u64, CaptureError> {
        let staged = self
            .staged
            .clone()
            .ok_or_else(|| CaptureError::SinkFinalizeError("no file staged".into()))?;
        let mut file = self
            .file
            .take()
            .ok_or_else(|| CaptureError::SinkFinalizeError("temp file already closed".into()))?;

        self.medium.sync(&mut file).map_err(|e| {
            CaptureError::SinkFinalizeError(format!(
                "failed to flush {}: {}",
                staged.temp_path.display(),
                e
            ))
        })?;
        drop(file);

        if let Err(e) = self.medium.rename(&staged.temp_path, &staged.final_path) {
            log::warn!(
                "rename {} -> {} failed ({}), copying instead",
                staged.temp_path.display(),
                staged.final_path.display(),
                e
            );
            self.replace_by_copy(&staged)?;
        }

        self.staged = None;
        log::debug!(
            "committed {} bytes to {}",
            self.bytes_written,
            staged.final_path.display()
        );
        Ok(self.bytes_written)
    }

    /// Copy fallback for media without a usable rename.
    ///
    /// The previous final file is kept as a verified backup until the
    /// replacement's full byte count is confirmed.
    fn replace_by_copy(&mut self, staged: &StagedFile) -> Result<(), CaptureError> {
        let fail = |what: String| CaptureError::SinkFinalizeError(what);

        let on_medium = self
            .medium
            .len(&staged.temp_path)
            .map_err(|e| fail(format!("cannot stat {}: {}", staged.temp_path.display(), e)))?;
        if on_medium != self.bytes_written {
            return Err(fail(format!(
                "{} holds {} bytes, expected {}",
                staged.temp_path.display(),
                on_medium,
                self.bytes_written
            )));
        }

        let backup = if self.medium.exists(&staged.final_path) {
            let backup = backup_path_for(&staged.final_path);
            if self.medium.exists(&backup) {
                log::error!(
                    "{} exists from an earlier failed replacement; recover it before writing {}",
                    backup.display(),
                    staged.final_path.display()
                );
                return Err(fail(format!("stale backup {} is in the way", backup.display())));
            }
            if let Err(e) = copy_verified(
                &self.medium,
                &mut self.copy_buffer,
                &staged.final_path,
                &backup,
            ) {
                self.remove_quietly(&backup);
                return Err(fail(format!(
                    "cannot preserve {}: {}",
                    staged.final_path.display(),
                    e
                )));
            }
            Some(backup)
        } else {
            None
        };

        match copy_verified(
            &self.medium,
            &mut self.copy_buffer,
            &staged.temp_path,
            &staged.final_path,
        ) {
            Ok(_) => {
                if let Some(backup) = &backup {
                    self.remove_quietly(backup);
                }
                self.remove_quietly(&staged.temp_path);
                Ok(())
            }
            Err(e) => {
                self.restore(staged, backup.as_deref());
                Err(fail(format!("rename and copy fallback both failed: {}", e)))
            }
        }
    }

    fn restore(&mut self, staged: &StagedFile, backup: Option<&Path>) {
        let Some(backup) = backup else {
            self.remove_quietly(&staged.final_path);
            return;
        };
        match copy_verified(&self.medium, &mut self.copy_buffer, backup, &staged.final_path) {
            Ok(_) => self.remove_quietly(backup),
            Err(e) => {
                self.remove_quietly(&staged.final_path);
                // Unstage so the rollback leaves the temp file in place.
                self.staged = None;
                log::error!(
                    "could not restore {} ({}); previous contents kept in {}, new contents in {}; \
                     rename one of them to {} to recover",
                    staged.final_path.display(),
                    e,
                    backup.display(),
                    staged.temp_path.display(),
                    staged.final_path.display()
                );
            }
        }
    }

    fn remove_quietly(&self, path: &Path) {
        if self.medium.exists(path) {
            if let Err(e) = self.medium.remove(path) {
                log::error!("failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

impl<M: StorageMedium> Drop for AtomicFileWriter<M> {
    fn drop(&mut self) {
        if self.staged.is_some() {
            log::warn!("writer dropped with a staged file, rolling back");
            self.abort();
        }
    }
}

/// Copy `from` into a truncated `to` through `buf`, then check the count.
fn copy_verified<M: StorageMedium>(
    medium: &M,
    buf: &mut [u8],
    from: &Path,
    to: &Path,
) -> io::Result<u64> {
    let expected = medium.len(from)?;
    let mut src = medium.open(from)?;
    let mut dst = medium.create(to)?;

    let mut copied = 0u64;
    loop {
        let n = match src.read(buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let written = dst.write(&buf[..n])?;
        if written != n {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {} of {} bytes", written, n),
            ));
        }
        copied += n as u64;
    }
    medium.sync(&mut dst)?;

    if copied != expected {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("copied {} of {} bytes", copied, expected),
        ));
    }
    Ok(copied)
}

/// [`ChunkSink`] that stages drained bytes through an [`AtomicFileWriter`].
pub struct AtomicFileSink<'a, M: StorageMedium> {
    writer: &'a mut AtomicFileWriter<M>,
    final_path: &'a Path,
}

impl<'a, M: StorageMedium> AtomicFileSink<'a, M> {
    pub fn new(writer: &'a mut AtomicFileWriter<M>, final_path: &'a Path) -> Self {
        Self { writer, final_path }
    }
}

impl<M: StorageMedium> ChunkSink for AtomicFileSink<'_, M> {
    fn begin(&mut self, _total_length: u32) -> Result<(), CaptureError> {
        self.writer.begin(self.final_path)
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<SinkControl, CaptureError> {
        self.writer.write_chunk(chunk)?;
        Ok(SinkControl::Continue)
    }

    fn finalize(&mut self) -> Result<(), CaptureError> {
        self.writer.finalize().map(|_| ())
    }

    fn abort(&mut self) {
        self.writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::medium::{FaultyStorage, LocalStorage};
    use std::fs;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn commit_via_rename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.jpg");
        let data = payload(1500);

        let mut writer = AtomicFileWriter::new(LocalStorage);
        writer.begin(&path).unwrap();
        assert!(temp_path_for(&path).exists());
        assert!(!path.exists());

        for chunk in data.chunks(512) {
            writer.write_chunk(chunk).unwrap();
        }
        assert_eq!(writer.finalize().unwrap(), 1500);

        assert_eq!(fs::read(&path).unwrap(), data);
        assert!(!temp_path_for(&path).exists());
        assert!(writer.staged().is_none());
    }

    #[test]
    fn short_write_is_an_error_and_abort_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.jpg");
        let storage = FaultyStorage::default();
        storage.limit_create(&temp_path_for(&path), 10);

        let mut writer = AtomicFileWriter::new(storage);
        writer.begin(&path).unwrap();
        let err = writer.write_chunk(&payload(20)).unwrap_err();
        assert_eq!(err, CaptureError::SinkWriteError("short write: 10 of 20 bytes".into()));

        writer.abort();
        assert!(!temp_path_for(&path).exists());
        assert!(!path.exists());
    }

    #[test]
    fn abort_is_idempotent_and_safe_without_begin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.jpg");

        let mut writer = AtomicFileWriter::new(LocalStorage);
        writer.abort();
        writer.abort();

        writer.begin(&path).unwrap();
        writer.write_chunk(b"partial").unwrap();
        writer.abort();
        writer.abort();

        assert!(!temp_path_for(&path).exists());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn copy_fallback_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.jpg");
        fs::write(&path, b"previous").unwrap();
        let data = payload(1300);

        let mut writer = AtomicFileWriter::new(FaultyStorage::without_rename());
        writer.begin(&path).unwrap();
        writer.write_chunk(&data).unwrap();
        assert_eq!(writer.finalize().unwrap(), 1300);

        assert_eq!(fs::read(&path).unwrap(), data);
        assert!(!temp_path_for(&path).exists());
        assert!(!backup_path_for(&path).exists());
    }

    #[test]
    fn failed_copy_fallback_restores_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.jpg");
        fs::write(&path, b"previous contents").unwrap();

        let storage = FaultyStorage::without_rename();
        let mut writer = AtomicFileWriter::new(storage);
        writer.begin(&path).unwrap();
        writer.write_chunk(&payload(1000)).unwrap();

        // The first copy into the final path runs out of space after 30 bytes.
        let final_path = path.clone();
        writer.medium().limit_create(&final_path, 30);
        let err = writer.finalize().unwrap_err();

        assert!(matches!(err, CaptureError::SinkFinalizeError(_)));
        assert_eq!(fs::read(&path).unwrap(), b"previous contents");
        assert!(!temp_path_for(&path).exists());
        assert!(!backup_path_for(&path).exists());
    }

    #[test]
    fn failed_restore_keeps_backup_and_new_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.jpg");
        fs::write(&path, b"previous contents").unwrap();
        let data = payload(1000);

        let mut writer = AtomicFileWriter::new(FaultyStorage::without_rename());
        writer.begin(&path).unwrap();
        writer.write_chunk(&data).unwrap();
        // Both the copy into place and the copy back run out of space.
        writer.medium().limit_create(&path, 30);
        writer.medium().limit_create(&path, 5);

        let err = writer.finalize().unwrap_err();

        assert!(matches!(err, CaptureError::SinkFinalizeError(_)));
        assert!(!path.exists());
        assert_eq!(fs::read(backup_path_for(&path)).unwrap(), b"previous contents");
        assert_eq!(fs::read(temp_path_for(&path)).unwrap(), data);
        assert!(writer.staged().is_none());
    }

    #[test]
    fn copy_fallback_never_overwrites_existing_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.jpg");
        fs::write(&path, b"previous contents").unwrap();
        fs::write(backup_path_for(&path), b"left from last time").unwrap();

        let mut writer = AtomicFileWriter::new(FaultyStorage::without_rename());
        writer.begin(&path).unwrap();
        writer.write_chunk(&payload(600)).unwrap();
        let err = writer.finalize().unwrap_err();

        assert!(matches!(err, CaptureError::SinkFinalizeError(reason) if reason.contains("stale backup")));
        assert_eq!(fs::read(backup_path_for(&path)).unwrap(), b"left from last time");
        assert_eq!(fs::read(&path).unwrap(), b"previous contents");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn backup_name_does_not_collide_with_user_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.jpg");
        let user_backup = dir.path().join("capture.jpg.bak");
        fs::write(&path, b"previous").unwrap();
        fs::write(&user_backup, b"user copy").unwrap();

        let mut writer = AtomicFileWriter::new(FaultyStorage::without_rename());
        writer.write_all_atomic(&path, &payload(800)).unwrap();

        assert_eq!(fs::read(&user_backup).unwrap(), b"user copy");
        assert_eq!(fs::read(&path).unwrap(), payload(800));
    }

    #[test]
    fn failed_copy_fallback_without_previous_file_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.jpg");

        let mut writer = AtomicFileWriter::new(FaultyStorage::without_rename());
        writer.begin(&path).unwrap();
        writer.write_chunk(&payload(700)).unwrap();
        writer.medium().limit_create(&path, 100);

        assert!(writer.finalize().is_err());
        assert!(!path.exists());
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn begin_fails_on_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();

        let mut writer = AtomicFileWriter::new(LocalStorage);
        let err = writer.begin(&blocker.join("capture.jpg")).unwrap_err();

        assert!(matches!(err, CaptureError::SinkWriteError(_)));
        assert!(writer.staged().is_none());
    }

    #[test]
    fn second_begin_discards_first_stage() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.jpg");
        let second = dir.path().join("second.jpg");

        let mut writer = AtomicFileWriter::new(LocalStorage);
        writer.begin(&first).unwrap();
        writer.write_chunk(b"abc").unwrap();
        writer.begin(&second).unwrap();

        assert!(!temp_path_for(&first).exists());
        assert!(temp_path_for(&second).exists());
        assert_eq!(writer.bytes_written(), 0);
    }

    #[test]
    fn finalize_without_begin_fails() {
        let mut writer = AtomicFileWriter::new(LocalStorage);
        assert!(matches!(writer.finalize(), Err(CaptureError::SinkFinalizeError(_))));
        assert!(matches!(writer.write_chunk(b"x"), Err(CaptureError::SinkWriteError(_))));
    }

    #[test]
    fn drop_rolls_back_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.jpg");
        {
            let mut writer = AtomicFileWriter::new(LocalStorage);
            writer.begin(&path).unwrap();
            writer.write_chunk(b"abc").unwrap();
        }
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn write_all_atomic_commits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let data = payload(1100);

        let mut writer = AtomicFileWriter::new(LocalStorage);
        assert_eq!(writer.write_all_atomic(&path, &data).unwrap(), 1100);
        assert_eq!(fs::read(&path).unwrap(), data);
    }
}
