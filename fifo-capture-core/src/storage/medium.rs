use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

/// Removable storage as seen by the atomic writer.
///
/// Exists so the writer can run against media whose rename is missing or
/// unreliable (FAT on an SD card) and against fault-injecting fakes in tests.
pub trait StorageMedium: Send {
    type File: Read + Write + Send;

    /// Open `path` for writing, creating it or truncating existing contents.
    fn create(&self, path: &Path) -> io::Result<Self::File>;

    /// Open `path` for reading.
    fn open(&self, path: &Path) -> io::Result<Self::File>;

    /// Push buffered data and metadata for `file` down to the medium.
    fn sync(&self, file: &mut Self::File) -> io::Result<()>;

    /// Atomically replace `to` with `from`.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Size of the file at `path` in bytes.
    fn len(&self, path: &Path) -> io::Result<u64>;
}

/// The local filesystem via `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl StorageMedium for LocalStorage {
    type File = File;

    fn create(&self, path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    }

    fn open(&self, path: &Path) -> io::Result<File> {
        File::open(path)
    }

    fn sync(&self, file: &mut File) -> io::Result<()> {
        file.flush()?;
        file.sync_all()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }
}

/// Local storage with an injectable rename failure and size-limited creates.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct FaultyStorage {
    rename_fails: bool,
    /// Byte budgets applied, in order, to the next creates of matching paths.
    create_limits: parking_lot::Mutex<Vec<(std::path::PathBuf, u64)>>,
}

#[cfg(test)]
impl FaultyStorage {
    pub(crate) fn without_rename() -> Self {
        Self {
            rename_fails: true,
            ..Default::default()
        }
    }

    /// The next create of `path` accepts `budget` bytes, then writes come up short.
    pub(crate) fn limit_create(&self, path: &Path, budget: u64) {
        self.create_limits.lock().push((path.to_path_buf(), budget));
    }
}

#[cfg(test)]
pub(crate) struct LimitedFile {
    inner: File,
    budget: Option<u64>,
}

#[cfg(test)]
impl Read for LimitedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

#[cfg(test)]
impl Write for LimitedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(budget) = self.budget.as_mut() else {
            return self.inner.write(buf);
        };
        let n = buf.len().min(*budget as usize);
        let written = self.inner.write(&buf[..n])?;
        *budget -= written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
impl StorageMedium for FaultyStorage {
    type File = LimitedFile;

    fn create(&self, path: &Path) -> io::Result<LimitedFile> {
        let budget = {
            let mut limits = self.create_limits.lock();
            let next = limits.iter().position(|(target, _)| target == path);
            next.map(|i| limits.remove(i).1)
        };
        Ok(LimitedFile {
            inner: LocalStorage.create(path)?,
            budget,
        })
    }

    fn open(&self, path: &Path) -> io::Result<LimitedFile> {
        Ok(LimitedFile {
            inner: LocalStorage.open(path)?,
            budget: None,
        })
    }

    fn sync(&self, file: &mut LimitedFile) -> io::Result<()> {
        LocalStorage.sync(&mut file.inner)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.rename_fails {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "no rename"));
        }
        LocalStorage.rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        LocalStorage.remove(path)
    }

    fn exists(&self, path: &Path) -> bool {
        LocalStorage.exists(path)
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        LocalStorage.len(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_truncates_and_makes_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/file.bin");
        let storage = LocalStorage;

        storage.create(&path).unwrap().write_all(b"longer contents").unwrap();
        storage.create(&path).unwrap().write_all(b"short").unwrap();

        assert_eq!(storage.len(&path).unwrap(), 5);
        assert_eq!(fs::read(&path).unwrap(), b"short");
    }

    #[test]
    fn rename_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a");
        let to = dir.path().join("b");
        fs::write(&from, b"new").unwrap();
        fs::write(&to, b"old").unwrap();

        LocalStorage.rename(&from, &to).unwrap();

        assert!(!LocalStorage.exists(&from));
        assert_eq!(fs::read(&to).unwrap(), b"new");
    }
}
