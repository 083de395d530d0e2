use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use advisory_lock::{AdvisoryFileLock, FileLockError, FileLockMode};

use crate::{Records, Result};

/// A JSON document holding [`Records`], replaced atomically on every write.
#[derive(Clone, Debug)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document. A missing file yields empty records.
    pub fn load(&self) -> Result<Records> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Records::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Writes `records` to a sibling temporary file, then renames it over
    /// the document.
    pub fn write(&self, records: &Records) -> Result<()> {
        let tmp = self.tmp_path();
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, records)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Takes the exclusive lock on the sibling `<name>.lock` file without
    /// blocking. Returns `Ok(None)` while any other handle holds it, in this
    /// process or another.
    pub fn try_lock(&self) -> Result<Option<FileLock>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.sibling(".lock"))?;
        match AdvisoryFileLock::try_lock(&file, FileLockMode::Exclusive) {
            Ok(()) => Ok(Some(FileLock { _file: file })),
            Err(FileLockError::AlreadyLocked) => Ok(None),
            Err(FileLockError::Io(e)) => Err(e.into()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

/// An exclusive lock on a [`JsonFile`]. Closing the handle on drop releases
/// it.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
}
