use crate::entry::Entry;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the snapshot file inside the upload directory
pub const ENTRIES_FILE: &str = "entries.json";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("saved entries are not a list of values: {0}")]
    Corrupt(#[source] serde_json::Error),
}

/// Durable copy of the last uploaded entry list
///
/// There is one snapshot for the whole server. Writes replace it entirely.
pub trait SnapshotStorage: Send + Sync {
    /// Overwrite the snapshot with `entries`
    fn write(&self, entries: &[Entry]) -> Result<(), SnapshotError>;

    /// Read the snapshot back, `None` if nothing was ever saved
    fn read(&self) -> Result<Option<Vec<Entry>>, SnapshotError>;
}

/// Snapshot kept as a JSON array in a single file
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    /// Snapshot stored as `entries.json` under `upload_dir`
    pub fn in_dir(upload_dir: impl AsRef<Path>) -> Self {
        FileSnapshot {
            path: upload_dir.as_ref().join(ENTRIES_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStorage for FileSnapshot {
    fn write(&self, entries: &[Entry]) -> Result<(), SnapshotError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer(&mut writer, entries)
            .map_err(|e| std::io::Error::new(ErrorKind::Other, e))?;
        writer.flush()?;

        Ok(())
    }

    fn read(&self) -> Result<Option<Vec<Entry>>, SnapshotError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let reader = BufReader::new(file);

        match serde_json::from_reader(reader) {
            Ok(entries) => Ok(Some(entries)),
            Err(e) if e.is_io() => Err(SnapshotError::Io(e.into())),
            Err(e) => Err(SnapshotError::Corrupt(e)),
        }
    }
}
