use crate::entry::Entry;
use crate::saving::{SnapshotError, SnapshotStorage};
use crate::session::SessionData;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no entries available")]
    NoEntries,

    #[error("saved entries file holds no entries")]
    EmptySnapshot,

    #[error("saved entries file is corrupt: {0}")]
    CorruptSnapshot(#[source] serde_json::Error),

    #[error("{0}")]
    LoadFailed(#[source] std::io::Error),

    #[error("{0}")]
    SaveFailed(#[source] SnapshotError),
}

/// Remember a freshly uploaded entry list
///
/// The session copy is replaced first and always succeeds. The snapshot is
/// then overwritten; if that fails the session still holds the list and
/// `StoreError::SaveFailed` reports the cause.
pub fn save(
    session: &mut SessionData,
    snapshot: &dyn SnapshotStorage,
    entries: Vec<Entry>,
) -> Result<(), StoreError> {
    let entries = session.entries.insert(entries);
    snapshot.write(entries).map_err(StoreError::SaveFailed)
}

/// Fetch the entry list for a re-draw
///
/// The session copy wins when it holds any entries. Otherwise the snapshot is
/// read and, if it holds entries, copied back into the session.
///
/// # Returns
/// * `Result<&[Entry], StoreError>` - A non-empty entry list
///
/// # Errors
/// * `NoEntries` if the session holds no entries and nothing was ever saved
/// * `EmptySnapshot` if the saved snapshot is an empty list
/// * `CorruptSnapshot` if the snapshot exists but cannot be parsed
/// * `LoadFailed` on any other I/O failure
pub fn load<'s>(
    session: &'s mut SessionData,
    snapshot: &dyn SnapshotStorage,
) -> Result<&'s [Entry], StoreError> {
    let in_session = session
        .entries
        .as_ref()
        .is_some_and(|entries| !entries.is_empty());

    if !in_session {
        let entries = match snapshot.read() {
            Ok(Some(entries)) if !entries.is_empty() => entries,
            Ok(Some(_)) => return Err(StoreError::EmptySnapshot),
            Ok(None) => return Err(StoreError::NoEntries),
            Err(SnapshotError::Corrupt(e)) => return Err(StoreError::CorruptSnapshot(e)),
            Err(SnapshotError::Io(e)) => return Err(StoreError::LoadFailed(e)),
        };
        session.entries = Some(entries);
    }

    Ok(session.entries.as_deref().unwrap_or_default())
}
