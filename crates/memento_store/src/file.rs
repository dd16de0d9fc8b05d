//! Journal-backed store for persistent data.

use crate::action::WriteAction;
use crate::connection::{Shared, StoreConnection};
use crate::error::{StoreError, StoreResult};
use crate::key::EntityKey;
use crate::row::Row;
use crate::store::{DurableStore, StoreProvider};
use crate::tables::Tables;
use fs2::FileExt;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Size of the little-endian length prefix of each journal frame.
const FRAME_HEADER_SIZE: usize = 4;

/// Options for opening a [`FileStore`].
#[derive(Debug, Clone)]
pub struct FileStoreOptions {
    /// Whether to create the journal if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the journal on every commit (safer but slower).
    pub sync_on_commit: bool,
}

impl Default for FileStoreOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
        }
    }
}

impl FileStoreOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the journal if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the journal on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}

/// Append-only journal of committed batches.
///
/// Each frame is a 4-byte little-endian length followed by the CBOR
/// encoding of the batch's actions.
pub(crate) struct Journal {
    file: File,
    sync_on_commit: bool,
    frames: u64,
    /// End of the last complete frame.
    len: u64,
}

impl Journal {
    /// Appends one committed batch.
    pub(crate) fn append(&mut self, actions: &[WriteAction]) -> StoreResult<()> {
        let mut payload = Vec::new();
        ciborium::into_writer(actions, &mut payload)
            .map_err(|e| StoreError::codec(e.to_string()))?;

        let len = u32::try_from(payload.len())
            .map_err(|_| StoreError::codec("journal frame exceeds 4 GiB"))?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);

        // A failed earlier append may have left a partial frame behind.
        let on_disk = self.file.metadata()?.len();
        if on_disk != self.len {
            warn!(
                offset = self.len,
                dropped = on_disk.saturating_sub(self.len),
                "truncating partial journal frame"
            );
            self.file.set_len(self.len)?;
        }

        if let Err(err) = self.write_frame(&frame) {
            if let Err(truncate) = self.file.set_len(self.len) {
                warn!(error = %truncate, "failed to truncate partial journal frame");
            }
            return Err(err.into());
        }

        self.len += frame.len() as u64;
        self.frames += 1;
        debug!(frame = self.frames, actions = actions.len(), "journal frame appended");
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.file.write_all(frame)?;
        if self.sync_on_commit {
            self.file.sync_data()
        } else {
            self.file.flush()
        }
    }
}

/// A durable store that journals committed batches to a file.
///
/// On open, the journal is replayed into memory; every
/// [`commit_durable`](DurableStore::commit_durable) appends one frame.
/// Connections behave exactly like those of
/// [`MemoryStore`](crate::MemoryStore).
///
/// # Durability
///
/// - With `sync_on_commit`, a commit returns only after its frame is synced
/// - A frame torn by a crash is truncated on the next open
///
/// # Locking
///
/// The journal is locked exclusively while the store (or any of its
/// connections) is alive. A second open fails with [`StoreError::Locked`].
///
/// # Example
///
/// ```no_run
/// use memento_store::{FileStore, StoreProvider};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("memo.journal")).unwrap();
/// let conn = store.connect().unwrap();
/// ```
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    shared: Arc<Shared>,
}

impl FileStore {
    /// Opens or creates a store journaled at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be opened, is locked, or is
    /// corrupted.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_options(path, FileStoreOptions::default())
    }

    /// Opens a store journaled at `path` with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The journal doesn't exist and `create_if_missing` is false
    /// - Another process has the journal locked (`Locked`)
    /// - A complete frame cannot be decoded or replayed (`Corrupted`)
    /// - I/O errors occur
    pub fn open_with_options(path: &Path, options: FileStoreOptions) -> StoreResult<Self> {
        if !options.create_if_missing && !path.exists() {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("journal {} does not exist", path.display()),
            )));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(options.create_if_missing)
            .open(path)?;

        file.try_lock_exclusive().map_err(|_| StoreError::Locked)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut tables = Tables::default();
        let (frames, valid_len) = replay(&bytes, &mut tables)?;

        if valid_len < bytes.len() {
            warn!(
                path = %path.display(),
                offset = valid_len,
                dropped = bytes.len() - valid_len,
                "truncating torn journal tail"
            );
            file.set_len(valid_len as u64)?;
            file.sync_all()?;
        }

        debug!(
            path = %path.display(),
            frames,
            rows = tables.len(),
            "journal replayed"
        );

        let journal = Journal {
            file,
            sync_on_commit: options.sync_on_commit,
            frames,
            len: valid_len as u64,
        };

        Ok(Self {
            path: path.to_path_buf(),
            shared: Arc::new(Shared::new(tables, Some(journal))),
        })
    }

    /// Returns the path to the journal.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the committed row stored under `key`.
    #[must_use]
    pub fn row(&self, key: &EntityKey) -> Option<Row> {
        self.shared.tables.read().get(key).cloned()
    }

    /// Returns the number of committed rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.tables.read().len()
    }

    /// Returns true if no rows are committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StoreProvider for FileStore {
    fn connect(&self) -> StoreResult<Box<dyn DurableStore>> {
        Ok(Box::new(StoreConnection::new(Arc::clone(&self.shared))))
    }
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("rows", &self.len())
            .finish()
    }
}

/// Replays journal frames into `tables`.
///
/// Returns the number of frames replayed and the length of the valid
/// prefix of `bytes`. A trailing incomplete frame is not an error.
fn replay(bytes: &[u8], tables: &mut Tables) -> StoreResult<(u64, usize)> {
    let mut offset = 0usize;
    let mut frames = 0u64;

    while offset < bytes.len() {
        let remaining = &bytes[offset..];
        if remaining.len() < FRAME_HEADER_SIZE {
            break;
        }

        let mut header = [0u8; FRAME_HEADER_SIZE];
        header.copy_from_slice(&remaining[..FRAME_HEADER_SIZE]);
        let len = u32::from_le_bytes(header) as usize;

        let Some(payload) = remaining.get(FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + len) else {
            break;
        };

        let actions: Vec<WriteAction> = ciborium::from_reader(payload).map_err(|e| {
            StoreError::corrupted(format!("frame at offset {offset} is undecodable: {e}"))
        })?;

        tables.apply(&actions).map_err(|e| {
            StoreError::corrupted(format!("frame at offset {offset} does not apply: {e}"))
        })?;

        offset += FRAME_HEADER_SIZE + len;
        frames += 1;
    }

    Ok((frames, offset))
}
