//! The public store: composes the log writer and the key directory, and
//! rebuilds both from the file at open time.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, info, warn};

use crate::error::{KvError, Result};
use crate::index::{KeyDir, Slot};
use crate::log::LogWriter;
use crate::record::{checksum, Record, LENGTH_FIELD_OFFSET, MAX_VALUE_SIZE, TOMBSTONE};

/// A durable key-value store backed by a single append-only log file.
///
/// Handles are cheap to clone and share one underlying store, so each OS
/// thread can hold its own. All operations take `&self` and are safe to
/// call concurrently.
///
/// Every successful [`put`](KvStore::put) and [`remove`](KvStore::remove)
/// is durable by the time it returns. When writers race on one key the
/// store converges to the record that reached the log last, regardless of
/// the order their index updates ran in.
///
/// # Example
/// ```
/// use kvlog::KvStore;
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = KvStore::open(dir.path().join("data.db")).unwrap();
///
/// store.put(1, b"value1").unwrap();
/// assert_eq!(store.get(1).unwrap().as_deref(), Some(&b"value1"[..]));
///
/// store.remove(1).unwrap();
/// assert_eq!(store.get(1).unwrap(), None);
/// ```
#[derive(Debug, Clone)]
pub struct KvStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    // read handles are opened against this path; only the LogWriter writes
    path: PathBuf,
    log: LogWriter,
    keydir: KeyDir,
}

impl KvStore {
    /// Opens the store at `path`, creating the file if it does not exist.
    ///
    /// Replays the log to rebuild the in-memory key directory, validating
    /// every record's checksum, and truncates whatever follows the last
    /// valid record (the torn tail of a crashed write, or trailing
    /// garbage). Dropping the file handle later needs no extra work: every
    /// acknowledged mutation was already flushed.
    ///
    /// # Errors
    /// returns [`KvError::Io`] if the file cannot be opened, read, or
    /// truncated
    pub fn open(path: impl AsRef<Path>) -> Result<KvStore> {
        let path = path.as_ref().to_path_buf();
        info!("opening kvlog {} at {:?}", env!("CARGO_PKG_VERSION"), path);

        let keydir = KeyDir::new();
        let valid_len = replay(&path, &keydir)?;
        debug!(valid_len, keys = keydir.len(), "log replay complete");

        let log = LogWriter::open(&path, valid_len)?;
        Ok(KvStore {
            inner: Arc::new(StoreInner { path, log, keydir }),
        })
    }

    /// Stores `value` under `key`, replacing any previous value. Durable
    /// on return.
    ///
    /// # Errors
    /// returns [`KvError::ValueTooLarge`] for values over 4096 bytes (the
    /// store is left unchanged), [`KvError::ShortWrite`] if the kernel cut
    /// the append short, or [`KvError::Io`] if the write or flush failed
    pub fn put(&self, key: u32, value: &[u8]) -> Result<()> {
        if value.len() > MAX_VALUE_SIZE {
            return Err(KvError::ValueTooLarge { size: value.len() });
        }
        self.commit(Record::put(key, value))
    }

    /// Returns the newest committed value for `key`, or `None` when the
    /// key is absent or deleted.
    ///
    /// Reads are per-key monotone but carry no cross-key ordering. A get
    /// may observe a write whose index update has landed even though the
    /// writing call has not returned yet; the record's bytes always
    /// precede its index update, so the read still finds them intact.
    pub fn get(&self, key: u32) -> Result<Option<Vec<u8>>> {
        match self.inner.keydir.get(key) {
            Some(slot) if !slot.is_deleted => self.read_value_at(slot.offset),
            _ => Ok(None),
        }
    }

    /// Deletes `key`. Removing an absent or already-deleted key is a
    /// no-op and writes nothing. Durable on return otherwise.
    ///
    /// Space held by the key's records is not reclaimed; a tombstone is
    /// appended and the directory entry flips to deleted.
    ///
    /// # Errors
    /// same as [`put`](KvStore::put), minus the size check
    pub fn remove(&self, key: u32) -> Result<()> {
        if !self.contains(key) {
            return Ok(());
        }
        // The slot seen above may already be displaced by a racing put;
        // the tombstone still appends later in the log and wins.
        self.commit(Record::tombstone(key))
    }

    /// True when `key` currently maps to a live value.
    pub fn contains(&self, key: u32) -> bool {
        matches!(self.inner.keydir.get(key), Some(slot) if !slot.is_deleted)
    }

    /// Appends `record`, advances the key directory, and flushes. The
    /// order matters: the bytes reach the file before the directory points
    /// at them, and the fsync only returns once the record is stable.
    fn commit(&self, record: Record<'_>) -> Result<()> {
        let bytes = record.encode();
        let start = self.inner.log.append(&bytes)?;
        let value_offset = start + LENGTH_FIELD_OFFSET;
        self.inner.keydir.advance(
            record.key,
            Slot {
                offset: value_offset,
                is_deleted: record.value.is_none(),
            },
        );
        self.inner.log.sync(value_offset)
    }

    /// Reads the value of the record whose length field sits at `offset`,
    /// through a read handle independent of the writer. Records behind
    /// directory entries are durable and never overwritten, so the bytes
    /// here are always well formed.
    fn read_value_at(&self, offset: u64) -> Result<Option<Vec<u8>>> {
        let mut file = File::open(&self.inner.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(file);

        let length = reader.read_u32::<LittleEndian>()?;
        if length == TOMBSTONE {
            return Ok(None);
        }
        let mut value = vec![0u8; length as usize];
        reader.read_exact(&mut value)?;
        Ok(Some(value))
    }
}

/// Replays the log at `path` into `keydir` and truncates the file to the
/// validated prefix, whose length it returns.
///
/// Replay stops at the first record that is short, oversized, or fails its
/// checksum. Everything from there on is dropped even if later bytes
/// happen to look valid: past a torn write there is no trustworthy record
/// boundary. Directory updates here are unconditional assignments, since
/// records arrive in file order.
fn replay(path: &Path, keydir: &KeyDir) -> Result<u64> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;

    let mut valid_pos: u64 = 0;
    {
        let mut reader = BufReader::new(&file);
        loop {
            let stored = match try_read_u32(&mut reader)? {
                Some(word) => word,
                None => break,
            };
            let key = match try_read_u32(&mut reader)? {
                Some(word) => word,
                None => break,
            };
            let value_offset = valid_pos + LENGTH_FIELD_OFFSET;
            let length = match try_read_u32(&mut reader)? {
                Some(word) => word,
                None => break,
            };

            if length == TOMBSTONE {
                if stored != checksum(key, TOMBSTONE, None) {
                    break;
                }
                keydir.assign(
                    key,
                    Slot {
                        offset: value_offset,
                        is_deleted: true,
                    },
                );
                valid_pos = value_offset + 4;
            } else {
                if length as usize > MAX_VALUE_SIZE {
                    // corruption, or a file that was never ours
                    break;
                }
                let mut value = vec![0u8; length as usize];
                match reader.read_exact(&mut value) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(e.into()),
                }
                if stored != checksum(key, length, Some(&value)) {
                    break;
                }
                keydir.assign(
                    key,
                    Slot {
                        offset: value_offset,
                        is_deleted: false,
                    },
                );
                valid_pos = value_offset + 4 + u64::from(length);
            }
        }
    }

    let file_len = file.metadata()?.len();
    if file_len > valid_pos {
        warn!(
            valid_pos,
            dropped = file_len - valid_pos,
            "dropping invalid log tail"
        );
        file.set_len(valid_pos)?;
    }
    Ok(valid_pos)
}

/// Reads one little-endian u32, mapping end-of-file (clean or torn) to
/// `None` so replay can stop there.
fn try_read_u32(reader: &mut impl Read) -> Result<Option<u32>> {
    match reader.read_u32::<LittleEndian>() {
        Ok(word) => Ok(Some(word)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}
