//! The append-only log writer, sole mutator of the store's file.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{KvError, Result};

/// Appends records to the log and makes them durable.
///
/// `append` holds an internal mutex across seek-to-end and the write, so
/// the offset handed back always matches where the bytes landed: the OS
/// offers no append-and-report-offset primitive, and bytes from other
/// threads must not interleave. The total order of appends under this
/// mutex is the log order the rest of the store obeys.
///
/// `sync` coalesces concurrent flushes (group commit): one atomic tracks
/// the highest offset any append has reached, the other the highest offset
/// an fsync is known to cover. A caller whose record a concurrent fsync
/// already covered skips the device flush. Correctness does not depend on
/// the skip; with the counters at rest every sync is a plain fsync.
#[derive(Debug)]
pub struct LogWriter {
    appender: Mutex<File>,
    // second handle onto the same open file, so a flush never has to wait
    // on the append mutex
    syncer: File,
    max_pending: AtomicU64,
    committed: AtomicU64,
}

impl LogWriter {
    /// Opens `path` for appending, creating the file if it is missing.
    ///
    /// `durable_len` is the validated file length established by recovery;
    /// offsets at or below it count as already flushed.
    pub fn open(path: &Path, durable_len: u64) -> Result<LogWriter> {
        let appender = OpenOptions::new().create(true).append(true).open(path)?;
        let syncer = appender.try_clone()?;
        Ok(LogWriter {
            appender: Mutex::new(appender),
            syncer,
            max_pending: AtomicU64::new(durable_len),
            committed: AtomicU64::new(durable_len),
        })
    }

    /// Appends a fully serialized record, returning the file offset of its
    /// first byte. No other append interleaves with it.
    ///
    /// # Errors
    /// returns [`KvError::ShortWrite`] if the kernel accepted fewer bytes
    /// than the record holds. No repair is attempted; the tail is
    /// undefined until the next recovery truncates it.
    pub fn append(&self, bytes: &[u8]) -> Result<u64> {
        let offset = {
            let mut file = self.appender.lock();
            let offset = file.seek(SeekFrom::End(0))?;
            let written = file.write(bytes)?;
            if written != bytes.len() {
                return Err(KvError::ShortWrite {
                    expected: bytes.len(),
                    written,
                });
            }
            offset
        };
        self.max_pending
            .fetch_max(offset + bytes.len() as u64, Ordering::AcqRel);
        Ok(offset)
    }

    /// Blocks until every byte at offsets `<= up_to` is durable.
    ///
    /// Safe to call from any thread, concurrently with `append`.
    pub fn sync(&self, up_to: u64) -> Result<()> {
        if self.committed.load(Ordering::Acquire) >= up_to {
            trace!(up_to, "fsync skipped, already committed");
            return Ok(());
        }
        let pending = self.max_pending.load(Ordering::Acquire);
        self.syncer.sync_all()?;
        self.committed.fetch_max(pending, Ordering::AcqRel);
        Ok(())
    }
}
