use std::io;
use thiserror::Error;

/// type alias for operations on a [`KvStore`] that could fail with a [`KvError`]
///
/// [`KvStore`]: crate::KvStore
pub type Result<T> = std::result::Result<T, KvError>;

/// Error variants surfaced by [`KvStore`] operations.
///
/// Corruption discovered while replaying the log has no variant here: it is
/// resolved at open time by truncating the invalid tail and is never
/// returned to a caller.
///
/// [`KvStore`]: crate::KvStore
#[derive(Error)]
pub enum KvError {
    /// variant for errors raised by the log file: open, seek, read, write,
    /// sync, or truncate
    #[error("IO error")]
    Io {
        /// source of the IO error
        #[from]
        source: io::Error,
    },

    /// variant for a value larger than the store accepts; the store is
    /// left unchanged
    #[error("value of {size} bytes exceeds the 4096 byte maximum")]
    ValueTooLarge {
        /// length of the rejected value in bytes
        size: usize,
    },

    /// variant for an append the kernel only partially accepted; the log
    /// tail is undefined until the next recovery truncates it
    #[error("short write: {written} of {expected} bytes reached the log")]
    ShortWrite {
        /// bytes the serialized record required
        expected: usize,
        /// bytes the kernel accepted
        written: usize,
    },
}

/// a custom Debug implementation that will write the entire error chain
impl std::fmt::Debug for KvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// writes the entire error chain of the given error `e`, to the formatter.
fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by: {}", cause)?;
        current = cause.source();
    }
    Ok(())
}
