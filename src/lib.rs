#![deny(missing_docs)]
//! # kvlog
//! A durable, concurrent key-value store backed by a single append-only
//! log file.
//!
//! Keys are `u32`; values are byte strings of at most 4096 bytes. Every
//! mutation is durable by the time the call returns, and writers racing on
//! one key converge to the record that reached the log last. Opening a
//! store replays its log, validating checksums and truncating any torn
//! tail a crash left behind, so the rebuilt state is exactly what a reader
//! could have observed before the crash.
//!
//! The pieces, bottom up: [`record`] defines the on-disk format,
//! [`log::LogWriter`] owns the file and serializes appends,
//! [`index::KeyDir`] maps keys to log offsets, and [`store::KvStore`] ties
//! them together.

/// Error and result types for the store.
pub mod error;
/// In-memory key directory mapping keys to log offsets.
pub mod index;
/// Append-only log file writer and reader.
pub mod log;
/// On-disk record format.
pub mod record;
/// The key-value store that ties the log and index together.
pub mod store;

pub use error::{KvError, Result};
pub use store::KvStore;
