//! In-memory key directory: maps each key to the log position of its
//! newest record.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Location of the record currently authoritative for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Byte offset of the record's length field within the log, the first
    /// thing a reader decodes.
    pub offset: u64,
    /// True when the record at `offset` is a tombstone.
    pub is_deleted: bool,
}

/// Concurrent map from key to [`Slot`].
///
/// Backed by a sharded hash map: touching an entry locks only its shard,
/// so writers on unrelated keys proceed in parallel, while the
/// read-modify-write in [`advance`](KeyDir::advance) is exclusive for its
/// key.
#[derive(Debug, Default)]
pub struct KeyDir {
    slots: DashMap<u32, Slot>,
}

impl KeyDir {
    /// Creates an empty directory.
    pub fn new() -> KeyDir {
        KeyDir::default()
    }

    /// Copies out the slot for `key`, if any. Shared access; no lock is
    /// held once this returns.
    pub fn get(&self, key: u32) -> Option<Slot> {
        self.slots.get(&key).map(|entry| *entry.value())
    }

    /// Applies the max-offset rule for `key` under exclusive access:
    /// insert when vacant, otherwise replace the slot only if `slot` sits
    /// strictly later in the log. A record that lost the race to a later
    /// writer leaves the entry untouched, so the directory never regresses
    /// against log order.
    pub fn advance(&self, key: u32, slot: Slot) {
        match self.slots.entry(key) {
            Entry::Occupied(mut current) => {
                if current.get().offset < slot.offset {
                    *current.get_mut() = slot;
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
            }
        }
    }

    /// Assigns `slot` unconditionally. Replay-only: recovery visits
    /// records in file order, so each record it accepts is by construction
    /// the newest seen so far for its key.
    pub fn assign(&self, key: u32, slot: Slot) {
        self.slots.insert(key, slot);
    }

    /// Drops the entry for `key`, reporting whether one was present.
    ///
    /// Reserved for log compaction, which rewrites live records and then
    /// discards tombstone entries; the read and write paths never call
    /// this.
    pub fn remove(&self, key: u32) -> bool {
        self.slots.remove(&key).is_some()
    }

    /// Number of keys tracked, deleted entries included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
