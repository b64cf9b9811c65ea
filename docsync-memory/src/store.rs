//! Insertion-ordered document storage.
//!
//! Every stored record is tagged with a sequence number taken when its identifier was
//! first inserted. Iteration follows sequence order, which is insertion order. Updates
//! keep the sequence number, and a reverted removal can put a record back under its old
//! number so it reappears where it was.

use std::collections::{BTreeMap, HashMap};

use docsync_core::record::Record;

#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    record: Record,
}

/// The records of one collection, keyed by identifier.
#[derive(Debug, Default)]
pub struct DocumentMap {
    slots: HashMap<String, Slot>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl DocumentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored record with the given identifier.
    pub fn read(&self, id: &str) -> Option<&Record> {
        self.slots.get(id).map(|slot| &slot.record)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the sequence number of a stored record.
    pub fn seq_of(&self, id: &str) -> Option<u64> {
        self.slots.get(id).map(|slot| slot.seq)
    }

    /// Stores a record, returning the one it replaced.
    ///
    /// A new identifier is appended at the end; an existing one keeps its position.
    pub fn insert(&mut self, record: Record) -> Option<Record> {
        match self.slots.get_mut(record.id()) {
            Some(slot) => Some(std::mem::replace(&mut slot.record, record)),
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.insert_at(seq, record);
                None
            }
        }
    }

    /// Stores a record under a previously issued sequence number.
    ///
    /// Used to restore a removed record to its original position.
    pub fn insert_at(&mut self, seq: u64, record: Record) {
        let id = record.id().to_string();

        if let Some(previous) = self.slots.insert(id.clone(), Slot { seq, record }) {
            if previous.seq != seq {
                self.order.remove(&previous.seq);
            }
        }
        self.order.insert(seq, id);
        self.next_seq = self.next_seq.max(seq + 1);
    }

    /// Removes a record, returning it with the sequence number it held.
    pub fn remove(&mut self, id: &str) -> Option<(u64, Record)> {
        let slot = self.slots.remove(id)?;
        self.order.remove(&slot.seq);
        Some((slot.seq, slot.record))
    }

    /// Iterates over the stored records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.order
            .values()
            .filter_map(|id| self.slots.get(id).map(|slot| &slot.record))
    }

    /// Iterates over the stored identifiers in insertion order.
    #[cfg(test)]
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.values().map(String::as_str)
    }

    /// Removes every record. Sequence numbers keep counting.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn record(id: &str, n: i32) -> Record {
        Record::new(id, 0, 0, doc! { "n": n })
    }

    fn ids(map: &DocumentMap) -> Vec<&str> {
        map.ids().collect()
    }

    #[test]
    fn test_insertion_order() {
        let mut map = DocumentMap::new();
        map.insert(record("b", 1));
        map.insert(record("a", 2));
        map.insert(record("c", 3));

        assert_eq!(ids(&map), vec!["b", "a", "c"]);
        assert_eq!(map.count(), 3);
        assert!(map.exists("a"));
        assert!(!map.exists("z"));
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut map = DocumentMap::new();
        map.insert(record("a", 1));
        map.insert(record("b", 2));

        let previous = map.insert(record("a", 10));

        assert_eq!(previous, Some(record("a", 1)));
        assert_eq!(ids(&map), vec!["a", "b"]);
        assert_eq!(map.read("a"), Some(&record("a", 10)));
    }

    #[test]
    fn test_restore_after_remove() {
        let mut map = DocumentMap::new();
        map.insert(record("a", 1));
        map.insert(record("b", 2));
        map.insert(record("c", 3));

        let (seq, removed) = map.remove("b").unwrap();
        assert_eq!(ids(&map), vec!["a", "c"]);
        assert!(map.remove("b").is_none());

        map.insert_at(seq, removed);
        assert_eq!(ids(&map), vec!["a", "b", "c"]);

        map.insert(record("d", 4));
        assert_eq!(ids(&map), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_clear() {
        let mut map = DocumentMap::new();
        map.insert(record("a", 1));
        map.clear();

        assert!(map.is_empty());
        assert_eq!(map.iter().count(), 0);
        assert!(map.read("a").is_none());
    }
}
