//! A scoped overlay over the KV store.
//!
//! [`CacheContext`] buffers every write and emitted event of a multi-step operation. Calling
//! [`CacheContext::commit`] applies the writes to the parent store and hands back the events;
//! dropping the context discards both.

use std::collections::BTreeMap;

use cosmwasm_std::{Event, Order, Record, Storage};

/// Copy-on-write overlay of a parent store.
pub struct CacheContext<'a> {
    parent: &'a mut dyn Storage,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    events: Vec<Event>,
}

impl<'a> CacheContext<'a> {
    /// Opens an overlay over `parent`.
    pub fn new(parent: &'a mut dyn Storage) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Buffers an event.
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Events buffered so far.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Applies the buffered writes to the parent store and returns the buffered events.
    #[must_use = "the events of a committed context must be forwarded"]
    pub fn commit(self) -> Vec<Event> {
        for (key, value) in self.writes {
            match value {
                Some(value) => self.parent.set(&key, &value),
                None => self.parent.remove(&key),
            }
        }
        self.events
    }
}

impl Storage for CacheContext<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(value) => value.clone(),
            None => self.parent.get(key),
        }
    }

    fn range<'b>(
        &'b self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> Box<dyn Iterator<Item = Record> + 'b> {
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Box::new(std::iter::empty());
            }
        }

        let in_range = |key: &[u8]| {
            start.map_or(true, |start| key >= start) && end.map_or(true, |end| key < end)
        };

        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .parent
            .range(start, end, Order::Ascending)
            .collect();
        for (key, value) in self.writes.iter().filter(|(key, _)| in_range(key.as_slice())) {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        let mut records: Vec<Record> = merged.into_iter().collect();
        if order == Order::Descending {
            records.reverse();
        }
        Box::new(records.into_iter())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn remove(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }
}

#[cfg(test)]
mod tests {
    use cosmwasm_std::testing::MockStorage;

    use super::*;

    #[test]
    fn commit_applies_writes_and_returns_events() {
        let mut storage = MockStorage::new();
        storage.set(b"keep", b"1");
        storage.set(b"drop", b"2");

        let mut cache = CacheContext::new(&mut storage);
        cache.set(b"new", b"3");
        cache.remove(b"drop");
        cache.emit(Event::new("created"));
        assert_eq!(storage_get(&cache, b"new"), Some(b"3".to_vec()));
        assert_eq!(storage_get(&cache, b"drop"), None);

        let events = cache.commit();
        assert_eq!(events, vec![Event::new("created")]);
        assert_eq!(storage.get(b"new"), Some(b"3".to_vec()));
        assert_eq!(storage.get(b"drop"), None);
        assert_eq!(storage.get(b"keep"), Some(b"1".to_vec()));
    }

    #[test]
    fn dropping_discards_everything() {
        let mut storage = MockStorage::new();
        storage.set(b"a", b"1");
        {
            let mut cache = CacheContext::new(&mut storage);
            cache.set(b"a", b"changed");
            cache.set(b"b", b"2");
            cache.emit(Event::new("lost"));
        }
        assert_eq!(storage.get(b"a"), Some(b"1".to_vec()));
        assert_eq!(storage.get(b"b"), None);
    }

    #[test]
    fn range_merges_overlay_and_parent() {
        let mut storage = MockStorage::new();
        storage.set(b"a", b"1");
        storage.set(b"c", b"3");
        storage.set(b"e", b"5");

        let mut cache = CacheContext::new(&mut storage);
        cache.set(b"b", b"2");
        cache.remove(b"c");
        cache.set(b"e", b"50");
        cache.set(b"z", b"out of range");

        let ascending: Vec<Record> = cache
            .range(Some(b"a".as_slice()), Some(b"f".as_slice()), Order::Ascending)
            .collect();
        assert_eq!(
            ascending,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
                (b"e".to_vec(), b"50".to_vec()),
            ]
        );

        let descending: Vec<Vec<u8>> = cache
            .range(None, None, Order::Descending)
            .map(|(k, _)| k)
            .collect();
        assert_eq!(descending, vec![b"z".to_vec(), b"e".to_vec(), b"b".to_vec(), b"a".to_vec()]);

        let empty = cache.range(Some(b"c".as_slice()), Some(b"c".as_slice()), Order::Ascending);
        assert_eq!(empty.count(), 0);
    }

    #[test]
    fn overlays_nest() {
        let mut storage = MockStorage::new();
        let mut outer = CacheContext::new(&mut storage);
        {
            let mut inner = CacheContext::new(&mut outer);
            inner.set(b"k", b"v");
            inner.emit(Event::new("inner"));
            let events = inner.commit();
            assert_eq!(events.len(), 1);
        }
        assert_eq!(outer.get(b"k"), Some(b"v".to_vec()));
        let _ = outer.commit();
        assert_eq!(storage.get(b"k"), Some(b"v".to_vec()));
    }

    fn storage_get(storage: &dyn Storage, key: &[u8]) -> Option<Vec<u8>> {
        storage.get(key)
    }
}
