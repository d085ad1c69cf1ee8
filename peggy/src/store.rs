//! The key-value store the bridge state lives in.
//!
//! The ledger owns the real storage engine. The core only needs ordered byte keys, point reads and writes, and lazy
//! prefix iteration, which is what [KvStore] captures. [CacheStore] buffers the writes of a single message on top of
//! another store, so a transition is either committed in full or dropped without a trace.

use std::collections::BTreeMap;

use itertools::{EitherOrBoth, Itertools};

pub type KvPair = (Vec<u8>, Vec<u8>);

/// A lazy iterator over key-value pairs in ascending key order. Calling [KvStore::prefix_iter] again restarts it.
pub type KvIter<'a> = Box<dyn Iterator<Item = KvPair> + 'a>;

pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    fn delete(&mut self, key: &[u8]);

    /// All pairs whose key starts with `prefix`, in ascending key order.
    fn prefix_iter<'a>(&'a self, prefix: &[u8]) -> KvIter<'a>;

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }
}

/// An in-memory [KvStore], ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn prefix_iter<'a>(&'a self, prefix: &[u8]) -> KvIter<'a> {
        let prefix = prefix.to_vec();
        Box::new(
            self.entries
                .range(prefix.clone()..)
                .take_while(move |(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }
}

/// Buffers writes on top of a parent store. Reads see the buffered writes first. Nothing reaches the parent until
/// [CacheStore::commit] is called; dropping the cache discards everything.
pub struct CacheStore<'a, S: KvStore + ?Sized> {
    parent: &'a mut S,
    /// `None` marks a deletion.
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a, S: KvStore + ?Sized> CacheStore<'a, S> {
    pub fn new(parent: &'a mut S) -> Self {
        CacheStore {
            parent,
            writes: BTreeMap::new(),
        }
    }

    /// The number of buffered writes, including deletions.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    pub fn commit(self) {
        for (key, value) in self.writes {
            match value {
                Some(value) => self.parent.set(key, value),
                None => self.parent.delete(&key),
            }
        }
    }
}

impl<S: KvStore + ?Sized> KvStore for CacheStore<'_, S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(value) => value.clone(),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    fn prefix_iter<'b>(&'b self, prefix: &[u8]) -> KvIter<'b> {
        let owned = prefix.to_vec();
        let buffered = self
            .writes
            .range(owned.clone()..)
            .take_while(move |(k, _)| k.starts_with(&owned));
        Box::new(
            self.parent
                .prefix_iter(prefix)
                .merge_join_by(buffered, |(parent_key, _), (buffered_key, _)| {
                    parent_key.as_slice().cmp(buffered_key.as_slice())
                })
                .filter_map(|entry| match entry {
                    EitherOrBoth::Left(pair) => Some(pair),
                    EitherOrBoth::Right((key, value)) | EitherOrBoth::Both(_, (key, value)) => {
                        value.clone().map(|value| (key.clone(), value))
                    }
                }),
        )
    }
}
