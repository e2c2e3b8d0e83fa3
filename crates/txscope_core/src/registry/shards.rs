//! Per-bucket locked map of scope entries.

use super::ScopeEntry;
use std::collections::hash_map::{Entry, RandomState};
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::{Mutex, MutexGuard, PoisonError};

const DEFAULT_SHARDS: usize = 16;

/// Scope entries spread over independently locked shards, so scopes hashing
/// to different shards never contend.
#[derive(Debug)]
pub(crate) struct ShardedMap<K> {
    shards: Box<[Mutex<HashMap<K, ScopeEntry>>]>,
    hasher: RandomState,
}

impl<K: Eq + Hash> ShardedMap<K> {
    pub(crate) fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub(crate) fn with_shards(shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    /// Runs `visit` on the entry of `key`, dropping the entry if it ends empty.
    pub(crate) fn visit(&self, key: K, visit: &mut dyn FnMut(&mut ScopeEntry)) {
        let mut shard = self.shard(&key);
        match shard.entry(key) {
            Entry::Occupied(mut occupied) => {
                visit(occupied.get_mut());
                if occupied.get().is_empty() {
                    occupied.remove();
                }
            }
            Entry::Vacant(vacant) => {
                let mut entry = ScopeEntry::default();
                visit(&mut entry);
                if !entry.is_empty() {
                    vacant.insert(entry);
                }
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    fn shard(&self, key: &K) -> MutexGuard<'_, HashMap<K, ScopeEntry>> {
        let index = (self.hasher.hash_one(key) as usize) % self.shards.len();
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
