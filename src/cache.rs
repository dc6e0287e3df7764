//! Process-wide leaderboard cache.
//!
//! Entries live for a fixed TTL and are dropped wholesale whenever XP is
//! awarded. Every entry is stamped with the generation that was current
//! when its reader started querying storage, and lookups only return
//! entries stamped with the current generation. An in-flight read that
//! lands after an invalidation is therefore never served, whichever order
//! the insert and the invalidation happen in.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::db::LeaderboardEntry;
use crate::names::LEADERBOARD_CACHE_MAX_ENTRIES;

pub struct TtlCache<K, V> {
    entries: DashMap<K, (V, Instant)>,
    ttl: Duration,
    max_entries: usize,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self::bounded(ttl, LEADERBOARD_CACHE_MAX_ENTRIES)
    }

    /// A cache holding at most `max_entries` keys. A full cache first drops
    /// its expired entries and, if that frees nothing, starts over empty.
    pub fn bounded(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let hit = self.entries.get(key).and_then(|entry| {
            let (value, stored_at) = entry.value();
            (stored_at.elapsed() < self.ttl).then(|| value.clone())
        });

        if hit.is_none() {
            self.entries
                .remove_if(key, |_, (_, stored_at)| stored_at.elapsed() >= self.ttl);
        }
        hit
    }

    pub fn insert(&self, key: K, value: V) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.sweep_expired();
            if self.entries.len() >= self.max_entries {
                tracing::debug!("cache full at {} entries, clearing", self.max_entries);
                self.entries.clear();
            }
        }
        self.entries.insert(key, (value, Instant::now()));
    }

    /// Drop every entry older than the TTL.
    pub fn sweep_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (_, stored_at)| stored_at.elapsed() < ttl);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Stamped<T> {
    value: T,
    generation: u64,
}

pub struct LeaderboardCache {
    top: TtlCache<i64, Stamped<Vec<LeaderboardEntry>>>,
    ranks: TtlCache<i64, Stamped<i64>>,
    generation: AtomicU64,
}

impl LeaderboardCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            top: TtlCache::new(ttl),
            ranks: TtlCache::new(ttl),
            generation: AtomicU64::new(0),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn current<T>(&self, stamped: Option<Stamped<T>>) -> Option<T> {
        let generation = self.generation();
        stamped
            .filter(|s| s.generation == generation)
            .map(|s| s.value)
    }

    pub fn top(&self, limit: i64) -> Option<Vec<LeaderboardEntry>> {
        self.current(self.top.get(&limit))
    }

    pub fn rank(&self, user_id: i64) -> Option<i64> {
        self.current(self.ranks.get(&user_id))
    }

    /// Publish a top-N page computed while `generation` was current.
    pub fn store_top(&self, limit: i64, entries: Vec<LeaderboardEntry>, generation: u64) {
        if self.generation() == generation {
            self.top.insert(
                limit,
                Stamped {
                    value: entries,
                    generation,
                },
            );
        }
    }

    pub fn store_rank(&self, user_id: i64, rank: i64, generation: u64) {
        if self.generation() == generation {
            self.ranks.insert(
                user_id,
                Stamped {
                    value: rank,
                    generation,
                },
            );
        }
    }

    /// Drop every cached ranking. Called after each XP award.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.top.clear();
        self.ranks.clear();
        tracing::debug!("leaderboard cache invalidated");
    }
}
