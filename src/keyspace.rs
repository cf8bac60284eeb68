//! The keyspace: a sharded map of key → entry with a reader-writer lock per
//! key.
//!
//! Shards are guarded by `std::sync::RwLock` and held only for map lookups,
//! never across an await. Each entry's own `tokio::sync::RwLock` is what
//! handlers hold for the duration of a command; guards are owned
//! (`read_owned`/`write_owned`) so an entry keeps a stable identity for as
//! long as any guard is outstanding. tokio's lock is write-preferring, so a
//! pending writer blocks new readers.
//!
//! Deleting a key tombstones the entry before removing its map slot; a task
//! that was already queued on the entry's lock observes the tombstone after
//! acquisition and retries against the map.

use crate::context::Context;
use crate::error::{StoreError, StoreResult};
use crate::types::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::RwLock as ShardLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// What lives behind a key's lock: the value plus expiry metadata.
#[derive(Debug)]
pub struct Stored {
    pub value: Value,
    /// Expiry as milliseconds since the UNIX epoch. None = no expiry.
    pub expires_at: Option<u64>,
    /// Set when the entry has been removed from the map; waiters that
    /// acquire the lock afterwards must retry their lookup.
    pub(crate) tombstone: bool,
}

impl Stored {
    fn sentinel() -> Self {
        Stored {
            value: Value::Null,
            expires_at: None,
            tombstone: false,
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => now_millis() >= exp,
            None => false,
        }
    }

    /// Time-to-live in seconds, or -1 if no expiry, or -2 if expired.
    pub fn ttl_seconds(&self) -> i64 {
        match self.expires_at {
            None => -1,
            Some(exp) => {
                let now = now_millis();
                if now >= exp {
                    -2
                } else {
                    ((exp - now) / 1000) as i64
                }
            }
        }
    }

    /// Time-to-live in milliseconds, or -1 if no expiry, or -2 if expired.
    pub fn ttl_millis(&self) -> i64 {
        match self.expires_at {
            None => -1,
            Some(exp) => {
                let now = now_millis();
                if now >= exp {
                    -2
                } else {
                    (exp - now) as i64
                }
            }
        }
    }
}

/// Current time in milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_millis() as u64
}

type EntryLock = Arc<RwLock<Stored>>;

pub type ReadGuard = OwnedRwLockReadGuard<Stored>;
pub type WriteGuard = OwnedRwLockWriteGuard<Stored>;

#[derive(Debug)]
pub struct Keyspace {
    shards: Vec<ShardLock<HashMap<String, EntryLock>>>,
}

impl Keyspace {
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(ShardLock::new(HashMap::new()));
        }
        Keyspace { shards }
    }

    fn shard(&self, key: &str) -> &ShardLock<HashMap<String, EntryLock>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    fn lookup(&self, key: &str) -> Option<EntryLock> {
        self.shard(key).read().unwrap().get(key).cloned()
    }

    /// Cheap existence check without taking the key's lock. A contended
    /// entry is reported as present; correctness lies with the locked
    /// operations that follow.
    pub fn contains(&self, key: &str) -> bool {
        match self.lookup(key) {
            Some(entry) => match entry.try_read() {
                Ok(stored) => {
                    !stored.tombstone && !stored.value.is_null() && !stored.is_expired()
                }
                Err(_) => true,
            },
            None => false,
        }
    }

    /// Acquire the key's read lock, lazily expiring the entry. Returns
    /// `NoSuchKey` when the key is absent (or just expired).
    pub async fn read_lock(&self, ctx: &Context, key: &str) -> StoreResult<ReadGuard> {
        loop {
            let Some(entry) = self.lookup(key) else {
                return Err(StoreError::NoSuchKey);
            };
            let guard = acquire_read(ctx, entry.clone()).await?;
            if guard.tombstone {
                continue;
            }
            if guard.value.is_null() {
                // Creation sentinel that a concurrent command is still
                // holding nothing in; readers treat it as absent.
                return Err(StoreError::NoSuchKey);
            }
            if !guard.is_expired() {
                return Ok(guard);
            }
            drop(guard);
            let mut wguard = acquire_write(ctx, entry).await?;
            if wguard.tombstone {
                continue;
            }
            if wguard.is_expired() {
                self.purge(key, &mut wguard);
                return Err(StoreError::NoSuchKey);
            }
            // Someone refreshed the expiry while we upgraded; retry.
        }
    }

    /// Acquire the key's write lock, lazily expiring the entry.
    pub async fn write_lock(&self, ctx: &Context, key: &str) -> StoreResult<WriteGuard> {
        loop {
            let Some(entry) = self.lookup(key) else {
                return Err(StoreError::NoSuchKey);
            };
            let mut guard = acquire_write(ctx, entry).await?;
            if guard.tombstone {
                continue;
            }
            if guard.is_expired() {
                self.purge(key, &mut guard);
                return Err(StoreError::NoSuchKey);
            }
            if guard.value.is_null() {
                return Err(StoreError::NoSuchKey);
            }
            return Ok(guard);
        }
    }

    /// Atomically get-or-create the entry and acquire its write lock.
    ///
    /// A fresh entry holds the `Null` sentinel; the caller commits a real
    /// value through the guard or rolls the entry back with `purge`. The
    /// returned flag says whether a live value pre-existed.
    pub async fn write_lock_or_create(
        &self,
        ctx: &Context,
        key: &str,
    ) -> StoreResult<(WriteGuard, bool)> {
        loop {
            let entry = {
                let mut shard = self.shard(key).write().unwrap();
                match shard.get(key) {
                    Some(e) => e.clone(),
                    None => {
                        let e = Arc::new(RwLock::new(Stored::sentinel()));
                        shard.insert(key.to_string(), e.clone());
                        e
                    }
                }
            };
            let mut guard = acquire_write(ctx, entry).await?;
            if guard.tombstone {
                continue;
            }
            if guard.is_expired() {
                guard.value = Value::Null;
                guard.expires_at = None;
                return Ok((guard, false));
            }
            let preexisting = !guard.value.is_null();
            return Ok((guard, preexisting));
        }
    }

    /// Tombstone the entry and drop its map slot. The caller holds the
    /// entry's write guard.
    pub fn purge(&self, key: &str, guard: &mut WriteGuard) {
        guard.value = Value::Null;
        guard.expires_at = None;
        guard.tombstone = true;
        self.shard(key).write().unwrap().remove(key);
    }

    /// Number of live map slots (may include entries pending expiry).
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().unwrap().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all key names.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for shard in &self.shards {
            keys.extend(shard.read().unwrap().keys().cloned());
        }
        keys
    }

    /// One active-expiry cycle: sample up to `sample` random volatile keys
    /// and delete those whose expiry has fired. Contended keys are skipped
    /// rather than waited on. Returns the number of keys removed.
    pub fn sweep_expired(&self, sample: usize) -> usize {
        use rand::seq::IteratorRandom;

        let mut volatile = Vec::new();
        for shard in &self.shards {
            let shard = shard.read().unwrap();
            for (key, entry) in shard.iter() {
                if let Ok(stored) = entry.try_read() {
                    if stored.expires_at.is_some() && !stored.tombstone {
                        volatile.push(key.clone());
                    }
                }
            }
        }

        let mut rng = rand::thread_rng();
        let sampled = volatile.into_iter().choose_multiple(&mut rng, sample);

        let mut removed = 0;
        for key in sampled {
            let Some(entry) = self.lookup(&key) else {
                continue;
            };
            let mut stored = match entry.try_write() {
                Ok(g) => g,
                Err(_) => continue,
            };
            if !stored.tombstone && stored.is_expired() {
                stored.value = Value::Null;
                stored.expires_at = None;
                stored.tombstone = true;
                self.shard(&key).write().unwrap().remove(&key);
                removed += 1;
            }
        }
        removed
    }
}

// Cancellation is polled first so an already-cancelled context never
// acquires, even when the lock is free.
async fn acquire_read(ctx: &Context, entry: EntryLock) -> StoreResult<ReadGuard> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(StoreError::Cancelled),
        guard = entry.clone().read_owned() => Ok(guard),
    }
}

async fn acquire_write(ctx: &Context, entry: EntryLock) -> StoreResult<WriteGuard> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(StoreError::Cancelled),
        guard = entry.clone().write_owned() => Ok(guard),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_read() {
        let ks = Keyspace::new(4);
        let ctx = Context::background();

        let (mut guard, preexisting) = ks.write_lock_or_create(&ctx, "k").await.unwrap();
        assert!(!preexisting);
        guard.value = Value::Str(b"v".to_vec());
        drop(guard);

        let guard = ks.read_lock(&ctx, "k").await.unwrap();
        assert_eq!(guard.value, Value::Str(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_missing_key_is_no_such_key() {
        let ks = Keyspace::new(4);
        let ctx = Context::background();
        assert!(matches!(
            ks.read_lock(&ctx, "nope").await,
            Err(StoreError::NoSuchKey)
        ));
        assert!(matches!(
            ks.write_lock(&ctx, "nope").await,
            Err(StoreError::NoSuchKey)
        ));
    }

    #[tokio::test]
    async fn test_purge_removes_slot() {
        let ks = Keyspace::new(4);
        let ctx = Context::background();

        let (mut guard, _) = ks.write_lock_or_create(&ctx, "k").await.unwrap();
        guard.value = Value::Int(1);
        drop(guard);
        assert!(ks.contains("k"));

        let mut guard = ks.write_lock(&ctx, "k").await.unwrap();
        ks.purge("k", &mut guard);
        drop(guard);
        assert!(!ks.contains("k"));
        assert_eq!(ks.len(), 0);
    }

    #[tokio::test]
    async fn test_lazy_expiry_on_access() {
        let ks = Keyspace::new(4);
        let ctx = Context::background();

        let (mut guard, _) = ks.write_lock_or_create(&ctx, "k").await.unwrap();
        guard.value = Value::Int(1);
        guard.expires_at = Some(now_millis().saturating_sub(10));
        drop(guard);

        assert!(matches!(
            ks.read_lock(&ctx, "k").await,
            Err(StoreError::NoSuchKey)
        ));
        // The lazy check removed the slot entirely.
        assert_eq!(ks.len(), 0);
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let ks = Keyspace::new(4);
        let ctx = Context::background();

        for i in 0..10 {
            let key = format!("k{i}");
            let (mut guard, _) = ks.write_lock_or_create(&ctx, &key).await.unwrap();
            guard.value = Value::Int(i);
            if i % 2 == 0 {
                guard.expires_at = Some(now_millis().saturating_sub(5));
            }
        }

        let removed = ks.sweep_expired(100);
        assert_eq!(removed, 5);
        assert_eq!(ks.len(), 5);
    }

    #[tokio::test]
    async fn test_cancelled_acquisition() {
        use tokio_util::sync::CancellationToken;

        let ks = Keyspace::new(4);
        let ctx = Context::background();

        let (mut guard, _) = ks.write_lock_or_create(&ctx, "k").await.unwrap();
        guard.value = Value::Int(1);

        let token = CancellationToken::new();
        token.cancel();
        let cancelled_ctx = Context::with_token(token);
        // Write lock is held; a cancelled context must surface Cancelled
        // instead of blocking.
        assert!(matches!(
            ks.write_lock(&cancelled_ctx, "k").await,
            Err(StoreError::Cancelled)
        ));
    }
}
