//! The store: command dispatch over the keyspace.
//!
//! For each parsed command array the dispatcher looks up the registry
//! entry, runs its key extractor, acquires every named key's lock in
//! canonical order (ascending lexicographic, write beating read when a key
//! appears in both sets), invokes the handler against an `Access` handle,
//! rolls back entries the handler never committed, and releases locks in
//! reverse order — on success, on error, and on panic alike.

use crate::command::{AccessKeys, CommandTable};
use crate::config::Config;
use crate::context::Context;
use crate::error::{StoreError, StoreResult};
use crate::expiry;
use crate::keyspace::{Keyspace, ReadGuard, Stored, WriteGuard};
use crate::resp::Reply;
use crate::types::Value;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct Store {
    keyspace: Arc<Keyspace>,
    table: CommandTable,
    shutdown: CancellationToken,
}

impl Store {
    /// Build a store. Must run inside a tokio runtime when
    /// `config.active_expiry` is set — the sweeper is spawned here.
    pub fn new(config: Config) -> Self {
        let keyspace = Arc::new(Keyspace::new(config.shard_count));
        let shutdown = CancellationToken::new();
        if config.active_expiry {
            expiry::spawn_sweeper(
                keyspace.clone(),
                shutdown.child_token(),
                config.sweep_interval_ms,
                config.sweep_sample,
            );
        }
        Store {
            keyspace,
            table: CommandTable::new(),
            shutdown,
        }
    }

    pub(crate) fn keyspace(&self) -> &Arc<Keyspace> {
        &self.keyspace
    }

    /// Number of live keys (entries pending expiry may still be counted).
    pub fn keyspace_len(&self) -> usize {
        self.keyspace.len()
    }

    /// Stop the background sweeper. Called automatically on drop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether a command mutates state and must be ordered by an external
    /// replication collaborator. None for unknown commands.
    pub fn is_synchronous(&self, name: &str) -> Option<bool> {
        self.table.get(&name.to_lowercase()).map(|s| s.synchronous)
    }

    /// Registry listing: (name, description) pairs.
    pub fn commands(&self) -> Vec<(&'static str, &'static str)> {
        self.table.iter().map(|s| (s.name, s.description)).collect()
    }

    /// Dispatch a command array and return the reply as RESP bytes. Errors
    /// are encoded as RESP error replies; the connection stays usable.
    pub async fn handle_command(&self, ctx: &Context, args: &[String]) -> Vec<u8> {
        match self.execute(ctx, args).await {
            Ok(reply) => reply.serialize(),
            Err(err) => {
                if err.is_cancelled() {
                    debug!(client = ctx.client_id(), "command cancelled");
                } else {
                    debug!(client = ctx.client_id(), %err, "command error");
                }
                Reply::error(err.to_resp_error()).serialize()
            }
        }
    }

    /// Dispatch a command array and return the structured reply.
    pub async fn execute(&self, ctx: &Context, args: &[String]) -> StoreResult<Reply> {
        let name = args
            .first()
            .ok_or_else(|| StoreError::UnknownCommand(String::new()))?
            .to_lowercase();
        let spec = self
            .table
            .get(name.as_str())
            .ok_or_else(|| StoreError::UnknownCommand(name.clone()))?;

        let keys = (spec.key_extractor)(args)?;
        let mut access = self.acquire(ctx, &keys).await?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            (spec.handler)(ctx, args, &mut access)
        }));
        self.finalize(access);

        match outcome {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Acquire all named keys in canonical order. On failure, entries
    /// created along the way are rolled back before the error surfaces.
    async fn acquire(&self, ctx: &Context, keys: &AccessKeys) -> StoreResult<Access> {
        let mut modes: BTreeMap<&String, bool> = BTreeMap::new();
        for key in &keys.read_keys {
            modes.entry(key).or_insert(false);
        }
        for key in &keys.write_keys {
            modes.insert(key, true);
        }

        let mut access = Access { slots: Vec::with_capacity(modes.len()) };
        for (key, write) in modes {
            let acquired = if write {
                match self.keyspace.write_lock_or_create(ctx, key).await {
                    Ok((guard, _preexisting)) => Ok(Slot {
                        key: key.clone(),
                        guard: SlotGuard::Write(guard),
                        deleted: false,
                    }),
                    Err(e) => Err(e),
                }
            } else {
                match self.keyspace.read_lock(ctx, key).await {
                    Ok(guard) => Ok(Slot {
                        key: key.clone(),
                        guard: SlotGuard::Read(guard),
                        deleted: false,
                    }),
                    Err(StoreError::NoSuchKey) => Ok(Slot {
                        key: key.clone(),
                        guard: SlotGuard::Vacant,
                        deleted: false,
                    }),
                    Err(e) => Err(e),
                }
            };
            match acquired {
                Ok(slot) => access.slots.push(slot),
                Err(e) => {
                    self.finalize(access);
                    return Err(e);
                }
            }
        }
        Ok(access)
    }

    /// Apply deletions, roll back never-committed creation sentinels, and
    /// release guards in reverse acquisition order.
    fn finalize(&self, mut access: Access) {
        while let Some(mut slot) = access.slots.pop() {
            if let SlotGuard::Write(guard) = &mut slot.guard {
                if slot.deleted || guard.value.is_null() {
                    self.keyspace.purge(&slot.key, guard);
                }
            }
        }
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

enum SlotGuard {
    Read(ReadGuard),
    Write(WriteGuard),
    /// A read key that did not exist at acquisition time.
    Vacant,
}

struct Slot {
    key: String,
    guard: SlotGuard,
    deleted: bool,
}

/// The handle a handler works through: locked views of every key its
/// extractor named. No entry reference escapes the handler's critical
/// section — the dispatcher drops the guards when the handler returns.
pub struct Access {
    slots: Vec<Slot>,
}

impl Access {
    fn slot(&self, key: &str) -> Option<&Slot> {
        self.slots
            .binary_search_by(|s| s.key.as_str().cmp(key))
            .ok()
            .map(|i| &self.slots[i])
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Slot> {
        match self.slots.binary_search_by(|s| s.key.as_str().cmp(key)) {
            Ok(i) => Some(&mut self.slots[i]),
            Err(_) => None,
        }
    }

    fn stored(&self, key: &str) -> Option<&Stored> {
        let slot = self.slot(key)?;
        if slot.deleted {
            return None;
        }
        match &slot.guard {
            SlotGuard::Read(g) => Some(g),
            SlotGuard::Write(g) => Some(g),
            SlotGuard::Vacant => None,
        }
    }

    /// Whether the key held a live value when the handler asked.
    pub fn exists(&self, key: &str) -> bool {
        self.stored(key).is_some_and(|s| !s.value.is_null())
    }

    /// The value at a key, or None when absent.
    pub fn value(&self, key: &str) -> Option<&Value> {
        let stored = self.stored(key)?;
        if stored.value.is_null() {
            None
        } else {
            Some(&stored.value)
        }
    }

    /// Mutable access to a write-locked value. A handler asking for a key
    /// its extractor did not declare writable is a bug.
    pub fn value_mut(&mut self, key: &str) -> StoreResult<&mut Value> {
        let slot = self
            .slot_mut(key)
            .ok_or_else(|| internal_no_lock(key))?;
        if slot.deleted {
            return Err(StoreError::NoSuchKey);
        }
        match &mut slot.guard {
            SlotGuard::Write(g) => Ok(&mut g.value),
            _ => Err(internal_no_lock(key)),
        }
    }

    /// Replace the value at a write-locked key, preserving its expiry.
    pub fn set_value(&mut self, key: &str, value: Value) -> StoreResult<()> {
        let slot = self
            .slot_mut(key)
            .ok_or_else(|| internal_no_lock(key))?;
        match &mut slot.guard {
            SlotGuard::Write(g) => {
                g.value = value;
                slot.deleted = false;
                Ok(())
            }
            _ => Err(internal_no_lock(key)),
        }
    }

    pub fn expiry(&self, key: &str) -> Option<u64> {
        self.stored(key).and_then(|s| s.expires_at)
    }

    /// TTL in seconds: -2 when absent, -1 when no expiry.
    pub fn ttl_seconds(&self, key: &str) -> i64 {
        match self.stored(key) {
            Some(s) if !s.value.is_null() => s.ttl_seconds(),
            _ => -2,
        }
    }

    /// TTL in milliseconds: -2 when absent, -1 when no expiry.
    pub fn ttl_millis(&self, key: &str) -> i64 {
        match self.stored(key) {
            Some(s) if !s.value.is_null() => s.ttl_millis(),
            _ => -2,
        }
    }

    pub fn set_expiry(&mut self, key: &str, expires_at: Option<u64>) -> StoreResult<()> {
        let slot = self
            .slot_mut(key)
            .ok_or_else(|| internal_no_lock(key))?;
        match &mut slot.guard {
            SlotGuard::Write(g) => {
                g.expires_at = expires_at;
                Ok(())
            }
            _ => Err(internal_no_lock(key)),
        }
    }

    /// Mark the key for deletion. Returns true if a live value existed.
    pub fn delete(&mut self, key: &str) -> bool {
        let existed = self.exists(key);
        if let Some(slot) = self.slot_mut(key) {
            if let SlotGuard::Write(g) = &mut slot.guard {
                g.value = Value::Null;
                g.expires_at = None;
                slot.deleted = true;
            }
        }
        existed
    }
}

fn internal_no_lock(key: &str) -> StoreError {
    StoreError::Internal(format!("write lock not held for key '{key}'"))
}
