//! Command registry: name → (key extractor, handler, sync flag, categories).
//!
//! Each module contributes a `commands()` vector of specs; the table is
//! assembled once at store construction. Key extractors validate arity and
//! name the keys a command touches so the dispatcher can lock them in
//! canonical order before the handler runs. Aliases are separate entries
//! sharing a handler.

pub mod generic;
pub mod hash;
pub mod list;
pub mod set;
pub mod sorted_set;
pub mod string;

use crate::context::Context;
use crate::error::{StoreError, StoreResult};
use crate::resp::Reply;
use crate::store::Access;
use crate::types::hash::HashValue;
use crate::types::list::ListValue;
use crate::types::set::SetValue;
use crate::types::sorted_set::SortedSet;
use crate::types::Value;
use std::collections::HashMap;

pub const CATEGORY_READ: &str = "read";
pub const CATEGORY_WRITE: &str = "write";
pub const CATEGORY_FAST: &str = "fast";
pub const CATEGORY_SLOW: &str = "slow";
pub const CATEGORY_GENERIC: &str = "generic";
pub const CATEGORY_STRING: &str = "string";
pub const CATEGORY_LIST: &str = "list";
pub const CATEGORY_HASH: &str = "hash";
pub const CATEGORY_SET: &str = "set";
pub const CATEGORY_SORTED_SET: &str = "sortedset";

/// The keys a command reads and writes, as named by its key extractor.
#[derive(Debug, Clone, Default)]
pub struct AccessKeys {
    pub read_keys: Vec<String>,
    pub write_keys: Vec<String>,
}

impl AccessKeys {
    pub fn read(keys: &[String]) -> Self {
        AccessKeys {
            read_keys: keys.to_vec(),
            write_keys: Vec::new(),
        }
    }

    pub fn write(keys: &[String]) -> Self {
        AccessKeys {
            read_keys: Vec::new(),
            write_keys: keys.to_vec(),
        }
    }

    pub fn read_write(read_keys: &[String], write_keys: &[String]) -> Self {
        AccessKeys {
            read_keys: read_keys.to_vec(),
            write_keys: write_keys.to_vec(),
        }
    }
}

pub type KeyExtractor = fn(&[String]) -> StoreResult<AccessKeys>;
pub type Handler = fn(&Context, &[String], &mut Access) -> StoreResult<Reply>;

pub struct CommandSpec {
    /// Lowercase command name.
    pub name: &'static str,
    pub categories: &'static [&'static str],
    pub description: &'static str,
    /// True for commands that mutate state and must be ordered by an
    /// external replication collaborator. The keyspace ignores it.
    pub synchronous: bool,
    pub key_extractor: KeyExtractor,
    pub handler: Handler,
}

pub struct CommandTable {
    commands: HashMap<&'static str, CommandSpec>,
}

impl CommandTable {
    pub fn new() -> Self {
        let mut commands = HashMap::new();
        let all = generic::commands()
            .into_iter()
            .chain(string::commands())
            .chain(list::commands())
            .chain(hash::commands())
            .chain(set::commands())
            .chain(sorted_set::commands());
        for spec in all {
            commands.insert(spec.name, spec);
        }
        CommandTable { commands }
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        CommandTable::new()
    }
}

pub(crate) fn wrong_args(cmd: &str) -> StoreError {
    StoreError::WrongArgCount(cmd.to_string())
}

pub(crate) fn parse_i64(token: &str) -> StoreResult<i64> {
    token.parse().map_err(|_| StoreError::NotInteger)
}

/// Parse a score token. Accepts `inf`/`+inf`/`-inf`/`infinity` spellings;
/// rejects NaN and anything that silently overflows to infinity.
pub(crate) fn parse_f64(token: &str) -> StoreResult<f64> {
    let lower = token.to_lowercase();
    let trimmed = lower.trim_start_matches(['+', '-']);
    if trimmed == "inf" || trimmed == "infinity" {
        return Ok(if lower.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    match token.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(StoreError::NotFloat),
    }
}

/// Read-side typed lookups: Ok(None) when the key is absent, WrongType when
/// it holds a different kind.
pub(crate) fn read_list<'a>(access: &'a Access, key: &str) -> StoreResult<Option<&'a ListValue>> {
    match access.value(key) {
        None => Ok(None),
        Some(Value::List(l)) => Ok(Some(l)),
        Some(_) => Err(StoreError::WrongType),
    }
}

pub(crate) fn read_hash<'a>(access: &'a Access, key: &str) -> StoreResult<Option<&'a HashValue>> {
    match access.value(key) {
        None => Ok(None),
        Some(Value::Hash(h)) => Ok(Some(h)),
        Some(_) => Err(StoreError::WrongType),
    }
}

pub(crate) fn read_set<'a>(access: &'a Access, key: &str) -> StoreResult<Option<&'a SetValue>> {
    match access.value(key) {
        None => Ok(None),
        Some(Value::Set(s)) => Ok(Some(s)),
        Some(_) => Err(StoreError::WrongType),
    }
}

pub(crate) fn read_zset<'a>(access: &'a Access, key: &str) -> StoreResult<Option<&'a SortedSet>> {
    match access.value(key) {
        None => Ok(None),
        Some(Value::SortedSet(z)) => Ok(Some(z)),
        Some(_) => Err(StoreError::WrongType),
    }
}

/// Write-side typed lookups: create an empty container when asked,
/// `NoSuchKey` otherwise.
pub(crate) fn list_entry<'a>(
    access: &'a mut Access,
    key: &str,
    create: bool,
) -> StoreResult<&'a mut ListValue> {
    if !access.exists(key) {
        if !create {
            return Err(StoreError::NoSuchKey);
        }
        access.set_value(key, Value::List(ListValue::new()))?;
    }
    match access.value_mut(key)? {
        Value::List(l) => Ok(l),
        _ => Err(StoreError::WrongType),
    }
}

pub(crate) fn hash_entry<'a>(
    access: &'a mut Access,
    key: &str,
    create: bool,
) -> StoreResult<&'a mut HashValue> {
    if !access.exists(key) {
        if !create {
            return Err(StoreError::NoSuchKey);
        }
        access.set_value(key, Value::Hash(HashValue::new()))?;
    }
    match access.value_mut(key)? {
        Value::Hash(h) => Ok(h),
        _ => Err(StoreError::WrongType),
    }
}

pub(crate) fn set_entry<'a>(
    access: &'a mut Access,
    key: &str,
    create: bool,
) -> StoreResult<&'a mut SetValue> {
    if !access.exists(key) {
        if !create {
            return Err(StoreError::NoSuchKey);
        }
        access.set_value(key, Value::Set(SetValue::new()))?;
    }
    match access.value_mut(key)? {
        Value::Set(s) => Ok(s),
        _ => Err(StoreError::WrongType),
    }
}

pub(crate) fn zset_entry<'a>(
    access: &'a mut Access,
    key: &str,
    create: bool,
) -> StoreResult<&'a mut SortedSet> {
    if !access.exists(key) {
        if !create {
            return Err(StoreError::NoSuchKey);
        }
        access.set_value(key, Value::SortedSet(SortedSet::new()))?;
    }
    match access.value_mut(key)? {
        Value::SortedSet(z) => Ok(z),
        _ => Err(StoreError::WrongType),
    }
}
