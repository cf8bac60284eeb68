//! Snapshot encoding: a byte-exact dump of the keyspace that the embedding
//! host can persist and feed back on startup. File I/O stays with the host;
//! this module only produces and consumes bytes.
//!
//! Layout: `magic "LODE"` + `version u16`, then one record per entry:
//! `{key-len u32, key, kind-tag u8, payload-len u32, payload,
//! expiry-ms u64 (0 = none)}`. All integers big-endian. Sorted-set payloads
//! preserve (score, member) iteration order.

use crate::context::Context;
use crate::error::{StoreError, StoreResult};
use crate::keyspace::now_millis;
use crate::store::Store;
use crate::types::hash::HashValue;
use crate::types::list::ListValue;
use crate::types::set::SetValue;
use crate::types::sorted_set::SortedSet;
use crate::types::{Scalar, Value};
use bytes::{Buf, BufMut};

const MAGIC: &[u8; 4] = b"LODE";
const VERSION: u16 = 1;

const TAG_STR: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_LIST: u8 = 4;
const TAG_HASH: u8 = 5;
const TAG_SET: u8 = 6;
const TAG_ZSET: u8 = 7;

/// Serialize every live entry. Each key's read lock is held only while its
/// record is encoded, so the dump is per-key consistent rather than a
/// global point-in-time cut.
pub async fn dump(store: &Store, ctx: &Context) -> StoreResult<Vec<u8>> {
    let mut out = Vec::new();
    out.put_slice(MAGIC);
    out.put_u16(VERSION);

    for key in store.keyspace().keys() {
        let guard = match store.keyspace().read_lock(ctx, &key).await {
            Ok(guard) => guard,
            // Deleted or expired while we walked the key list.
            Err(StoreError::NoSuchKey) => continue,
            Err(e) => return Err(e),
        };

        let (tag, payload) = encode_value(&guard.value)?;
        out.put_u32(key.len() as u32);
        out.put_slice(key.as_bytes());
        out.put_u8(tag);
        out.put_u32(payload.len() as u32);
        out.put_slice(&payload);
        out.put_u64(guard.expires_at.unwrap_or(0));
    }
    Ok(out)
}

/// Load entries from a dump into the store. Entries whose expiry has
/// already fired are skipped. Existing keys are overwritten.
pub async fn restore(store: &Store, ctx: &Context, mut data: &[u8]) -> StoreResult<usize> {
    let magic = take(&mut data, 4)?;
    if magic != MAGIC {
        return Err(corrupt("bad magic"));
    }
    let version = read_u16(&mut data)?;
    if version != VERSION {
        return Err(corrupt(&format!("unsupported version {version}")));
    }

    let now = now_millis();
    let mut loaded = 0usize;
    while data.has_remaining() {
        let key_len = read_u32(&mut data)? as usize;
        let key = String::from_utf8(take(&mut data, key_len)?.to_vec())
            .map_err(|_| corrupt("key is not UTF-8"))?;
        let tag = read_u8(&mut data)?;
        let payload_len = read_u32(&mut data)? as usize;
        let payload = take(&mut data, payload_len)?;
        let expiry = read_u64(&mut data)?;

        if expiry != 0 && expiry <= now {
            continue;
        }

        let value = decode_value(tag, payload)?;
        let (mut guard, _) = store.keyspace().write_lock_or_create(ctx, &key).await?;
        guard.value = value;
        guard.expires_at = if expiry == 0 { None } else { Some(expiry) };
        loaded += 1;
    }
    Ok(loaded)
}

fn encode_value(value: &Value) -> StoreResult<(u8, Vec<u8>)> {
    let mut buf = Vec::new();
    let tag = match value {
        Value::Str(bytes) => {
            buf.put_slice(bytes);
            TAG_STR
        }
        Value::Int(n) => {
            buf.put_i64(*n);
            TAG_INT
        }
        Value::Float(f) => {
            buf.put_f64(*f);
            TAG_FLOAT
        }
        Value::List(list) => {
            buf.put_u32(list.len() as u32);
            for element in list.iter() {
                buf.put_u32(element.len() as u32);
                buf.put_slice(element);
            }
            TAG_LIST
        }
        Value::Hash(hash) => {
            buf.put_u32(hash.len() as u32);
            for (field, scalar) in hash.iter() {
                buf.put_u32(field.len() as u32);
                buf.put_slice(field.as_bytes());
                encode_scalar(&mut buf, scalar);
            }
            TAG_HASH
        }
        Value::Set(set) => {
            buf.put_u32(set.len() as u32);
            for member in set.iter() {
                buf.put_u32(member.len() as u32);
                buf.put_slice(member);
            }
            TAG_SET
        }
        Value::SortedSet(zset) => {
            buf.put_u32(zset.len() as u32);
            for (member, score) in zset.iter() {
                buf.put_f64(score);
                buf.put_u32(member.len() as u32);
                buf.put_slice(member);
            }
            TAG_ZSET
        }
        Value::Null => {
            return Err(StoreError::Internal(
                "creation sentinel reached the snapshot encoder".to_string(),
            ))
        }
    };
    Ok((tag, buf))
}

fn decode_value(tag: u8, mut payload: &[u8]) -> StoreResult<Value> {
    let value = match tag {
        TAG_STR => Value::Str(payload.to_vec()),
        TAG_INT => {
            if payload.remaining() < 8 {
                return Err(corrupt("short integer payload"));
            }
            Value::Int(payload.get_i64())
        }
        TAG_FLOAT => {
            if payload.remaining() < 8 {
                return Err(corrupt("short float payload"));
            }
            Value::Float(payload.get_f64())
        }
        TAG_LIST => {
            let count = read_u32(&mut payload)?;
            let mut list = ListValue::new();
            for _ in 0..count {
                let len = read_u32(&mut payload)? as usize;
                list.push_back(take(&mut payload, len)?.to_vec());
            }
            Value::List(list)
        }
        TAG_HASH => {
            let count = read_u32(&mut payload)?;
            let mut hash = HashValue::new();
            for _ in 0..count {
                let len = read_u32(&mut payload)? as usize;
                let field = String::from_utf8(take(&mut payload, len)?.to_vec())
                    .map_err(|_| corrupt("hash field is not UTF-8"))?;
                let scalar = decode_scalar(&mut payload)?;
                hash.set(field, scalar);
            }
            Value::Hash(hash)
        }
        TAG_SET => {
            let count = read_u32(&mut payload)?;
            let mut set = SetValue::new();
            for _ in 0..count {
                let len = read_u32(&mut payload)? as usize;
                set.add(take(&mut payload, len)?.to_vec());
            }
            Value::Set(set)
        }
        TAG_ZSET => {
            let count = read_u32(&mut payload)?;
            let mut members = Vec::with_capacity(count as usize);
            for _ in 0..count {
                if payload.remaining() < 8 {
                    return Err(corrupt("short sorted-set record"));
                }
                let score = payload.get_f64();
                let len = read_u32(&mut payload)? as usize;
                members.push((take(&mut payload, len)?.to_vec(), score));
            }
            Value::SortedSet(SortedSet::with_members(members))
        }
        other => return Err(corrupt(&format!("unknown kind tag {other}"))),
    };
    Ok(value)
}

fn encode_scalar(buf: &mut Vec<u8>, scalar: &Scalar) {
    match scalar {
        Scalar::Str(bytes) => {
            buf.put_u8(TAG_STR);
            buf.put_u32(bytes.len() as u32);
            buf.put_slice(bytes);
        }
        Scalar::Int(n) => {
            buf.put_u8(TAG_INT);
            buf.put_i64(*n);
        }
        Scalar::Float(f) => {
            buf.put_u8(TAG_FLOAT);
            buf.put_f64(*f);
        }
    }
}

fn decode_scalar(payload: &mut &[u8]) -> StoreResult<Scalar> {
    match read_u8(payload)? {
        TAG_STR => {
            let len = read_u32(payload)? as usize;
            Ok(Scalar::Str(take(payload, len)?.to_vec()))
        }
        TAG_INT => {
            if payload.remaining() < 8 {
                return Err(corrupt("short scalar payload"));
            }
            Ok(Scalar::Int(payload.get_i64()))
        }
        TAG_FLOAT => {
            if payload.remaining() < 8 {
                return Err(corrupt("short scalar payload"));
            }
            Ok(Scalar::Float(payload.get_f64()))
        }
        other => Err(corrupt(&format!("unknown scalar tag {other}"))),
    }
}

fn corrupt(detail: &str) -> StoreError {
    StoreError::Internal(format!("snapshot: {detail}"))
}

fn take<'a>(data: &mut &'a [u8], len: usize) -> StoreResult<&'a [u8]> {
    if data.remaining() < len {
        return Err(corrupt("truncated record"));
    }
    let (head, tail) = data.split_at(len);
    *data = tail;
    Ok(head)
}

fn read_u8(data: &mut &[u8]) -> StoreResult<u8> {
    if !data.has_remaining() {
        return Err(corrupt("truncated record"));
    }
    Ok(data.get_u8())
}

fn read_u16(data: &mut &[u8]) -> StoreResult<u16> {
    if data.remaining() < 2 {
        return Err(corrupt("truncated record"));
    }
    Ok(data.get_u16())
}

fn read_u32(data: &mut &[u8]) -> StoreResult<u32> {
    if data.remaining() < 4 {
        return Err(corrupt("truncated record"));
    }
    Ok(data.get_u32())
}

fn read_u64(data: &mut &[u8]) -> StoreResult<u64> {
    if data.remaining() < 8 {
        return Err(corrupt("truncated record"));
    }
    Ok(data.get_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{SetOptions, ZAddOptions};
    use crate::config::Config;

    #[tokio::test]
    async fn test_round_trip() {
        let source = Store::new(Config::default());
        let ctx = Context::background();

        source.set("greeting", "hello", SetOptions::default()).await.unwrap();
        source.set("count", "42", SetOptions::default()).await.unwrap();
        source.rpush("queue", &["a", "b", "c"]).await.unwrap();
        source.hset("profile", &[("name", "ada"), ("age", "36")]).await.unwrap();
        source.sadd("tags", &["x", "y"]).await.unwrap();
        source
            .zadd(
                "board",
                &[(1.5, "one"), (2.5, "two"), (f64::INFINITY, "top")],
                ZAddOptions::default(),
            )
            .await
            .unwrap();

        let bytes = dump(&source, &ctx).await.unwrap();

        let target = Store::new(Config::default());
        let loaded = restore(&target, &ctx, &bytes).await.unwrap();
        assert_eq!(loaded, 6);

        assert_eq!(target.get("greeting").await.unwrap().as_deref(), Some("hello"));
        assert_eq!(target.get("count").await.unwrap().as_deref(), Some("42"));
        assert_eq!(
            target.lrange("queue", 0, -1).await.unwrap(),
            vec!["a", "b", "c"]
        );
        assert_eq!(target.hget("profile", "name").await.unwrap().as_deref(), Some("ada"));
        assert_eq!(target.scard("tags").await.unwrap(), 2);
        assert_eq!(
            target.zrange("board", 0, -1).await.unwrap(),
            vec!["one", "two", "top"]
        );
        assert_eq!(target.zscore("board", "top").await.unwrap().as_deref(), Some("inf"));

        // A second dump of the restored store is byte-identical modulo key
        // order, so compare after a round of sorting through replies instead
        // of raw bytes.
        let second = dump(&target, &ctx).await.unwrap();
        assert_eq!(second.len(), bytes.len());
    }

    #[tokio::test]
    async fn test_rejects_garbage() {
        let store = Store::new(Config::default());
        let ctx = Context::background();
        assert!(restore(&store, &ctx, b"not a snapshot").await.is_err());

        let mut truncated = Vec::new();
        truncated.put_slice(MAGIC);
        truncated.put_u16(VERSION);
        truncated.put_u32(5);
        truncated.put_slice(b"ab");
        assert!(restore(&store, &ctx, &truncated).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_entries_are_skipped() {
        let source = Store::new(Config::default());
        let ctx = Context::background();
        source.set("stale", "v", SetOptions { px: Some(30), ..Default::default() }).await.unwrap();
        source.set("fresh", "v", SetOptions::default()).await.unwrap();

        let bytes = dump(&source, &ctx).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(60)).await;

        let target = Store::new(Config::default());
        let loaded = restore(&target, &ctx, &bytes).await.unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(target.get("stale").await.unwrap(), None);
        assert_eq!(target.get("fresh").await.unwrap().as_deref(), Some("v"));
    }
}
