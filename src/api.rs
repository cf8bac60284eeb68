//! Typed API surface: in-process callers get typed methods that encode a
//! command array, run it through the same dispatcher remote clients use,
//! and decode the structured reply.

use crate::context::Context;
use crate::error::{StoreError, StoreResult};
use crate::resp::Reply;
use crate::store::Store;

/// Options for [`Store::set`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Only set if the key does not exist.
    pub nx: bool,
    /// Only set if the key exists.
    pub xx: bool,
    /// Return the old value.
    pub get: bool,
    /// Expire after this many seconds.
    pub ex: Option<i64>,
    /// Expire after this many milliseconds.
    pub px: Option<i64>,
}

/// Options for the EXPIRE family.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpireOptions {
    pub nx: bool,
    pub xx: bool,
    pub gt: bool,
    pub lt: bool,
}

impl ExpireOptions {
    fn push_flags(&self, cmd: &mut Vec<String>) {
        if self.nx {
            cmd.push("NX".to_string());
        }
        if self.xx {
            cmd.push("XX".to_string());
        }
        if self.gt {
            cmd.push("GT".to_string());
        }
        if self.lt {
            cmd.push("LT".to_string());
        }
    }
}

/// Options for [`Store::zadd`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ZAddOptions {
    pub nx: bool,
    pub xx: bool,
    pub gt: bool,
    pub lt: bool,
    /// Count updated members as well as added ones.
    pub ch: bool,
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn expect_ok(reply: Reply) -> StoreResult<()> {
    match reply {
        Reply::Simple(_) => Ok(()),
        other => Err(unexpected(&other)),
    }
}

fn as_int(reply: Reply) -> StoreResult<i64> {
    match reply {
        Reply::Integer(n) => Ok(n),
        other => Err(unexpected(&other)),
    }
}

fn as_opt_string(reply: Reply) -> StoreResult<Option<String>> {
    match reply {
        Reply::Bulk(Some(data)) => Ok(Some(String::from_utf8_lossy(&data).into_owned())),
        Reply::Bulk(None) | Reply::Array(None) => Ok(None),
        Reply::Simple(s) => Ok(Some(s)),
        other => Err(unexpected(&other)),
    }
}

fn as_string_vec(reply: Reply) -> StoreResult<Vec<String>> {
    match reply {
        Reply::Array(Some(items)) => items
            .into_iter()
            .map(|item| {
                as_opt_string(item).map(|s| s.unwrap_or_default())
            })
            .collect(),
        Reply::Array(None) => Ok(Vec::new()),
        other => Err(unexpected(&other)),
    }
}

fn as_pairs(reply: Reply) -> StoreResult<Vec<(String, String)>> {
    let flat = as_string_vec(reply)?;
    Ok(flat
        .chunks(2)
        .filter(|pair| pair.len() == 2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

fn unexpected(reply: &Reply) -> StoreError {
    StoreError::Internal(format!("unexpected reply shape: {reply:?}"))
}

impl Store {
    async fn call(&self, cmd: Vec<String>) -> StoreResult<Reply> {
        self.execute(&Context::background(), &cmd).await
    }

    /// SET: create or replace the value at a key. Returns the old value
    /// when `options.get` is set.
    pub async fn set(&self, key: &str, value: &str, options: SetOptions) -> StoreResult<Option<String>> {
        let mut cmd = args(&["SET", key, value]);
        if options.nx {
            cmd.push("NX".to_string());
        }
        if options.xx {
            cmd.push("XX".to_string());
        }
        if options.get {
            cmd.push("GET".to_string());
        }
        if let Some(ex) = options.ex {
            cmd.push("EX".to_string());
            cmd.push(ex.to_string());
        } else if let Some(px) = options.px {
            cmd.push("PX".to_string());
            cmd.push(px.to_string());
        }
        let reply = self.call(cmd).await?;
        as_opt_string(reply)
    }

    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        as_opt_string(self.call(args(&["GET", key])).await?)
    }

    pub async fn mset(&self, pairs: &[(&str, &str)]) -> StoreResult<()> {
        let mut cmd = args(&["MSET"]);
        for (key, value) in pairs {
            cmd.push(key.to_string());
            cmd.push(value.to_string());
        }
        expect_ok(self.call(cmd).await?)
    }

    pub async fn getdel(&self, key: &str) -> StoreResult<Option<String>> {
        as_opt_string(self.call(args(&["GETDEL", key])).await?)
    }

    pub async fn strlen(&self, key: &str) -> StoreResult<i64> {
        as_int(self.call(args(&["STRLEN", key])).await?)
    }

    pub async fn append(&self, key: &str, value: &str) -> StoreResult<i64> {
        as_int(self.call(args(&["APPEND", key, value])).await?)
    }

    pub async fn incr(&self, key: &str) -> StoreResult<i64> {
        as_int(self.call(args(&["INCR", key])).await?)
    }

    pub async fn decr(&self, key: &str) -> StoreResult<i64> {
        as_int(self.call(args(&["DECR", key])).await?)
    }

    pub async fn incr_by(&self, key: &str, delta: i64) -> StoreResult<i64> {
        as_int(self.call(args(&["INCRBY", key, &delta.to_string()])).await?)
    }

    pub async fn incr_by_float(&self, key: &str, delta: f64) -> StoreResult<String> {
        let reply = self.call(args(&["INCRBYFLOAT", key, &delta.to_string()])).await?;
        as_opt_string(reply)?.ok_or_else(|| StoreError::Internal("nil INCRBYFLOAT reply".into()))
    }

    pub async fn getrange(&self, key: &str, start: i64, end: i64) -> StoreResult<String> {
        let cmd = args(&["GETRANGE", key, &start.to_string(), &end.to_string()]);
        Ok(as_opt_string(self.call(cmd).await?)?.unwrap_or_default())
    }

    pub async fn del(&self, keys: &[&str]) -> StoreResult<i64> {
        let mut cmd = args(&["DEL"]);
        cmd.extend(keys.iter().map(|k| k.to_string()));
        as_int(self.call(cmd).await?)
    }

    pub async fn exists(&self, keys: &[&str]) -> StoreResult<i64> {
        let mut cmd = args(&["EXISTS"]);
        cmd.extend(keys.iter().map(|k| k.to_string()));
        as_int(self.call(cmd).await?)
    }

    pub async fn key_type(&self, key: &str) -> StoreResult<String> {
        as_opt_string(self.call(args(&["TYPE", key])).await?)?
            .ok_or_else(|| StoreError::Internal("nil TYPE reply".into()))
    }

    pub async fn ttl(&self, key: &str) -> StoreResult<i64> {
        as_int(self.call(args(&["TTL", key])).await?)
    }

    pub async fn pttl(&self, key: &str) -> StoreResult<i64> {
        as_int(self.call(args(&["PTTL", key])).await?)
    }

    /// EXPIRE: returns true when the expiry was applied.
    pub async fn expire(&self, key: &str, seconds: i64, options: ExpireOptions) -> StoreResult<bool> {
        let mut cmd = args(&["EXPIRE", key, &seconds.to_string()]);
        options.push_flags(&mut cmd);
        Ok(as_int(self.call(cmd).await?)? == 1)
    }

    pub async fn persist(&self, key: &str) -> StoreResult<bool> {
        Ok(as_int(self.call(args(&["PERSIST", key])).await?)? == 1)
    }

    pub async fn lpush(&self, key: &str, elements: &[&str]) -> StoreResult<i64> {
        let mut cmd = args(&["LPUSH", key]);
        cmd.extend(elements.iter().map(|e| e.to_string()));
        as_int(self.call(cmd).await?)
    }

    pub async fn rpush(&self, key: &str, elements: &[&str]) -> StoreResult<i64> {
        let mut cmd = args(&["RPUSH", key]);
        cmd.extend(elements.iter().map(|e| e.to_string()));
        as_int(self.call(cmd).await?)
    }

    pub async fn lpop(&self, key: &str) -> StoreResult<Option<String>> {
        as_opt_string(self.call(args(&["LPOP", key])).await?)
    }

    pub async fn rpop(&self, key: &str) -> StoreResult<Option<String>> {
        as_opt_string(self.call(args(&["RPOP", key])).await?)
    }

    pub async fn llen(&self, key: &str) -> StoreResult<i64> {
        as_int(self.call(args(&["LLEN", key])).await?)
    }

    pub async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        let cmd = args(&["LRANGE", key, &start.to_string(), &stop.to_string()]);
        as_string_vec(self.call(cmd).await?)
    }

    pub async fn lindex(&self, key: &str, index: i64) -> StoreResult<Option<String>> {
        as_opt_string(self.call(args(&["LINDEX", key, &index.to_string()])).await?)
    }

    pub async fn lset(&self, key: &str, index: i64, element: &str) -> StoreResult<()> {
        expect_ok(self.call(args(&["LSET", key, &index.to_string(), element])).await?)
    }

    pub async fn ltrim(&self, key: &str, start: i64, stop: i64) -> StoreResult<()> {
        expect_ok(self.call(args(&["LTRIM", key, &start.to_string(), &stop.to_string()])).await?)
    }

    pub async fn lrem(&self, key: &str, count: i64, element: &str) -> StoreResult<i64> {
        as_int(self.call(args(&["LREM", key, &count.to_string(), element])).await?)
    }

    /// LMOVE: `from_left`/`to_left` pick the end popped and pushed.
    pub async fn lmove(
        &self,
        source: &str,
        destination: &str,
        from_left: bool,
        to_left: bool,
    ) -> StoreResult<Option<String>> {
        let from = if from_left { "LEFT" } else { "RIGHT" };
        let to = if to_left { "LEFT" } else { "RIGHT" };
        as_opt_string(self.call(args(&["LMOVE", source, destination, from, to])).await?)
    }

    pub async fn hset(&self, key: &str, pairs: &[(&str, &str)]) -> StoreResult<i64> {
        let mut cmd = args(&["HSET", key]);
        for (field, value) in pairs {
            cmd.push(field.to_string());
            cmd.push(value.to_string());
        }
        as_int(self.call(cmd).await?)
    }

    pub async fn hsetnx(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        Ok(as_int(self.call(args(&["HSETNX", key, field, value])).await?)? == 1)
    }

    pub async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        as_opt_string(self.call(args(&["HGET", key, field])).await?)
    }

    pub async fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        as_pairs(self.call(args(&["HGETALL", key])).await?)
    }

    pub async fn hdel(&self, key: &str, fields: &[&str]) -> StoreResult<i64> {
        let mut cmd = args(&["HDEL", key]);
        cmd.extend(fields.iter().map(|f| f.to_string()));
        as_int(self.call(cmd).await?)
    }

    pub async fn hexists(&self, key: &str, field: &str) -> StoreResult<bool> {
        Ok(as_int(self.call(args(&["HEXISTS", key, field])).await?)? == 1)
    }

    pub async fn hlen(&self, key: &str) -> StoreResult<i64> {
        as_int(self.call(args(&["HLEN", key])).await?)
    }

    pub async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        as_int(self.call(args(&["HINCRBY", key, field, &delta.to_string()])).await?)
    }

    pub async fn hincr_by_float(&self, key: &str, field: &str, delta: f64) -> StoreResult<String> {
        let reply = self.call(args(&["HINCRBYFLOAT", key, field, &delta.to_string()])).await?;
        as_opt_string(reply)?.ok_or_else(|| StoreError::Internal("nil HINCRBYFLOAT reply".into()))
    }

    pub async fn sadd(&self, key: &str, members: &[&str]) -> StoreResult<i64> {
        let mut cmd = args(&["SADD", key]);
        cmd.extend(members.iter().map(|m| m.to_string()));
        as_int(self.call(cmd).await?)
    }

    pub async fn srem(&self, key: &str, members: &[&str]) -> StoreResult<i64> {
        let mut cmd = args(&["SREM", key]);
        cmd.extend(members.iter().map(|m| m.to_string()));
        as_int(self.call(cmd).await?)
    }

    pub async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        as_string_vec(self.call(args(&["SMEMBERS", key])).await?)
    }

    pub async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        Ok(as_int(self.call(args(&["SISMEMBER", key, member])).await?)? == 1)
    }

    pub async fn scard(&self, key: &str) -> StoreResult<i64> {
        as_int(self.call(args(&["SCARD", key])).await?)
    }

    pub async fn smove(&self, source: &str, destination: &str, member: &str) -> StoreResult<bool> {
        Ok(as_int(self.call(args(&["SMOVE", source, destination, member])).await?)? == 1)
    }

    pub async fn sunion(&self, keys: &[&str]) -> StoreResult<Vec<String>> {
        let mut cmd = args(&["SUNION"]);
        cmd.extend(keys.iter().map(|k| k.to_string()));
        as_string_vec(self.call(cmd).await?)
    }

    pub async fn sinter(&self, keys: &[&str]) -> StoreResult<Vec<String>> {
        let mut cmd = args(&["SINTER"]);
        cmd.extend(keys.iter().map(|k| k.to_string()));
        as_string_vec(self.call(cmd).await?)
    }

    pub async fn sdiff(&self, keys: &[&str]) -> StoreResult<Vec<String>> {
        let mut cmd = args(&["SDIFF"]);
        cmd.extend(keys.iter().map(|k| k.to_string()));
        as_string_vec(self.call(cmd).await?)
    }

    /// ZADD: returns the number of added members (or added+updated with
    /// `options.ch`).
    pub async fn zadd(
        &self,
        key: &str,
        members: &[(f64, &str)],
        options: ZAddOptions,
    ) -> StoreResult<i64> {
        let mut cmd = args(&["ZADD", key]);
        if options.nx {
            cmd.push("NX".to_string());
        }
        if options.xx {
            cmd.push("XX".to_string());
        }
        if options.gt {
            cmd.push("GT".to_string());
        }
        if options.lt {
            cmd.push("LT".to_string());
        }
        if options.ch {
            cmd.push("CH".to_string());
        }
        for (score, member) in members {
            cmd.push(crate::resp::format_score(*score));
            cmd.push(member.to_string());
        }
        as_int(self.call(cmd).await?)
    }

    pub async fn zcard(&self, key: &str) -> StoreResult<i64> {
        as_int(self.call(args(&["ZCARD", key])).await?)
    }

    pub async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<String>> {
        as_opt_string(self.call(args(&["ZSCORE", key, member])).await?)
    }

    pub async fn zrem(&self, key: &str, members: &[&str]) -> StoreResult<i64> {
        let mut cmd = args(&["ZREM", key]);
        cmd.extend(members.iter().map(|m| m.to_string()));
        as_int(self.call(cmd).await?)
    }

    pub async fn zincr_by(&self, key: &str, increment: f64, member: &str) -> StoreResult<String> {
        let cmd = args(&["ZINCRBY", key, &crate::resp::format_score(increment), member]);
        as_opt_string(self.call(cmd).await?)?
            .ok_or_else(|| StoreError::Internal("nil ZINCRBY reply".into()))
    }

    pub async fn zrank(&self, key: &str, member: &str) -> StoreResult<Option<i64>> {
        match self.call(args(&["ZRANK", key, member])).await? {
            Reply::Integer(n) => Ok(Some(n)),
            Reply::Bulk(None) => Ok(None),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn zcount(&self, key: &str, min: &str, max: &str) -> StoreResult<i64> {
        as_int(self.call(args(&["ZCOUNT", key, min, max])).await?)
    }

    pub async fn zrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        let cmd = args(&["ZRANGE", key, &start.to_string(), &stop.to_string()]);
        as_string_vec(self.call(cmd).await?)
    }

    /// ZRANGE ... WITHSCORES, decoded into (member, score) pairs.
    pub async fn zrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<(String, String)>> {
        let cmd = args(&[
            "ZRANGE",
            key,
            &start.to_string(),
            &stop.to_string(),
            "WITHSCORES",
        ]);
        as_pairs(self.call(cmd).await?)
    }

    pub async fn zrange_by_score(&self, key: &str, min: &str, max: &str) -> StoreResult<Vec<String>> {
        as_string_vec(self.call(args(&["ZRANGEBYSCORE", key, min, max])).await?)
    }

    pub async fn zpopmin(&self, key: &str, count: i64) -> StoreResult<Vec<(String, String)>> {
        as_pairs(self.call(args(&["ZPOPMIN", key, &count.to_string()])).await?)
    }

    pub async fn zpopmax(&self, key: &str, count: i64) -> StoreResult<Vec<(String, String)>> {
        as_pairs(self.call(args(&["ZPOPMAX", key, &count.to_string()])).await?)
    }

    /// ZUNIONSTORE with optional weights; returns the stored cardinality.
    pub async fn zunionstore(
        &self,
        destination: &str,
        keys: &[&str],
        weights: Option<&[f64]>,
        aggregate: Option<&str>,
    ) -> StoreResult<i64> {
        self.zsetop_store("ZUNIONSTORE", destination, keys, weights, aggregate).await
    }

    pub async fn zinterstore(
        &self,
        destination: &str,
        keys: &[&str],
        weights: Option<&[f64]>,
        aggregate: Option<&str>,
    ) -> StoreResult<i64> {
        self.zsetop_store("ZINTERSTORE", destination, keys, weights, aggregate).await
    }

    pub async fn zdiffstore(&self, destination: &str, keys: &[&str]) -> StoreResult<i64> {
        let mut cmd = args(&["ZDIFFSTORE", destination, &keys.len().to_string()]);
        cmd.extend(keys.iter().map(|k| k.to_string()));
        as_int(self.call(cmd).await?)
    }

    async fn zsetop_store(
        &self,
        name: &str,
        destination: &str,
        keys: &[&str],
        weights: Option<&[f64]>,
        aggregate: Option<&str>,
    ) -> StoreResult<i64> {
        let mut cmd = args(&[name, destination, &keys.len().to_string()]);
        cmd.extend(keys.iter().map(|k| k.to_string()));
        if let Some(weights) = weights {
            cmd.push("WEIGHTS".to_string());
            cmd.extend(weights.iter().map(|w| crate::resp::format_score(*w)));
        }
        if let Some(aggregate) = aggregate {
            cmd.push("AGGREGATE".to_string());
            cmd.push(aggregate.to_string());
        }
        as_int(self.call(cmd).await?)
    }
}
