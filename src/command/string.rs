//! String commands. Scalars are adapted from the raw token on write, so an
//! integer-looking SET stores an integer and INCR works on it directly.

use crate::command::{
    parse_f64, parse_i64, wrong_args, AccessKeys, CommandSpec, CATEGORY_FAST, CATEGORY_READ,
    CATEGORY_SLOW, CATEGORY_STRING, CATEGORY_WRITE,
};
use crate::context::Context;
use crate::error::{StoreError, StoreResult};
use crate::keyspace::now_millis;
use crate::resp::{format_score, Reply};
use crate::store::Access;
use crate::types::{adapt_token, Value};

/// Longest value a string may grow to: 512 MB.
const MAX_STRING_SIZE: usize = 512 * 1024 * 1024;

fn set_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 3 {
        return Err(wrong_args("set"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn get_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 2 {
        return Err(wrong_args("get"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn mset_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 3 || (args.len() - 1) % 2 != 0 {
        return Err(wrong_args("mset"));
    }
    let keys: Vec<String> = args[1..].iter().step_by(2).cloned().collect();
    Ok(AccessKeys::write(&keys))
}

fn getdel_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 2 {
        return Err(wrong_args("getdel"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn strlen_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 2 {
        return Err(wrong_args("strlen"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn getrange_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 4 {
        return Err(wrong_args("getrange"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn setrange_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 4 {
        return Err(wrong_args("setrange"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn append_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 3 {
        return Err(wrong_args("append"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn incr_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 2 {
        return Err(wrong_args("incr"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn incrby_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 3 {
        return Err(wrong_args("incrby"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

/// Scalar bytes at a key; WrongType when a container lives there.
fn read_scalar(access: &Access, key: &str) -> StoreResult<Option<Vec<u8>>> {
    match access.value(key) {
        None => Ok(None),
        Some(v) => v.scalar_bytes().map(Some).ok_or(StoreError::WrongType),
    }
}

fn scalar_as_i64(value: &Value) -> StoreResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Str(b) => std::str::from_utf8(b)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(StoreError::NotInteger),
        Value::Float(_) => Err(StoreError::NotInteger),
        _ => Err(StoreError::WrongType),
    }
}

fn scalar_as_f64(value: &Value) -> StoreResult<f64> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        Value::Str(b) => std::str::from_utf8(b)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(StoreError::NotFloat),
        _ => Err(StoreError::WrongType),
    }
}

fn cmd_set(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let key = &args[1];
    let value = &args[2];

    let mut nx = false;
    let mut xx = false;
    let mut get = false;
    let mut expire_at: Option<u64> = None;

    let mut i = 3;
    while i < args.len() {
        match args[i].to_lowercase().as_str() {
            "nx" => nx = true,
            "xx" => xx = true,
            "get" => get = true,
            opt @ ("ex" | "px" | "exat" | "pxat") => {
                if expire_at.is_some() {
                    return Err(StoreError::SyntaxError);
                }
                let amount = args.get(i + 1).ok_or(StoreError::SyntaxError)?;
                let amount = parse_i64(amount)?;
                if (opt == "ex" || opt == "px") && amount <= 0 {
                    return Err(StoreError::Generic(
                        "invalid expire time in 'set' command".to_string(),
                    ));
                }
                expire_at = Some(match opt {
                    "ex" => now_millis().saturating_add_signed(amount.saturating_mul(1000)),
                    "px" => now_millis().saturating_add_signed(amount),
                    "exat" => amount.saturating_mul(1000).max(0) as u64,
                    _ => amount.max(0) as u64,
                });
                i += 1;
            }
            _ => return Err(StoreError::SyntaxError),
        }
        i += 1;
    }
    if nx && xx {
        return Err(StoreError::OptionConflict(
            "NX and XX options at the same time are not compatible".to_string(),
        ));
    }

    let exists = access.exists(key);
    let old = if get { read_scalar(access, key)? } else { None };

    if (nx && exists) || (xx && !exists) {
        return Ok(match old {
            Some(bytes) => Reply::bulk(bytes),
            None => Reply::nil(),
        });
    }

    access.set_value(key, adapt_token(value).into())?;
    if let Some(at) = expire_at {
        access.set_expiry(key, Some(at))?;
    }

    Ok(if get {
        match old {
            Some(bytes) => Reply::bulk(bytes),
            None => Reply::nil(),
        }
    } else {
        Reply::ok()
    })
}

fn cmd_get(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    Ok(match read_scalar(access, &args[1])? {
        Some(bytes) => Reply::bulk(bytes),
        None => Reply::nil(),
    })
}

fn cmd_mset(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    for pair in args[1..].chunks(2) {
        access.set_value(&pair[0], adapt_token(&pair[1]).into())?;
    }
    Ok(Reply::ok())
}

fn cmd_getdel(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let key = &args[1];
    let old = read_scalar(access, key)?;
    if old.is_some() {
        access.delete(key);
    }
    Ok(match old {
        Some(bytes) => Reply::bulk(bytes),
        None => Reply::nil(),
    })
}

fn cmd_strlen(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let len = read_scalar(access, &args[1])?.map_or(0, |b| b.len());
    Ok(Reply::integer(len as i64))
}

/// Byte range with negative-index notation, clamped like the wire protocol
/// expects.
fn substring(data: &[u8], start: i64, end: i64) -> Vec<u8> {
    let len = data.len() as i64;
    if len == 0 {
        return Vec::new();
    }
    if start < 0 && end < 0 && start > end {
        return Vec::new();
    }

    let mut s = if start < 0 { len + start } else { start };
    let mut e = if end < 0 { len + end } else { end };
    if s < 0 {
        s = 0;
    }
    if e < 0 {
        e = 0;
    }
    if e >= len {
        e = len - 1;
    }
    if s > e {
        return Vec::new();
    }
    data[s as usize..=e as usize].to_vec()
}

fn cmd_getrange(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let start = parse_i64(&args[2])?;
    let end = parse_i64(&args[3])?;
    let data = read_scalar(access, &args[1])?.unwrap_or_default();
    Ok(Reply::bulk(substring(&data, start, end)))
}

fn cmd_setrange(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let key = &args[1];
    let offset = parse_i64(&args[2])?;
    if offset < 0 {
        return Err(StoreError::Generic("offset is out of range".to_string()));
    }
    let offset = offset as usize;
    let patch = args[3].as_bytes();

    let mut data = read_scalar(access, key)?.unwrap_or_default();
    let needed = offset + patch.len();
    if needed > MAX_STRING_SIZE {
        return Err(StoreError::LimitExceeded(
            "string exceeds maximum allowed size (512MB)".to_string(),
        ));
    }
    if needed > data.len() {
        data.resize(needed, 0);
    }
    data[offset..offset + patch.len()].copy_from_slice(patch);
    let len = data.len();
    access.set_value(key, Value::Str(data))?;
    Ok(Reply::integer(len as i64))
}

fn cmd_append(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let key = &args[1];
    let mut data = read_scalar(access, key)?.unwrap_or_default();
    if data.len() + args[2].len() > MAX_STRING_SIZE {
        return Err(StoreError::LimitExceeded(
            "string exceeds maximum allowed size (512MB)".to_string(),
        ));
    }
    data.extend_from_slice(args[2].as_bytes());
    let len = data.len();
    access.set_value(key, Value::Str(data))?;
    Ok(Reply::integer(len as i64))
}

fn incr_decr(access: &mut Access, key: &str, delta: i64) -> StoreResult<Reply> {
    let current = match access.value(key) {
        Some(v) => scalar_as_i64(v)?,
        None => 0,
    };
    let new_val = current.checked_add(delta).ok_or_else(|| {
        StoreError::Generic("increment or decrement would overflow".to_string())
    })?;
    access.set_value(key, Value::Int(new_val))?;
    Ok(Reply::integer(new_val))
}

fn cmd_incr(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    incr_decr(access, &args[1], 1)
}

fn cmd_decr(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    incr_decr(access, &args[1], -1)
}

fn cmd_incrby(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let delta = parse_i64(&args[2])?;
    incr_decr(access, &args[1], delta)
}

fn cmd_decrby(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let delta = parse_i64(&args[2])?;
    incr_decr(access, &args[1], delta.checked_neg().ok_or(StoreError::NotInteger)?)
}

fn cmd_incrbyfloat(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let key = &args[1];
    let delta = parse_f64(&args[2])?;
    let current = match access.value(key) {
        Some(v) => scalar_as_f64(v)?,
        None => 0.0,
    };
    let new_val = current + delta;
    if new_val.is_nan() || new_val.is_infinite() {
        return Err(StoreError::Generic(
            "increment would produce NaN or Infinity".to_string(),
        ));
    }
    access.set_value(key, Value::Float(new_val))?;
    Ok(Reply::bulk(format_score(new_val).into_bytes()))
}

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "set",
            categories: &[CATEGORY_STRING, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(SET key value [NX | XX] [GET] [EX seconds | PX milliseconds | EXAT unix-seconds | PXAT unix-milliseconds]) Sets the value at the key.",
            synchronous: true,
            key_extractor: set_keys,
            handler: cmd_set,
        },
        CommandSpec {
            name: "get",
            categories: &[CATEGORY_STRING, CATEGORY_READ, CATEGORY_FAST],
            description: "(GET key) Returns the string value at the key.",
            synchronous: false,
            key_extractor: get_keys,
            handler: cmd_get,
        },
        CommandSpec {
            name: "mset",
            categories: &[CATEGORY_STRING, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(MSET key value [key value ...]) Sets multiple keys in one atomic step.",
            synchronous: true,
            key_extractor: mset_keys,
            handler: cmd_mset,
        },
        CommandSpec {
            name: "getdel",
            categories: &[CATEGORY_STRING, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(GETDEL key) Returns the string value and deletes the key.",
            synchronous: true,
            key_extractor: getdel_keys,
            handler: cmd_getdel,
        },
        CommandSpec {
            name: "strlen",
            categories: &[CATEGORY_STRING, CATEGORY_READ, CATEGORY_FAST],
            description: "(STRLEN key) Returns the length of the string value.",
            synchronous: false,
            key_extractor: strlen_keys,
            handler: cmd_strlen,
        },
        CommandSpec {
            name: "getrange",
            categories: &[CATEGORY_STRING, CATEGORY_READ, CATEGORY_SLOW],
            description: "(GETRANGE key start end) Returns a substring of the string value.",
            synchronous: false,
            key_extractor: getrange_keys,
            handler: cmd_getrange,
        },
        CommandSpec {
            name: "substr",
            categories: &[CATEGORY_STRING, CATEGORY_READ, CATEGORY_SLOW],
            description: "(SUBSTR key start end) Alias of GETRANGE.",
            synchronous: false,
            key_extractor: getrange_keys,
            handler: cmd_getrange,
        },
        CommandSpec {
            name: "setrange",
            categories: &[CATEGORY_STRING, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(SETRANGE key offset value) Overwrites part of the string from offset, zero-padding as needed.",
            synchronous: true,
            key_extractor: setrange_keys,
            handler: cmd_setrange,
        },
        CommandSpec {
            name: "append",
            categories: &[CATEGORY_STRING, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(APPEND key value) Appends to the string value, creating the key if absent.",
            synchronous: true,
            key_extractor: append_keys,
            handler: cmd_append,
        },
        CommandSpec {
            name: "incr",
            categories: &[CATEGORY_STRING, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(INCR key) Increments the integer value by one.",
            synchronous: true,
            key_extractor: incr_keys,
            handler: cmd_incr,
        },
        CommandSpec {
            name: "decr",
            categories: &[CATEGORY_STRING, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(DECR key) Decrements the integer value by one.",
            synchronous: true,
            key_extractor: incr_keys,
            handler: cmd_decr,
        },
        CommandSpec {
            name: "incrby",
            categories: &[CATEGORY_STRING, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(INCRBY key increment) Increments the integer value by the given amount.",
            synchronous: true,
            key_extractor: incrby_keys,
            handler: cmd_incrby,
        },
        CommandSpec {
            name: "decrby",
            categories: &[CATEGORY_STRING, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(DECRBY key decrement) Decrements the integer value by the given amount.",
            synchronous: true,
            key_extractor: incrby_keys,
            handler: cmd_decrby,
        },
        CommandSpec {
            name: "incrbyfloat",
            categories: &[CATEGORY_STRING, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(INCRBYFLOAT key increment) Increments the float value by the given amount.",
            synchronous: true,
            key_extractor: incrby_keys,
            handler: cmd_incrbyfloat,
        },
    ]
}
