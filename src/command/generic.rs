//! Key-level commands: deletion, existence, type inspection, expiry.

use crate::command::{
    parse_i64, wrong_args, AccessKeys, CommandSpec, CATEGORY_FAST, CATEGORY_GENERIC,
    CATEGORY_READ, CATEGORY_SLOW, CATEGORY_WRITE,
};
use crate::context::Context;
use crate::error::{StoreError, StoreResult};
use crate::keyspace::now_millis;
use crate::resp::Reply;
use crate::store::Access;

fn del_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 2 {
        return Err(wrong_args("del"));
    }
    Ok(AccessKeys::write(&args[1..]))
}

fn exists_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 2 {
        return Err(wrong_args("exists"));
    }
    Ok(AccessKeys::read(&args[1..]))
}

fn type_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 2 {
        return Err(wrong_args("type"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn ttl_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 2 {
        return Err(wrong_args("ttl"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn expire_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 3 {
        return Err(wrong_args("expire"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn persist_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 2 {
        return Err(wrong_args("persist"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn cmd_del(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let mut removed = 0i64;
    for key in &args[1..] {
        if access.delete(key) {
            removed += 1;
        }
    }
    Ok(Reply::integer(removed))
}

fn cmd_exists(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let mut count = 0i64;
    for key in &args[1..] {
        if access.exists(key) {
            count += 1;
        }
    }
    Ok(Reply::integer(count))
}

fn cmd_type(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let name = match access.value(&args[1]) {
        Some(value) => value.type_name(),
        None => "none",
    };
    Ok(Reply::simple(name))
}

fn cmd_ttl(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    Ok(Reply::integer(access.ttl_seconds(&args[1])))
}

fn cmd_pttl(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    Ok(Reply::integer(access.ttl_millis(&args[1])))
}

fn cmd_expiretime(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let reply = if !access.exists(&args[1]) {
        -2
    } else {
        match access.expiry(&args[1]) {
            Some(exp) => (exp / 1000) as i64,
            None => -1,
        }
    };
    Ok(Reply::integer(reply))
}

fn cmd_pexpiretime(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let reply = if !access.exists(&args[1]) {
        -2
    } else {
        match access.expiry(&args[1]) {
            Some(exp) => exp as i64,
            None => -1,
        }
    };
    Ok(Reply::integer(reply))
}

/// Option flags on the EXPIRE family.
#[derive(Debug, Default)]
struct ExpireFlags {
    nx: bool,
    xx: bool,
    gt: bool,
    lt: bool,
}

fn parse_expire_flags(args: &[String]) -> StoreResult<ExpireFlags> {
    let mut flags = ExpireFlags::default();
    for opt in args {
        match opt.to_lowercase().as_str() {
            "nx" => flags.nx = true,
            "xx" => flags.xx = true,
            "gt" => flags.gt = true,
            "lt" => flags.lt = true,
            _ => return Err(StoreError::SyntaxError),
        }
    }
    if flags.nx && flags.xx {
        return Err(StoreError::OptionConflict(
            "NX and XX options at the same time are not compatible".to_string(),
        ));
    }
    if flags.gt && flags.lt {
        return Err(StoreError::OptionConflict(
            "GT and LT options at the same time are not compatible".to_string(),
        ));
    }
    Ok(flags)
}

/// Shared EXPIRE-family logic once the target expiry instant is known.
fn apply_expiry(access: &mut Access, key: &str, at_ms: u64, flags: &ExpireFlags) -> StoreResult<Reply> {
    if !access.exists(key) {
        return Ok(Reply::integer(0));
    }
    let current = access.expiry(key);

    let apply = if flags.nx {
        current.is_none()
    } else if flags.xx {
        current.is_some()
    } else if flags.gt {
        // A key without expiry counts as infinitely far out.
        match current {
            Some(cur) => at_ms > cur,
            None => false,
        }
    } else if flags.lt {
        match current {
            Some(cur) => at_ms < cur,
            None => true,
        }
    } else {
        true
    };

    if !apply {
        return Ok(Reply::integer(0));
    }
    if at_ms <= now_millis() {
        access.delete(key);
    } else {
        access.set_expiry(key, Some(at_ms))?;
    }
    Ok(Reply::integer(1))
}

fn cmd_expire(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let seconds = parse_i64(&args[2])?;
    let flags = parse_expire_flags(&args[3..])?;
    let at_ms = now_millis().saturating_add_signed(seconds.saturating_mul(1000));
    apply_expiry(access, &args[1], at_ms, &flags)
}

fn cmd_pexpire(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let millis = parse_i64(&args[2])?;
    let flags = parse_expire_flags(&args[3..])?;
    let at_ms = now_millis().saturating_add_signed(millis);
    apply_expiry(access, &args[1], at_ms, &flags)
}

fn cmd_expireat(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let unix_seconds = parse_i64(&args[2])?;
    let flags = parse_expire_flags(&args[3..])?;
    let at_ms = unix_seconds.saturating_mul(1000).max(0) as u64;
    apply_expiry(access, &args[1], at_ms, &flags)
}

fn cmd_pexpireat(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let unix_millis = parse_i64(&args[2])?;
    let flags = parse_expire_flags(&args[3..])?;
    apply_expiry(access, &args[1], unix_millis.max(0) as u64, &flags)
}

fn cmd_persist(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let key = &args[1];
    if !access.exists(key) || access.expiry(key).is_none() {
        return Ok(Reply::integer(0));
    }
    access.set_expiry(key, None)?;
    Ok(Reply::integer(1))
}

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "del",
            categories: &[CATEGORY_GENERIC, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(DEL key [key ...]) Removes the given keys; returns the number removed.",
            synchronous: true,
            key_extractor: del_keys,
            handler: cmd_del,
        },
        CommandSpec {
            name: "unlink",
            categories: &[CATEGORY_GENERIC, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(UNLINK key [key ...]) Alias of DEL.",
            synchronous: true,
            key_extractor: del_keys,
            handler: cmd_del,
        },
        CommandSpec {
            name: "exists",
            categories: &[CATEGORY_GENERIC, CATEGORY_READ, CATEGORY_FAST],
            description: "(EXISTS key [key ...]) Counts how many of the given keys exist.",
            synchronous: false,
            key_extractor: exists_keys,
            handler: cmd_exists,
        },
        CommandSpec {
            name: "type",
            categories: &[CATEGORY_GENERIC, CATEGORY_READ, CATEGORY_FAST],
            description: "(TYPE key) Returns the value kind stored at the key.",
            synchronous: false,
            key_extractor: type_keys,
            handler: cmd_type,
        },
        CommandSpec {
            name: "ttl",
            categories: &[CATEGORY_GENERIC, CATEGORY_READ, CATEGORY_FAST],
            description: "(TTL key) Remaining time to live in seconds; -1 without expiry, -2 when absent.",
            synchronous: false,
            key_extractor: ttl_keys,
            handler: cmd_ttl,
        },
        CommandSpec {
            name: "pttl",
            categories: &[CATEGORY_GENERIC, CATEGORY_READ, CATEGORY_FAST],
            description: "(PTTL key) Remaining time to live in milliseconds.",
            synchronous: false,
            key_extractor: ttl_keys,
            handler: cmd_pttl,
        },
        CommandSpec {
            name: "expiretime",
            categories: &[CATEGORY_GENERIC, CATEGORY_READ, CATEGORY_FAST],
            description: "(EXPIRETIME key) Absolute expiry in unix seconds; -1 without expiry, -2 when absent.",
            synchronous: false,
            key_extractor: ttl_keys,
            handler: cmd_expiretime,
        },
        CommandSpec {
            name: "pexpiretime",
            categories: &[CATEGORY_GENERIC, CATEGORY_READ, CATEGORY_FAST],
            description: "(PEXPIRETIME key) Absolute expiry in unix milliseconds.",
            synchronous: false,
            key_extractor: ttl_keys,
            handler: cmd_pexpiretime,
        },
        CommandSpec {
            name: "expire",
            categories: &[CATEGORY_GENERIC, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(EXPIRE key seconds [NX | XX | GT | LT]) Sets the key's expiry in seconds from now.",
            synchronous: true,
            key_extractor: expire_keys,
            handler: cmd_expire,
        },
        CommandSpec {
            name: "pexpire",
            categories: &[CATEGORY_GENERIC, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(PEXPIRE key milliseconds [NX | XX | GT | LT]) Sets the key's expiry in milliseconds from now.",
            synchronous: true,
            key_extractor: expire_keys,
            handler: cmd_pexpire,
        },
        CommandSpec {
            name: "expireat",
            categories: &[CATEGORY_GENERIC, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(EXPIREAT key unix-seconds [NX | XX | GT | LT]) Sets the key's expiry as an absolute unix time.",
            synchronous: true,
            key_extractor: expire_keys,
            handler: cmd_expireat,
        },
        CommandSpec {
            name: "pexpireat",
            categories: &[CATEGORY_GENERIC, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(PEXPIREAT key unix-milliseconds [NX | XX | GT | LT]) Sets the key's expiry as absolute unix milliseconds.",
            synchronous: true,
            key_extractor: expire_keys,
            handler: cmd_pexpireat,
        },
        CommandSpec {
            name: "persist",
            categories: &[CATEGORY_GENERIC, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(PERSIST key) Removes the key's expiry.",
            synchronous: true,
            key_extractor: persist_keys,
            handler: cmd_persist,
        },
    ]
}
