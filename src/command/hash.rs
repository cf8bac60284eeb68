//! Hash commands. Field values are scalars adapted from the raw token.
//! A hash emptied by HDEL stays at its key.

use crate::command::{
    hash_entry, parse_f64, parse_i64, read_hash, wrong_args, AccessKeys, CommandSpec,
    CATEGORY_FAST, CATEGORY_HASH, CATEGORY_READ, CATEGORY_SLOW, CATEGORY_WRITE,
};
use crate::context::Context;
use crate::error::{StoreError, StoreResult};
use crate::resp::{format_score, Reply};
use crate::store::Access;
use crate::types::adapt_token;

fn hset_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 4 || (args.len() - 2) % 2 != 0 {
        return Err(wrong_args("hset"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn hsetnx_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 4 {
        return Err(wrong_args("hsetnx"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn hget_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 3 {
        return Err(wrong_args("hget"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn hmget_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 3 {
        return Err(wrong_args("hmget"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn hgetall_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 2 {
        return Err(wrong_args("hgetall"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn hdel_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 3 {
        return Err(wrong_args("hdel"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn hincrby_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 4 {
        return Err(wrong_args("hincrby"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn hrandfield_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 2 || args.len() > 4 {
        return Err(wrong_args("hrandfield"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn cmd_hset(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let hash = hash_entry(access, &args[1], true)?;
    let mut added = 0i64;
    for pair in args[2..].chunks(2) {
        if hash.set(pair[0].clone(), adapt_token(&pair[1])) {
            added += 1;
        }
    }
    Ok(Reply::integer(added))
}

fn cmd_hsetnx(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let hash = hash_entry(access, &args[1], true)?;
    let set = hash.set_if_absent(args[2].clone(), adapt_token(&args[3]));
    Ok(Reply::integer(set as i64))
}

fn cmd_hget(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    Ok(match read_hash(access, &args[1])? {
        Some(hash) => match hash.get(&args[2]) {
            Some(value) => Reply::bulk(value.to_bytes()),
            None => Reply::nil(),
        },
        None => Reply::nil(),
    })
}

fn cmd_hmget(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let hash = read_hash(access, &args[1])?;
    let items = args[2..]
        .iter()
        .map(|field| match hash.and_then(|h| h.get(field)) {
            Some(value) => Reply::bulk(value.to_bytes()),
            None => Reply::nil(),
        })
        .collect();
    Ok(Reply::array(items))
}

fn cmd_hgetall(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let mut items = Vec::new();
    if let Some(hash) = read_hash(access, &args[1])? {
        for (field, value) in hash.iter() {
            items.push(Reply::bulk(field.as_bytes().to_vec()));
            items.push(Reply::bulk(value.to_bytes()));
        }
    }
    Ok(Reply::array(items))
}

fn cmd_hdel(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    if !access.exists(&args[1]) {
        return Ok(Reply::integer(0));
    }
    let hash = hash_entry(access, &args[1], false)?;
    let mut removed = 0i64;
    for field in &args[2..] {
        if hash.remove(field) {
            removed += 1;
        }
    }
    Ok(Reply::integer(removed))
}

fn cmd_hexists(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let exists = read_hash(access, &args[1])?.is_some_and(|h| h.contains(&args[2]));
    Ok(Reply::integer(exists as i64))
}

fn cmd_hlen(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let len = read_hash(access, &args[1])?.map_or(0, |h| h.len());
    Ok(Reply::integer(len as i64))
}

fn cmd_hkeys(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let items = match read_hash(access, &args[1])? {
        Some(hash) => hash
            .fields()
            .into_iter()
            .map(|f| Reply::bulk(f.as_bytes().to_vec()))
            .collect(),
        None => Vec::new(),
    };
    Ok(Reply::array(items))
}

fn cmd_hvals(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let items = match read_hash(access, &args[1])? {
        Some(hash) => hash
            .values()
            .into_iter()
            .map(|v| Reply::bulk(v.to_bytes()))
            .collect(),
        None => Vec::new(),
    };
    Ok(Reply::array(items))
}

fn cmd_hstrlen(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let len = read_hash(access, &args[1])?
        .and_then(|h| h.get(&args[2]))
        .map_or(0, |v| v.to_bytes().len());
    Ok(Reply::integer(len as i64))
}

fn cmd_hincrby(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let delta = parse_i64(&args[3])?;
    let hash = hash_entry(access, &args[1], true)?;
    match hash.incr_by(&args[2], delta) {
        Ok(new_val) => Ok(Reply::integer(new_val)),
        Err(msg) => Err(StoreError::Generic(msg.to_string())),
    }
}

fn cmd_hincrbyfloat(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let delta = parse_f64(&args[3])?;
    let hash = hash_entry(access, &args[1], true)?;
    match hash.incr_by_float(&args[2], delta) {
        Ok(new_val) => Ok(Reply::bulk(format_score(new_val).into_bytes())),
        Err(msg) => Err(StoreError::Generic(msg.to_string())),
    }
}

fn cmd_hrandfield(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let count = match args.get(2) {
        Some(token) => Some(parse_i64(token)?),
        None => None,
    };
    let with_values = match args.get(3) {
        Some(token) if token.eq_ignore_ascii_case("withvalues") => true,
        Some(_) => return Err(StoreError::SyntaxError),
        None => false,
    };

    let hash = read_hash(access, &args[1])?;
    match count {
        None => Ok(match hash.and_then(|h| h.random_fields(1).pop().cloned()) {
            Some(field) => Reply::bulk(field.into_bytes()),
            None => Reply::nil(),
        }),
        Some(count) => {
            let mut items = Vec::new();
            if let Some(hash) = hash {
                for field in hash.random_fields(count) {
                    items.push(Reply::bulk(field.as_bytes().to_vec()));
                    if with_values {
                        if let Some(value) = hash.get(field) {
                            items.push(Reply::bulk(value.to_bytes()));
                        }
                    }
                }
            }
            Ok(Reply::array(items))
        }
    }
}

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "hset",
            categories: &[CATEGORY_HASH, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(HSET key field value [field value ...]) Sets hash fields; returns the number of new fields.",
            synchronous: true,
            key_extractor: hset_keys,
            handler: cmd_hset,
        },
        CommandSpec {
            name: "hsetnx",
            categories: &[CATEGORY_HASH, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(HSETNX key field value) Sets the field only when it does not exist.",
            synchronous: true,
            key_extractor: hsetnx_keys,
            handler: cmd_hsetnx,
        },
        CommandSpec {
            name: "hget",
            categories: &[CATEGORY_HASH, CATEGORY_READ, CATEGORY_FAST],
            description: "(HGET key field) Returns the value of the field.",
            synchronous: false,
            key_extractor: hget_keys,
            handler: cmd_hget,
        },
        CommandSpec {
            name: "hmget",
            categories: &[CATEGORY_HASH, CATEGORY_READ, CATEGORY_FAST],
            description: "(HMGET key field [field ...]) Returns the values of the fields, nil for missing ones.",
            synchronous: false,
            key_extractor: hmget_keys,
            handler: cmd_hmget,
        },
        CommandSpec {
            name: "hgetall",
            categories: &[CATEGORY_HASH, CATEGORY_READ, CATEGORY_SLOW],
            description: "(HGETALL key) Returns all fields and values as a flat array.",
            synchronous: false,
            key_extractor: hgetall_keys,
            handler: cmd_hgetall,
        },
        CommandSpec {
            name: "hdel",
            categories: &[CATEGORY_HASH, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(HDEL key field [field ...]) Removes fields; the hash is kept even when emptied.",
            synchronous: true,
            key_extractor: hdel_keys,
            handler: cmd_hdel,
        },
        CommandSpec {
            name: "hexists",
            categories: &[CATEGORY_HASH, CATEGORY_READ, CATEGORY_FAST],
            description: "(HEXISTS key field) Whether the field exists.",
            synchronous: false,
            key_extractor: hget_keys,
            handler: cmd_hexists,
        },
        CommandSpec {
            name: "hlen",
            categories: &[CATEGORY_HASH, CATEGORY_READ, CATEGORY_FAST],
            description: "(HLEN key) Number of fields in the hash.",
            synchronous: false,
            key_extractor: hgetall_keys,
            handler: cmd_hlen,
        },
        CommandSpec {
            name: "hkeys",
            categories: &[CATEGORY_HASH, CATEGORY_READ, CATEGORY_SLOW],
            description: "(HKEYS key) All field names.",
            synchronous: false,
            key_extractor: hgetall_keys,
            handler: cmd_hkeys,
        },
        CommandSpec {
            name: "hvals",
            categories: &[CATEGORY_HASH, CATEGORY_READ, CATEGORY_SLOW],
            description: "(HVALS key) All field values.",
            synchronous: false,
            key_extractor: hgetall_keys,
            handler: cmd_hvals,
        },
        CommandSpec {
            name: "hstrlen",
            categories: &[CATEGORY_HASH, CATEGORY_READ, CATEGORY_FAST],
            description: "(HSTRLEN key field) Length of the field's value in its textual form.",
            synchronous: false,
            key_extractor: hget_keys,
            handler: cmd_hstrlen,
        },
        CommandSpec {
            name: "hincrby",
            categories: &[CATEGORY_HASH, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(HINCRBY key field increment) Increments the integer field; absent fields count as zero.",
            synchronous: true,
            key_extractor: hincrby_keys,
            handler: cmd_hincrby,
        },
        CommandSpec {
            name: "hincrbyfloat",
            categories: &[CATEGORY_HASH, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(HINCRBYFLOAT key field increment) Increments the float field; absent fields count as zero.",
            synchronous: true,
            key_extractor: hincrby_keys,
            handler: cmd_hincrbyfloat,
        },
        CommandSpec {
            name: "hrandfield",
            categories: &[CATEGORY_HASH, CATEGORY_READ, CATEGORY_SLOW],
            description: "(HRANDFIELD key [count [WITHVALUES]]) Random fields; a negative count permits repeats.",
            synchronous: false,
            key_extractor: hrandfield_keys,
            handler: cmd_hrandfield,
        },
    ]
}
