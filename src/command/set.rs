//! Set commands, including the aggregate combinations and their STORE
//! variants. Multi-key commands rely on the dispatcher's canonical lock
//! ordering; handlers simply read the locked inputs.

use crate::command::{
    parse_i64, read_set, set_entry, wrong_args, AccessKeys, CommandSpec, CATEGORY_FAST,
    CATEGORY_READ, CATEGORY_SET, CATEGORY_SLOW, CATEGORY_WRITE,
};
use crate::context::Context;
use crate::error::{StoreError, StoreResult};
use crate::resp::Reply;
use crate::store::Access;
use crate::types::set::SetValue;
use crate::types::Value;

fn sadd_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 3 {
        return Err(wrong_args("sadd"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn smembers_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 2 {
        return Err(wrong_args("smembers"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn sismember_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 3 {
        return Err(wrong_args("sismember"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn spop_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 2 || args.len() > 3 {
        return Err(wrong_args("spop"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn srandmember_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 2 || args.len() > 3 {
        return Err(wrong_args("srandmember"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn smove_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 4 {
        return Err(wrong_args("smove"));
    }
    Ok(AccessKeys::write(&args[1..3]))
}

fn combine_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 2 {
        return Err(wrong_args("sunion"));
    }
    Ok(AccessKeys::read(&args[1..]))
}

fn combine_store_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 3 {
        return Err(wrong_args("sunionstore"));
    }
    Ok(AccessKeys::read_write(&args[2..], &args[1..2]))
}

fn cmd_sadd(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let set = set_entry(access, &args[1], true)?;
    let mut added = 0i64;
    for member in &args[2..] {
        if set.add(member.as_bytes().to_vec()) {
            added += 1;
        }
    }
    Ok(Reply::integer(added))
}

fn cmd_srem(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    if !access.exists(&args[1]) {
        return Ok(Reply::integer(0));
    }
    let set = set_entry(access, &args[1], false)?;
    let mut removed = 0i64;
    for member in &args[2..] {
        if set.remove(member.as_bytes()) {
            removed += 1;
        }
    }
    Ok(Reply::integer(removed))
}

fn cmd_smembers(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let items = match read_set(access, &args[1])? {
        Some(set) => set
            .members()
            .into_iter()
            .map(|m| Reply::bulk(m.clone()))
            .collect(),
        None => Vec::new(),
    };
    Ok(Reply::array(items))
}

fn cmd_sismember(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let present = read_set(access, &args[1])?.is_some_and(|s| s.contains(args[2].as_bytes()));
    Ok(Reply::integer(present as i64))
}

fn cmd_scard(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let len = read_set(access, &args[1])?.map_or(0, |s| s.len());
    Ok(Reply::integer(len as i64))
}

fn cmd_spop(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let count = match args.get(2) {
        Some(token) => {
            let n = parse_i64(token)?;
            if n < 0 {
                return Err(StoreError::LimitExceeded(
                    "value is out of range, must be positive".to_string(),
                ));
            }
            Some(n as usize)
        }
        None => None,
    };

    if !access.exists(&args[1]) {
        return Ok(match count {
            Some(_) => Reply::empty_array(),
            None => Reply::nil(),
        });
    }
    let set = set_entry(access, &args[1], false)?;
    match count {
        None => Ok(match set.pop(1).pop() {
            Some(member) => Reply::bulk(member),
            None => Reply::nil(),
        }),
        Some(n) => Ok(Reply::array(
            set.pop(n).into_iter().map(Reply::bulk).collect(),
        )),
    }
}

fn cmd_srandmember(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let count = match args.get(2) {
        Some(token) => Some(parse_i64(token)?),
        None => None,
    };
    let set = read_set(access, &args[1])?;
    match count {
        None => Ok(match set.and_then(|s| s.random_members(1).pop()) {
            Some(member) => Reply::bulk(member),
            None => Reply::nil(),
        }),
        Some(n) => {
            let members = set.map_or_else(Vec::new, |s| s.random_members(n));
            Ok(Reply::array(members.into_iter().map(Reply::bulk).collect()))
        }
    }
}

fn cmd_smove(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let source = &args[1];
    let destination = &args[2];
    let member = args[3].as_bytes();

    if !access.exists(source) {
        return Ok(Reply::integer(0));
    }
    if access.exists(destination) {
        set_entry(access, destination, false)?;
    }

    let src = set_entry(access, source, false)?;
    if !src.remove(member) {
        return Ok(Reply::integer(0));
    }
    let dst = set_entry(access, destination, true)?;
    dst.add(member.to_vec());
    Ok(Reply::integer(1))
}

#[derive(Clone, Copy)]
enum Combine {
    Union,
    Intersect,
    Difference,
}

/// Combine the sets at `keys`; absent keys act as empty sets.
fn combine(access: &Access, keys: &[String], op: Combine) -> StoreResult<SetValue> {
    let mut result = match read_set(access, &keys[0])? {
        Some(set) => set.clone(),
        None => SetValue::new(),
    };
    for key in &keys[1..] {
        let other = match read_set(access, key)? {
            Some(set) => set.clone(),
            None => SetValue::new(),
        };
        result = match op {
            Combine::Union => result.union(&other),
            Combine::Intersect => result.intersect(&other),
            Combine::Difference => result.difference(&other),
        };
    }
    Ok(result)
}

fn combined_reply(result: SetValue) -> Reply {
    Reply::array(
        result
            .iter()
            .map(|m| Reply::bulk(m.clone()))
            .collect(),
    )
}

fn cmd_sunion(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    Ok(combined_reply(combine(access, &args[1..], Combine::Union)?))
}

fn cmd_sinter(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    Ok(combined_reply(combine(access, &args[1..], Combine::Intersect)?))
}

fn cmd_sdiff(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    Ok(combined_reply(combine(access, &args[1..], Combine::Difference)?))
}

fn store_combined(args: &[String], access: &mut Access, op: Combine) -> StoreResult<Reply> {
    let result = combine(access, &args[2..], op)?;
    let cardinality = result.len() as i64;
    access.set_value(&args[1], Value::Set(result))?;
    Ok(Reply::integer(cardinality))
}

fn cmd_sunionstore(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    store_combined(args, access, Combine::Union)
}

fn cmd_sinterstore(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    store_combined(args, access, Combine::Intersect)
}

fn cmd_sdiffstore(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    store_combined(args, access, Combine::Difference)
}

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "sadd",
            categories: &[CATEGORY_SET, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(SADD key member [member ...]) Adds members, creating the key if absent.",
            synchronous: true,
            key_extractor: sadd_keys,
            handler: cmd_sadd,
        },
        CommandSpec {
            name: "srem",
            categories: &[CATEGORY_SET, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(SREM key member [member ...]) Removes members; returns how many were present.",
            synchronous: true,
            key_extractor: sadd_keys,
            handler: cmd_srem,
        },
        CommandSpec {
            name: "smembers",
            categories: &[CATEGORY_SET, CATEGORY_READ, CATEGORY_SLOW],
            description: "(SMEMBERS key) Returns all members.",
            synchronous: false,
            key_extractor: smembers_keys,
            handler: cmd_smembers,
        },
        CommandSpec {
            name: "sismember",
            categories: &[CATEGORY_SET, CATEGORY_READ, CATEGORY_FAST],
            description: "(SISMEMBER key member) Whether the member is in the set.",
            synchronous: false,
            key_extractor: sismember_keys,
            handler: cmd_sismember,
        },
        CommandSpec {
            name: "scard",
            categories: &[CATEGORY_SET, CATEGORY_READ, CATEGORY_FAST],
            description: "(SCARD key) Cardinality of the set.",
            synchronous: false,
            key_extractor: smembers_keys,
            handler: cmd_scard,
        },
        CommandSpec {
            name: "spop",
            categories: &[CATEGORY_SET, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(SPOP key [count]) Removes and returns random members.",
            synchronous: true,
            key_extractor: spop_keys,
            handler: cmd_spop,
        },
        CommandSpec {
            name: "srandmember",
            categories: &[CATEGORY_SET, CATEGORY_READ, CATEGORY_SLOW],
            description: "(SRANDMEMBER key [count]) Random members; a negative count permits repeats.",
            synchronous: false,
            key_extractor: srandmember_keys,
            handler: cmd_srandmember,
        },
        CommandSpec {
            name: "smove",
            categories: &[CATEGORY_SET, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(SMOVE source destination member) Atomically moves a member between sets.",
            synchronous: true,
            key_extractor: smove_keys,
            handler: cmd_smove,
        },
        CommandSpec {
            name: "sunion",
            categories: &[CATEGORY_SET, CATEGORY_READ, CATEGORY_SLOW],
            description: "(SUNION key [key ...]) Union of the given sets.",
            synchronous: false,
            key_extractor: combine_keys,
            handler: cmd_sunion,
        },
        CommandSpec {
            name: "sinter",
            categories: &[CATEGORY_SET, CATEGORY_READ, CATEGORY_SLOW],
            description: "(SINTER key [key ...]) Intersection of the given sets.",
            synchronous: false,
            key_extractor: combine_keys,
            handler: cmd_sinter,
        },
        CommandSpec {
            name: "sdiff",
            categories: &[CATEGORY_SET, CATEGORY_READ, CATEGORY_SLOW],
            description: "(SDIFF key [key ...]) Difference of the first set against the rest.",
            synchronous: false,
            key_extractor: combine_keys,
            handler: cmd_sdiff,
        },
        CommandSpec {
            name: "sunionstore",
            categories: &[CATEGORY_SET, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(SUNIONSTORE destination key [key ...]) Stores the union at the destination.",
            synchronous: true,
            key_extractor: combine_store_keys,
            handler: cmd_sunionstore,
        },
        CommandSpec {
            name: "sinterstore",
            categories: &[CATEGORY_SET, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(SINTERSTORE destination key [key ...]) Stores the intersection at the destination.",
            synchronous: true,
            key_extractor: combine_store_keys,
            handler: cmd_sinterstore,
        },
        CommandSpec {
            name: "sdiffstore",
            categories: &[CATEGORY_SET, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(SDIFFSTORE destination key [key ...]) Stores the difference at the destination.",
            synchronous: true,
            key_extractor: combine_store_keys,
            handler: cmd_sdiffstore,
        },
    ]
}
