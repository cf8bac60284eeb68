//! List commands. Negative indices count from the tail; LINDEX and LSET
//! treat an out-of-bounds index as an error rather than clamping. Pops
//! never auto-delete an emptied key.

use crate::command::{
    list_entry, parse_i64, read_list, wrong_args, AccessKeys, CommandSpec, CATEGORY_FAST,
    CATEGORY_LIST, CATEGORY_READ, CATEGORY_SLOW, CATEGORY_WRITE,
};
use crate::context::Context;
use crate::error::{StoreError, StoreResult};
use crate::resp::Reply;
use crate::store::Access;

fn push_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 3 {
        return Err(wrong_args("lpush"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn pop_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 2 || args.len() > 3 {
        return Err(wrong_args("lpop"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn llen_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 2 {
        return Err(wrong_args("llen"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn lrange_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 4 {
        return Err(wrong_args("lrange"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn lindex_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 3 {
        return Err(wrong_args("lindex"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn lset_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 4 {
        return Err(wrong_args("lset"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn ltrim_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 4 {
        return Err(wrong_args("ltrim"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn lrem_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 4 {
        return Err(wrong_args("lrem"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn lmove_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 5 {
        return Err(wrong_args("lmove"));
    }
    Ok(AccessKeys::write(&args[1..3]))
}

fn push(args: &[String], access: &mut Access, front: bool, create: bool) -> StoreResult<Reply> {
    let key = &args[1];
    let list = list_entry(access, key, create)?;
    for value in &args[2..] {
        if front {
            list.push_front(value.as_bytes().to_vec());
        } else {
            list.push_back(value.as_bytes().to_vec());
        }
    }
    Ok(Reply::integer(list.len() as i64))
}

fn cmd_lpush(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    push(args, access, true, true)
}

fn cmd_rpush(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    push(args, access, false, true)
}

fn cmd_lpushx(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    push(args, access, true, false)
}

fn cmd_rpushx(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    push(args, access, false, false)
}

fn pop(args: &[String], access: &mut Access, front: bool) -> StoreResult<Reply> {
    let key = &args[1];
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

    if !access.exists(key) {
        return Ok(match count {
            Some(_) => Reply::nil_array(),
            None => Reply::nil(),
        });
    }
    let list = list_entry(access, key, false)?;

    match count {
        None => Ok(match if front { list.pop_front() } else { list.pop_back() } {
            Some(v) => Reply::bulk(v),
            None => Reply::nil(),
        }),
        Some(n) => {
            let mut popped = Vec::new();
            for _ in 0..n {
                let item = if front { list.pop_front() } else { list.pop_back() };
                match item {
                    Some(v) => popped.push(Reply::bulk(v)),
                    None => break,
                }
            }
            Ok(if popped.is_empty() {
                Reply::nil_array()
            } else {
                Reply::array(popped)
            })
        }
    }
}

fn cmd_lpop(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    pop(args, access, true)
}

fn cmd_rpop(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    pop(args, access, false)
}

fn cmd_llen(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let len = read_list(access, &args[1])?.map_or(0, |l| l.len());
    Ok(Reply::integer(len as i64))
}

fn cmd_lrange(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let start = parse_i64(&args[2])?;
    let stop = parse_i64(&args[3])?;
    let items = match read_list(access, &args[1])? {
        Some(list) => list
            .range(start, stop)
            .map(|v| Reply::bulk(v.to_vec()))
            .collect(),
        None => Vec::new(),
    };
    Ok(Reply::array(items))
}

fn cmd_lindex(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let index = parse_i64(&args[2])?;
    let list = read_list(access, &args[1])?.ok_or(StoreError::NoSuchKey)?;
    match list.get(index) {
        Some(v) => Ok(Reply::bulk(v.to_vec())),
        None => Err(StoreError::IndexOutOfRange),
    }
}

fn cmd_lset(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let index = parse_i64(&args[2])?;
    let value = args[3].as_bytes().to_vec();
    if !access.exists(&args[1]) {
        return Err(StoreError::NoSuchKey);
    }
    let list = list_entry(access, &args[1], false)?;
    if list.set(index, value) {
        Ok(Reply::ok())
    } else {
        Err(StoreError::IndexOutOfRange)
    }
}

fn cmd_ltrim(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let start = parse_i64(&args[2])?;
    let stop = parse_i64(&args[3])?;
    if access.exists(&args[1]) {
        let list = list_entry(access, &args[1], false)?;
        list.trim(start, stop);
    }
    Ok(Reply::ok())
}

fn cmd_lrem(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let count = parse_i64(&args[2])?;
    let value = args[3].as_bytes();
    if !access.exists(&args[1]) {
        return Ok(Reply::integer(0));
    }
    let list = list_entry(access, &args[1], false)?;
    Ok(Reply::integer(list.remove(count, value)))
}

fn side(token: &str) -> StoreResult<bool> {
    match token.to_lowercase().as_str() {
        "left" => Ok(true),
        "right" => Ok(false),
        _ => Err(StoreError::SyntaxError),
    }
}

fn cmd_lmove(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let source = &args[1];
    let destination = &args[2];
    let from_left = side(&args[3])?;
    let to_left = side(&args[4])?;

    if !access.exists(source) {
        return Ok(Reply::nil());
    }
    // Type-check the destination before mutating the source.
    if access.exists(destination) {
        list_entry(access, destination, false)?;
    }

    let src = list_entry(access, source, false)?;
    let moved = if from_left {
        src.pop_front()
    } else {
        src.pop_back()
    };
    let Some(moved) = moved else {
        return Ok(Reply::nil());
    };

    let dst = list_entry(access, destination, true)?;
    if to_left {
        dst.push_front(moved.clone());
    } else {
        dst.push_back(moved.clone());
    }
    Ok(Reply::bulk(moved))
}

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "lpush",
            categories: &[CATEGORY_LIST, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(LPUSH key element [element ...]) Prepends elements, creating the key if absent.",
            synchronous: true,
            key_extractor: push_keys,
            handler: cmd_lpush,
        },
        CommandSpec {
            name: "rpush",
            categories: &[CATEGORY_LIST, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(RPUSH key element [element ...]) Appends elements, creating the key if absent.",
            synchronous: true,
            key_extractor: push_keys,
            handler: cmd_rpush,
        },
        CommandSpec {
            name: "lpushx",
            categories: &[CATEGORY_LIST, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(LPUSHX key element [element ...]) Prepends elements only when the key exists.",
            synchronous: true,
            key_extractor: push_keys,
            handler: cmd_lpushx,
        },
        CommandSpec {
            name: "rpushx",
            categories: &[CATEGORY_LIST, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(RPUSHX key element [element ...]) Appends elements only when the key exists.",
            synchronous: true,
            key_extractor: push_keys,
            handler: cmd_rpushx,
        },
        CommandSpec {
            name: "lpop",
            categories: &[CATEGORY_LIST, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(LPOP key [count]) Removes and returns elements from the head.",
            synchronous: true,
            key_extractor: pop_keys,
            handler: cmd_lpop,
        },
        CommandSpec {
            name: "rpop",
            categories: &[CATEGORY_LIST, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(RPOP key [count]) Removes and returns elements from the tail.",
            synchronous: true,
            key_extractor: pop_keys,
            handler: cmd_rpop,
        },
        CommandSpec {
            name: "llen",
            categories: &[CATEGORY_LIST, CATEGORY_READ, CATEGORY_FAST],
            description: "(LLEN key) Returns the list length.",
            synchronous: false,
            key_extractor: llen_keys,
            handler: cmd_llen,
        },
        CommandSpec {
            name: "lrange",
            categories: &[CATEGORY_LIST, CATEGORY_READ, CATEGORY_SLOW],
            description: "(LRANGE key start stop) Returns elements in the index range.",
            synchronous: false,
            key_extractor: lrange_keys,
            handler: cmd_lrange,
        },
        CommandSpec {
            name: "lindex",
            categories: &[CATEGORY_LIST, CATEGORY_READ, CATEGORY_SLOW],
            description: "(LINDEX key index) Returns the element at the index; out of range is an error.",
            synchronous: false,
            key_extractor: lindex_keys,
            handler: cmd_lindex,
        },
        CommandSpec {
            name: "lset",
            categories: &[CATEGORY_LIST, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(LSET key index element) Replaces the element at the index; out of range is an error.",
            synchronous: true,
            key_extractor: lset_keys,
            handler: cmd_lset,
        },
        CommandSpec {
            name: "ltrim",
            categories: &[CATEGORY_LIST, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(LTRIM key start stop) Removes elements outside the index range.",
            synchronous: true,
            key_extractor: ltrim_keys,
            handler: cmd_ltrim,
        },
        CommandSpec {
            name: "lrem",
            categories: &[CATEGORY_LIST, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(LREM key count element) Removes matching elements; the count's sign picks the scan direction.",
            synchronous: true,
            key_extractor: lrem_keys,
            handler: cmd_lrem,
        },
        CommandSpec {
            name: "lmove",
            categories: &[CATEGORY_LIST, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(LMOVE source destination <LEFT | RIGHT> <LEFT | RIGHT>) Atomically moves an element between lists.",
            synchronous: true,
            key_extractor: lmove_keys,
            handler: cmd_lmove,
        },
    ]
}
