//! Sorted-set commands: ZADD and friends, rank/score/lex ranges, pops, and
//! the weighted aggregate combinations with their STORE variants.

use crate::command::{
    parse_f64, parse_i64, read_zset, wrong_args, zset_entry, AccessKeys, CommandSpec,
    CATEGORY_FAST, CATEGORY_READ, CATEGORY_SLOW, CATEGORY_SORTED_SET, CATEGORY_WRITE,
};
use crate::context::Context;
use crate::error::{StoreError, StoreResult};
use crate::resp::{format_score, Reply};
use crate::store::Access;
use crate::types::sorted_set::{
    Aggregate, LexBound, PopSide, ScoreBound, ScoreComparison, SortedSet, UpdatePolicy,
    ZAddOutcome,
};
use crate::types::Value;

fn zadd_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 4 {
        return Err(wrong_args("zadd"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn zcard_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 2 {
        return Err(wrong_args("zcard"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn zscore_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 3 {
        return Err(wrong_args("zscore"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn zmscore_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 3 {
        return Err(wrong_args("zmscore"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn zrem_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 3 {
        return Err(wrong_args("zrem"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn zincrby_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 4 {
        return Err(wrong_args("zincrby"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn zrank_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 3 {
        return Err(wrong_args("zrank"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn zcount_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 4 {
        return Err(wrong_args("zcount"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn zrange_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 4 {
        return Err(wrong_args("zrange"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn zpop_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 2 || args.len() > 3 {
        return Err(wrong_args("zpopmin"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

fn zrandmember_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 2 || args.len() > 4 {
        return Err(wrong_args("zrandmember"));
    }
    Ok(AccessKeys::read(&args[1..2]))
}

fn zremrange_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() != 4 {
        return Err(wrong_args("zremrangebyscore"));
    }
    Ok(AccessKeys::write(&args[1..2]))
}

/// numkeys-prefixed read commands: CMD numkeys key [key ...] [options].
fn numkeys_at(args: &[String], index: usize, cmd: &str) -> StoreResult<Vec<String>> {
    let numkeys = parse_i64(args.get(index).ok_or_else(|| wrong_args(cmd))?)?;
    if numkeys < 1 {
        return Err(StoreError::Generic(
            "at least 1 input key is needed".to_string(),
        ));
    }
    let numkeys = numkeys as usize;
    if args.len() < index + 1 + numkeys {
        return Err(StoreError::SyntaxError);
    }
    Ok(args[index + 1..index + 1 + numkeys].to_vec())
}

fn zsetop_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 3 {
        return Err(wrong_args("zunion"));
    }
    let keys = numkeys_at(args, 1, "zunion")?;
    Ok(AccessKeys::read(&keys))
}

fn zsetop_store_keys(args: &[String]) -> StoreResult<AccessKeys> {
    if args.len() < 4 {
        return Err(wrong_args("zunionstore"));
    }
    let keys = numkeys_at(args, 2, "zunionstore")?;
    Ok(AccessKeys::read_write(&keys, &args[1..2]))
}

fn parse_score_bound(token: &str) -> StoreResult<ScoreBound> {
    if let Some(rest) = token.strip_prefix('(') {
        Ok(ScoreBound::exclusive(parse_f64(rest)?))
    } else {
        Ok(ScoreBound::inclusive(parse_f64(token)?))
    }
}

fn parse_lex_bound(token: &str) -> StoreResult<LexBound> {
    match token {
        "-" => Ok(LexBound::NegInf),
        "+" => Ok(LexBound::PosInf),
        _ => {
            if let Some(rest) = token.strip_prefix('[') {
                Ok(LexBound::Incl(rest.as_bytes().to_vec()))
            } else if let Some(rest) = token.strip_prefix('(') {
                Ok(LexBound::Excl(rest.as_bytes().to_vec()))
            } else {
                Err(StoreError::Generic(
                    "min or max not valid string range item".to_string(),
                ))
            }
        }
    }
}

/// Flat reply: members, optionally interleaved with their scores.
fn records_reply(records: Vec<(Vec<u8>, f64)>, with_scores: bool) -> Reply {
    let mut items = Vec::with_capacity(records.len() * if with_scores { 2 } else { 1 });
    for (member, score) in records {
        items.push(Reply::bulk(member));
        if with_scores {
            items.push(Reply::bulk(format_score(score).into_bytes()));
        }
    }
    Reply::array(items)
}

fn cmd_zadd(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let key = &args[1];

    let mut policy = UpdatePolicy::Always;
    let mut nx = false;
    let mut xx = false;
    let mut comparison = ScoreComparison::Always;
    let mut changed = false;
    let mut incr = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].to_lowercase().as_str() {
            "nx" => nx = true,
            "xx" => xx = true,
            "gt" => comparison = ScoreComparison::OnlyIfGreater,
            "lt" => comparison = ScoreComparison::OnlyIfLess,
            "ch" => changed = true,
            "incr" => incr = true,
            _ => break,
        }
        i += 1;
    }
    if nx && xx {
        return Err(StoreError::OptionConflict(
            "XX and NX options at the same time are not compatible".to_string(),
        ));
    }
    if nx {
        policy = UpdatePolicy::OnlyIfAbsent;
    } else if xx {
        policy = UpdatePolicy::OnlyIfPresent;
    }

    let pairs = &args[i..];
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return Err(StoreError::SyntaxError);
    }
    let mut members = Vec::with_capacity(pairs.len() / 2);
    for pair in pairs.chunks(2) {
        members.push((pair[1].as_bytes().to_vec(), parse_f64(&pair[0])?));
    }

    // OnlyIfPresent never creates the key either.
    if policy == UpdatePolicy::OnlyIfPresent && !access.exists(key) {
        return Ok(if incr { Reply::nil() } else { Reply::integer(0) });
    }

    let set = zset_entry(access, key, true)?;
    match set.add_or_update(&members, policy, comparison, changed, incr)? {
        ZAddOutcome::Count(n) => Ok(Reply::integer(n as i64)),
        ZAddOutcome::Score(Some(score)) => Ok(Reply::bulk(format_score(score).into_bytes())),
        ZAddOutcome::Score(None) => Ok(Reply::nil()),
    }
}

fn cmd_zcard(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let len = read_zset(access, &args[1])?.map_or(0, |z| z.len());
    Ok(Reply::integer(len as i64))
}

fn cmd_zscore(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    Ok(
        match read_zset(access, &args[1])?.and_then(|z| z.score(args[2].as_bytes())) {
            Some(score) => Reply::bulk(format_score(score).into_bytes()),
            None => Reply::nil(),
        },
    )
}

fn cmd_zmscore(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let set = read_zset(access, &args[1])?;
    let items = args[2..]
        .iter()
        .map(|member| match set.and_then(|z| z.score(member.as_bytes())) {
            Some(score) => Reply::bulk(format_score(score).into_bytes()),
            None => Reply::nil(),
        })
        .collect();
    Ok(Reply::array(items))
}

fn cmd_zrem(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    if !access.exists(&args[1]) {
        return Ok(Reply::integer(0));
    }
    let set = zset_entry(access, &args[1], false)?;
    let mut removed = 0i64;
    for member in &args[2..] {
        if set.remove(member.as_bytes()) {
            removed += 1;
        }
    }
    Ok(Reply::integer(removed))
}

fn cmd_zincrby(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let increment = parse_f64(&args[2])?;
    let member = args[3].as_bytes().to_vec();
    let set = zset_entry(access, &args[1], true)?;
    match set.add_or_update(
        &[(member, increment)],
        UpdatePolicy::Always,
        ScoreComparison::Always,
        false,
        true,
    )? {
        ZAddOutcome::Score(Some(score)) => Ok(Reply::bulk(format_score(score).into_bytes())),
        _ => Err(StoreError::Internal("ZINCRBY produced no score".to_string())),
    }
}

fn zrank(args: &[String], access: &mut Access, reverse: bool) -> StoreResult<Reply> {
    Ok(
        match read_zset(access, &args[1])?.and_then(|z| z.rank(args[2].as_bytes(), reverse)) {
            Some(rank) => Reply::integer(rank as i64),
            None => Reply::nil(),
        },
    )
}

fn cmd_zrank(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    zrank(args, access, false)
}

fn cmd_zrevrank(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    zrank(args, access, true)
}

fn cmd_zcount(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let min = parse_score_bound(&args[2])?;
    let max = parse_score_bound(&args[3])?;
    let count = read_zset(access, &args[1])?.map_or(0, |z| z.count_by_score(&min, &max));
    Ok(Reply::integer(count as i64))
}

fn cmd_zlexcount(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let min = parse_lex_bound(&args[2])?;
    let max = parse_lex_bound(&args[3])?;
    let count = read_zset(access, &args[1])?.map_or(0, |z| z.count_by_lex(&min, &max));
    Ok(Reply::integer(count as i64))
}

fn cmd_zrange(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let key = &args[1];
    let start_token = &args[2];
    let stop_token = &args[3];

    let mut by_score = false;
    let mut by_lex = false;
    let mut reverse = false;
    let mut with_scores = false;
    let mut offset = 0usize;
    let mut count = -1i64;
    let mut have_limit = false;

    let mut i = 4;
    while i < args.len() {
        match args[i].to_lowercase().as_str() {
            "byscore" => by_score = true,
            "bylex" => by_lex = true,
            "rev" => reverse = true,
            "withscores" => with_scores = true,
            "limit" => {
                if i + 2 >= args.len() {
                    return Err(StoreError::SyntaxError);
                }
                let raw_offset = parse_i64(&args[i + 1])?;
                if raw_offset < 0 {
                    return Err(StoreError::LimitExceeded(
                        "negative LIMIT offset is not allowed".to_string(),
                    ));
                }
                offset = raw_offset as usize;
                count = parse_i64(&args[i + 2])?;
                have_limit = true;
                i += 2;
            }
            _ => return Err(StoreError::SyntaxError),
        }
        i += 1;
    }

    if by_score && by_lex {
        return Err(StoreError::SyntaxError);
    }
    if have_limit && !by_score && !by_lex {
        return Err(StoreError::Generic(
            "syntax error, LIMIT is only supported in combination with either BYSCORE or BYLEX"
                .to_string(),
        ));
    }
    if by_lex && with_scores {
        return Err(StoreError::Generic(
            "syntax error, WITHSCORES not supported in combination with BYLEX".to_string(),
        ));
    }

    let Some(set) = read_zset(access, key)? else {
        return Ok(Reply::empty_array());
    };

    let records = if by_score {
        // With REV the bounds arrive highest-first.
        let (min_token, max_token) = if reverse {
            (stop_token, start_token)
        } else {
            (start_token, stop_token)
        };
        let min = parse_score_bound(min_token)?;
        let max = parse_score_bound(max_token)?;
        set.range_by_score(&min, &max, reverse, offset, count)
    } else if by_lex {
        let (min_token, max_token) = if reverse {
            (stop_token, start_token)
        } else {
            (start_token, stop_token)
        };
        let min = parse_lex_bound(min_token)?;
        let max = parse_lex_bound(max_token)?;
        set.range_by_lex(&min, &max, reverse, offset, count)
    } else {
        set.range_by_rank(parse_i64(start_token)?, parse_i64(stop_token)?, reverse)
    };
    Ok(records_reply(records, with_scores))
}

fn range_by_score(
    args: &[String],
    access: &mut Access,
    reverse: bool,
) -> StoreResult<Reply> {
    let mut with_scores = false;
    let mut offset = 0usize;
    let mut count = -1i64;

    let mut i = 4;
    while i < args.len() {
        match args[i].to_lowercase().as_str() {
            "withscores" => with_scores = true,
            "limit" => {
                if i + 2 >= args.len() {
                    return Err(StoreError::SyntaxError);
                }
                let raw_offset = parse_i64(&args[i + 1])?;
                if raw_offset < 0 {
                    return Err(StoreError::LimitExceeded(
                        "negative LIMIT offset is not allowed".to_string(),
                    ));
                }
                offset = raw_offset as usize;
                count = parse_i64(&args[i + 2])?;
                i += 2;
            }
            _ => return Err(StoreError::SyntaxError),
        }
        i += 1;
    }

    // Reversed variants take max before min.
    let (min_token, max_token) = if reverse {
        (&args[3], &args[2])
    } else {
        (&args[2], &args[3])
    };
    let min = parse_score_bound(min_token)?;
    let max = parse_score_bound(max_token)?;

    let records = match read_zset(access, &args[1])? {
        Some(set) => set.range_by_score(&min, &max, reverse, offset, count),
        None => Vec::new(),
    };
    Ok(records_reply(records, with_scores))
}

fn cmd_zrangebyscore(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    range_by_score(args, access, false)
}

fn cmd_zrevrangebyscore(
    _ctx: &Context,
    args: &[String],
    access: &mut Access,
) -> StoreResult<Reply> {
    range_by_score(args, access, true)
}

fn cmd_zrangebylex(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let mut offset = 0usize;
    let mut count = -1i64;
    let mut i = 4;
    while i < args.len() {
        match args[i].to_lowercase().as_str() {
            "limit" => {
                if i + 2 >= args.len() {
                    return Err(StoreError::SyntaxError);
                }
                let raw_offset = parse_i64(&args[i + 1])?;
                if raw_offset < 0 {
                    return Err(StoreError::LimitExceeded(
                        "negative LIMIT offset is not allowed".to_string(),
                    ));
                }
                offset = raw_offset as usize;
                count = parse_i64(&args[i + 2])?;
                i += 2;
            }
            _ => return Err(StoreError::SyntaxError),
        }
        i += 1;
    }

    let min = parse_lex_bound(&args[2])?;
    let max = parse_lex_bound(&args[3])?;
    let records = match read_zset(access, &args[1])? {
        Some(set) => set.range_by_lex(&min, &max, false, offset, count),
        None => Vec::new(),
    };
    Ok(records_reply(records, false))
}

fn zpop(args: &[String], access: &mut Access, side: PopSide) -> StoreResult<Reply> {
    let count = match args.get(2) {
        Some(token) => {
            let n = parse_i64(token)?;
            if n < 0 {
                return Err(StoreError::LimitExceeded(
                    "value is out of range, must be positive".to_string(),
                ));
            }
            n as usize
        }
        None => 1,
    };
    if !access.exists(&args[1]) {
        return Ok(Reply::empty_array());
    }
    let set = zset_entry(access, &args[1], false)?;
    Ok(records_reply(set.pop(count, side), true))
}

fn cmd_zpopmin(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    zpop(args, access, PopSide::Min)
}

fn cmd_zpopmax(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    zpop(args, access, PopSide::Max)
}

fn cmd_zrandmember(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let count = match args.get(2) {
        Some(token) => Some(parse_i64(token)?),
        None => None,
    };
    let with_scores = match args.get(3) {
        Some(token) if token.eq_ignore_ascii_case("withscores") => true,
        Some(_) => return Err(StoreError::SyntaxError),
        None => false,
    };

    let set = read_zset(access, &args[1])?;
    match count {
        None => Ok(
            match set.and_then(|z| z.random_members(1).into_iter().next()) {
                Some((member, _)) => Reply::bulk(member),
                None => Reply::nil(),
            },
        ),
        Some(n) => {
            let records = set.map_or_else(Vec::new, |z| z.random_members(n));
            Ok(records_reply(records, with_scores))
        }
    }
}

fn zremrange(
    access: &mut Access,
    key: &str,
    victims: Vec<(Vec<u8>, f64)>,
) -> StoreResult<Reply> {
    let set = zset_entry(access, key, false)?;
    let mut removed = 0i64;
    for (member, _) in victims {
        if set.remove(&member) {
            removed += 1;
        }
    }
    Ok(Reply::integer(removed))
}

fn cmd_zremrangebyscore(
    _ctx: &Context,
    args: &[String],
    access: &mut Access,
) -> StoreResult<Reply> {
    let min = parse_score_bound(&args[2])?;
    let max = parse_score_bound(&args[3])?;
    if !access.exists(&args[1]) {
        return Ok(Reply::integer(0));
    }
    let victims = zset_entry(access, &args[1], false)?.range_by_score(&min, &max, false, 0, -1);
    zremrange(access, &args[1], victims)
}

fn cmd_zremrangebyrank(
    _ctx: &Context,
    args: &[String],
    access: &mut Access,
) -> StoreResult<Reply> {
    let start = parse_i64(&args[2])?;
    let stop = parse_i64(&args[3])?;
    if !access.exists(&args[1]) {
        return Ok(Reply::integer(0));
    }
    let victims = zset_entry(access, &args[1], false)?.range_by_rank(start, stop, false);
    zremrange(access, &args[1], victims)
}

fn cmd_zremrangebylex(_ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let min = parse_lex_bound(&args[2])?;
    let max = parse_lex_bound(&args[3])?;
    if !access.exists(&args[1]) {
        return Ok(Reply::integer(0));
    }
    let victims = zset_entry(access, &args[1], false)?.range_by_lex(&min, &max, false, 0, -1);
    zremrange(access, &args[1], victims)
}

/// WEIGHTS / AGGREGATE / WITHSCORES options after the key list of a
/// ZUNION-family command.
struct SetOpOptions {
    weights: Vec<f64>,
    aggregate: Aggregate,
    with_scores: bool,
}

fn parse_setop_options(
    args: &[String],
    mut i: usize,
    numkeys: usize,
    allow_withscores: bool,
) -> StoreResult<SetOpOptions> {
    let mut weights: Vec<f64> = Vec::new();
    let mut aggregate = Aggregate::Sum;
    let mut with_scores = false;

    while i < args.len() {
        match args[i].to_lowercase().as_str() {
            "weights" => {
                if i + numkeys >= args.len() {
                    return Err(StoreError::SyntaxError);
                }
                for w in &args[i + 1..i + 1 + numkeys] {
                    weights.push(parse_f64(w)?);
                }
                i += numkeys;
            }
            "aggregate" => {
                let token = args.get(i + 1).ok_or(StoreError::SyntaxError)?;
                aggregate = match token.to_lowercase().as_str() {
                    "sum" => Aggregate::Sum,
                    "min" => Aggregate::Min,
                    "max" => Aggregate::Max,
                    _ => return Err(StoreError::SyntaxError),
                };
                i += 1;
            }
            "withscores" if allow_withscores => with_scores = true,
            _ => return Err(StoreError::SyntaxError),
        }
        i += 1;
    }

    if weights.is_empty() {
        weights = vec![1.0; numkeys];
    }
    Ok(SetOpOptions {
        weights,
        aggregate,
        with_scores,
    })
}

#[derive(Clone, Copy)]
enum SetOp {
    Union,
    Intersect,
}

fn combine(
    ctx: &Context,
    access: &Access,
    keys: &[String],
    weights: &[f64],
    aggregate: Aggregate,
    op: SetOp,
) -> StoreResult<SortedSet> {
    if ctx.is_cancelled() {
        return Err(StoreError::Cancelled);
    }
    let empty = SortedSet::new();
    let mut inputs: Vec<(&SortedSet, f64)> = Vec::with_capacity(keys.len());
    for (key, weight) in keys.iter().zip(weights) {
        let set = read_zset(access, key)?.unwrap_or(&empty);
        inputs.push((set, *weight));
    }
    Ok(match op {
        SetOp::Union => SortedSet::union(&inputs, aggregate),
        SetOp::Intersect => SortedSet::intersect(&inputs, aggregate),
    })
}

fn zsetop(ctx: &Context, args: &[String], access: &mut Access, op: SetOp) -> StoreResult<Reply> {
    let keys = numkeys_at(args, 1, "zunion")?;
    let options = parse_setop_options(args, 2 + keys.len(), keys.len(), true)?;
    let result = combine(ctx, access, &keys, &options.weights, options.aggregate, op)?;
    let records: Vec<(Vec<u8>, f64)> = result.iter().map(|(m, s)| (m.to_vec(), s)).collect();
    Ok(records_reply(records, options.with_scores))
}

fn cmd_zunion(ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    zsetop(ctx, args, access, SetOp::Union)
}

fn cmd_zinter(ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    zsetop(ctx, args, access, SetOp::Intersect)
}

fn zsetop_store(
    ctx: &Context,
    args: &[String],
    access: &mut Access,
    op: SetOp,
) -> StoreResult<Reply> {
    let destination = &args[1];
    let keys = numkeys_at(args, 2, "zunionstore")?;
    let options = parse_setop_options(args, 3 + keys.len(), keys.len(), false)?;
    let result = combine(ctx, access, &keys, &options.weights, options.aggregate, op)?;
    let cardinality = result.len() as i64;
    access.set_value(destination, Value::SortedSet(result))?;
    Ok(Reply::integer(cardinality))
}

fn cmd_zunionstore(ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    zsetop_store(ctx, args, access, SetOp::Union)
}

fn cmd_zinterstore(ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    zsetop_store(ctx, args, access, SetOp::Intersect)
}

fn zdiff_inputs<'a>(
    ctx: &Context,
    access: &'a Access,
    keys: &[String],
) -> StoreResult<(Option<&'a SortedSet>, Vec<&'a SortedSet>)> {
    if ctx.is_cancelled() {
        return Err(StoreError::Cancelled);
    }
    let base = read_zset(access, &keys[0])?;
    let mut others = Vec::with_capacity(keys.len() - 1);
    for key in &keys[1..] {
        if let Some(set) = read_zset(access, key)? {
            others.push(set);
        }
    }
    Ok((base, others))
}

fn cmd_zdiff(ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let keys = numkeys_at(args, 1, "zdiff")?;
    let with_scores = match args.get(2 + keys.len()) {
        Some(token) if token.eq_ignore_ascii_case("withscores") => true,
        Some(_) => return Err(StoreError::SyntaxError),
        None => false,
    };
    let (base, others) = zdiff_inputs(ctx, access, &keys)?;
    let Some(base) = base else {
        return Ok(Reply::empty_array());
    };
    let diff = base.subtract(&others);
    let records: Vec<(Vec<u8>, f64)> = diff.iter().map(|(m, s)| (m.to_vec(), s)).collect();
    Ok(records_reply(records, with_scores))
}

fn cmd_zdiffstore(ctx: &Context, args: &[String], access: &mut Access) -> StoreResult<Reply> {
    let destination = &args[1];
    let keys = numkeys_at(args, 2, "zdiffstore")?;
    if args.len() > 3 + keys.len() {
        return Err(StoreError::SyntaxError);
    }
    let (base, others) = zdiff_inputs(ctx, access, &keys)?;
    let diff = match base {
        Some(base) => base.subtract(&others),
        None => SortedSet::new(),
    };
    let cardinality = diff.len() as i64;
    access.set_value(destination, Value::SortedSet(diff))?;
    Ok(Reply::integer(cardinality))
}

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "zadd",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(ZADD key [NX | XX] [GT | LT] [CH] [INCR] score member [score member ...]) Adds or updates members.",
            synchronous: true,
            key_extractor: zadd_keys,
            handler: cmd_zadd,
        },
        CommandSpec {
            name: "zcard",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_FAST],
            description: "(ZCARD key) Cardinality of the sorted set.",
            synchronous: false,
            key_extractor: zcard_keys,
            handler: cmd_zcard,
        },
        CommandSpec {
            name: "zscore",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_FAST],
            description: "(ZSCORE key member) Score of the member.",
            synchronous: false,
            key_extractor: zscore_keys,
            handler: cmd_zscore,
        },
        CommandSpec {
            name: "zmscore",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_FAST],
            description: "(ZMSCORE key member [member ...]) Scores of the members, nil for missing ones.",
            synchronous: false,
            key_extractor: zmscore_keys,
            handler: cmd_zmscore,
        },
        CommandSpec {
            name: "zrem",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(ZREM key member [member ...]) Removes members; the set is kept even when emptied.",
            synchronous: true,
            key_extractor: zrem_keys,
            handler: cmd_zrem,
        },
        CommandSpec {
            name: "zincrby",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(ZINCRBY key increment member) Adds the increment to the member's score.",
            synchronous: true,
            key_extractor: zincrby_keys,
            handler: cmd_zincrby,
        },
        CommandSpec {
            name: "zrank",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_FAST],
            description: "(ZRANK key member) 0-based rank in ascending score order.",
            synchronous: false,
            key_extractor: zrank_keys,
            handler: cmd_zrank,
        },
        CommandSpec {
            name: "zrevrank",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_FAST],
            description: "(ZREVRANK key member) 0-based rank in descending score order.",
            synchronous: false,
            key_extractor: zrank_keys,
            handler: cmd_zrevrank,
        },
        CommandSpec {
            name: "zcount",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_FAST],
            description: "(ZCOUNT key min max) Number of members with scores in the range.",
            synchronous: false,
            key_extractor: zcount_keys,
            handler: cmd_zcount,
        },
        CommandSpec {
            name: "zlexcount",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_FAST],
            description: "(ZLEXCOUNT key min max) Number of members in the lex range; 0 unless all scores are equal.",
            synchronous: false,
            key_extractor: zcount_keys,
            handler: cmd_zlexcount,
        },
        CommandSpec {
            name: "zrange",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_SLOW],
            description: "(ZRANGE key start stop [BYSCORE | BYLEX] [REV] [LIMIT offset count] [WITHSCORES]) Members in a rank, score or lex range.",
            synchronous: false,
            key_extractor: zrange_keys,
            handler: cmd_zrange,
        },
        CommandSpec {
            name: "zrangebyscore",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_SLOW],
            description: "(ZRANGEBYSCORE key min max [WITHSCORES] [LIMIT offset count]) Members with scores in the range.",
            synchronous: false,
            key_extractor: zrange_keys,
            handler: cmd_zrangebyscore,
        },
        CommandSpec {
            name: "zrevrangebyscore",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_SLOW],
            description: "(ZREVRANGEBYSCORE key max min [WITHSCORES] [LIMIT offset count]) Score range in descending order.",
            synchronous: false,
            key_extractor: zrange_keys,
            handler: cmd_zrevrangebyscore,
        },
        CommandSpec {
            name: "zrangebylex",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_SLOW],
            description: "(ZRANGEBYLEX key min max [LIMIT offset count]) Members in the lex range; empty unless all scores are equal.",
            synchronous: false,
            key_extractor: zrange_keys,
            handler: cmd_zrangebylex,
        },
        CommandSpec {
            name: "zpopmin",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(ZPOPMIN key [count]) Removes and returns the lowest-scored members.",
            synchronous: true,
            key_extractor: zpop_keys,
            handler: cmd_zpopmin,
        },
        CommandSpec {
            name: "zpopmax",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_WRITE, CATEGORY_FAST],
            description: "(ZPOPMAX key [count]) Removes and returns the highest-scored members.",
            synchronous: true,
            key_extractor: zpop_keys,
            handler: cmd_zpopmax,
        },
        CommandSpec {
            name: "zrandmember",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_SLOW],
            description: "(ZRANDMEMBER key [count [WITHSCORES]]) Random members; a negative count permits repeats.",
            synchronous: false,
            key_extractor: zrandmember_keys,
            handler: cmd_zrandmember,
        },
        CommandSpec {
            name: "zremrangebyscore",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(ZREMRANGEBYSCORE key min max) Removes members with scores in the range.",
            synchronous: true,
            key_extractor: zremrange_keys,
            handler: cmd_zremrangebyscore,
        },
        CommandSpec {
            name: "zremrangebyrank",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(ZREMRANGEBYRANK key start stop) Removes members in the rank range.",
            synchronous: true,
            key_extractor: zremrange_keys,
            handler: cmd_zremrangebyrank,
        },
        CommandSpec {
            name: "zremrangebylex",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(ZREMRANGEBYLEX key min max) Removes members in the lex range.",
            synchronous: true,
            key_extractor: zremrange_keys,
            handler: cmd_zremrangebylex,
        },
        CommandSpec {
            name: "zunion",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_SLOW],
            description: "(ZUNION numkeys key [key ...] [WEIGHTS weight ...] [AGGREGATE SUM | MIN | MAX] [WITHSCORES]) Weighted union.",
            synchronous: false,
            key_extractor: zsetop_keys,
            handler: cmd_zunion,
        },
        CommandSpec {
            name: "zunionstore",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(ZUNIONSTORE destination numkeys key [key ...] [WEIGHTS weight ...] [AGGREGATE SUM | MIN | MAX]) Stores the weighted union.",
            synchronous: true,
            key_extractor: zsetop_store_keys,
            handler: cmd_zunionstore,
        },
        CommandSpec {
            name: "zinter",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_SLOW],
            description: "(ZINTER numkeys key [key ...] [WEIGHTS weight ...] [AGGREGATE SUM | MIN | MAX] [WITHSCORES]) Weighted intersection.",
            synchronous: false,
            key_extractor: zsetop_keys,
            handler: cmd_zinter,
        },
        CommandSpec {
            name: "zinterstore",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(ZINTERSTORE destination numkeys key [key ...] [WEIGHTS weight ...] [AGGREGATE SUM | MIN | MAX]) Stores the weighted intersection.",
            synchronous: true,
            key_extractor: zsetop_store_keys,
            handler: cmd_zinterstore,
        },
        CommandSpec {
            name: "zdiff",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_READ, CATEGORY_SLOW],
            description: "(ZDIFF numkeys key [key ...] [WITHSCORES]) Difference of the first set against the rest.",
            synchronous: false,
            key_extractor: zsetop_keys,
            handler: cmd_zdiff,
        },
        CommandSpec {
            name: "zdiffstore",
            categories: &[CATEGORY_SORTED_SET, CATEGORY_WRITE, CATEGORY_SLOW],
            description: "(ZDIFFSTORE destination numkeys key [key ...]) Stores the difference.",
            synchronous: true,
            key_extractor: zsetop_store_keys,
            handler: cmd_zdiffstore,
        },
    ]
}
