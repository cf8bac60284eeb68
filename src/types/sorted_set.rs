//! Sorted set — records of (member, score) ordered by score ascending with
//! lexicographic tie-break on the member bytes.
//!
//! The ordering structure is a skip list with per-link spans, giving
//! O(log n) insert/update/remove and O(log n) rank queries; a side
//! HashMap provides O(1) member → score lookup. Scores are IEEE-754
//! doubles; ±inf is legal, NaN is rejected at the command boundary and
//! never stored.

use crate::error::{StoreError, StoreResult};
use std::cmp::Ordering;
use std::collections::HashMap;

const MAX_LEVEL: usize = 32;
/// Probability of promoting a node one level up.
const LEVEL_P: f64 = 0.25;
const NIL: usize = usize::MAX;

/// Ordering used everywhere: score ascending, member bytes as tie-break.
/// NaN never reaches this function.
fn entry_cmp(a_score: f64, a_member: &[u8], b_score: f64, b_member: &[u8]) -> Ordering {
    match a_score.partial_cmp(&b_score) {
        Some(Ordering::Equal) | None => a_member.cmp(b_member),
        Some(ord) => ord,
    }
}

#[derive(Debug, Clone, Copy)]
struct Link {
    next: usize,
    /// Number of level-0 steps this link covers.
    span: usize,
}

#[derive(Debug, Clone)]
struct Node {
    member: Vec<u8>,
    score: f64,
    links: Vec<Link>,
}

/// Arena-backed skip list. Index 0 is the head sentinel.
#[derive(Debug, Clone)]
struct SkipList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    level: usize,
    len: usize,
}

impl SkipList {
    fn new() -> Self {
        SkipList {
            nodes: vec![Node {
                member: Vec::new(),
                score: 0.0,
                links: vec![Link { next: NIL, span: 0 }; MAX_LEVEL],
            }],
            free: Vec::new(),
            level: 1,
            len: 0,
        }
    }

    fn random_level(&self) -> usize {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut level = 1;
        while level < MAX_LEVEL && rng.gen::<f64>() < LEVEL_P {
            level += 1;
        }
        level
    }

    fn alloc(&mut self, member: Vec<u8>, score: f64, height: usize) -> usize {
        let node = Node {
            member,
            score,
            links: vec![Link { next: NIL, span: 0 }; height],
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Insert a member that is known not to be present.
    fn insert(&mut self, member: Vec<u8>, score: f64) {
        let mut update = [0usize; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];

        let mut x = 0;
        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            loop {
                let link = self.nodes[x].links[i];
                if link.next == NIL {
                    break;
                }
                let n = &self.nodes[link.next];
                if entry_cmp(n.score, &n.member, score, &member) == Ordering::Less {
                    rank[i] += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let height = self.random_level();
        if height > self.level {
            for i in self.level..height {
                rank[i] = 0;
                update[i] = 0;
                self.nodes[0].links[i] = Link {
                    next: NIL,
                    span: self.len,
                };
            }
            self.level = height;
        }

        let idx = self.alloc(member, score, height);
        for i in 0..height {
            let up_link = self.nodes[update[i]].links[i];
            self.nodes[idx].links[i] = Link {
                next: up_link.next,
                span: up_link.span - (rank[0] - rank[i]),
            };
            self.nodes[update[i]].links[i] = Link {
                next: idx,
                span: rank[0] - rank[i] + 1,
            };
        }
        for i in height..self.level {
            self.nodes[update[i]].links[i].span += 1;
        }
        self.len += 1;
    }

    fn remove(&mut self, member: &[u8], score: f64) -> bool {
        let mut update = [0usize; MAX_LEVEL];

        let mut x = 0;
        for i in (0..self.level).rev() {
            loop {
                let link = self.nodes[x].links[i];
                if link.next == NIL {
                    break;
                }
                let n = &self.nodes[link.next];
                if entry_cmp(n.score, &n.member, score, member) == Ordering::Less {
                    x = link.next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let target = self.nodes[x].links[0].next;
        if target == NIL {
            return false;
        }
        {
            let t = &self.nodes[target];
            if t.score != score || t.member != member {
                return false;
            }
        }

        for i in 0..self.level {
            if self.nodes[update[i]].links[i].next == target {
                let t_link = self.nodes[target].links[i];
                let up = &mut self.nodes[update[i]].links[i];
                up.span += t_link.span - 1;
                up.next = t_link.next;
            } else {
                self.nodes[update[i]].links[i].span -= 1;
            }
        }

        while self.level > 1 && self.nodes[0].links[self.level - 1].next == NIL {
            self.level -= 1;
        }
        self.len -= 1;
        self.nodes[target].member = Vec::new();
        self.nodes[target].links = Vec::new();
        self.free.push(target);
        true
    }

    /// 0-based rank of a member known to hold `score`.
    fn rank(&self, member: &[u8], score: f64) -> Option<usize> {
        let mut x = 0;
        let mut traversed = 0usize;
        for i in (0..self.level).rev() {
            loop {
                let link = self.nodes[x].links[i];
                if link.next == NIL {
                    break;
                }
                let n = &self.nodes[link.next];
                match entry_cmp(n.score, &n.member, score, member) {
                    Ordering::Less => {
                        traversed += link.span;
                        x = link.next;
                    }
                    Ordering::Equal => return Some(traversed + link.span - 1),
                    Ordering::Greater => break,
                }
            }
        }
        None
    }

    /// Node index at 0-based rank `r`, or NIL.
    fn node_at_rank(&self, r: usize) -> usize {
        if r >= self.len {
            return NIL;
        }
        let target = r + 1;
        let mut x = 0;
        let mut traversed = 0usize;
        for i in (0..self.level).rev() {
            loop {
                let link = self.nodes[x].links[i];
                if link.next != NIL && traversed + link.span <= target {
                    traversed += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
            if traversed == target {
                return x;
            }
        }
        NIL
    }

    fn first(&self) -> usize {
        self.nodes[0].links[0].next
    }

    fn last(&self) -> usize {
        let mut x = 0;
        for i in (0..self.level).rev() {
            loop {
                let next = self.nodes[x].links[i].next;
                if next == NIL {
                    break;
                }
                x = next;
            }
        }
        if x == 0 {
            NIL
        } else {
            x
        }
    }
}

/// Inclusive/exclusive score bound, as parsed from `(5` / `5` / `±inf`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBound {
    pub value: f64,
    pub exclusive: bool,
}

impl ScoreBound {
    pub fn inclusive(value: f64) -> Self {
        ScoreBound {
            value,
            exclusive: false,
        }
    }

    pub fn exclusive(value: f64) -> Self {
        ScoreBound {
            value,
            exclusive: true,
        }
    }

    /// Does `score` satisfy this as a lower bound?
    pub fn admits_above(&self, score: f64) -> bool {
        if self.exclusive {
            score > self.value
        } else {
            score >= self.value
        }
    }

    /// Does `score` satisfy this as an upper bound?
    pub fn admits_below(&self, score: f64) -> bool {
        if self.exclusive {
            score < self.value
        } else {
            score <= self.value
        }
    }
}

/// Lexicographic bound, as parsed from `[x` / `(x` / `-` / `+`.
#[derive(Debug, Clone, PartialEq)]
pub enum LexBound {
    NegInf,
    PosInf,
    Incl(Vec<u8>),
    Excl(Vec<u8>),
}

impl LexBound {
    pub fn admits_above(&self, member: &[u8]) -> bool {
        match self {
            LexBound::NegInf => true,
            LexBound::PosInf => false,
            LexBound::Incl(b) => member >= b.as_slice(),
            LexBound::Excl(b) => member > b.as_slice(),
        }
    }

    pub fn admits_below(&self, member: &[u8]) -> bool {
        match self {
            LexBound::NegInf => false,
            LexBound::PosInf => true,
            LexBound::Incl(b) => member <= b.as_slice(),
            LexBound::Excl(b) => member < b.as_slice(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    Always,
    OnlyIfAbsent,
    OnlyIfPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreComparison {
    Always,
    OnlyIfGreater,
    OnlyIfLess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Min,
    Max,
}

impl Aggregate {
    fn combine(&self, a: f64, b: f64) -> f64 {
        match self {
            Aggregate::Sum => {
                let sum = a + b;
                // inf + -inf: the reference behaviour is 0, not NaN.
                if sum.is_nan() {
                    0.0
                } else {
                    sum
                }
            }
            Aggregate::Min => a.min(b),
            Aggregate::Max => a.max(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopSide {
    Min,
    Max,
}

/// Result of `add_or_update`: a count of affected members, or — in INCR
/// mode — the new score (None when a policy skipped the update).
#[derive(Debug, Clone, PartialEq)]
pub enum ZAddOutcome {
    Count(usize),
    Score(Option<f64>),
}

#[derive(Debug, Clone)]
pub struct SortedSet {
    index: HashMap<Vec<u8>, f64>,
    list: SkipList,
}

impl Default for SortedSet {
    fn default() -> Self {
        SortedSet::new()
    }
}

impl PartialEq for SortedSet {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl SortedSet {
    pub fn new() -> Self {
        SortedSet {
            index: HashMap::new(),
            list: SkipList::new(),
        }
    }

    pub fn with_members(members: Vec<(Vec<u8>, f64)>) -> Self {
        let mut set = SortedSet::new();
        for (member, score) in members {
            set.upsert(member, score);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, member: &[u8]) -> bool {
        self.index.contains_key(member)
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.index.get(member).copied()
    }

    /// Insert or reposition a member. Returns true if the member was new.
    fn upsert(&mut self, member: Vec<u8>, score: f64) -> bool {
        match self.index.insert(member.clone(), score) {
            Some(old) => {
                if old != score {
                    self.list.remove(&member, old);
                    self.list.insert(member, score);
                }
                false
            }
            None => {
                self.list.insert(member, score);
                true
            }
        }
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.index.remove(member) {
            Some(score) => {
                self.list.remove(member, score);
                true
            }
            None => false,
        }
    }

    /// Add or update a batch of members under the given policy.
    ///
    /// `changed` counts score updates as well as insertions in the returned
    /// count. `incr` requires exactly one member and returns the new score
    /// instead of a count; the provided score acts as a delta.
    pub fn add_or_update(
        &mut self,
        members: &[(Vec<u8>, f64)],
        policy: UpdatePolicy,
        comparison: ScoreComparison,
        changed: bool,
        incr: bool,
    ) -> StoreResult<ZAddOutcome> {
        if policy == UpdatePolicy::OnlyIfAbsent && comparison != ScoreComparison::Always {
            return Err(StoreError::OptionConflict(
                "GT, LT, and NX options at the same time are not compatible".to_string(),
            ));
        }
        if members.iter().any(|(_, s)| s.is_nan()) {
            return Err(StoreError::NotFloat);
        }

        if incr {
            if members.len() != 1 {
                return Err(StoreError::Generic(
                    "INCR option supports a single increment-element pair".to_string(),
                ));
            }
            let (member, delta) = &members[0];
            return match self.score(member) {
                None => {
                    if policy == UpdatePolicy::OnlyIfPresent {
                        return Ok(ZAddOutcome::Score(None));
                    }
                    self.upsert(member.clone(), *delta);
                    Ok(ZAddOutcome::Score(Some(*delta)))
                }
                Some(old) => {
                    if policy == UpdatePolicy::OnlyIfAbsent {
                        return Ok(ZAddOutcome::Score(None));
                    }
                    let new = old + delta;
                    if new.is_nan() {
                        return Err(StoreError::Generic(
                            "resulting score is not a number (NaN)".to_string(),
                        ));
                    }
                    match comparison {
                        ScoreComparison::OnlyIfGreater if new <= old => {
                            return Ok(ZAddOutcome::Score(None))
                        }
                        ScoreComparison::OnlyIfLess if new >= old => {
                            return Ok(ZAddOutcome::Score(None))
                        }
                        _ => {}
                    }
                    self.upsert(member.clone(), new);
                    Ok(ZAddOutcome::Score(Some(new)))
                }
            };
        }

        let mut added = 0usize;
        let mut updated = 0usize;
        for (member, score) in members {
            match self.score(member) {
                None => {
                    if policy == UpdatePolicy::OnlyIfPresent {
                        continue;
                    }
                    self.upsert(member.clone(), *score);
                    added += 1;
                }
                Some(old) => {
                    if policy == UpdatePolicy::OnlyIfAbsent {
                        continue;
                    }
                    match comparison {
                        ScoreComparison::OnlyIfGreater if *score <= old => continue,
                        ScoreComparison::OnlyIfLess if *score >= old => continue,
                        _ => {}
                    }
                    if *score != old {
                        self.upsert(member.clone(), *score);
                        updated += 1;
                    }
                }
            }
        }
        Ok(ZAddOutcome::Count(if changed { added + updated } else { added }))
    }

    /// 0-based rank by score order; `reverse` counts from the high end.
    pub fn rank(&self, member: &[u8], reverse: bool) -> Option<usize> {
        let score = self.score(member)?;
        let r = self.list.rank(member, score)?;
        Some(if reverse { self.len() - 1 - r } else { r })
    }

    /// Member at a given 0-based forward rank.
    pub fn at_rank(&self, r: usize) -> Option<(&[u8], f64)> {
        let idx = self.list.node_at_rank(r);
        if idx == NIL {
            return None;
        }
        let node = &self.list.nodes[idx];
        Some((node.member.as_slice(), node.score))
    }

    pub fn count_by_score(&self, min: &ScoreBound, max: &ScoreBound) -> usize {
        self.iter()
            .filter(|(_, s)| min.admits_above(*s) && max.admits_below(*s))
            .count()
    }

    /// Count by lex range. Only meaningful when every record carries the
    /// same score; otherwise 0.
    pub fn count_by_lex(&self, min: &LexBound, max: &LexBound) -> usize {
        if !self.all_same_score() {
            return 0;
        }
        self.iter()
            .filter(|(m, _)| min.admits_above(m) && max.admits_below(m))
            .count()
    }

    /// Rank range with negative-index notation, like LRANGE.
    pub fn range_by_rank(&self, start: i64, stop: i64, reverse: bool) -> Vec<(Vec<u8>, f64)> {
        let len = self.len() as i64;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { (len + stop).max(0) } else { stop };

        if start > stop || start >= len || len == 0 {
            return vec![];
        }
        let stop = stop.min(len - 1);

        // A reverse rank r maps to forward rank len-1-r.
        let (fwd_start, fwd_stop) = if reverse {
            (len - 1 - stop, len - 1 - start)
        } else {
            (start, stop)
        };

        let mut out = Vec::with_capacity((fwd_stop - fwd_start + 1) as usize);
        let mut idx = self.list.node_at_rank(fwd_start as usize);
        while idx != NIL && out.len() < (fwd_stop - fwd_start + 1) as usize {
            let node = &self.list.nodes[idx];
            out.push((node.member.clone(), node.score));
            idx = node.links[0].next;
        }
        if reverse {
            out.reverse();
        }
        out
    }

    /// Score range with optional reversal and offset/count windowing.
    /// A negative count means unbounded.
    pub fn range_by_score(
        &self,
        min: &ScoreBound,
        max: &ScoreBound,
        reverse: bool,
        offset: usize,
        count: i64,
    ) -> Vec<(Vec<u8>, f64)> {
        let mut matched: Vec<(Vec<u8>, f64)> = self
            .iter()
            .filter(|(_, s)| min.admits_above(*s) && max.admits_below(*s))
            .map(|(m, s)| (m.to_vec(), s))
            .collect();
        if reverse {
            matched.reverse();
        }
        window(matched, offset, count)
    }

    /// Lex range; empty unless every record carries the same score.
    pub fn range_by_lex(
        &self,
        min: &LexBound,
        max: &LexBound,
        reverse: bool,
        offset: usize,
        count: i64,
    ) -> Vec<(Vec<u8>, f64)> {
        if !self.all_same_score() {
            return vec![];
        }
        let mut matched: Vec<(Vec<u8>, f64)> = self
            .iter()
            .filter(|(m, _)| min.admits_above(m) && max.admits_below(m))
            .map(|(m, s)| (m.to_vec(), s))
            .collect();
        if reverse {
            matched.reverse();
        }
        window(matched, offset, count)
    }

    /// Remove and return up to `count` extremal records.
    pub fn pop(&mut self, count: usize, side: PopSide) -> Vec<(Vec<u8>, f64)> {
        let mut out = Vec::new();
        for _ in 0..count {
            if self.is_empty() {
                break;
            }
            let rank = match side {
                PopSide::Min => 0,
                PopSide::Max => self.len() - 1,
            };
            let (member, score) = match self.at_rank(rank) {
                Some((m, s)) => (m.to_vec(), s),
                None => break,
            };
            self.remove(&member);
            out.push((member, score));
        }
        out
    }

    /// Sample `count` records. Positive count returns distinct members
    /// (all of them when count >= cardinality); negative count permits
    /// repeats and returns exactly |count| records.
    pub fn random_members(&self, count: i64) -> Vec<(Vec<u8>, f64)> {
        use rand::seq::IteratorRandom;
        let mut rng = rand::thread_rng();

        if count >= 0 {
            let count = (count as usize).min(self.len());
            self.index
                .iter()
                .choose_multiple(&mut rng, count)
                .into_iter()
                .map(|(m, s)| (m.clone(), *s))
                .collect()
        } else {
            let members: Vec<(&Vec<u8>, &f64)> = self.index.iter().collect();
            if members.is_empty() {
                return vec![];
            }
            let count = count.unsigned_abs() as usize;
            (0..count)
                .map(|_| {
                    use rand::Rng;
                    let (m, s) = members[rng.gen_range(0..members.len())];
                    (m.clone(), *s)
                })
                .collect()
        }
    }

    /// Set difference by member; scores come from `self`.
    pub fn subtract(&self, others: &[&SortedSet]) -> SortedSet {
        let mut result = SortedSet::new();
        for (member, score) in self.iter() {
            if !others.iter().any(|o| o.contains(member)) {
                result.upsert(member.to_vec(), score);
            }
        }
        result
    }

    /// Weighted union. Each input's scores are multiplied by its weight and
    /// duplicates combine under the aggregate. A weighted score of NaN
    /// (0 × inf) normalises to 0.
    pub fn union(inputs: &[(&SortedSet, f64)], aggregate: Aggregate) -> SortedSet {
        let mut combined: HashMap<Vec<u8>, f64> = HashMap::new();
        for (set, weight) in inputs {
            for (member, score) in set.iter() {
                let weighted = weigh(score, *weight);
                combined
                    .entry(member.to_vec())
                    .and_modify(|cur| *cur = aggregate.combine(*cur, weighted))
                    .or_insert(weighted);
            }
        }
        let mut result = SortedSet::new();
        for (member, score) in combined {
            result.upsert(member, score);
        }
        result
    }

    /// Weighted intersection: members present in every input.
    pub fn intersect(inputs: &[(&SortedSet, f64)], aggregate: Aggregate) -> SortedSet {
        let mut result = SortedSet::new();
        let Some(((first, first_weight), rest)) = inputs.split_first() else {
            return result;
        };
        for (member, score) in first.iter() {
            if !rest.iter().all(|(o, _)| o.contains(member)) {
                continue;
            }
            let mut acc = weigh(score, *first_weight);
            for (other, weight) in rest {
                let other_score = other.score(member).unwrap_or(0.0);
                acc = aggregate.combine(acc, weigh(other_score, *weight));
            }
            result.upsert(member.to_vec(), acc);
        }
        result
    }

    /// Iterate all records in score order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: &self.list,
            node: self.list.first(),
        }
    }

    fn all_same_score(&self) -> bool {
        if self.len() <= 1 {
            return true;
        }
        let first = self.list.first();
        let last = self.list.last();
        self.list.nodes[first].score == self.list.nodes[last].score
    }
}

fn weigh(score: f64, weight: f64) -> f64 {
    let weighted = score * weight;
    if weighted.is_nan() {
        0.0
    } else {
        weighted
    }
}

fn window(matched: Vec<(Vec<u8>, f64)>, offset: usize, count: i64) -> Vec<(Vec<u8>, f64)> {
    let take = if count < 0 {
        matched.len()
    } else {
        count as usize
    };
    matched.into_iter().skip(offset).take(take).collect()
}

pub struct Iter<'a> {
    list: &'a SkipList,
    node: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.node == NIL {
            return None;
        }
        let n = &self.list.nodes[self.node];
        self.node = n.links[0].next;
        Some((n.member.as_slice(), n.score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zset(pairs: &[(&str, f64)]) -> SortedSet {
        SortedSet::with_members(
            pairs
                .iter()
                .map(|(m, s)| (m.as_bytes().to_vec(), *s))
                .collect(),
        )
    }

    fn members_of(set: &SortedSet) -> Vec<String> {
        set.iter()
            .map(|(m, _)| String::from_utf8_lossy(m).into_owned())
            .collect()
    }

    #[test]
    fn test_insert_orders_by_score_then_member() {
        let set = zset(&[("b", 2.0), ("a", 1.0), ("c", 2.0), ("d", 0.5)]);
        assert_eq!(members_of(&set), vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn test_rank() {
        let set = zset(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        assert_eq!(set.rank(b"a", false), Some(0));
        assert_eq!(set.rank(b"c", false), Some(2));
        assert_eq!(set.rank(b"c", true), Some(0));
        assert_eq!(set.rank(b"missing", false), None);
    }

    #[test]
    fn test_at_rank() {
        let set = zset(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        assert_eq!(set.at_rank(0).map(|(m, _)| m.to_vec()), Some(b"a".to_vec()));
        assert_eq!(set.at_rank(2).map(|(m, _)| m.to_vec()), Some(b"c".to_vec()));
        assert_eq!(set.at_rank(3), None);
    }

    #[test]
    fn test_update_repositions() {
        let mut set = zset(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        set.add_or_update(
            &[(b"a".to_vec(), 10.0)],
            UpdatePolicy::Always,
            ScoreComparison::Always,
            false,
            false,
        )
        .unwrap();
        assert_eq!(members_of(&set), vec!["b", "c", "a"]);
        assert_eq!(set.rank(b"a", false), Some(2));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_remove_keeps_ranks_consistent() {
        let mut set = zset(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
        assert!(set.remove(b"b"));
        assert!(!set.remove(b"b"));
        assert_eq!(set.rank(b"c", false), Some(1));
        assert_eq!(set.rank(b"d", false), Some(2));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_add_policies() {
        let mut set = zset(&[("a", 1.0)]);

        // OnlyIfAbsent leaves existing members alone.
        let out = set
            .add_or_update(
                &[(b"a".to_vec(), 5.0), (b"b".to_vec(), 2.0)],
                UpdatePolicy::OnlyIfAbsent,
                ScoreComparison::Always,
                false,
                false,
            )
            .unwrap();
        assert_eq!(out, ZAddOutcome::Count(1));
        assert_eq!(set.score(b"a"), Some(1.0));
        assert_eq!(set.score(b"b"), Some(2.0));

        // OnlyIfPresent never creates.
        let out = set
            .add_or_update(
                &[(b"c".to_vec(), 3.0), (b"a".to_vec(), 9.0)],
                UpdatePolicy::OnlyIfPresent,
                ScoreComparison::Always,
                true,
                false,
            )
            .unwrap();
        assert_eq!(out, ZAddOutcome::Count(1));
        assert!(!set.contains(b"c"));
        assert_eq!(set.score(b"a"), Some(9.0));
    }

    #[test]
    fn test_nx_with_comparison_conflicts() {
        let mut set = SortedSet::new();
        let err = set
            .add_or_update(
                &[(b"a".to_vec(), 1.0)],
                UpdatePolicy::OnlyIfAbsent,
                ScoreComparison::OnlyIfGreater,
                false,
                false,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::OptionConflict(_)));
    }

    #[test]
    fn test_comparison_gates() {
        let mut set = zset(&[("a", 5.0)]);
        set.add_or_update(
            &[(b"a".to_vec(), 3.0)],
            UpdatePolicy::Always,
            ScoreComparison::OnlyIfGreater,
            false,
            false,
        )
        .unwrap();
        assert_eq!(set.score(b"a"), Some(5.0));

        set.add_or_update(
            &[(b"a".to_vec(), 3.0)],
            UpdatePolicy::Always,
            ScoreComparison::OnlyIfLess,
            false,
            false,
        )
        .unwrap();
        assert_eq!(set.score(b"a"), Some(3.0));
    }

    #[test]
    fn test_incr() {
        let mut set = zset(&[("a", 1.0)]);
        let out = set
            .add_or_update(
                &[(b"a".to_vec(), 5.0)],
                UpdatePolicy::Always,
                ScoreComparison::Always,
                false,
                true,
            )
            .unwrap();
        assert_eq!(out, ZAddOutcome::Score(Some(6.0)));

        // INCR on a fresh member seeds it with the delta.
        let out = set
            .add_or_update(
                &[(b"b".to_vec(), 2.5)],
                UpdatePolicy::Always,
                ScoreComparison::Always,
                false,
                true,
            )
            .unwrap();
        assert_eq!(out, ZAddOutcome::Score(Some(2.5)));

        // Skipped by policy: nil, not an error.
        let out = set
            .add_or_update(
                &[(b"a".to_vec(), 1.0)],
                UpdatePolicy::OnlyIfAbsent,
                ScoreComparison::Always,
                false,
                true,
            )
            .unwrap();
        assert_eq!(out, ZAddOutcome::Score(None));
    }

    #[test]
    fn test_incr_opposite_infinities() {
        let mut set = zset(&[("a", f64::INFINITY)]);
        let err = set
            .add_or_update(
                &[(b"a".to_vec(), f64::NEG_INFINITY)],
                UpdatePolicy::Always,
                ScoreComparison::Always,
                false,
                true,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Generic(_)));
    }

    #[test]
    fn test_range_by_rank() {
        let set = zset(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
        let all: Vec<_> = set
            .range_by_rank(0, -1, false)
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(all, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);

        let rev: Vec<_> = set
            .range_by_rank(0, 1, true)
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(rev, vec![b"d".to_vec(), b"c".to_vec()]);

        assert!(set.range_by_rank(5, 10, false).is_empty());
        assert_eq!(set.range_by_rank(-2, -1, false).len(), 2);
    }

    #[test]
    fn test_range_by_score_bounds() {
        let set = zset(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let got: Vec<_> = set
            .range_by_score(
                &ScoreBound::inclusive(2.0),
                &ScoreBound::inclusive(f64::INFINITY),
                false,
                0,
                -1,
            )
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(got, vec![b"b".to_vec(), b"c".to_vec()]);

        let got = set.range_by_score(
            &ScoreBound::exclusive(2.0),
            &ScoreBound::inclusive(f64::INFINITY),
            false,
            0,
            -1,
        );
        assert_eq!(got.len(), 1);

        // Windowing applies after reversal.
        let got: Vec<_> = set
            .range_by_score(
                &ScoreBound::inclusive(f64::NEG_INFINITY),
                &ScoreBound::inclusive(f64::INFINITY),
                true,
                1,
                1,
            )
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(got, vec![b"b".to_vec()]);
    }

    #[test]
    fn test_lex_ranges_require_equal_scores() {
        let same = zset(&[("a", 0.0), ("b", 0.0), ("c", 0.0)]);
        assert_eq!(
            same.count_by_lex(&LexBound::NegInf, &LexBound::PosInf),
            3
        );
        assert_eq!(
            same.count_by_lex(
                &LexBound::Excl(b"a".to_vec()),
                &LexBound::Incl(b"c".to_vec())
            ),
            2
        );

        let mixed = zset(&[("a", 0.0), ("b", 1.0)]);
        assert_eq!(mixed.count_by_lex(&LexBound::NegInf, &LexBound::PosInf), 0);
        assert!(mixed
            .range_by_lex(&LexBound::NegInf, &LexBound::PosInf, false, 0, -1)
            .is_empty());
    }

    #[test]
    fn test_pop() {
        let mut set = zset(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let popped = set.pop(2, PopSide::Min);
        assert_eq!(
            popped,
            vec![(b"a".to_vec(), 1.0), (b"b".to_vec(), 2.0)]
        );
        assert_eq!(set.len(), 1);

        let popped = set.pop(5, PopSide::Max);
        assert_eq!(popped, vec![(b"c".to_vec(), 3.0)]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_random_members() {
        let set = zset(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        assert_eq!(set.random_members(2).len(), 2);
        assert_eq!(set.random_members(10).len(), 3);
        assert_eq!(set.random_members(-5).len(), 5);
    }

    #[test]
    fn test_subtract() {
        let a = zset(&[("x", 1.0), ("y", 2.0), ("z", 3.0)]);
        let b = zset(&[("y", 9.0)]);
        let diff = a.subtract(&[&b]);
        assert_eq!(members_of(&diff), vec!["x", "z"]);
        assert_eq!(diff.score(b"x"), Some(1.0));
    }

    #[test]
    fn test_union_weights_and_aggregates() {
        let a = zset(&[("x", 1.0), ("y", 2.0)]);
        let b = zset(&[("y", 3.0), ("z", 4.0)]);

        let sum = SortedSet::union(&[(&a, 2.0), (&b, 3.0)], Aggregate::Sum);
        assert_eq!(sum.score(b"x"), Some(2.0));
        assert_eq!(sum.score(b"y"), Some(13.0));
        assert_eq!(sum.score(b"z"), Some(12.0));

        let max = SortedSet::union(&[(&a, 2.0), (&b, 3.0)], Aggregate::Max);
        assert_eq!(max.score(b"y"), Some(9.0));

        let min = SortedSet::union(&[(&a, 1.0), (&b, 1.0)], Aggregate::Min);
        assert_eq!(min.score(b"y"), Some(2.0));
    }

    #[test]
    fn test_union_zero_weight_of_infinity() {
        let a = zset(&[("x", f64::INFINITY)]);
        let out = SortedSet::union(&[(&a, 0.0)], Aggregate::Sum);
        assert_eq!(out.score(b"x"), Some(0.0));
    }

    #[test]
    fn test_intersect() {
        let a = zset(&[("x", 1.0), ("y", 2.0)]);
        let b = zset(&[("y", 3.0), ("z", 4.0)]);
        let inter = SortedSet::intersect(&[(&a, 1.0), (&b, 1.0)], Aggregate::Sum);
        assert_eq!(members_of(&inter), vec!["y"]);
        assert_eq!(inter.score(b"y"), Some(5.0));
    }

    #[test]
    fn test_infinite_scores_sort_at_extremes() {
        let set = zset(&[
            ("mid", 0.0),
            ("hi", f64::INFINITY),
            ("lo", f64::NEG_INFINITY),
        ]);
        assert_eq!(members_of(&set), vec!["lo", "mid", "hi"]);
        assert_eq!(set.rank(b"hi", false), Some(2));
    }

    #[test]
    fn test_random_insertions_match_reference_sort() {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        let mut set = SortedSet::new();
        let mut reference: Vec<(Vec<u8>, f64)> = Vec::new();

        for i in 0..500 {
            let member = format!("m{:03}", rng.gen_range(0..200)).into_bytes();
            let score: f64 = rng.gen_range(-100.0..100.0);
            set.upsert(member.clone(), score);
            reference.retain(|(m, _)| *m != member);
            reference.push((member, score));

            if i % 7 == 0 && !reference.is_empty() {
                let victim = reference[rng.gen_range(0..reference.len())].0.clone();
                set.remove(&victim);
                reference.retain(|(m, _)| *m != victim);
            }
        }

        reference.sort_by(|(am, asc), (bm, bsc)| {
            entry_cmp(*asc, am, *bsc, bm)
        });

        let got: Vec<(Vec<u8>, f64)> = set.iter().map(|(m, s)| (m.to_vec(), s)).collect();
        assert_eq!(got, reference);

        // Ranks agree with positions in the reference sort.
        for (i, (member, _)) in reference.iter().enumerate() {
            assert_eq!(set.rank(member, false), Some(i));
            assert_eq!(
                set.at_rank(i).map(|(m, _)| m.to_vec()),
                Some(member.clone())
            );
        }
    }
}
