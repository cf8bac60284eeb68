use lodestore::api::{ExpireOptions, SetOptions, ZAddOptions};
use lodestore::{Config, Context, Store, StoreError};
use std::sync::Arc;
use std::time::Duration;

fn cmd(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

async fn raw(store: &Store, parts: &[&str]) -> Vec<u8> {
    store.handle_command(&Context::background(), &cmd(parts)).await
}

#[tokio::test]
async fn test_set_get_strlen_wire_format() {
    let store = Store::new(Config::default());

    assert_eq!(raw(&store, &["SET", "foo", "bar"]).await, b"+OK\r\n");
    assert_eq!(raw(&store, &["GET", "foo"]).await, b"$3\r\nbar\r\n");
    assert_eq!(raw(&store, &["STRLEN", "foo"]).await, b":3\r\n");
    assert_eq!(raw(&store, &["GET", "missing"]).await, b"$-1\r\n");
}

#[tokio::test]
async fn test_list_wire_format() {
    let store = Store::new(Config::default());

    assert_eq!(raw(&store, &["RPUSH", "l", "1", "2", "3"]).await, b":3\r\n");
    assert_eq!(
        raw(&store, &["LRANGE", "l", "0", "-1"]).await,
        b"*3\r\n$1\r\n1\r\n$1\r\n2\r\n$1\r\n3\r\n"
    );
    assert_eq!(raw(&store, &["LPOP", "l"]).await, b"$1\r\n1\r\n");
}

#[tokio::test]
async fn test_sorted_set_wire_format() {
    let store = Store::new(Config::default());

    assert_eq!(
        raw(&store, &["ZADD", "z", "1", "a", "2", "b", "3", "c"]).await,
        b":3\r\n"
    );
    assert_eq!(
        raw(&store, &["ZRANGEBYSCORE", "z", "2", "+inf"]).await,
        b"*2\r\n$1\r\nb\r\n$1\r\nc\r\n"
    );
    assert_eq!(raw(&store, &["ZRANK", "z", "c"]).await, b":2\r\n");
}

#[tokio::test]
async fn test_hgetall_contains_all_pairs() {
    let store = Store::new(Config::default());

    assert_eq!(
        raw(&store, &["HSET", "h", "f1", "v1", "f2", "v2"]).await,
        b":2\r\n"
    );
    let pairs = store.hgetall("h").await.unwrap();
    assert_eq!(pairs.len(), 2);
    assert!(pairs.contains(&("f1".to_string(), "v1".to_string())));
    assert!(pairs.contains(&("f2".to_string(), "v2".to_string())));
}

#[tokio::test]
async fn test_zunionstore_weights_and_aggregate() {
    let store = Store::new(Config::default());

    raw(&store, &["ZADD", "a", "1", "x", "2", "y"]).await;
    raw(&store, &["ZADD", "b", "3", "y", "4", "z"]).await;
    assert_eq!(
        raw(
            &store,
            &[
                "ZUNIONSTORE", "out", "2", "a", "b", "WEIGHTS", "2", "3", "AGGREGATE", "MAX",
            ],
        )
        .await,
        b":3\r\n"
    );
    // y: max(2*2, 3*3) = 9
    assert_eq!(raw(&store, &["ZSCORE", "out", "y"]).await, b"$1\r\n9\r\n");
    assert_eq!(raw(&store, &["ZSCORE", "out", "x"]).await, b"$1\r\n2\r\n");
    assert_eq!(raw(&store, &["ZSCORE", "out", "z"]).await, b"$2\r\n12\r\n");
}

#[tokio::test]
async fn test_set_with_expiry_wire() {
    let store = Store::new(Config::default());

    assert_eq!(raw(&store, &["SET", "k", "v", "PX", "120"]).await, b"+OK\r\n");
    assert_eq!(raw(&store, &["GET", "k"]).await, b"$1\r\nv\r\n");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(raw(&store, &["GET", "k"]).await, b"$-1\r\n");
}

#[tokio::test]
async fn test_expire_ttl_exists() {
    let store = Store::new(Config::default());

    store.set("k", "v", SetOptions::default()).await.unwrap();
    assert!(store.expire("k", 1, ExpireOptions::default()).await.unwrap());

    let ttl = store.ttl("k").await.unwrap();
    assert!((0..=1).contains(&ttl), "ttl was {ttl}");

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(store.exists(&["k"]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_expire_option_flags() {
    let store = Store::new(Config::default());
    store.set("k", "v", SetOptions::default()).await.unwrap();

    // NX applies only without an existing expiry.
    assert!(store
        .expire("k", 100, ExpireOptions { nx: true, ..Default::default() })
        .await
        .unwrap());
    assert!(!store
        .expire("k", 100, ExpireOptions { nx: true, ..Default::default() })
        .await
        .unwrap());

    // GT only extends.
    assert!(!store
        .expire("k", 50, ExpireOptions { gt: true, ..Default::default() })
        .await
        .unwrap());
    assert!(store
        .expire("k", 500, ExpireOptions { gt: true, ..Default::default() })
        .await
        .unwrap());

    // Conflicting flags error out.
    let reply = raw(&store, &["EXPIRE", "k", "10", "NX", "XX"]).await;
    assert!(reply.starts_with(b"-ERR"), "got {:?}", String::from_utf8_lossy(&reply));
    let reply = raw(&store, &["EXPIRE", "k", "10", "GT", "LT"]).await;
    assert!(reply.starts_with(b"-ERR"));
}

#[tokio::test]
async fn test_hash_round_trip() {
    let store = Store::new(Config::default());

    store.hset("h", &[("f", "v")]).await.unwrap();
    assert_eq!(store.hget("h", "f").await.unwrap().as_deref(), Some("v"));

    // HSETNX leaves the existing value alone.
    assert!(!store.hsetnx("h", "f", "other").await.unwrap());
    assert_eq!(store.hget("h", "f").await.unwrap().as_deref(), Some("v"));

    assert!(store.hsetnx("h", "g", "w").await.unwrap());
    assert_eq!(store.hlen("h").await.unwrap(), 2);
}

#[tokio::test]
async fn test_set_round_trip() {
    let store = Store::new(Config::default());

    store.sadd("s", &["a", "b", "c"]).await.unwrap();
    assert_eq!(store.srem("s", &["c"]).await.unwrap(), 1);
    let mut members = store.smembers("s").await.unwrap();
    members.sort();
    assert_eq!(members, vec!["a", "b"]);
}

#[tokio::test]
async fn test_zincrby_round_trip() {
    let store = Store::new(Config::default());

    store
        .zadd("k", &[(1.0, "a"), (2.0, "b")], ZAddOptions::default())
        .await
        .unwrap();
    assert_eq!(store.zincr_by("k", 5.0, "a").await.unwrap(), "6");
    assert_eq!(store.zscore("k", "a").await.unwrap().as_deref(), Some("6"));
}

#[tokio::test]
async fn test_zcard_tracks_adds_and_removes() {
    let store = Store::new(Config::default());

    store
        .zadd("z", &[(1.0, "a"), (2.0, "b"), (3.0, "c")], ZAddOptions::default())
        .await
        .unwrap();
    assert_eq!(store.zcard("z").await.unwrap(), 3);

    // Re-adding an existing member must not bump cardinality.
    store.zadd("z", &[(9.0, "a")], ZAddOptions::default()).await.unwrap();
    assert_eq!(store.zcard("z").await.unwrap(), 3);

    store.zrem("z", &["b", "nope"]).await.unwrap();
    assert_eq!(store.zcard("z").await.unwrap(), 2);
}

#[tokio::test]
async fn test_zrangebyscore_full_range_is_sorted() {
    let store = Store::new(Config::default());

    store
        .zadd(
            "z",
            &[(3.0, "c"), (1.0, "a"), (2.0, "bb"), (2.0, "ba"), (-1.0, "neg")],
            ZAddOptions::default(),
        )
        .await
        .unwrap();
    let all = store.zrange_by_score("z", "-inf", "+inf").await.unwrap();
    assert_eq!(all, vec!["neg", "a", "ba", "bb", "c"]);
}

#[tokio::test]
async fn test_push_pop_symmetry() {
    let store = Store::new(Config::default());

    store.lpush("l1", &["x"]).await.unwrap();
    assert_eq!(store.lpop("l1").await.unwrap().as_deref(), Some("x"));

    store.rpush("l2", &["x"]).await.unwrap();
    assert_eq!(store.rpop("l2").await.unwrap().as_deref(), Some("x"));
}

#[tokio::test]
async fn test_lmove_between_lists() {
    let store = Store::new(Config::default());

    store.rpush("src", &["a", "b", "c"]).await.unwrap();
    store.rpush("dst", &["x"]).await.unwrap();

    let moved = store.lmove("src", "dst", true, false).await.unwrap();
    assert_eq!(moved.as_deref(), Some("a"));
    assert_eq!(store.lrange("src", 0, -1).await.unwrap(), vec!["b", "c"]);
    assert_eq!(store.lrange("dst", 0, -1).await.unwrap(), vec!["x", "a"]);

    // Rotating a list onto itself.
    let moved = store.lmove("src", "src", true, false).await.unwrap();
    assert_eq!(moved.as_deref(), Some("b"));
    assert_eq!(store.lrange("src", 0, -1).await.unwrap(), vec!["c", "b"]);

    // Missing source yields nil.
    assert_eq!(store.lmove("nope", "dst", true, true).await.unwrap(), None);
}

#[tokio::test]
async fn test_list_index_errors() {
    let store = Store::new(Config::default());
    store.rpush("l", &["a"]).await.unwrap();

    assert!(matches!(
        store.lset("l", 5, "x").await.unwrap_err(),
        StoreError::IndexOutOfRange
    ));
    let reply = raw(&store, &["LINDEX", "l", "7"]).await;
    assert!(reply.starts_with(b"-ERR index out of range"));

    // Pushx on a missing key refuses to create it.
    let reply = raw(&store, &["LPUSHX", "nope", "v"]).await;
    assert!(reply.starts_with(b"-ERR no such key"));
    assert_eq!(store.exists(&["nope"]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_wrong_type_errors() {
    let store = Store::new(Config::default());
    store.set("s", "v", SetOptions::default()).await.unwrap();

    let reply = raw(&store, &["LPUSH", "s", "x"]).await;
    assert!(reply.starts_with(b"-WRONGTYPE"));
    let reply = raw(&store, &["ZADD", "s", "1", "m"]).await;
    assert!(reply.starts_with(b"-WRONGTYPE"));
    let reply = raw(&store, &["HGET", "s", "f"]).await;
    assert!(reply.starts_with(b"-WRONGTYPE"));

    // The failed attempts must not have clobbered the string.
    assert_eq!(store.get("s").await.unwrap().as_deref(), Some("v"));
}

#[tokio::test]
async fn test_unknown_command_and_arity() {
    let store = Store::new(Config::default());

    let reply = raw(&store, &["NOSUCHCMD", "a"]).await;
    assert!(reply.starts_with(b"-ERR unknown command"));

    let reply = raw(&store, &["GET"]).await;
    assert!(reply.starts_with(b"-ERR wrong number of arguments"));

    let reply = raw(&store, &["SET", "k"]).await;
    assert!(reply.starts_with(b"-ERR wrong number of arguments"));
}

#[tokio::test]
async fn test_zadd_option_conflicts() {
    let store = Store::new(Config::default());

    let reply = raw(&store, &["ZADD", "z", "NX", "XX", "1", "a"]).await;
    assert!(reply.starts_with(b"-ERR"));
    let reply = raw(&store, &["ZADD", "z", "NX", "GT", "1", "a"]).await;
    assert!(reply.starts_with(b"-ERR"));

    // INCR with two pairs is refused.
    let reply = raw(&store, &["ZADD", "z", "INCR", "1", "a", "2", "b"]).await;
    assert!(reply.starts_with(b"-ERR"));

    // NaN scores never reach the engine.
    let reply = raw(&store, &["ZADD", "z", "nan", "a"]).await;
    assert!(reply.starts_with(b"-ERR"));
}

#[tokio::test]
async fn test_zadd_incr_modes() {
    let store = Store::new(Config::default());

    assert_eq!(
        raw(&store, &["ZADD", "z", "INCR", "5", "m"]).await,
        b"$1\r\n5\r\n"
    );
    assert_eq!(
        raw(&store, &["ZADD", "z", "INCR", "2.5", "m"]).await,
        b"$3\r\n7.5\r\n"
    );
    // Skipped by NX on an existing member: nil.
    assert_eq!(
        raw(&store, &["ZADD", "z", "NX", "INCR", "1", "m"]).await,
        b"$-1\r\n"
    );
}

#[tokio::test]
async fn test_empty_containers_are_retained() {
    let store = Store::new(Config::default());

    store.hset("h", &[("f", "v")]).await.unwrap();
    store.hdel("h", &["f"]).await.unwrap();
    assert_eq!(store.exists(&["h"]).await.unwrap(), 1);
    assert_eq!(store.key_type("h").await.unwrap(), "hash");

    store
        .zadd("z", &[(1.0, "a")], ZAddOptions::default())
        .await
        .unwrap();
    store.zrem("z", &["a"]).await.unwrap();
    assert_eq!(store.exists(&["z"]).await.unwrap(), 1);
    assert_eq!(store.key_type("z").await.unwrap(), "zset");

    store.rpush("l", &["a"]).await.unwrap();
    store.rpop("l").await.unwrap();
    assert_eq!(store.exists(&["l"]).await.unwrap(), 1);

    // Only DEL removes the key itself.
    assert_eq!(store.del(&["h", "z", "l"]).await.unwrap(), 3);
    assert_eq!(store.exists(&["h", "z", "l"]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_set_nx_xx_get() {
    let store = Store::new(Config::default());

    // NX on a fresh key sets it.
    assert_eq!(
        store
            .set("k", "v1", SetOptions { nx: true, ..Default::default() })
            .await
            .unwrap(),
        None
    );
    // NX again is a no-op.
    store
        .set("k", "v2", SetOptions { nx: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v1"));

    // XX replaces and GET returns the old value.
    let old = store
        .set("k", "v3", SetOptions { xx: true, get: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(old.as_deref(), Some("v1"));
    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v3"));

    // XX on a missing key does nothing.
    store
        .set("other", "v", SetOptions { xx: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(store.get("other").await.unwrap(), None);
    assert_eq!(store.exists(&["other"]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_incr_family() {
    let store = Store::new(Config::default());

    assert_eq!(store.incr("n").await.unwrap(), 1);
    assert_eq!(store.incr_by("n", 9).await.unwrap(), 10);
    assert_eq!(store.decr("n").await.unwrap(), 9);
    assert_eq!(store.incr_by_float("f", 1.5).await.unwrap(), "1.5");
    assert_eq!(store.incr_by_float("f", 2.0).await.unwrap(), "3.5");

    store.set("s", "abc", SetOptions::default()).await.unwrap();
    assert!(matches!(
        store.incr("s").await.unwrap_err(),
        StoreError::NotInteger
    ));
}

#[tokio::test]
async fn test_getrange_substr_alias() {
    let store = Store::new(Config::default());
    store.set("k", "Hello World", SetOptions::default()).await.unwrap();

    assert_eq!(store.getrange("k", 0, 4).await.unwrap(), "Hello");
    assert_eq!(store.getrange("k", -5, -1).await.unwrap(), "World");
    assert_eq!(
        raw(&store, &["SUBSTR", "k", "0", "4"]).await,
        raw(&store, &["GETRANGE", "k", "0", "4"]).await
    );
}

#[tokio::test]
async fn test_disjoint_keys_do_not_interact() {
    let store = Arc::new(Store::new(Config::default()));

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("counter{i}");
            for _ in 0..100 {
                store.incr(&key).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for i in 0..8 {
        let key = format!("counter{i}");
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("100"));
    }
}

#[tokio::test]
async fn test_same_key_commands_are_linearized() {
    let store = Arc::new(Store::new(Config::default()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                store.incr("shared").await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(store.get("shared").await.unwrap().as_deref(), Some("400"));
}

#[tokio::test]
async fn test_cancelled_context_surfaces_cleanly() {
    use tokio_util::sync::CancellationToken;

    let store = Store::new(Config::default());
    store.set("k", "v", SetOptions::default()).await.unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let ctx = Context::with_token(token);

    let err = store.execute(&ctx, &cmd(&["GET", "k"])).await.unwrap_err();
    assert!(err.is_cancelled());

    // The reply encoding is a plain error; the store stays usable.
    let reply = store.handle_command(&ctx, &cmd(&["GET", "k"])).await;
    assert!(reply.starts_with(b"-ERR"));
    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
}

#[tokio::test]
async fn test_multi_key_commands_lock_in_canonical_order() {
    let store = Arc::new(Store::new(Config::default()));

    store.sadd("seta", &["1", "2", "3"]).await.unwrap();
    store.sadd("setb", &["2", "3", "4"]).await.unwrap();

    // Hammer overlapping multi-key commands from both directions; ordered
    // acquisition means this cannot deadlock.
    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                if i % 2 == 0 {
                    store.sinter(&["seta", "setb"]).await.unwrap();
                } else {
                    store.sunion(&["setb", "seta"]).await.unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut inter = store.sinter(&["seta", "setb"]).await.unwrap();
    inter.sort();
    assert_eq!(inter, vec!["2", "3"]);
}

#[tokio::test]
async fn test_store_variants() {
    let store = Store::new(Config::default());

    store.sadd("a", &["x", "y"]).await.unwrap();
    store.sadd("b", &["y", "z"]).await.unwrap();

    assert_eq!(raw(&store, &["SUNIONSTORE", "dest", "a", "b"]).await, b":3\r\n");
    assert_eq!(store.scard("dest").await.unwrap(), 3);

    assert_eq!(raw(&store, &["SINTERSTORE", "dest", "a", "b"]).await, b":1\r\n");
    assert!(store.sismember("dest", "y").await.unwrap());

    store
        .zadd("za", &[(1.0, "x"), (2.0, "y")], ZAddOptions::default())
        .await
        .unwrap();
    store
        .zadd("zb", &[(5.0, "y")], ZAddOptions::default())
        .await
        .unwrap();
    assert_eq!(store.zdiffstore("zdest", &["za", "zb"]).await.unwrap(), 1);
    assert_eq!(store.zscore("zdest", "x").await.unwrap().as_deref(), Some("1"));
}

#[tokio::test]
async fn test_zrange_rev_and_limits() {
    let store = Store::new(Config::default());
    store
        .zadd(
            "z",
            &[(1.0, "a"), (2.0, "b"), (3.0, "c"), (4.0, "d")],
            ZAddOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        raw(&store, &["ZRANGE", "z", "0", "1", "REV"]).await,
        b"*2\r\n$1\r\nd\r\n$1\r\nc\r\n"
    );
    assert_eq!(
        raw(
            &store,
            &["ZRANGE", "z", "(1", "+inf", "BYSCORE", "LIMIT", "1", "2"],
        )
        .await,
        b"*2\r\n$1\r\nc\r\n$1\r\nd\r\n"
    );
    // LIMIT without BYSCORE/BYLEX is a syntax error.
    let reply = raw(&store, &["ZRANGE", "z", "0", "1", "LIMIT", "0", "1"]).await;
    assert!(reply.starts_with(b"-ERR"));
}

#[tokio::test]
async fn test_zrangebylex() {
    let store = Store::new(Config::default());
    store
        .zadd(
            "z",
            &[(0.0, "a"), (0.0, "b"), (0.0, "c"), (0.0, "d")],
            ZAddOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        raw(&store, &["ZRANGEBYLEX", "z", "[b", "(d"]).await,
        b"*2\r\n$1\r\nb\r\n$1\r\nc\r\n"
    );
    assert_eq!(raw(&store, &["ZLEXCOUNT", "z", "-", "+"]).await, b":4\r\n");

    // Mixed scores make lex ranges meaningless.
    store.zadd("z", &[(9.0, "e")], ZAddOptions::default()).await.unwrap();
    assert_eq!(raw(&store, &["ZLEXCOUNT", "z", "-", "+"]).await, b":0\r\n");
    assert_eq!(raw(&store, &["ZRANGEBYLEX", "z", "-", "+"]).await, b"*0\r\n");
}

#[tokio::test]
async fn test_active_expiry_sweeps_without_access() {
    let store = Store::new(Config {
        sweep_interval_ms: 20,
        ..Default::default()
    });

    for i in 0..5 {
        let key = format!("volatile{i}");
        store
            .set(&key, "v", SetOptions { px: Some(40), ..Default::default() })
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Swept by the background task, not by access: the keyspace map itself
    // no longer holds the keys.
    assert_eq!(store.keyspace_len(), 0);
}

#[tokio::test]
async fn test_del_is_multi_key_and_counts() {
    let store = Store::new(Config::default());

    store.set("a", "1", SetOptions::default()).await.unwrap();
    store.set("b", "2", SetOptions::default()).await.unwrap();
    assert_eq!(store.del(&["a", "b", "missing"]).await.unwrap(), 2);
    assert_eq!(store.exists(&["a", "b"]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_lrem_and_ltrim() {
    let store = Store::new(Config::default());

    store.rpush("l", &["x", "y", "x", "y", "x"]).await.unwrap();
    assert_eq!(store.lrem("l", -2, "x").await.unwrap(), 2);
    assert_eq!(store.lrange("l", 0, -1).await.unwrap(), vec!["x", "y", "y"]);

    store.ltrim("l", 1, 2).await.unwrap();
    assert_eq!(store.lrange("l", 0, -1).await.unwrap(), vec!["y", "y"]);
}

#[tokio::test]
async fn test_mset_is_atomic_across_keys() {
    let store = Store::new(Config::default());

    store.mset(&[("k1", "a"), ("k2", "b"), ("k3", "c")]).await.unwrap();
    assert_eq!(store.get("k2").await.unwrap().as_deref(), Some("b"));
    assert_eq!(store.exists(&["k1", "k2", "k3"]).await.unwrap(), 3);
}

#[tokio::test]
async fn test_synchronous_flags() {
    let store = Store::new(Config::default());

    assert_eq!(store.is_synchronous("SET"), Some(true));
    assert_eq!(store.is_synchronous("get"), Some(false));
    assert_eq!(store.is_synchronous("ZUNIONSTORE"), Some(true));
    assert_eq!(store.is_synchronous("zrange"), Some(false));
    assert_eq!(store.is_synchronous("nope"), None);
}
