//! Active expiry: a background task that samples volatile keys and deletes
//! the ones whose expiry has fired. Lazy expiry on access (in the keyspace
//! lock methods) covers the keys the sweeper never gets to.

use crate::keyspace::Keyspace;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Spawn the sweeper. Sampling is random so a cycle never holds any lock
/// for long; contended keys are skipped and picked up on a later cycle.
pub fn spawn_sweeper(
    keyspace: Arc<Keyspace>,
    shutdown: CancellationToken,
    interval_ms: u64,
    sample: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.cancelled() => {
                    debug!("expiry sweeper shutting down");
                    return;
                }
            }
            let removed = keyspace.sweep_expired(sample);
            if removed > 0 {
                trace!(removed, "active expiry removed keys");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::keyspace::now_millis;
    use crate::types::Value;

    #[tokio::test]
    async fn test_sweeper_removes_fired_keys() {
        let keyspace = Arc::new(Keyspace::new(4));
        let ctx = Context::background();

        for i in 0..4 {
            let key = format!("k{i}");
            let (mut guard, _) = keyspace.write_lock_or_create(&ctx, &key).await.unwrap();
            guard.value = Value::Int(i);
            guard.expires_at = Some(now_millis() + 30);
        }

        let shutdown = CancellationToken::new();
        let handle = spawn_sweeper(keyspace.clone(), shutdown.clone(), 10, 20);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(keyspace.len(), 0);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
