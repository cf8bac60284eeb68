//! Request-scoped context: cancellation, deadline, caller identity.
//!
//! Every lock acquisition and every long-running handler observes the
//! context; a cancelled context surfaces `StoreError::Cancelled` without
//! corrupting any state.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    /// Identity of the caller, for logs. 0 = internal (typed API).
    client_id: u64,
}

impl Context {
    /// A context that never cancels — used by the typed API surface and tests.
    pub fn background() -> Self {
        Context {
            token: CancellationToken::new(),
            deadline: None,
            client_id: 0,
        }
    }

    /// A context driven by the connection layer's cancellation token.
    pub fn with_token(token: CancellationToken) -> Self {
        Context {
            token,
            deadline: None,
            client_id: 0,
        }
    }

    pub fn with_deadline(mut self, after: Duration) -> Self {
        self.deadline = Some(Instant::now() + after);
        self
    }

    pub fn with_client_id(mut self, client_id: u64) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    /// Synchronous check, for handlers pausing at coarse boundaries.
    pub fn is_cancelled(&self) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        match self.deadline {
            Some(d) => Instant::now() >= d,
            None => false,
        }
    }

    /// Resolves when the context is cancelled or its deadline passes.
    /// Never resolves for a background context.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(d) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(d) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::background()
    }
}
