//! Cancellation utilities.
//!
//! A [`CancelHandle`] is threaded through every suspend point of a
//! generation: the outbound model call, each tool execution, and the outward
//! chunk emission loop. Observing cancellation stops further work; tool
//! executions already in flight are not force-killed, the core simply stops
//! waiting on them.

use tokio_util::sync::CancellationToken;

/// A clonable handle used to request and observe cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation is requested. Used with `select!` to
    /// preempt suspended awaits.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}
