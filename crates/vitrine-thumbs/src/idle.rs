//! Host idle signals for deferred rendering.

use async_trait::async_trait;
use tokio::sync::Notify;

/// Resolves when the host has spare capacity.
///
/// The scheduler always bounds the wait with its idle timeout, so an
/// implementation may never resolve.
#[async_trait]
pub trait IdleSignal: Send + Sync {
    async fn idle(&self);
}

/// Defers to the next scheduling tick. Used when the host has no idle signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NextTick;

#[async_trait]
impl IdleSignal for NextTick {
    async fn idle(&self) {
        tokio::task::yield_now().await;
    }
}

/// A host that never reports idle; jobs start when the timeout expires.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverIdle;

#[async_trait]
impl IdleSignal for NeverIdle {
    async fn idle(&self) {
        std::future::pending::<()>().await;
    }
}

/// Idle signal driven by the host calling [`IdleNotifier::notify_idle`].
#[derive(Debug, Default)]
pub struct IdleNotifier {
    notify: Notify,
}

impl IdleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases every job currently waiting for idle time.
    pub fn notify_idle(&self) {
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl IdleSignal for IdleNotifier {
    async fn idle(&self) {
        self.notify.notified().await;
    }
}
