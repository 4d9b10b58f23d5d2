//! In-flight requests and the futures handed to callers.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

use crate::cache::Thumbnail;

/// Future returned by [`crate::Thumbnails::ensure`].
///
/// Cheap to clone. All clones for a pending request observe the same
/// outcome. It never fails: errors settle as [`Thumbnail::Unavailable`].
#[derive(Clone)]
#[must_use = "futures do nothing unless awaited"]
pub struct ThumbnailFuture {
    state: FutureState,
}

#[derive(Clone)]
enum FutureState {
    Settled(Thumbnail),
    Pending(Shared<BoxFuture<'static, Thumbnail>>),
}

impl ThumbnailFuture {
    pub(crate) fn settled(value: Thumbnail) -> Self {
        Self {
            state: FutureState::Settled(value),
        }
    }

    fn pending(rx: oneshot::Receiver<Thumbnail>) -> Self {
        // A dropped sender means the request was cancelled.
        let shared = rx.map(|r| r.unwrap_or(Thumbnail::Unavailable)).boxed().shared();
        Self {
            state: FutureState::Pending(shared),
        }
    }

    /// True when the value was already known at creation time.
    pub fn is_settled(&self) -> bool {
        matches!(self.state, FutureState::Settled(_))
    }

    /// True when both futures wait on the same in-flight request.
    pub fn same_request(&self, other: &Self) -> bool {
        match (&self.state, &other.state) {
            (FutureState::Pending(a), FutureState::Pending(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// The outcome if it is available without waiting.
    pub fn peek(&self) -> Option<Thumbnail> {
        match &self.state {
            FutureState::Settled(value) => Some(value.clone()),
            FutureState::Pending(shared) => shared.peek().cloned(),
        }
    }
}

impl Future for ThumbnailFuture {
    type Output = Thumbnail;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Thumbnail> {
        match &mut self.get_mut().state {
            FutureState::Settled(value) => Poll::Ready(value.clone()),
            FutureState::Pending(shared) => Pin::new(shared).poll(cx),
        }
    }
}

impl std::fmt::Debug for ThumbnailFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            FutureState::Settled(value) => f.debug_tuple("Settled").field(value).finish(),
            FutureState::Pending(_) => f.write_str("Pending"),
        }
    }
}

struct PendingEntry {
    future: ThumbnailFuture,
    resolve: oneshot::Sender<Thumbnail>,
    /// Ties the entry to the job queued alongside it.
    generation: u64,
    started: bool,
}

/// Asset reference → pending request. An entry lives from the first request
/// until its job completes or it is cancelled.
#[derive(Default)]
pub(crate) struct InFlightRegistry {
    entries: HashMap<String, PendingEntry>,
    next_generation: u64,
}

impl InFlightRegistry {
    /// The shared future of a pending request, if any.
    pub fn future(&self, key: &str) -> Option<ThumbnailFuture> {
        self.entries.get(key).map(|e| e.future.clone())
    }

    /// Registers a new pending request and returns its future together with
    /// the generation its job must present to [`InFlightRegistry::start`].
    pub fn register(&mut self, key: &str) -> (ThumbnailFuture, u64) {
        let (resolve, rx) = oneshot::channel();
        let future = ThumbnailFuture::pending(rx);
        let generation = self.next_generation;
        self.next_generation += 1;
        self.entries.insert(
            key.to_owned(),
            PendingEntry {
                future: future.clone(),
                resolve,
                generation,
                started: false,
            },
        );
        (future, generation)
    }

    /// Marks the entry as running. Returns `false` when there is no entry to
    /// run (cancelled, already taken, or re-registered after a cancel so the
    /// job belongs to an older request).
    pub fn start(&mut self, key: &str, generation: u64) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) if !entry.started && entry.generation == generation => {
                entry.started = true;
                true
            }
            _ => false,
        }
    }

    /// Removes the entry and wakes every waiter with `value`.
    pub fn resolve(&mut self, key: &str, value: Thumbnail) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                // Every waiter may already be gone; that is fine.
                let _ = entry.resolve.send(value);
                true
            }
            None => false,
        }
    }

    /// Drops an entry whose job has not started. Waiters settle as
    /// [`Thumbnail::Unavailable`].
    pub fn cancel(&mut self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) if !entry.started => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
