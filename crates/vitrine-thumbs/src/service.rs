//! The public thumbnail service.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use vitrine_engine::surface::SurfaceConfig;

use crate::cache::{ResultCache, Thumbnail};
use crate::idle::{IdleSignal, NextTick};
use crate::options::{Schedule, ThumbnailOptions};
use crate::registry::{InFlightRegistry, ThumbnailFuture};
use crate::renderer::ThumbnailRenderer;
use crate::scheduler::{Job, Scheduler};

/// Snapshot of the service's bookkeeping.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailStats {
    pub queued: usize,
    pub active: usize,
    pub in_flight: usize,
    pub cached: usize,
}

struct State {
    cache: ResultCache,
    registry: InFlightRegistry,
    scheduler: Scheduler,
}

struct Inner {
    state: Mutex<State>,
    renderer: Arc<dyn ThumbnailRenderer>,
    idle: Arc<dyn IdleSignal>,
    options: ThumbnailOptions,
}

/// Cached, coalesced thumbnail rendering.
///
/// Cloning yields another handle to the same cache and queue. Jobs run as
/// tasks on the current Tokio runtime, so [`Thumbnails::ensure`] must be
/// called from within one.
#[derive(Clone)]
pub struct Thumbnails {
    inner: Arc<Inner>,
}

impl Thumbnails {
    pub fn new(renderer: Arc<dyn ThumbnailRenderer>, options: ThumbnailOptions) -> Self {
        Self::with_idle_signal(renderer, options, Arc::new(NextTick))
    }

    pub fn with_idle_signal(
        renderer: Arc<dyn ThumbnailRenderer>,
        options: ThumbnailOptions,
        idle: Arc<dyn IdleSignal>,
    ) -> Self {
        let state = State {
            cache: ResultCache::new(),
            registry: InFlightRegistry::default(),
            scheduler: Scheduler::new(options.admission_limit()),
        };
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                renderer,
                idle,
                options,
            }),
        }
    }

    pub fn options(&self) -> &ThumbnailOptions {
        &self.inner.options
    }

    /// Returns a future for the thumbnail of `key`, rendering it at most once.
    pub fn ensure(&self, key: &str) -> ThumbnailFuture {
        self.ensure_with(key, &self.inner.options.surface_config())
    }

    /// Like [`Thumbnails::ensure`], with output parameters for a new job.
    ///
    /// `config` has no effect when the key is already cached or in flight.
    pub fn ensure_with(&self, key: &str, config: &SurfaceConfig) -> ThumbnailFuture {
        let future = {
            let mut state = self.inner.lock();
            // A pending request wins over a cached value for the same key.
            if let Some(pending) = state.registry.future(key) {
                return pending;
            }
            if let Some(done) = state.cache.get(key) {
                return ThumbnailFuture::settled(done.clone());
            }

            let (future, generation) = state.registry.register(key);
            state.scheduler.enqueue(Job {
                key: key.to_owned(),
                config: *config,
                generation,
            });
            log::debug!("queued thumbnail for {key}");
            future
        };
        self.inner.pump();
        future
    }

    /// Cached outcome for `key`; `None` if it has not settled yet.
    pub fn get(&self, key: &str) -> Option<Thumbnail> {
        self.inner.lock().cache.get(key).cloned()
    }

    /// Withdraws a request whose job has not started.
    ///
    /// Waiting futures settle as [`Thumbnail::Unavailable`] and nothing is
    /// cached. Returns `false` if there is no such request or it is already
    /// rendering.
    pub fn cancel(&self, key: &str) -> bool {
        let cancelled = self.inner.lock().registry.cancel(key);
        if cancelled {
            log::debug!("cancelled thumbnail for {key}");
        }
        cancelled
    }

    pub fn stats(&self) -> ThumbnailStats {
        let state = self.inner.lock();
        ThumbnailStats {
            queued: state.scheduler.queued(),
            active: state.scheduler.active(),
            in_flight: state.registry.len(),
            cached: state.cache.len(),
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        // The state stays consistent between statements; a poisoned lock only
        // means some other thread panicked while holding it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts queued jobs while there is capacity.
    fn pump(self: &Arc<Self>) {
        loop {
            let job = {
                let mut state = self.lock();
                let State { registry, scheduler, .. } = &mut *state;
                scheduler.admit(registry)
            };
            let Some(job) = job else {
                break;
            };
            let inner = Arc::clone(self);
            tokio::spawn(async move { inner.run(job).await });
        }
    }

    async fn run(self: Arc<Self>, job: Job) {
        if self.options.schedule == Schedule::Idle {
            let waited = tokio::time::timeout(self.options.idle_timeout, self.idle.idle()).await;
            if waited.is_err() {
                log::debug!("{}: idle wait timed out, rendering anyway", job.key);
            }
        }

        let rendered = AssertUnwindSafe(self.renderer.render(&job.key, &job.config))
            .catch_unwind()
            .await;
        let outcome = match rendered {
            Ok(Ok(Some(image))) => {
                log::debug!("rendered thumbnail for {}", job.key);
                Thumbnail::Image(image.into())
            }
            Ok(Ok(None)) => {
                log::debug!("{}: nothing to render", job.key);
                Thumbnail::Unavailable
            }
            Ok(Err(err)) => {
                log::warn!("thumbnail for {} failed: {err}", job.key);
                Thumbnail::Unavailable
            }
            Err(_) => {
                log::warn!("thumbnail for {} panicked while rendering", job.key);
                Thumbnail::Unavailable
            }
        };

        self.complete(&job.key, outcome);
        self.pump();
    }

    fn complete(&self, key: &str, outcome: Thumbnail) {
        let mut state = self.lock();
        state.cache.set(key, outcome.clone());
        state.registry.resolve(key, outcome);
        state.scheduler.finish();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use vitrine_assets::AssetLoadError;

    use super::*;
    use crate::error::ThumbnailError;
    use crate::idle::{IdleNotifier, NeverIdle};

    // ── fakes ─────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeRenderer {
        calls: Mutex<Vec<(String, SurfaceConfig)>>,
        failing: HashSet<String>,
        empty: HashSet<String>,
        delay: Option<Duration>,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeRenderer {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(key, _)| key.clone()).collect()
        }

        fn widths(&self) -> Vec<(String, u32)> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(key, config)| (key.clone(), config.width))
                .collect()
        }
    }

    #[async_trait]
    impl ThumbnailRenderer for FakeRenderer {
        async fn render(
            &self,
            key: &str,
            config: &SurfaceConfig,
        ) -> Result<Option<String>, ThumbnailError> {
            self.calls.lock().unwrap().push((key.to_owned(), *config));
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            match self.delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }
            self.running.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(key) {
                return Err(AssetLoadError::NotFound(key.to_owned()).into());
            }
            if key == "panics" {
                panic!("renderer blew up");
            }
            if self.empty.contains(key) {
                return Ok(None);
            }
            Ok(Some(format!("data:image/png;base64,{key}")))
        }
    }

    fn immediate() -> ThumbnailOptions {
        ThumbnailOptions::default().with_schedule(Schedule::Immediate)
    }

    fn service(renderer: FakeRenderer, options: ThumbnailOptions) -> (Thumbnails, Arc<FakeRenderer>) {
        let renderer = Arc::new(renderer);
        let thumbs = Thumbnails::new(Arc::clone(&renderer) as Arc<dyn ThumbnailRenderer>, options);
        (thumbs, renderer)
    }

    fn image(key: &str) -> Thumbnail {
        Thumbnail::Image(format!("data:image/png;base64,{key}").into())
    }

    // ── coalescing ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn concurrent_requests_share_one_render() {
        let (thumbs, renderer) = service(FakeRenderer::default(), immediate());

        let futures: Vec<_> = (0..5).map(|_| thumbs.ensure("model-a.glb")).collect();
        for f in &futures[1..] {
            assert!(futures[0].same_request(f));
        }

        let results = futures::future::join_all(futures).await;
        assert!(results.iter().all(|r| *r == image("model-a.glb")));
        assert_eq!(renderer.calls(), vec!["model-a.glb"]);
    }

    #[tokio::test]
    async fn settled_key_returns_resolved_future_without_new_job() {
        let (thumbs, renderer) = service(FakeRenderer::default(), immediate());

        let first = thumbs.ensure("model-a.glb");
        let second = thumbs.ensure("model-a.glb");
        assert!(first.same_request(&second));
        assert_eq!(first.await, second.await);

        let third = thumbs.ensure("model-a.glb");
        assert!(third.is_settled());
        assert_eq!(thumbs.stats().queued, 0);
        assert_eq!(third.await, image("model-a.glb"));
        assert_eq!(renderer.calls().len(), 1);
    }

    #[tokio::test]
    async fn distinct_strings_are_distinct_keys() {
        let (thumbs, renderer) = service(FakeRenderer::default(), immediate());
        thumbs.ensure("models/a.glb").await;
        thumbs.ensure("./models/a.glb").await;
        assert_eq!(renderer.calls().len(), 2);
    }

    // ── cache ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn get_reports_not_attempted_then_settled() {
        let (thumbs, _) = service(FakeRenderer::default(), immediate());
        assert_eq!(thumbs.get("a.glb"), None);

        let pending = thumbs.ensure("a.glb");
        assert_eq!(thumbs.get("a.glb"), None);

        let value = pending.await;
        assert_eq!(thumbs.get("a.glb"), Some(value));
    }

    #[tokio::test]
    async fn failed_load_resolves_and_caches_unavailable() {
        let renderer = FakeRenderer {
            failing: HashSet::from(["broken.glb".to_owned()]),
            ..Default::default()
        };
        let (thumbs, renderer) = service(renderer, immediate());

        assert_eq!(thumbs.ensure("broken.glb").await, Thumbnail::Unavailable);
        assert_eq!(thumbs.get("broken.glb"), Some(Thumbnail::Unavailable));

        let again = thumbs.ensure("broken.glb");
        assert!(again.is_settled());
        assert_eq!(again.await, Thumbnail::Unavailable);
        assert_eq!(renderer.calls().len(), 1);
    }

    #[tokio::test]
    async fn empty_render_is_cached_as_unavailable() {
        let renderer = FakeRenderer {
            empty: HashSet::from(["empty.glb".to_owned()]),
            ..Default::default()
        };
        let (thumbs, _) = service(renderer, immediate());
        assert_eq!(thumbs.ensure("empty.glb").await, Thumbnail::Unavailable);
        assert_eq!(thumbs.get("empty.glb"), Some(Thumbnail::Unavailable));
    }

    #[tokio::test]
    async fn panicking_render_does_not_stall_the_queue() {
        let (thumbs, _) = service(FakeRenderer::default(), immediate());
        let broken = thumbs.ensure("panics");
        let next = thumbs.ensure("b.glb");

        assert_eq!(broken.await, Thumbnail::Unavailable);
        assert_eq!(next.await, image("b.glb"));
        assert_eq!(thumbs.stats().active, 0);
    }

    // ── scheduling ────────────────────────────────────────────────────────

    fn sized(width: u32) -> SurfaceConfig {
        SurfaceConfig {
            width,
            height: width,
            ..SurfaceConfig::default()
        }
    }

    #[tokio::test]
    async fn queued_config_reaches_the_renderer() {
        let (thumbs, renderer) = service(FakeRenderer::default(), immediate());

        let a = thumbs.ensure("A");
        let b = thumbs.ensure_with("B", &sized(96));
        futures::future::join(a, b).await;

        let default_width = thumbs.options().surface_config().width;
        assert_eq!(
            renderer.widths(),
            vec![("A".to_owned(), default_width), ("B".to_owned(), 96)]
        );
    }

    #[tokio::test]
    async fn config_of_in_flight_request_is_kept() {
        let (thumbs, renderer) = service(FakeRenderer::default(), immediate());

        let _a = thumbs.ensure("A");
        let first = thumbs.ensure_with("B", &sized(64));
        let second = thumbs.ensure_with("B", &sized(256));
        assert!(first.same_request(&second));

        second.await;
        assert_eq!(renderer.widths()[1], ("B".to_owned(), 64));
    }

    #[tokio::test]
    async fn single_slot_completes_in_fifo_order() {
        let (thumbs, renderer) = service(FakeRenderer::default(), immediate());

        let all = ["A", "B", "C"].map(|k| thumbs.ensure(k));
        let stats = thumbs.stats();
        assert_eq!((stats.active, stats.queued, stats.in_flight), (1, 2, 3));

        futures::future::join_all(all).await;
        assert_eq!(renderer.calls(), vec!["A", "B", "C"]);
        assert_eq!(renderer.peak.load(Ordering::SeqCst), 1);
        assert_eq!(
            thumbs.stats(),
            ThumbnailStats { queued: 0, active: 0, in_flight: 0, cached: 3 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn higher_limit_overlaps_jobs() {
        let renderer = FakeRenderer {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let (thumbs, renderer) = service(renderer, immediate().with_max_concurrent(2));

        let all = ["A", "B", "C"].map(|k| thumbs.ensure(k));
        futures::future::join_all(all).await;
        assert_eq!(renderer.peak.load(Ordering::SeqCst), 2);
        assert_eq!(renderer.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_wait_is_bounded_by_timeout() {
        let renderer = Arc::new(FakeRenderer::default());
        let thumbs = Thumbnails::with_idle_signal(
            Arc::clone(&renderer) as Arc<dyn ThumbnailRenderer>,
            ThumbnailOptions::default(),
            Arc::new(NeverIdle),
        );

        let start = tokio::time::Instant::now();
        assert_eq!(thumbs.ensure("a.glb").await, image("a.glb"));
        assert!(start.elapsed() >= Duration::from_millis(1200));
        assert_eq!(renderer.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_signal_releases_job_early() {
        let renderer = Arc::new(FakeRenderer::default());
        let notifier = Arc::new(IdleNotifier::new());
        let thumbs = Thumbnails::with_idle_signal(
            Arc::clone(&renderer) as Arc<dyn ThumbnailRenderer>,
            ThumbnailOptions::default().with_idle_timeout(Duration::from_secs(60)),
            Arc::clone(&notifier) as Arc<dyn IdleSignal>,
        );

        let start = tokio::time::Instant::now();
        let pending = thumbs.ensure("a.glb");
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert!(renderer.calls().is_empty());
        assert_eq!(thumbs.stats().active, 1);

        notifier.notify_idle();
        assert_eq!(pending.await, image("a.glb"));
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    // ── cancellation ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn cancel_skips_queued_job() {
        let (thumbs, renderer) = service(FakeRenderer::default(), immediate());

        let a = thumbs.ensure("A");
        let b = thumbs.ensure("B");
        assert!(!thumbs.cancel("A"), "A was already admitted");
        assert!(thumbs.cancel("B"));
        assert!(!thumbs.cancel("B"));

        assert_eq!(b.await, Thumbnail::Unavailable);
        assert_eq!(a.await, image("A"));
        assert_eq!(renderer.calls(), vec!["A"]);
        assert_eq!(thumbs.get("B"), None);
        assert_eq!(thumbs.stats().queued, 0);
    }

    #[tokio::test]
    async fn cancelled_key_can_be_requested_again() {
        let (thumbs, renderer) = service(FakeRenderer::default(), immediate());

        let a = thumbs.ensure("A");
        let _b = thumbs.ensure("B");
        assert!(thumbs.cancel("B"));
        let b = thumbs.ensure("B");

        assert_eq!(a.await, image("A"));
        assert_eq!(b.await, image("B"));
        assert_eq!(renderer.calls(), vec!["A", "B"]);
        assert_eq!(thumbs.stats().queued, 0);
    }

    #[tokio::test]
    async fn re_request_after_cancel_renders_with_new_config() {
        let (thumbs, renderer) = service(FakeRenderer::default(), immediate());

        let a = thumbs.ensure("A");
        let stale = thumbs.ensure_with("B", &sized(64));
        assert!(thumbs.cancel("B"));
        let fresh = thumbs.ensure_with("B", &sized(256));
        assert!(!stale.same_request(&fresh));

        assert_eq!(stale.await, Thumbnail::Unavailable);
        a.await;
        assert_eq!(fresh.await, image("B"));
        assert_eq!(
            renderer.widths(),
            vec![("A".to_owned(), 512), ("B".to_owned(), 256)]
        );
        assert_eq!(
            thumbs.stats(),
            ThumbnailStats { queued: 0, active: 0, in_flight: 0, cached: 2 }
        );
    }

    #[tokio::test]
    async fn re_requested_key_keeps_its_new_queue_position() {
        let (thumbs, renderer) = service(FakeRenderer::default(), immediate());

        let a = thumbs.ensure("A");
        let _stale = thumbs.ensure("B");
        let c = thumbs.ensure("C");
        assert!(thumbs.cancel("B"));
        let b = thumbs.ensure("B");

        futures::future::join3(a, b, c).await;
        assert_eq!(renderer.calls(), vec!["A", "C", "B"]);
    }
}
