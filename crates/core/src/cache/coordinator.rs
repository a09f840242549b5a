//! Stale-while-revalidate coordination in front of the origin.
//!
//! Every read goes through [`RefreshCoordinator::serve`]:
//!
//! - no snapshot yet: fetch from the origin while the caller waits (`MISS`)
//! - snapshot younger than `ttl - refresh_threshold`: serve it (`HIT`)
//! - snapshot in the refresh window: serve it (`HIT`) and start a background refresh
//! - snapshot at or past `ttl`: serve it (`STALE`) and start a background refresh
//!
//! At most one background refresh runs at a time. Its slot is reserved
//! before the task is spawned and cleared by a drop guard inside the task, so
//! a failing, panicking or aborted refresh always frees it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::policy::{CachePolicy, Freshness, Window};
use super::snapshot::CacheSnapshot;
use super::store::CacheStore;
use crate::{CatalogSource, Error};

/// Result of a successful read.
#[derive(Debug, Clone)]
pub struct Served {
    pub snapshot: Arc<CacheSnapshot>,
    pub freshness: Freshness,
    /// Age of the snapshot when it was handed out.
    pub age: Duration,
}

/// The one in-flight background refresh.
struct RefreshTask {
    /// Distinguishes this refresh from any later one holding the slot.
    id: u64,
    /// `None` while the slot is reserved and the task is being spawned.
    handle: Option<JoinHandle<()>>,
    /// Closes when the task settles.
    done: watch::Receiver<()>,
    started_at: Instant,
}

struct Inner {
    store: CacheStore,
    source: Arc<dyn CatalogSource>,
    policy: CachePolicy,
    refresh: Mutex<Option<RefreshTask>>,
    next_refresh_id: AtomicU64,
    /// Serializes cold-start fetches so concurrent first requests share one.
    cold_fetch: tokio::sync::Mutex<()>,
}

impl Inner {
    fn refresh_slot(&self) -> MutexGuard<'_, Option<RefreshTask>> {
        self.refresh.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the catalog and install it as the current snapshot.
    async fn refresh(&self) -> Result<Arc<CacheSnapshot>, Error> {
        let products = self.source.fetch().await?;
        let previous = self.store.read();
        let snapshot = Arc::new(CacheSnapshot::from_products(&products, previous.as_deref())?);
        self.store.write(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

/// Clears the refresh slot when the background task ends, however it ends.
///
/// Only its own reservation is cleared. The drop may run inside
/// `tokio::spawn` itself when the runtime is shutting down, so the slot lock
/// must not be held across the spawn.
struct SlotRelease {
    inner: Arc<Inner>,
    id: u64,
    _done: watch::Sender<()>,
}

impl Drop for SlotRelease {
    fn drop(&mut self) {
        let mut slot = self.inner.refresh_slot();
        if slot.as_ref().is_some_and(|task| task.id == self.id) {
            *slot = None;
        }
    }
}

/// Owns the catalog cache and decides when to go back to the origin.
///
/// Cheap to clone; clones share the same store and refresh slot.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(store: CacheStore, source: Arc<dyn CatalogSource>, policy: CachePolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                source,
                policy,
                refresh: Mutex::new(None),
                next_refresh_id: AtomicU64::new(0),
                cold_fetch: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.inner.policy
    }

    /// Current snapshot without any refresh side effects.
    pub fn snapshot(&self) -> Option<Arc<CacheSnapshot>> {
        self.inner.store.read()
    }

    /// Whether a background refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh_slot().is_some()
    }

    /// Serve the catalog.
    ///
    /// # Errors
    ///
    /// Fails only when no snapshot exists and the origin fetch fails.
    pub async fn serve(&self) -> Result<Served, Error> {
        if let Some(snapshot) = self.inner.store.read() {
            return Ok(self.serve_cached(snapshot));
        }
        self.serve_cold().await
    }

    fn serve_cached(&self, snapshot: Arc<CacheSnapshot>) -> Served {
        let age = snapshot.age(Instant::now());
        let window = self.inner.policy.classify(age);
        let freshness = if window == Window::Expired { Freshness::Stale } else { Freshness::Hit };

        if window.needs_refresh() {
            self.trigger_refresh();
        }

        tracing::debug!(age_ms = age.as_millis() as u64, ?window, %freshness, "serving cached catalog");
        Served { snapshot, freshness, age }
    }

    async fn serve_cold(&self) -> Result<Served, Error> {
        let _cold = self.inner.cold_fetch.lock().await;

        if let Some(snapshot) = self.inner.store.read() {
            return Ok(self.serve_cached(snapshot));
        }

        tracing::info!("cold start, fetching catalog from origin");
        match self.inner.refresh().await {
            Ok(snapshot) => {
                tracing::info!(products = snapshot.product_count, validator = %snapshot.validator, "catalog cached");
                Ok(Served { snapshot, freshness: Freshness::Miss, age: Duration::ZERO })
            }
            Err(err) => match self.inner.store.read() {
                Some(snapshot) => {
                    tracing::warn!(error = %err, "origin fetch failed, serving last good catalog");
                    let age = snapshot.age(Instant::now());
                    Ok(Served { snapshot, freshness: Freshness::Stale, age })
                }
                None => {
                    tracing::error!(error = %err, "origin fetch failed with no cached catalog");
                    Err(err)
                }
            },
        }
    }

    /// Start a background refresh unless one is already running.
    ///
    /// Returns `true` if this call started one.
    pub fn trigger_refresh(&self) -> bool {
        let id = self.inner.next_refresh_id.fetch_add(1, Ordering::Relaxed);
        let (done_tx, done_rx) = watch::channel(());
        {
            let mut slot = self.inner.refresh_slot();
            if slot.is_some() {
                return false;
            }
            *slot = Some(RefreshTask { id, handle: None, done: done_rx, started_at: Instant::now() });
        }

        let release = SlotRelease { inner: Arc::clone(&self.inner), id, _done: done_tx };

        tracing::info!("triggering background catalog refresh");
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            match release.inner.refresh().await {
                Ok(snapshot) => tracing::info!(
                    products = snapshot.product_count,
                    validator = %snapshot.validator,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "background refresh complete"
                ),
                Err(err) => tracing::warn!(error = %err, "background refresh failed, keeping cached catalog"),
            }
            drop(release);
        });

        // The task may already have finished and released the slot; its
        // handle is then simply dropped.
        let mut slot = self.inner.refresh_slot();
        if let Some(task) = slot.as_mut()
            && task.id == id
        {
            task.handle = Some(handle);
        }
        true
    }

    /// Wait until the in-flight background refresh, if any, has settled.
    pub async fn wait_for_refresh(&self) {
        let done = self.inner.refresh_slot().as_ref().map(|task| task.done.clone());
        if let Some(mut done) = done {
            while done.changed().await.is_ok() {}
        }
    }

    /// Abandon any in-flight refresh; the next cold start fetches again.
    pub fn shutdown(&self) {
        let running = self
            .inner
            .refresh_slot()
            .as_ref()
            .map(|task| (task.started_at, task.handle.as_ref().map(JoinHandle::abort_handle)));

        // Aborting may drop the task (and its slot guard) right here, so the
        // slot lock must already be released.
        if let Some((started_at, abort)) = running {
            tracing::warn!(
                running_ms = started_at.elapsed().as_millis() as u64,
                "shutting down with a background refresh in progress"
            );
            if let Some(abort) = abort {
                abort.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Photo, Product};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    #[derive(Clone, Copy)]
    enum Outcome {
        Catalog(&'static str),
        Fail,
        Panic,
    }

    /// Origin fake: plays back scripted outcomes, repeating the last one.
    struct ScriptedSource {
        script: Mutex<VecDeque<Outcome>>,
        calls: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Outcome>) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(script.into()), calls: AtomicUsize::new(0), gate: None })
        }

        fn gated(script: Vec<Outcome>, gate: Arc<Semaphore>) -> Arc<Self> {
            Arc::new(Self { script: Mutex::new(script.into()), calls: AtomicUsize::new(0), gate: Some(gate) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn catalog(title: &str) -> Vec<Product> {
        vec![Product {
            id: "folder-1".into(),
            title: title.into(),
            description: "Resin".into(),
            price: 99,
            media: vec![Photo { id: "img".into(), name: "img.jpg".into() }],
        }]
    }

    #[async_trait]
    impl CatalogSource for ScriptedSource {
        async fn fetch(&self) -> Result<Vec<Product>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }

            let outcome = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 { script.pop_front() } else { script.front().copied() }
            };

            match outcome {
                Some(Outcome::Catalog(title)) => Ok(catalog(title)),
                Some(Outcome::Panic) => panic!("origin client bug"),
                Some(Outcome::Fail) | None => Err(Error::HttpError("status 503".into())),
            }
        }
    }

    fn coordinator(source: Arc<ScriptedSource>, ttl: u64, threshold: u64) -> RefreshCoordinator {
        let policy = CachePolicy::new(Duration::from_secs(ttl), Duration::from_secs(threshold)).unwrap();
        RefreshCoordinator::new(CacheStore::new(), source, policy)
    }

    fn title_of(served: &Served) -> String {
        let products: Vec<Product> = serde_json::from_slice(&served.snapshot.body).unwrap();
        products[0].title.clone()
    }

    async fn advance_secs(secs: u64) {
        tokio::time::advance(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_start_is_a_miss() {
        let source = ScriptedSource::new(vec![Outcome::Catalog("A")]);
        let cache = coordinator(source.clone(), 60, 30);

        let served = cache.serve().await.unwrap();
        assert_eq!(served.freshness, Freshness::Miss);
        assert_eq!(served.age, Duration::ZERO);
        assert_eq!(title_of(&served), "A");
        assert_eq!(source.calls(), 1);
        assert!(cache.snapshot().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_in_fresh_window_are_identical() {
        let source = ScriptedSource::new(vec![Outcome::Catalog("A")]);
        let cache = coordinator(source.clone(), 60, 30);

        let first = cache.serve().await.unwrap();
        let second = cache.serve().await.unwrap();
        let third = cache.serve().await.unwrap();

        assert_eq!(second.freshness, Freshness::Hit);
        assert_eq!(first.snapshot.body, second.snapshot.body);
        assert_eq!(first.snapshot.validator, third.snapshot.validator);
        assert!(!cache.is_refreshing());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_failure_is_an_error_and_writes_nothing() {
        let source = ScriptedSource::new(vec![Outcome::Fail]);
        let cache = coordinator(source.clone(), 60, 30);

        let result = cache.serve().await;
        assert!(matches!(result, Err(Error::HttpError(_))));
        assert!(cache.snapshot().is_none());
        assert!(!cache.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_snapshot_survives_failing_origin() {
        let source = ScriptedSource::new(vec![Outcome::Catalog("A"), Outcome::Fail]);
        let cache = coordinator(source.clone(), 60, 30);
        let original = cache.serve().await.unwrap();

        advance_secs(61).await;
        let served = cache.serve().await.unwrap();
        assert_eq!(served.freshness, Freshness::Stale);
        assert_eq!(served.snapshot.validator, original.snapshot.validator);
        cache.wait_for_refresh().await;

        let served = cache.serve().await.unwrap();
        assert_eq!(served.freshness, Freshness::Stale);
        assert_eq!(title_of(&served), "A");
        cache.wait_for_refresh().await;
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nearing_expiry_refreshes_once() {
        let gate = Arc::new(Semaphore::new(1));
        let source = ScriptedSource::gated(vec![Outcome::Catalog("A"), Outcome::Catalog("B")], gate.clone());
        let cache = coordinator(source.clone(), 60, 30);
        cache.serve().await.unwrap();

        advance_secs(45).await;
        let first = cache.serve().await.unwrap();
        let second = cache.serve().await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(first.freshness, Freshness::Hit);
        assert_eq!(second.freshness, Freshness::Hit);
        assert_eq!(title_of(&second), "A");
        assert!(cache.is_refreshing());
        assert_eq!(source.calls(), 2);

        gate.add_permits(1);
        cache.wait_for_refresh().await;
        assert!(!cache.is_refreshing());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_scenario_long_ttl() {
        let gate = Arc::new(Semaphore::new(1));
        let source = ScriptedSource::gated(vec![Outcome::Catalog("A"), Outcome::Catalog("B")], gate.clone());
        let cache = coordinator(source.clone(), 60, 30);

        let a = cache.serve().await.unwrap();
        assert_eq!(a.freshness, Freshness::Miss);

        advance_secs(45).await;
        let at_45 = cache.serve().await.unwrap();
        assert_eq!(title_of(&at_45), "A");
        assert_eq!(at_45.freshness, Freshness::Hit);
        assert!(cache.is_refreshing());

        advance_secs(1).await;
        gate.add_permits(1);
        cache.wait_for_refresh().await;

        advance_secs(1).await;
        let at_47 = cache.serve().await.unwrap();
        assert_eq!(title_of(&at_47), "B");
        assert_eq!(at_47.freshness, Freshness::Hit);
        assert_ne!(at_47.snapshot.validator, a.snapshot.validator);
        assert!(at_47.snapshot.last_modified >= a.snapshot.last_modified);
        assert_eq!(at_47.age, Duration::from_secs(1));
        assert!(!cache.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_scenario_short_ttl() {
        let source =
            ScriptedSource::new(vec![Outcome::Catalog("A"), Outcome::Fail, Outcome::Fail, Outcome::Catalog("C")]);
        let cache = coordinator(source.clone(), 5, 3);

        assert_eq!(cache.serve().await.unwrap().freshness, Freshness::Miss);

        advance_secs(6).await;
        let at_6 = cache.serve().await.unwrap();
        assert_eq!(at_6.freshness, Freshness::Stale);
        assert_eq!(title_of(&at_6), "A");
        cache.wait_for_refresh().await;

        advance_secs(4).await;
        let at_10 = cache.serve().await.unwrap();
        assert_eq!(at_10.freshness, Freshness::Stale);
        assert_eq!(title_of(&at_10), "A");
        cache.wait_for_refresh().await;

        let still_stale = cache.serve().await.unwrap();
        assert_eq!(still_stale.freshness, Freshness::Stale);
        cache.wait_for_refresh().await;

        let recovered = cache.serve().await.unwrap();
        assert_eq!(recovered.freshness, Freshness::Hit);
        assert_eq!(title_of(&recovered), "C");
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_refresh_does_not_wedge_slot() {
        let source = ScriptedSource::new(vec![Outcome::Catalog("A"), Outcome::Panic]);
        let cache = coordinator(source.clone(), 5, 3);
        cache.serve().await.unwrap();

        advance_secs(6).await;
        cache.serve().await.unwrap();
        cache.wait_for_refresh().await;
        assert!(!cache.is_refreshing());

        assert!(cache.trigger_refresh());
        cache.wait_for_refresh().await;
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_serves_from_injected_store() {
        let store = CacheStore::new();
        store.write(Arc::new(CacheSnapshot::from_products(&catalog("seeded"), None).unwrap()));

        let source = ScriptedSource::new(vec![Outcome::Catalog("A")]);
        let cache = RefreshCoordinator::new(store, source.clone(), CachePolicy::default());

        let served = cache.serve().await.unwrap();
        assert_eq!(served.freshness, Freshness::Hit);
        assert_eq!(title_of(&served), "seeded");
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_cold_requests_share_one_fetch() {
        let gate = Arc::new(Semaphore::new(0));
        let source = ScriptedSource::gated(vec![Outcome::Catalog("A")], gate.clone());
        let cache = coordinator(source.clone(), 60, 30);

        let (first, second, ()) = tokio::join!(cache.serve(), cache.serve(), async {
            tokio::task::yield_now().await;
            gate.add_permits(1);
        });

        let mut tags = [first.unwrap().freshness, second.unwrap().freshness];
        tags.sort_by_key(|f| f.as_str());
        assert_eq!(tags, [Freshness::Hit, Freshness::Miss]);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_refresh() {
        let gate = Arc::new(Semaphore::new(1));
        let source = ScriptedSource::gated(vec![Outcome::Catalog("A"), Outcome::Catalog("B")], gate);
        let cache = coordinator(source.clone(), 5, 3);
        cache.serve().await.unwrap();

        advance_secs(4).await;
        cache.serve().await.unwrap();
        tokio::task::yield_now().await;
        assert!(cache.is_refreshing());

        cache.shutdown();
        cache.wait_for_refresh().await;
        assert!(!cache.is_refreshing());
        assert_eq!(title_of(&cache.serve().await.unwrap()), "A");
    }

    #[test]
    fn test_trigger_during_runtime_teardown_returns() {
        struct TriggerOnDrop(RefreshCoordinator);

        impl Drop for TriggerOnDrop {
            fn drop(&mut self) {
                self.0.trigger_refresh();
            }
        }

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let cache = coordinator(ScriptedSource::new(vec![Outcome::Catalog("A")]), 60, 30);

            let guard = TriggerOnDrop(cache.clone());
            runtime.block_on(async move {
                tokio::spawn(async move {
                    let _guard = guard;
                    std::future::pending::<()>().await;
                });
                tokio::task::yield_now().await;
            });

            // Dropping the runtime drops the parked task, whose guard spawns
            // onto the closing runtime.
            drop(runtime);
            tx.send(cache.is_refreshing()).unwrap();
        });

        let refreshing = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("runtime teardown hung in trigger_refresh");
        assert!(!refreshing);
    }
}
