//! Per-instance memoisation of image outcomes, keyed by the raw `src` string.
//!
//! The cache stores the *computation*, not just its result: the first caller
//! for a key inserts a [`Shared`] future and every later caller (including
//! ones racing it from other tasks) awaits that same future. Each distinct
//! source is therefore decoded and hashed at most once per cache.
//!
//! Keys are the unresolved source strings. Two spellings of the same file
//! (`a.png` and `./a.png`) are separate entries.
//!
//! Failures and skips are cached too; nothing is retried until [`clear`].
//!
//! [`clear`]: AnnotationCache::clear

use crate::pipeline::ImageOutcome;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

type SharedOutcome = Shared<BoxFuture<'static, ImageOutcome>>;

/// Whether a lookup started a computation or joined an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// This call ran the compute closure.
    Miss,
    /// An earlier or concurrent call already owns the computation.
    Hit,
}

/// Source string → (possibly in-flight) outcome.
#[derive(Default)]
pub struct AnnotationCache {
    entries: Mutex<HashMap<String, SharedOutcome>>,
    computations: AtomicUsize,
}

impl AnnotationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the outcome for `source`, running `compute` only on first sight.
    ///
    /// The map lock is held only for the lookup/insert, never across an await.
    pub async fn get_or_compute<F, Fut>(&self, source: &str, compute: F) -> (ImageOutcome, CacheStatus)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ImageOutcome> + Send + 'static,
    {
        let (shared, status) = {
            let mut entries = self.lock();
            match entries.get(source) {
                Some(existing) => (existing.clone(), CacheStatus::Hit),
                None => {
                    let shared = compute().boxed().shared();
                    entries.insert(source.to_owned(), shared.clone());
                    self.computations.fetch_add(1, Ordering::SeqCst);
                    (shared, CacheStatus::Miss)
                }
            }
        };
        (shared.await, status)
    }

    /// Settled outcome for `source`, if its computation has finished.
    pub fn peek(&self, source: &str) -> Option<ImageOutcome> {
        self.lock().get(source).and_then(|s| s.peek().cloned())
    }

    /// Number of distinct sources seen.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total compute closures started over the cache's lifetime.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::SeqCst)
    }

    /// Forget every entry. In-flight computations keep running for their
    /// current awaiters but are no longer reachable from the cache.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SharedOutcome>> {
        // Entries are only ever inserted whole, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AnnotationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationCache")
            .field("entries", &self.len())
            .field("computations", &self.computations())
            .finish()
    }
}
