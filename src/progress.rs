//! Progress-callback trait for per-image annotation events.
//!
//! Inject an [`Arc<dyn AnnotationProgressCallback>`] via
//! [`crate::config::AnnotateConfigBuilder::progress_callback`] to receive
//! events as the annotator works through the distinct image sources of a
//! document.
//!
//! Events are per *source*, not per element: ten `<img>` tags pointing at
//! `logo.png` produce one `on_image_start`/`on_image_complete` pair.
//!
//! # Example
//!
//! ```rust
//! use html_thumbhash::{AnnotateConfig, AnnotationProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl AnnotationProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, source: &str, _value_len: usize) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{n}: {source}");
//!     }
//! }
//!
//! let config = AnnotateConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::{ImageError, SkipReason};
use std::sync::Arc;

/// Called by the annotator as it processes each distinct image source.
///
/// Implementations must be `Send + Sync`: sources are processed concurrently
/// and events for different sources may arrive from different threads and in
/// any order. All methods default to no-ops.
pub trait AnnotationProgressCallback: Send + Sync {
    /// Called once after the scan, before any image is read.
    ///
    /// # Arguments
    /// * `total_sources` — distinct sources that will be looked up
    fn on_annotation_start(&self, total_sources: usize) {
        let _ = total_sources;
    }

    /// Called just before a source is resolved and decoded.
    ///
    /// Not called for sources served from the cache of a previous run.
    fn on_image_start(&self, source: &str) {
        let _ = source;
    }

    /// Called when a source produced a placeholder.
    ///
    /// # Arguments
    /// * `source`    — the raw `src` value
    /// * `value_len` — byte length of the written attribute value
    fn on_image_complete(&self, source: &str, value_len: usize) {
        let _ = (source, value_len);
    }

    /// Called when a source was deliberately not processed.
    fn on_image_skipped(&self, source: &str, reason: SkipReason) {
        let _ = (source, reason);
    }

    /// Called when a source failed to decode or encode.
    fn on_image_error(&self, source: &str, error: &ImageError) {
        let _ = (source, error);
    }

    /// Called once after every source has settled.
    ///
    /// # Arguments
    /// * `total_sources` — distinct sources looked up
    /// * `annotated`     — sources that produced a placeholder
    fn on_annotation_complete(&self, total_sources: usize, annotated: usize) {
        let _ = (total_sources, annotated);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnnotationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnnotateConfig`].
pub type ProgressCallback = Arc<dyn AnnotationProgressCallback>;
