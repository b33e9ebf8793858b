//! Result types returned by an annotation run.

use crate::error::{ImageError, SkipReason};
use serde::{Deserialize, Serialize};

/// Summary of one [`crate::Annotator::annotate`] call.
///
/// Source-level counters count distinct `src` values; node-level counters
/// count `<img>` elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationReport {
    /// `<img>` elements with a non-empty `src`.
    pub image_nodes: usize,
    /// Distinct `src` values among them.
    pub distinct_sources: usize,
    /// Elements that received a placeholder attribute.
    pub annotated_nodes: usize,
    /// Sources that produced a placeholder.
    pub annotated_sources: usize,
    /// Sources answered from the cache instead of being decoded by this call.
    pub cache_hits: usize,
    /// Wall-clock time of the whole call.
    pub duration_ms: u64,
    /// Sources that were not processed, and why.
    pub skipped: Vec<SkippedSource>,
    /// Sources that failed to decode or encode.
    pub failures: Vec<ImageFailure>,
}

impl AnnotationReport {
    /// True when no source failed. Skipped sources do not count.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A source that was deliberately left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSource {
    pub source: String,
    pub reason: SkipReason,
}

/// A source whose image could not be turned into a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFailure {
    pub source: String,
    pub error: ImageError,
}

/// Output of the markup-level entry points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedHtml {
    /// The re-serialised document.
    pub html: String,
    pub report: AnnotationReport,
}
