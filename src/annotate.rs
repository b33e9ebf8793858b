//! Tree annotation: find `<img>` elements and attach ThumbHash placeholders.
//!
//! One [`Annotator::annotate`] call runs five phases:
//!
//! ```text
//! Scan ──▶ Dispatch ──▶ Await ──▶ Mutate ──▶ Done
//! ```
//!
//! 1. **Scan**     visit every element once, collect distinct `src` values
//! 2. **Dispatch** look each source up in the [`AnnotationCache`], starting
//!    the resolve → decode → encode pipeline on a miss
//! 3. **Await**    wait for every source to settle (bounded by `concurrency`);
//!    a failed image is an outcome, not an error
//! 4. **Mutate**   second visit: write the placeholder and source attributes
//!    on every element whose source produced a value
//! 5. **Done**     return an [`AnnotationReport`]
//!
//! The tree is not borrowed while images are decoding. Scan copies the
//! source strings out, Mutate looks them up again.
//!
//! The free functions [`annotate_html`], [`annotate_file`] and
//! [`annotate_sync`] wrap parse → annotate → serialise for callers that hold
//! markup rather than a [`Document`].

use crate::cache::{AnnotationCache, CacheStatus};
use crate::config::AnnotateConfig;
use crate::document::{Document, Element};
use crate::error::AnnotateError;
use crate::output::{AnnotatedHtml, AnnotationReport, ImageFailure, SkippedSource};
use crate::pipeline::decode::{PixelDecoder, RasterDecoder};
use crate::pipeline::{self, ImageOutcome};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Tag whose elements are annotated.
pub const IMAGE_TAG: &str = "img";

/// Attribute the source reference is read from.
pub const SOURCE_ATTRIBUTE: &str = "src";

/// The `src` of an image element, if it has a non-empty one.
fn image_source(el: &Element) -> Option<&str> {
    if !el.is(IMAGE_TAG) {
        return None;
    }
    el.attribute(SOURCE_ATTRIBUTE).filter(|s| !s.is_empty())
}

/// Annotates documents, remembering every source it has processed.
///
/// The cache lives as long as the annotator. Reuse one instance across the
/// pages of a site to hash each shared image once; create a fresh one (or call
/// [`Annotator::clear_cache`]) when documents must not see each other's
/// results, e.g. after images changed on disk.
pub struct Annotator {
    config: AnnotateConfig,
    decoder: Arc<dyn PixelDecoder>,
    cache: AnnotationCache,
}

impl fmt::Debug for Annotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Annotator")
            .field("config", &self.config)
            .field("decoder", &"<dyn PixelDecoder>")
            .field("cache", &self.cache)
            .finish()
    }
}

impl Annotator {
    /// Create an annotator using the default [`RasterDecoder`].
    pub fn new(config: AnnotateConfig) -> Result<Self, AnnotateError> {
        Self::with_decoder(config, Arc::new(RasterDecoder))
    }

    /// Create an annotator with a custom pixel decoder.
    pub fn with_decoder(
        config: AnnotateConfig,
        decoder: Arc<dyn PixelDecoder>,
    ) -> Result<Self, AnnotateError> {
        config.validate()?;
        Ok(Self {
            config,
            decoder,
            cache: AnnotationCache::new(),
        })
    }

    pub fn config(&self) -> &AnnotateConfig {
        &self.config
    }

    pub fn cache(&self) -> &AnnotationCache {
        &self.cache
    }

    /// Forget every cached outcome.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Annotate every `<img>` in `document` in place.
    ///
    /// Never fails: images that cannot be processed are reported and left
    /// untouched.
    pub async fn annotate(&self, document: &mut Document) -> AnnotationReport {
        let start = Instant::now();
        let cb = self.config.progress_callback.as_ref();

        // ── Scan ─────────────────────────────────────────────────────────────
        let mut sources: BTreeMap<String, usize> = BTreeMap::new();
        document.visit_elements(|el| {
            if let Some(src) = image_source(el) {
                *sources.entry(src.to_owned()).or_default() += 1;
            }
        });

        let mut report = AnnotationReport {
            image_nodes: sources.values().sum(),
            distinct_sources: sources.len(),
            ..AnnotationReport::default()
        };
        info!(
            "Annotating {} image nodes ({} distinct sources)",
            report.image_nodes, report.distinct_sources
        );
        if let Some(cb) = cb {
            cb.on_annotation_start(report.distinct_sources);
        }

        // ── Dispatch + Await ─────────────────────────────────────────────────
        let settled: Vec<(String, ImageOutcome, CacheStatus)> =
            stream::iter(sources.into_keys().map(|source| async move {
                let (outcome, status) = self.lookup(&source).await;
                (source, outcome, status)
            }))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let mut values: HashMap<String, Arc<str>> = HashMap::new();
        for (source, outcome, status) in settled {
            if status == CacheStatus::Hit {
                report.cache_hits += 1;
            }
            match outcome {
                ImageOutcome::Annotated(value) => {
                    report.annotated_sources += 1;
                    values.insert(source, value);
                }
                ImageOutcome::Skipped(reason) => {
                    report.skipped.push(SkippedSource { source, reason });
                }
                ImageOutcome::Failed(error) => {
                    report.failures.push(ImageFailure { source, error });
                }
            }
        }
        report.skipped.sort_by(|a, b| a.source.cmp(&b.source));
        report.failures.sort_by(|a, b| a.source.cmp(&b.source));

        // ── Mutate ───────────────────────────────────────────────────────────
        let output_attribute = self.config.output_attribute.as_str();
        let original_attribute = self.config.original_attribute.as_str();
        let mut annotated_nodes = 0;
        document.visit_elements_mut(|el| {
            let Some(source) = image_source(el).map(str::to_owned) else {
                return;
            };
            if let Some(value) = values.get(&source) {
                el.attributes.set(output_attribute, value.as_ref());
                el.attributes.set(original_attribute, source);
                annotated_nodes += 1;
            }
        });
        report.annotated_nodes = annotated_nodes;
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Annotation complete: {}/{} nodes, {} failed, {} skipped, {} cached, {}ms",
            report.annotated_nodes,
            report.image_nodes,
            report.failures.len(),
            report.skipped.len(),
            report.cache_hits,
            report.duration_ms
        );
        if let Some(cb) = cb {
            cb.on_annotation_complete(report.distinct_sources, report.annotated_sources);
        }

        report
    }

    /// Parse `markup`, annotate it, and serialise the result.
    pub async fn annotate_html(&self, markup: &str) -> AnnotatedHtml {
        let mut document = Document::parse(markup);
        let report = self.annotate(&mut document).await;
        AnnotatedHtml {
            html: document.to_html(),
            report,
        }
    }

    /// Cache-checked pipeline run for one source.
    async fn lookup(&self, source: &str) -> (ImageOutcome, CacheStatus) {
        let owned = source.to_owned();
        let base_dir = self.config.base_dir.clone();
        let format = self.config.output_format;
        let decoder = Arc::clone(&self.decoder);
        let cb = self.config.progress_callback.clone();

        let (outcome, status) = self
            .cache
            .get_or_compute(source, move || async move {
                if let Some(cb) = &cb {
                    cb.on_image_start(&owned);
                }
                let outcome =
                    pipeline::process_source(&owned, base_dir.as_deref(), format, decoder).await;
                if let Some(cb) = &cb {
                    match &outcome {
                        ImageOutcome::Annotated(v) => cb.on_image_complete(&owned, v.len()),
                        ImageOutcome::Skipped(reason) => cb.on_image_skipped(&owned, *reason),
                        ImageOutcome::Failed(e) => cb.on_image_error(&owned, e),
                    }
                }
                outcome
            })
            .await;

        if status == CacheStatus::Hit {
            debug!("Cache hit for '{}'", source);
        }
        (outcome, status)
    }
}

// ── Markup-level entry points ────────────────────────────────────────────────

/// Annotate an HTML string with a fresh [`Annotator`].
///
/// # Errors
/// Returns `Err(AnnotateError)` only for an invalid config. Malformed markup
/// is repaired the way a browser would; image failures are listed in the
/// report.
pub async fn annotate_html(
    markup: &str,
    config: &AnnotateConfig,
) -> Result<AnnotatedHtml, AnnotateError> {
    let annotator = Annotator::new(config.clone())?;
    Ok(annotator.annotate_html(markup).await)
}

/// Annotate an HTML file and write the result to `output_path`.
///
/// When `config.base_dir` is unset, image references are resolved against the
/// input file's directory. Uses atomic write (temp file + rename), so
/// `output_path` may equal `input_path`.
pub async fn annotate_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &AnnotateConfig,
) -> Result<AnnotationReport, AnnotateError> {
    let input = input_path.as_ref();
    let path = output_path.as_ref();
    info!("Annotating file: {}", input.display());

    let bytes = tokio::fs::read(input).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AnnotateError::InputNotFound {
            path: input.to_path_buf(),
        },
        _ => AnnotateError::ReadFailed {
            path: input.to_path_buf(),
            source: e,
        },
    })?;

    let markup = String::from_utf8(bytes).map_err(|e| AnnotateError::InvalidDocument {
        position: e.utf8_error().valid_up_to() as u64,
        detail: format!("'{}' is not valid UTF-8", input.display()),
    })?;

    let mut config = config.clone();
    if config.base_dir.is_none() {
        config.base_dir = input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);
    }

    let output = annotate_html(&markup, &config).await?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AnnotateError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = tmp_path_for(path);
    tokio::fs::write(&tmp_path, &output.html)
        .await
        .map_err(|e| AnnotateError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| AnnotateError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(output.report)
}

/// Synchronous wrapper around [`annotate_html`].
///
/// Creates a temporary tokio runtime internally; do not call from async code.
pub fn annotate_sync(markup: &str, config: &AnnotateConfig) -> Result<AnnotatedHtml, AnnotateError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AnnotateError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(annotate_html(markup, config))
}

/// `page.html` → `page.html.tmp`, next to the destination.
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
