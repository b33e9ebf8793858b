//! Pipeline stages for turning one image reference into a placeholder.
//!
//! Each submodule implements exactly one transformation step and is
//! independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! resolve ──▶ decode ──▶ encode
//! (src→path)  (≤100px RGBA)  (ThumbHash → base64 | data URL)
//! ```
//!
//! 1. [`resolve`] — skip remote/inline references, join the rest onto the
//!    base directory
//! 2. [`decode`]  — read, orient and downscale pixels; runs in
//!    `spawn_blocking` because image decoding is CPU-bound
//! 3. [`encode`]  — hash the pixels and render the configured representation
//!
//! [`process_source`] chains the three and folds every failure into an
//! [`ImageOutcome`], so callers never see an `Err` for a bad image.

pub mod decode;
pub mod encode;
pub mod resolve;

use crate::config::OutputFormat;
use crate::error::{ImageError, SkipReason};
use decode::PixelDecoder;
use resolve::Resolution;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to one distinct image source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// The placeholder value to write into the output attribute.
    Annotated(Arc<str>),
    /// Not ours to process; the element is left as-is.
    Skipped(SkipReason),
    /// Reading or hashing failed; the element is left as-is.
    Failed(ImageError),
}

impl ImageOutcome {
    /// The attribute value, if one was produced.
    pub fn value(&self) -> Option<&str> {
        match self {
            ImageOutcome::Annotated(v) => Some(v),
            _ => None,
        }
    }
}

/// Run one source reference through resolve → decode → encode.
pub async fn process_source(
    source: &str,
    base_dir: Option<&Path>,
    format: OutputFormat,
    decoder: Arc<dyn PixelDecoder>,
) -> ImageOutcome {
    let path = match resolve::resolve(source, base_dir) {
        Resolution::Skip(reason) => {
            debug!("Skipping '{}': {}", source, reason);
            return ImageOutcome::Skipped(reason);
        }
        Resolution::Local(path) => path,
    };
    debug!("Resolved '{}' → {}", source, path.display());

    let result = tokio::task::spawn_blocking(move || {
        let pixels = decoder.decode(&path)?;
        encode::encode(&pixels, format)
    })
    .await
    .map_err(|e| ImageError::TaskFailed {
        detail: e.to_string(),
    })
    .and_then(|r| r);

    match result {
        Ok(value) => ImageOutcome::Annotated(value.into()),
        Err(e) => {
            warn!("Skipped processing image '{}': {}", source, e);
            ImageOutcome::Failed(e)
        }
    }
}
