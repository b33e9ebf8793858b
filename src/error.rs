//! Error types for the html-thumbhash library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AnnotateError`] — **Fatal**: the document itself cannot be processed
//!   (unreadable or non-UTF-8 input file, invalid configuration, output file
//!   not writable). Malformed markup is never fatal: the parser repairs it. Returned as `Err(AnnotateError)` from the
//!   host-level entry points in [`crate::annotate`].
//!
//! * [`ImageError`] — **Non-fatal**: a single image could not be turned into a
//!   placeholder (missing file, corrupt data, hashing failure). It is recorded in
//!   the [`crate::output::AnnotationReport`] and the affected `<img>` elements are
//!   left untouched. One bad image never costs the caller the whole document.
//!
//! A third outcome, [`SkipReason`], is not an error at all: remote and inline
//! references are simply not ours to process.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the html-thumbhash library.
///
/// Per-image failures use [`ImageError`] and never surface here.
#[derive(Debug, Error)]
pub enum AnnotateError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input document was not found at the given path.
    #[error("HTML file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Input document exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input bytes are not a UTF-8 document.
    #[error("Document could not be decoded at byte {position}: {detail}")]
    InvalidDocument { position: u64, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the annotated output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image source.
///
/// Cloneable because one outcome is shared by every element that references
/// the same source.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ImageError {
    /// The resolved path does not exist.
    #[error("image not found: '{}'", path.display())]
    NotFound { path: PathBuf },

    /// The file exists but could not be read or decoded as an image.
    #[error("failed to decode '{}': {detail}", path.display())]
    Decode { path: PathBuf, detail: String },

    /// Hashing or re-encoding the decoded pixels failed.
    #[error("failed to encode placeholder: {detail}")]
    Encode { detail: String },

    /// The blocking decode task panicked or was cancelled.
    #[error("image task failed: {detail}")]
    TaskFailed { detail: String },
}

/// Why a source reference was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The `src` attribute is empty or whitespace.
    Empty,
    /// The reference is an absolute or protocol-relative URL.
    Remote,
    /// The reference is an inline `data:` URI.
    InlineData,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Empty => "empty source",
            SkipReason::Remote => "remote URL",
            SkipReason::InlineData => "inline data URI",
        };
        f.write_str(s)
    }
}
