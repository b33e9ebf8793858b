//! # html-thumbhash
//!
//! Attach ThumbHash image placeholders to the `<img>` elements of HTML
//! documents.
//!
//! ## Why this crate?
//!
//! A ThumbHash is a ~25-byte perceptual summary of an image. Front-end code
//! can expand it into a blurred preview that is shown while the real image
//! loads, so pages do not flash empty boxes or shift layout. Computing the
//! hash needs the image pixels, which are available at build time but not in
//! the browser. This crate walks a static page, decodes each local image once,
//! and writes the hash into an attribute next to `src`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! HTML
//!  │
//!  ├─ 1. Parse    markup → owned element tree (html5ever tokenizer)
//!  ├─ 2. Scan     collect distinct <img src> values
//!  ├─ 3. Resolve  skip remote / data: / empty, join local paths to base_dir
//!  ├─ 4. Decode   read + EXIF-orient + fit inside 100×100 (spawn_blocking)
//!  ├─ 5. Encode   RGBA → ThumbHash → base64 or PNG data URL
//!  ├─ 6. Mutate   write data-thumbhash + src on every matching element
//!  └─ 7. Output   serialised HTML + AnnotationReport
//! ```
//!
//! Outcomes are memoised per [`Annotator`] by raw `src` string, so a shared
//! image is decoded once no matter how many elements (or documents) use it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use html_thumbhash::{annotate_html, AnnotateConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnnotateConfig::builder().base_dir("./public").build()?;
//!     let output = annotate_html(r#"<img src="/hero.jpg">"#, &config).await?;
//!     println!("{}", output.html);
//!     eprintln!("{}/{} images annotated",
//!         output.report.annotated_nodes,
//!         output.report.image_nodes);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `html-thumbhash` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! html-thumbhash = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod annotate;
pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use annotate::{annotate_file, annotate_html, annotate_sync, Annotator};
pub use cache::{AnnotationCache, CacheStatus};
pub use config::{AnnotateConfig, AnnotateConfigBuilder, OutputFormat};
pub use document::{Attributes, Document, Element, Node};
pub use error::{AnnotateError, ImageError, SkipReason};
pub use output::{AnnotatedHtml, AnnotationReport, ImageFailure, SkippedSource};
pub use pipeline::decode::{PixelBuffer, PixelDecoder, RasterDecoder};
pub use pipeline::encode::{decode_placeholder, PerceptualHash};
pub use pipeline::ImageOutcome;
pub use progress::{AnnotationProgressCallback, NoopProgressCallback, ProgressCallback};
