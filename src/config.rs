//! Configuration types for image-placeholder annotation.
//!
//! All annotation behaviour is controlled through [`AnnotateConfig`], built
//! via its [`AnnotateConfigBuilder`]. One struct holds every knob so a config
//! can be shared across tasks, serialised for logging, and compared between
//! runs.

use crate::error::AnnotateError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Attribute written with the encoded placeholder by default.
pub const DEFAULT_OUTPUT_ATTRIBUTE: &str = "data-thumbhash";

/// Attribute written with the original source reference by default.
pub const DEFAULT_ORIGINAL_ATTRIBUTE: &str = "src";

/// Configuration for annotating a document.
///
/// Built via [`AnnotateConfig::builder()`] or using
/// [`AnnotateConfig::default()`].
///
/// # Example
/// ```rust
/// use html_thumbhash::{AnnotateConfig, OutputFormat};
///
/// let config = AnnotateConfig::builder()
///     .base_dir("public")
///     .output_format(OutputFormat::DataUrl)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotateConfig {
    /// Directory image references are resolved against. Default: none.
    ///
    /// When unset, references are used as-is, i.e. relative to the process's
    /// working directory. Root-relative references (`/images/x.png`) are joined
    /// under this directory rather than treated as filesystem roots.
    pub base_dir: Option<PathBuf>,

    /// Attribute written with the encoded placeholder. Default: `data-thumbhash`.
    pub output_attribute: String,

    /// Attribute written with the source reference. Default: `src`.
    ///
    /// Set this to e.g. `data-src` for lazy-loading setups where the real
    /// source must not be in `src` until the page script swaps it in.
    pub original_attribute: String,

    /// Representation written into `output_attribute`. Default: [`OutputFormat::RawHash`].
    pub output_format: OutputFormat,

    /// Maximum number of images decoded at once. Default: 8.
    ///
    /// Every in-flight image holds an open file and a full-resolution decode
    /// buffer until it is downscaled, so documents with hundreds of images
    /// need a ceiling.
    pub concurrency: usize,

    /// Optional per-image progress events.
    #[serde(skip)]
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            output_attribute: DEFAULT_OUTPUT_ATTRIBUTE.to_string(),
            original_attribute: DEFAULT_ORIGINAL_ATTRIBUTE.to_string(),
            output_format: OutputFormat::default(),
            concurrency: 8,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnnotateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotateConfig")
            .field("base_dir", &self.base_dir)
            .field("output_attribute", &self.output_attribute)
            .field("original_attribute", &self.original_attribute)
            .field("output_format", &self.output_format)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn AnnotationProgressCallback>"),
            )
            .finish()
    }
}

impl AnnotateConfig {
    /// Create a new builder for `AnnotateConfig`.
    pub fn builder() -> AnnotateConfigBuilder {
        AnnotateConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the constraints the builder enforces.
    ///
    /// Public fields can be edited after `build()`, so the annotator re-checks
    /// through here before touching a document.
    pub fn validate(&self) -> Result<(), AnnotateError> {
        validate_attribute_name("output_attribute", &self.output_attribute)?;
        validate_attribute_name("original_attribute", &self.original_attribute)?;
        if self.output_attribute.eq_ignore_ascii_case(&self.original_attribute) {
            return Err(AnnotateError::InvalidConfig(format!(
                "output_attribute and original_attribute must differ, both are '{}'",
                self.output_attribute
            )));
        }
        if self.concurrency == 0 {
            return Err(AnnotateError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

fn validate_attribute_name(field: &str, name: &str) -> Result<(), AnnotateError> {
    if name.is_empty() {
        return Err(AnnotateError::InvalidConfig(format!("{field} must not be empty")));
    }
    if let Some(c) = name
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '>' | '/' | '='))
    {
        return Err(AnnotateError::InvalidConfig(format!(
            "{field} '{name}' contains invalid character {c:?}"
        )));
    }
    Ok(())
}

/// Builder for [`AnnotateConfig`].
#[derive(Debug)]
pub struct AnnotateConfigBuilder {
    config: AnnotateConfig,
}

impl AnnotateConfigBuilder {
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.base_dir = Some(dir.into());
        self
    }

    pub fn output_attribute(mut self, name: impl Into<String>) -> Self {
        self.config.output_attribute = name.into();
        self
    }

    pub fn original_attribute(mut self, name: impl Into<String>) -> Self {
        self.config.original_attribute = name.into();
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnnotateConfig, AnnotateError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the perceptual hash is written into the output attribute.
///
/// | Format | Example | Client needs |
/// |--------|---------|--------------|
/// | `RawHash` | `1QcSHQRnh493V4dIh4eXh1h4kJUI` | a ThumbHash decoder in JS |
/// | `DataUrl` | `data:image/png;base64,iVBORw0…` | nothing, usable as `src` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Base64 of the raw hash bytes. Most compact. (default)
    #[default]
    RawHash,
    /// The hash decoded back to pixels and re-encoded as a PNG `data:` URI.
    DataUrl,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = AnnotateConfig::default();
        assert_eq!(c.base_dir, None);
        assert_eq!(c.output_attribute, "data-thumbhash");
        assert_eq!(c.original_attribute, "src");
        assert_eq!(c.output_format, OutputFormat::RawHash);
        assert_eq!(c.concurrency, 8);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let c = AnnotateConfig::builder()
            .base_dir("./")
            .output_attribute("data-placeholder")
            .original_attribute("data-src")
            .output_format(OutputFormat::DataUrl)
            .concurrency(2)
            .build()
            .unwrap();
        assert_eq!(c.base_dir, Some(PathBuf::from("./")));
        assert_eq!(c.output_attribute, "data-placeholder");
        assert_eq!(c.original_attribute, "data-src");
        assert_eq!(c.output_format, OutputFormat::DataUrl);
        assert_eq!(c.concurrency, 2);
    }

    #[test]
    fn builder_clamps_zero_concurrency() {
        let c = AnnotateConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn empty_attribute_rejected() {
        let err = AnnotateConfig::builder()
            .output_attribute("")
            .build()
            .unwrap_err();
        assert!(matches!(err, AnnotateError::InvalidConfig(_)));
    }

    #[test]
    fn attribute_with_space_rejected() {
        let err = AnnotateConfig::builder()
            .original_attribute("data src")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("data src"), "got: {err}");
    }

    #[test]
    fn identical_attributes_rejected() {
        let err = AnnotateConfig::builder()
            .output_attribute("src")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("must differ"), "got: {err}");
    }

    #[test]
    fn zero_concurrency_set_directly_fails_validation() {
        let mut c = AnnotateConfig::default();
        c.concurrency = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn serde_skips_callback_and_fills_defaults() {
        let c: AnnotateConfig =
            serde_json::from_str(r#"{"output_format":"data_url","base_dir":"site"}"#).unwrap();
        assert_eq!(c.output_format, OutputFormat::DataUrl);
        assert_eq!(c.base_dir, Some(PathBuf::from("site")));
        assert_eq!(c.output_attribute, "data-thumbhash");
        assert!(c.progress_callback.is_none());

        let json = serde_json::to_string(&c).unwrap();
        assert!(!json.contains("progress_callback"));
    }
}
