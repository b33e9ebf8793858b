//! Source resolution: turn a raw `src` value into a local path, or a skip.
//!
//! Only images reachable on the local filesystem are processed. Remote
//! references (`https://…`, protocol-relative `//cdn…`) and inline `data:` URIs
//! are skipped without touching the disk.
//!
//! Root-relative references such as `/images/hero.jpg` are site paths, not
//! filesystem roots, so when a base directory is configured they are joined
//! underneath it.

use crate::error::SkipReason;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Optional URL scheme followed by `//`.
static ABSOLUTE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:[a-z][a-z0-9+.\-]*:)?//").unwrap());

/// The outcome of resolving one source reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Do not process this reference.
    Skip(SkipReason),
    /// Read the image from this path.
    Local(PathBuf),
}

/// Check if the source is an absolute or protocol-relative URL.
pub fn is_absolute_url(source: &str) -> bool {
    ABSOLUTE_URL.is_match(source)
}

/// Resolve a source reference against an optional base directory.
pub fn resolve(source: &str, base_dir: Option<&Path>) -> Resolution {
    if source.trim().is_empty() {
        return Resolution::Skip(SkipReason::Empty);
    }
    if is_absolute_url(source) {
        return Resolution::Skip(SkipReason::Remote);
    }
    if source
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
    {
        return Resolution::Skip(SkipReason::InlineData);
    }

    let path = Path::new(source);
    match base_dir {
        Some(dir) if !path.is_absolute() || starts_with_separator(source) => {
            // `Path::join` replaces the base when handed an absolute path.
            let relative = source.trim_start_matches(|c| c == '/' || c == '\\');
            Resolution::Local(dir.join(relative))
        }
        _ => Resolution::Local(path.to_path_buf()),
    }
}

fn starts_with_separator(source: &str) -> bool {
    source.starts_with('/') || source.starts_with(std::path::MAIN_SEPARATOR)
}
