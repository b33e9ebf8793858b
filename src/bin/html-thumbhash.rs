//! CLI binary for html-thumbhash.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnnotateConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use html_thumbhash::{
    annotate_file, AnnotateConfig, AnnotatedHtml, AnnotationProgressCallback, AnnotationReport,
    Annotator, ImageError, OutputFormat, ProgressCallback, SkipReason,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per image source.
/// Sources settle out of order, so start times are keyed by source.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_annotation_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Parsing document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Hashing");
        self.bar.reset_eta();
    }

    fn elapsed(&self, source: &str) -> String {
        let ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(source)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.2}s", ms as f64 / 1000.0))
    }
}

/// Keep long paths and data URIs from wrapping the terminal.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

impl AnnotationProgressCallback for CliProgressCallback {
    fn on_annotation_start(&self, total_sources: usize) {
        self.activate_bar(total_sources);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Hashing {total_sources} distinct images…"))
        ));
    }

    fn on_image_start(&self, source: &str) {
        self.start_times
            .lock()
            .unwrap()
            .insert(source.to_string(), Instant::now());
        self.bar.set_message(truncate(source, 40));
    }

    fn on_image_complete(&self, source: &str, value_len: usize) {
        let elapsed = self.elapsed(source);
        self.bar.println(format!(
            "  {} {:<48}  {:<10}  {}",
            green("✓"),
            truncate(source, 48),
            dim(&format!("{value_len:>4} chars")),
            elapsed,
        ));
        self.bar.inc(1);
    }

    fn on_image_skipped(&self, source: &str, reason: SkipReason) {
        self.start_times.lock().unwrap().remove(source);
        self.bar.println(format!(
            "  {} {:<48}  {}",
            dim("–"),
            truncate(source, 48),
            dim(&reason.to_string()),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, source: &str, error: &ImageError) {
        let elapsed = self.elapsed(source);
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:<48}  {}  {}",
            red("✗"),
            truncate(source, 48),
            red(&truncate(&error.to_string(), 80)),
            elapsed,
        ));
        self.bar.inc(1);
    }

    fn on_annotation_complete(&self, total_sources: usize, annotated: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {}/{} images hashed",
                green("✔"),
                bold(&annotated.to_string()),
                total_sources
            );
        } else {
            eprintln!(
                "{} {}/{} images hashed  ({} failed)",
                if annotated == 0 { red("✘") } else { yellow("⚠") },
                bold(&annotated.to_string()),
                total_sources,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Annotate a page, print to stdout
  html-thumbhash public/index.html

  # Write to a file; images resolve against the input's directory
  html-thumbhash public/index.html -o dist/index.html

  # Rewrite in place, resolving root-relative paths under ./public
  html-thumbhash --in-place --base-dir public public/blog/post.html

  # Pipe through stdin
  cat page.html | html-thumbhash --base-dir public > page.annotated.html

  # Lazy-loading markup: keep the real URL in data-src
  html-thumbhash --original-attribute data-src page.html -o page.html --in-place

  # Ready-to-use PNG previews instead of raw hashes
  html-thumbhash --format data-url page.html

  # Machine-readable report
  html-thumbhash page.html -o out.html --json > report.json

OUTPUT FORMATS:
  raw       base64 ThumbHash bytes (5–25 bytes, ~20–36 chars). Decode in the
            browser with the thumbhash JS package.
  data-url  data:image/png;base64,… of the decoded preview. Usable directly
            as an <img> src or CSS background, no client-side code needed.

SKIPPED SOURCES:
  Remote references (http://, https://, //cdn…), inline data: URIs and empty
  src attributes are left untouched. Images that are missing or fail to
  decode are reported and their elements are left untouched too.

ENVIRONMENT VARIABLES:
  Every flag can be set with HTML_THUMBHASH_<FLAG>, e.g.
  HTML_THUMBHASH_BASE_DIR=public, HTML_THUMBHASH_FORMAT=data-url.
  RUST_LOG overrides the log filter (e.g. RUST_LOG=html_thumbhash=debug).
"#;

/// Annotate <img> elements in HTML with ThumbHash placeholders.
#[derive(Parser, Debug)]
#[command(
    name = "html-thumbhash",
    version,
    about = "Annotate <img> elements in HTML with ThumbHash placeholders",
    long_about = "Scan an HTML document for <img> elements, compute a ThumbHash for every \
locally stored image they reference, and write it into an attribute so the page can show a \
blurred preview while the real image loads.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// HTML file to annotate. `-` or omitted reads stdin.
    input: Option<PathBuf>,

    /// Write the annotated HTML to this file instead of stdout.
    #[arg(short, long, env = "HTML_THUMBHASH_OUTPUT", conflicts_with = "in_place")]
    output: Option<PathBuf>,

    /// Overwrite INPUT with the annotated HTML.
    #[arg(long, env = "HTML_THUMBHASH_IN_PLACE")]
    in_place: bool,

    /// Directory image paths are resolved against.
    #[arg(
        long,
        env = "HTML_THUMBHASH_BASE_DIR",
        long_help = "Directory image paths are resolved against. Root-relative paths \
          (/img/a.png) are joined under it too.\n\
          Default: the input file's directory, or the working directory for stdin."
    )]
    base_dir: Option<PathBuf>,

    /// Attribute that receives the placeholder.
    #[arg(long, env = "HTML_THUMBHASH_OUTPUT_ATTRIBUTE", default_value = "data-thumbhash")]
    output_attribute: String,

    /// Attribute that receives the original `src` value.
    #[arg(long, env = "HTML_THUMBHASH_ORIGINAL_ATTRIBUTE", default_value = "src")]
    original_attribute: String,

    /// Placeholder encoding: raw or data-url.
    #[arg(long, env = "HTML_THUMBHASH_FORMAT", value_enum, default_value = "raw")]
    format: FormatArg,

    /// Number of images decoded concurrently.
    #[arg(short, long, env = "HTML_THUMBHASH_CONCURRENCY", default_value_t = 8,
          value_parser = clap::value_parser!(u64).range(1..=256))]
    concurrency: u64,

    /// Print the AnnotationReport as JSON on stdout.
    #[arg(long, env = "HTML_THUMBHASH_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "HTML_THUMBHASH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HTML_THUMBHASH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HTML_THUMBHASH_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Raw,
    DataUrl,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Raw => OutputFormat::RawHash,
            FormatArg::DataUrl => OutputFormat::DataUrl,
        }
    }
}

impl Cli {
    /// The input file, or `None` for stdin.
    fn input_file(&self) -> Option<&Path> {
        self.input.as_deref().filter(|p| p.as_os_str() != "-")
    }

    /// Where the annotated document goes, or `None` for stdout.
    fn output_file(&self) -> Result<Option<&Path>> {
        if self.in_place {
            return match self.input_file() {
                Some(path) => Ok(Some(path)),
                None => anyhow::bail!("--in-place needs an INPUT file, not stdin"),
            };
        }
        Ok(self.output.as_deref())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn AnnotationProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let output_file = cli.output_file()?;

    // ── Run annotation ───────────────────────────────────────────────────
    match (cli.input_file(), output_file) {
        (Some(input), Some(output)) => {
            let report = annotate_file(input, output, &config)
                .await
                .with_context(|| format!("Failed to annotate {}", input.display()))?;

            if cli.json {
                print_json(&report)?;
            } else if !cli.quiet {
                eprintln!(
                    "{}  {}/{} images  {}ms  →  {}",
                    if report.is_clean() { green("✔") } else { yellow("⚠") },
                    report.annotated_nodes,
                    report.image_nodes,
                    report.duration_ms,
                    bold(&output.display().to_string()),
                );
            }
        }
        (input, output) => {
            let markup = match input {
                Some(path) => tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };

            let mut config = config;
            if config.base_dir.is_none() {
                config.base_dir = input
                    .and_then(Path::parent)
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf);
            }

            let annotator = Annotator::new(config).context("Invalid configuration")?;
            let annotated = annotator.annotate_html(&markup).await;

            match output {
                Some(path) => {
                    write_output(path, &annotated.html).await?;
                    if cli.json {
                        print_json(&annotated.report)?;
                    }
                }
                None if cli.json => print_json(&annotated)?,
                None => {
                    let stdout = io::stdout();
                    let mut handle = stdout.lock();
                    handle
                        .write_all(annotated.html.as_bytes())
                        .context("Failed to write to stdout")?;
                }
            }

            if !cli.quiet && !show_progress && !cli.json {
                print_summary(&annotated);
            }
        }
    }

    Ok(())
}

/// Map CLI args to `AnnotateConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnnotateConfig> {
    let mut builder = AnnotateConfig::builder()
        .output_attribute(cli.output_attribute.clone())
        .original_attribute(cli.original_attribute.clone())
        .output_format(cli.format.into())
        .concurrency(cli.concurrency as usize);

    if let Some(ref dir) = cli.base_dir {
        builder = builder.base_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn write_output(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, html)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise report")?;
    println!("{json}");
    Ok(())
}

fn print_summary(annotated: &AnnotatedHtml) {
    let report: &AnnotationReport = &annotated.report;
    eprintln!(
        "Annotated {}/{} images in {}ms",
        report.annotated_nodes, report.image_nodes, report.duration_ms
    );
    for failure in &report.failures {
        eprintln!("  {} {}: {}", red("✗"), failure.source, failure.error);
    }
}
