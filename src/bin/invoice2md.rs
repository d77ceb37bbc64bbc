//! CLI binary for invoice2md.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use invoice2md::{
    convert_file, convert_to_file, inspect, ChunkSeparator, ConnectionConfig, ConversionConfig,
    ConversionProgressCallback, ConversionStats, DocumentMetadata, ProgressCallback,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Terminal styling ─────────────────────────────────────────────────────────

fn paint(sgr: &str, text: &str) -> String {
    format!("\x1b[{sgr}m{text}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Progress bar ─────────────────────────────────────────────────────────────

/// Terminal progress: a page bar that advances as pages render, plus one log
/// line per answered batch.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Self::with_bar(ProgressBar::new(0))
    }

    fn with_bar(bar: ProgressBar) -> Arc<Self> {
        let bar = bar.with_prefix("invoice2md").with_style(
            ProgressStyle::with_template("{spinner:.yellow} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_message("loading document");
        bar.enable_steady_tick(Duration::from_millis(100));

        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize, total_batches: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.yellow} {prefix:.bold}  {wide_bar:.yellow/240} {pos}/{len} pages  {elapsed}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_message(String::new());
        self.bar.println(paint(
            "1",
            &format!("{total_pages} pages, {total_batches} request(s)"),
        ));
    }

    fn on_page_rendered(&self, _page_num: usize, _total_pages: usize) {
        self.bar.inc(1);
    }

    fn on_batch_start(&self, batch_num: usize, first_page: usize, last_page: usize) {
        self.bar
            .set_message(format!("request {batch_num}: pages {first_page}-{last_page}"));
    }

    fn on_batch_complete(&self, batch_num: usize, total_batches: usize, markdown_len: usize) {
        self.bar.println(format!(
            "  {} request {batch_num}/{total_batches}  {}",
            paint("32", "ok"),
            paint("2", &format!("{markdown_len} bytes of markdown")),
        ));
    }

    // The error itself is reported once, by main.
    fn on_conversion_failed(&self, _error: &str) {
        self.bar.abandon_with_message("failed");
    }

    fn on_conversion_complete(&self, _total_batches: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert to stdout
  invoice2md --api-key sk-... invoice.pdf

  # Convert to file with a local Ollama model
  invoice2md --api-base http://localhost:11434/v1 --api-key ollama \
             --model qwen2.5vl:7b invoice.pdf -o invoice.md

  # Read the PDF from stdin
  cat invoice.pdf | invoice2md - > invoice.md

  # Inspect PDF metadata (no API key needed)
  invoice2md --inspect-only invoice.pdf

ENVIRONMENT VARIABLES:
  INVOICE2MD_API_KEY   API key (falls back to OPENAI_API_KEY)
  INVOICE2MD_API_BASE  Endpoint base URL (default https://api.openai.com/v1)
  INVOICE2MD_MODEL     Vision model (default qwen3-vl:32b)
  PDFIUM_LIB_PATH      Path to an existing libpdfium
  RUST_LOG             Log filter, e.g. invoice2md=debug
"#;

/// OCR invoice PDFs into Markdown with a vision-capable chat model.
#[derive(Parser, Debug)]
#[command(
    name = "invoice2md",
    version,
    about = "OCR invoice PDFs into Markdown with a vision-capable chat model",
    long_about = "Render every page of a PDF, send pages in batches of five to an \
OpenAI-compatible chat-completions endpoint with an invoice OCR prompt, and join \
the replies into one Markdown document.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path, or `-` for stdin.
    input: PathBuf,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "INVOICE2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// API key for the endpoint.
    #[arg(long, env = "INVOICE2MD_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Endpoint base URL (the part before /chat/completions).
    #[arg(long, env = "INVOICE2MD_API_BASE")]
    api_base: Option<String>,

    /// Vision model identifier.
    #[arg(long, env = "INVOICE2MD_MODEL")]
    model: Option<String>,

    /// Pages per request.
    #[arg(long, env = "INVOICE2MD_BATCH_SIZE", default_value_t = 5,
          value_parser = clap::value_parser!(u16).range(1..))]
    batch_size: u16,

    /// Render scale applied to both page axes.
    #[arg(long, env = "INVOICE2MD_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Max output tokens per request.
    #[arg(long, env = "INVOICE2MD_MAX_TOKENS", default_value_t = 8000)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "INVOICE2MD_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "INVOICE2MD_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Chunk separator: hr, comment, or a custom string.
    #[arg(long, env = "INVOICE2MD_SEPARATOR", default_value = "hr")]
    separator: String,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Per-request timeout in seconds. Waits indefinitely when unset.
    #[arg(long, env = "INVOICE2MD_TIMEOUT")]
    timeout: Option<u64>,

    /// Print structured JSON (ConversionOutput) to stdout instead of Markdown.
    #[arg(long, conflicts_with = "output")]
    json: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "INVOICE2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = ConversionConfig {
            pdfium_library: cli.pdfium_lib.clone(),
            ..ConversionConfig::default()
        };
        let meta = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to encode metadata as JSON")?
            );
        } else {
            print_metadata(&cli, &meta);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let mut config = build_config(&cli).await?;
    // Fail on missing credentials before the input is even read.
    config.validate().context("Invalid configuration")?;
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        config.progress_callback = Some(cb);
    }

    // ── Run conversion ───────────────────────────────────────────────────
    match cli.output.as_deref() {
        Some(path) => {
            let stats = convert_to_file(&cli.input, path, &config)
                .await
                .context("Conversion failed")?;
            if !cli.quiet {
                print_summary(&stats, Some(path));
            }
        }
        None => {
            let output = convert_file(&cli.input, &config)
                .await
                .context("Conversion failed")?;
            if cli.json {
                let json = serde_json::to_string_pretty(&output)
                    .context("Failed to encode output as JSON")?;
                println!("{json}");
            } else {
                write_markdown(&output.markdown).context("Failed to write Markdown to stdout")?;
                if !cli.quiet {
                    print_summary(&output.stats, None);
                }
            }
        }
    }

    Ok(())
}

/// Markdown goes to stdout, always ending in a newline.
fn write_markdown(markdown: &str) -> io::Result<()> {
    let mut out = io::stdout().lock();
    out.write_all(markdown.as_bytes())?;
    if !markdown.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.flush()
}

fn print_metadata(cli: &Cli, meta: &DocumentMetadata) {
    let batches = meta.page_count.div_ceil(usize::from(cli.batch_size));
    let rows = [
        ("file", Some(cli.input.display().to_string())),
        ("title", meta.title.clone()),
        ("author", meta.author.clone()),
        ("producer", meta.producer.clone()),
        ("pages", Some(meta.page_count.to_string())),
        ("requests", Some(format!("{batches} (batches of {})", cli.batch_size))),
        ("version", Some(meta.pdf_version.clone())),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            println!("{:<10}{value}", format!("{label}:"));
        }
    }
}

fn print_summary(stats: &ConversionStats, destination: Option<&Path>) {
    let target = destination
        .map(|p| format!("  ->  {}", paint("1", &p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "{} {} pages, {} requests, {}ms{target}",
        paint("32", "done:"),
        stats.total_pages,
        stats.total_batches,
        stats.total_duration_ms,
    );
    eprintln!(
        "{}",
        paint(
            "2",
            &format!(
                "      tokens: {} prompt / {} completion",
                stats.total_input_tokens, stats.total_output_tokens
            )
        )
    );
}

/// Translate parsed flags into a library configuration (progress is attached later).
async fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let system_prompt = match cli.system_prompt.as_deref() {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Cannot read system prompt file {}", path.display()))?,
        ),
        None => None,
    };

    let api_key = cli
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    let connection = ConnectionConfig::from_credentials(
        cli.api_base.as_deref(),
        api_key.as_deref(),
        cli.model.as_deref(),
    );

    let mut builder = ConversionConfig::builder()
        .connection(connection)
        .batch_size(usize::from(cli.batch_size))
        .render_scale(cli.scale)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .separator(parse_separator(&cli.separator));

    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library(lib);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--separator` string into `ChunkSeparator`.
fn parse_separator(s: &str) -> ChunkSeparator {
    if s.eq_ignore_ascii_case("hr") || s == "---" {
        ChunkSeparator::HorizontalRule
    } else if s.eq_ignore_ascii_case("comment") {
        ChunkSeparator::Comment
    } else {
        ChunkSeparator::Custom(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_parsing() {
        assert_eq!(parse_separator("hr"), ChunkSeparator::HorizontalRule);
        assert_eq!(parse_separator("---"), ChunkSeparator::HorizontalRule);
        assert_eq!(parse_separator("Comment"), ChunkSeparator::Comment);
        assert_eq!(
            parse_separator("* * *"),
            ChunkSeparator::Custom("* * *".into())
        );
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["invoice2md", "invoice.pdf"]).unwrap();
        assert_eq!(cli.batch_size, 5);
        assert_eq!(cli.scale, 2.0);
        assert_eq!(cli.max_tokens, 8000);
        assert_eq!(cli.temperature, 0.0);
        assert_eq!(cli.separator, "hr");
    }

    #[test]
    fn json_and_output_file_conflict() {
        let err = Cli::try_parse_from(["invoice2md", "--json", "-o", "out.md", "in.pdf"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        assert!(Cli::try_parse_from(["invoice2md", "--json", "in.pdf"]).is_ok());
        assert!(Cli::try_parse_from(["invoice2md", "-o", "out.md", "in.pdf"]).is_ok());
    }

    #[test]
    fn failed_conversion_only_abandons_the_bar() {
        let cb = CliProgressCallback::with_bar(ProgressBar::hidden());
        cb.on_conversion_start(7, 2);
        cb.on_page_rendered(1, 7);
        cb.on_conversion_failed("Chat completion failed with HTTP 500: boom");

        assert!(cb.bar.is_finished());
        assert_eq!(cb.bar.message(), "failed");
        assert_eq!(cb.bar.position(), 1);
    }

    #[test]
    fn zero_batch_size_rejected() {
        assert!(Cli::try_parse_from(["invoice2md", "--batch-size", "0", "x.pdf"]).is_err());
    }
}
