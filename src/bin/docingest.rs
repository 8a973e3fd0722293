//! CLI binary for docingest.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `IngestConfig` and prints extraction results.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docingest::{DocumentFormat, DocumentProcessor, ExtractionResult, IngestConfig};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  docingest extract report.pdf
  docingest extract slides.pptx --json > slides.json
  docingest extract /tmp/upload-81f2 --name "Minutes 2024.doc"
  docingest extract scan.png --provider openai --model gpt-4.1-mini

ENVIRONMENT:
  OPENAI_API_KEY, ANTHROPIC_API_KEY, ...   credentials for image text extraction
  EDGEQUAKE_PROVIDER / EDGEQUAKE_MODEL     vision provider and model
  PDFIUM_LIB_PATH                          pdfium shared library (file or directory)
  RUST_LOG                                 log filter, overrides --verbose / --quiet
"#;

/// Extract text chunks from PDF, Office, image and text files.
#[derive(Parser, Debug)]
#[command(
    name = "docingest",
    version,
    about = "Extract page-level text chunks from PDF, Office, image and text files",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Show debug logs.
    #[arg(short, long, global = true, env = "DOCINGEST_VERBOSE")]
    verbose: bool,

    /// Only show errors.
    #[arg(short, long, global = true, env = "DOCINGEST_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract one file and print its chunks.
    Extract(ExtractArgs),
    /// List the supported file extensions.
    Formats,
}

#[derive(clap::Args, Debug)]
struct ExtractArgs {
    /// File to extract.
    input: PathBuf,

    /// Original file name; selects the format. Defaults to the input's name.
    #[arg(long)]
    name: Option<String>,

    /// Print the full result as JSON.
    #[arg(long, env = "DOCINGEST_JSON")]
    json: bool,

    /// LLM provider for images: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID for images (default gpt-4.1-nano).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Custom prompt for image text extraction.
    #[arg(long, env = "DOCINGEST_PROMPT")]
    prompt: Option<String>,

    /// Vision model temperature.
    #[arg(long, env = "DOCINGEST_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max tokens the vision model may generate.
    #[arg(long, env = "DOCINGEST_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Office-to-PDF converter executable.
    #[arg(long, env = "DOCINGEST_CONVERTER", default_value = "libreoffice")]
    converter: String,

    /// Converter time limit in seconds.
    #[arg(long, env = "DOCINGEST_CONVERSION_TIMEOUT", default_value_t = 60)]
    conversion_timeout: u64,

    /// Path to the pdfium shared library.
    #[arg(long, env = "DOCINGEST_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Characters per chunk for .txt / .md files.
    #[arg(long, env = "DOCINGEST_TEXT_WINDOW", default_value_t = 1000)]
    text_window: usize,
}

impl ExtractArgs {
    fn to_config(&self) -> Result<IngestConfig> {
        let mut builder = IngestConfig::builder()
            .converter_program(&self.converter)
            .conversion_timeout_secs(self.conversion_timeout)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .text_window_chars(self.text_window);
        if let Some(ref p) = self.provider {
            builder = builder.provider_name(p);
        }
        if let Some(ref m) = self.model {
            builder = builder.model(m);
        }
        if let Some(ref p) = self.prompt {
            builder = builder.vision_prompt(p);
        }
        if let Some(ref lib) = self.pdfium_lib {
            builder = builder.pdfium_library_path(lib);
        }
        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
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

    match cli.command {
        Command::Formats => {
            let mut stdout = io::stdout().lock();
            for ext in DocumentFormat::extensions() {
                writeln!(stdout, "{ext}")?;
            }
            Ok(())
        }
        Command::Extract(args) => run_extract(args, cli.quiet).await,
    }
}

async fn run_extract(args: ExtractArgs, quiet: bool) -> Result<()> {
    if !args.input.is_file() {
        bail!("Input file not found: {}", args.input.display());
    }
    let file_name = match args.name {
        Some(ref n) => n.clone(),
        None => args
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("Input path has no file name; pass --name")?,
    };

    let processor = DocumentProcessor::new(args.to_config()?);
    let result = processor
        .extract(&args.input, &file_name)
        .await
        .with_context(|| format!("Failed to extract '{file_name}'"))?;

    let mut stdout = io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &result).context("Failed to write JSON")?;
        writeln!(stdout)?;
    } else {
        print_chunks(&mut stdout, &result)?;
    }

    if !quiet {
        if let Some(err) = result.error() {
            eprintln!("{} {}", yellow("degraded:"), err);
        }
        eprintln!(
            "{}",
            dim(&format!(
                "{} chunks, {} pages",
                result.chunks.len(),
                result.page_count
            ))
        );
    }
    Ok(())
}

fn print_chunks(out: &mut impl Write, result: &ExtractionResult) -> io::Result<()> {
    for (i, chunk) in result.chunks.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "{}", bold(&format!("── page {} ──", chunk.page_number)))?;
        writeln!(out, "{}", chunk.text)?;
    }
    Ok(())
}
