//! CLI binary for edgequake-invoice.
//!
//! A thin shim over the library crate: reads the document, asks for a PDF
//! password when one is needed, calls the model, and writes the workbook.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_invoice::pipeline::llm::extract_invoice;
use edgequake_invoice::{
    prepare_images, suggested_file_name, write_xlsx, ExtractionConfig, InvoiceDocument,
    LlmVisionModel, NormalizeError, OpenAiCompatibleVision, UploadedFile, VisionModel,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Password prompts before giving up on an encrypted PDF.
const MAX_PASSWORD_ATTEMPTS: usize = 3;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scan → faktura_<number>.xlsx in the current directory (xAI Grok vision)
  XAI_API_KEY=xai-... invoice2xlsx scan.jpg

  # Encrypted PDF, explicit output path
  invoice2xlsx --password secret faktura.pdf -o out/faktura.xlsx

  # Any edgequake-llm provider instead of xAI
  invoice2xlsx --provider openai --model gpt-4.1 faktura.pdf

  # Review before exporting: dump JSON, edit it, export the edit
  invoice2xlsx --json faktura.pdf > faktura.json
  invoice2xlsx --from-json faktura.json -o faktura_poprawiona.xlsx

ENVIRONMENT VARIABLES:
  XAI_API_KEY             xAI API key (Grok vision, the default backend)
  OPENAI_API_KEY          OpenAI API key (used with --provider or auto-detection)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Provider for auto-detection (with EDGEQUAKE_MODEL)
  EDGEQUAKE_MODEL         Model for auto-detection
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, e.g. edgequake_invoice=debug
"#;

/// Extract invoice data from scans and PDFs into an Excel workbook.
#[derive(Parser, Debug)]
#[command(
    name = "invoice2xlsx",
    version,
    about = "Extract invoice data from scans and PDFs into an Excel workbook",
    long_about = "Read an invoice (JPEG, PNG or PDF, including password-protected PDFs) with a \
Vision Language Model, validate the extracted data (NIP, dates, amounts, line items) and write \
one spreadsheet row per line item.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Invoice file (JPEG, PNG or PDF). Not needed with --from-json.
    #[arg(required_unless_present = "from_json")]
    input: Option<PathBuf>,

    /// Write the workbook here instead of ./faktura_<number>.xlsx.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// PDF password. Prompted for interactively when needed and not given.
    #[arg(long)]
    password: Option<String>,

    /// edgequake-llm provider (openai, anthropic, gemini, ollama, azure, …).
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Model ID. Default: grok-2-vision-1212 for xAI, gpt-4.1-nano otherwise.
    #[arg(long)]
    model: Option<String>,

    /// API key for the OpenAI-compatible endpoint (xAI by default).
    #[arg(long, env = "XAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, default_value = edgequake_invoice::provider::XAI_BASE_URL)]
    base_url: String,

    /// Largest image side sent to the model, in pixels (64–8192).
    #[arg(long, default_value_t = 2000,
          value_parser = clap::value_parser!(u32).range(64..=8192))]
    max_dimension: u32,

    /// JPEG quality of the images sent to the model (1–100).
    #[arg(long, default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Model call timeout in seconds (0 disables).
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Also print the validated invoice as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Skip the model: validate an edited invoice JSON and export it.
    #[arg(long, value_name = "EDITED_JSON", conflicts_with = "input")]
    from_json: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let start = Instant::now();

    let document = match (&cli.from_json, &cli.input) {
        (Some(path), _) => load_edited(path).await?,
        (None, Some(input)) => extract(&cli, input).await?,
        (None, None) => bail!("an input file or --from-json is required"),
    };

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(suggested_file_name(&document)));
    write_xlsx(&document, &output)
        .await
        .context("Export failed")?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&document).context("Failed to serialise invoice")?;
        println!("{json}");
    }

    eprintln!(
        "{}  {}  {} item(s)  {:.1}s  →  {}",
        green("✔"),
        bold(document.invoice_number()),
        document.items().len(),
        start.elapsed().as_secs_f64(),
        bold(&output.display().to_string()),
    );
    Ok(())
}

/// The user-edit path: re-validate an edited JSON document.
async fn load_edited(path: &Path) -> Result<InvoiceDocument> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    InvoiceDocument::from_json(&text)
        .with_context(|| format!("{} is not a valid invoice", path.display()))
}

async fn extract(cli: &Cli, input: &Path) -> Result<InvoiceDocument> {
    let file = UploadedFile::from_path(input)
        .with_context(|| format!("Failed to read {:?}", input))?;
    let config = build_config(cli)?;
    let model = build_model(cli)?;

    let spinner = spinner("Preparing images…");
    let payloads = prepare_with_password(&file, cli.password.clone(), &config, &spinner).await;
    let payloads = match payloads {
        Ok(p) => p,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };

    spinner.set_message(format!(
        "Reading {} page(s) with {}…",
        payloads.len(),
        model.name()
    ));
    let result = extract_invoice(model.as_ref(), payloads, &config).await;
    spinner.finish_and_clear();

    result.context("Extraction failed")
}

/// Prepare payloads, prompting for a password while the PDF asks for one.
///
/// The same `file` is reused for every attempt.
async fn prepare_with_password(
    file: &UploadedFile,
    mut password: Option<String>,
    config: &ExtractionConfig,
    spinner: &ProgressBar,
) -> Result<Vec<String>> {
    let mut attempts = 0;
    loop {
        match prepare_images(file, password.as_deref(), config).await {
            Ok(payloads) => return Ok(payloads),
            Err(e) if e.is_recoverable() && attempts < MAX_PASSWORD_ATTEMPTS => {
                attempts += 1;
                let prompt = match e {
                    NormalizeError::InvalidPassword => red("Wrong password. Try again: "),
                    _ => bold("PDF is password-protected. Password: "),
                };
                let entered = spinner.suspend(|| read_password(&prompt))?;
                password = Some(entered);
            }
            Err(e) => return Err(e).context("Failed to prepare the document"),
        }
    }
}

fn read_password(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    io::stderr().flush().ok();
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    if read == 0 {
        bail!("no password entered");
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .max_dimension(cli.max_dimension)
        .jpeg_quality(cli.jpeg_quality)
        .api_timeout_secs(cli.timeout);
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library(lib);
    }
    builder.build().context("Invalid configuration")
}

/// xAI (or another OpenAI-compatible endpoint) when an API key is present and
/// no provider is named; an edgequake-llm provider otherwise.
fn build_model(cli: &Cli) -> Result<Box<dyn VisionModel>> {
    match (&cli.provider, &cli.api_key) {
        (None, Some(key)) if !key.is_empty() => {
            let mut model = OpenAiCompatibleVision::xai(key.as_str()).with_base_url(&cli.base_url);
            if let Some(ref id) = cli.model {
                model = model.with_model(id.as_str());
            }
            eprintln!("{}", dim(&format!("model: {}", model.model())));
            Ok(Box::new(model))
        }
        _ => {
            let model = LlmVisionModel::from_env(cli.provider.as_deref(), cli.model.as_deref())
                .context("No vision model available")?;
            Ok(Box::new(model))
        }
    }
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}
