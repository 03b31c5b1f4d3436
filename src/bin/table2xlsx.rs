//! CLI binary for edgequake-table2xlsx.
//!
//! A thin shim over the library crate: each subcommand maps to one
//! extraction entry point, writes the table to the staging directory and
//! prints the artifact handle. `download` redeems a handle exactly once.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use edgequake_table2xlsx::{
    extract_images_to_artifact, extract_pdf_to_artifact, extract_phone_numbers_to_artifact,
    extract_sheet_to_artifact, input, resolve_client, ArtifactHandle, ArtifactStore,
    ExtractionConfig, ExtractionOutput, ExtractionProgressCallback, ProgressCallback, SheetLayout,
    Table, Table2XlsxError,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per unit.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER_TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, unit: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut t| t.remove(&unit))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_units: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} units  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER_TICKS);

        self.bar.set_length(total_units as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Sending {total_units} units to the vision model…"))
        ));
    }

    fn on_unit_start(&self, unit: usize, _total: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(unit, Instant::now());
        }
        self.bar.set_message(format!("unit {unit}"));
    }

    fn on_unit_complete(&self, unit: usize, total: usize, records: usize) {
        let secs = self.elapsed_secs(unit);
        self.bar.println(format!(
            "  {} Unit {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            unit,
            total,
            dim(&format!("{records:>4} rows")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, unit: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(unit);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Unit {:>3}/{:<3}  {}  {}",
            red("✗"),
            unit,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_units: usize, success_count: usize) {
        let failed = total_units.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} units processed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} units processed  ({} skipped)",
                if failed == total_units {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_units,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Raw CRM workbook, contact-list shape (Sheet1)
  table2xlsx sheet leads.xlsx --layout contact-list

  # CRM export shape (Sheet2), write the result straight to a file
  table2xlsx sheet export.xlsx --layout crm-export -o clean.xlsx

  # Spreadsheet screenshots through the vision model
  table2xlsx images shot1.png shot2.jpg

  # Every page of a PDF
  table2xlsx pdf https://example.com/price-list.pdf

  # Phone numbers from chat screenshots
  table2xlsx phones chat1.png chat2.png

  # Redeem a handle printed by an earlier run (works once)
  table2xlsx download 0b7e…-….xlsx -o result.xlsx

  # Remove expired artifacts from the staging directory
  table2xlsx sweep

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider, gemini-2.5-flash)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Provider override, used together with EDGEQUAKE_MODEL
  EDGEQUAKE_MODEL         Model override, used together with EDGEQUAKE_LLM_PROVIDER
  PDFIUM_LIB_PATH         pdfium shared library (file or directory)
  RUST_LOG                Log filter; wins over --verbose / --quiet
"#;

/// Extract tables from spreadsheets, images and PDFs into .xlsx files.
#[derive(Parser, Debug)]
#[command(
    name = "table2xlsx",
    version,
    about = "Extract tables from spreadsheets, images and PDFs into clean .xlsx files",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory receiving generated artifacts.
    #[arg(long, global = true, env = "TABLE2XLSX_STAGING_DIR", default_value = "temp_downloads")]
    staging_dir: PathBuf,

    /// Seconds an artifact stays downloadable.
    #[arg(long, global = true, env = "TABLE2XLSX_TTL", default_value_t = 3600)]
    ttl: u64,

    /// LLM provider: gemini, openai, anthropic, mistral, ollama.
    #[arg(long, global = true, env = "TABLE2XLSX_PROVIDER")]
    provider: Option<String>,

    /// Vision model ID (default: gemini-2.5-flash).
    #[arg(long, global = true, env = "TABLE2XLSX_MODEL")]
    model: Option<String>,

    /// Pause between AI calls in milliseconds.
    #[arg(long, global = true, env = "TABLE2XLSX_DELAY_MS", default_value_t = 1000)]
    delay_ms: u64,

    /// Per-call AI timeout in seconds.
    #[arg(long, global = true, env = "TABLE2XLSX_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, global = true, env = "TABLE2XLSX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// PDF rendering DPI (72–400).
    #[arg(long, global = true, env = "TABLE2XLSX_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Max AI output tokens per unit.
    #[arg(long, global = true, env = "TABLE2XLSX_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Path to the pdfium shared library.
    #[arg(long, global = true, env = "TABLE2XLSX_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Print the result as JSON (output, stats and handle).
    #[arg(long, global = true, env = "TABLE2XLSX_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "TABLE2XLSX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level logs.
    #[arg(short, long, global = true, env = "TABLE2XLSX_VERBOSE")]
    verbose: bool,

    /// Suppress everything except errors and the handle.
    #[arg(short, long, global = true, env = "TABLE2XLSX_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a raw CRM workbook (no AI).
    Sheet {
        /// The .xlsx file or URL.
        input: String,
        #[arg(long, value_enum)]
        layout: LayoutArg,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Extract tables from spreadsheet screenshots.
    Images {
        #[arg(required = true)]
        inputs: Vec<String>,
        /// Text file with a custom extraction prompt.
        #[arg(long)]
        prompt_file: Option<PathBuf>,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Extract tables from every page of a PDF.
    Pdf {
        input: String,
        /// PDF user password for encrypted documents.
        #[arg(long, env = "TABLE2XLSX_PDF_PASSWORD")]
        password: Option<String>,
        /// Text file with a custom extraction prompt.
        #[arg(long)]
        prompt_file: Option<PathBuf>,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Harvest phone numbers from chat screenshots.
    Phones {
        #[arg(required = true)]
        inputs: Vec<String>,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Retrieve an artifact by handle. A handle can be redeemed once.
    Download {
        handle: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Delete expired artifacts.
    Sweep,
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Also redeem the artifact immediately and write it here.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    ContactList,
    CrmExport,
}

impl From<LayoutArg> for SheetLayout {
    fn from(v: LayoutArg) -> Self {
        match v {
            LayoutArg::ContactList => SheetLayout::ContactList,
            LayoutArg::CrmExport => SheetLayout::CrmExport,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let uses_ai = matches!(
        cli.command,
        Command::Images { .. } | Command::Pdf { .. } | Command::Phones { .. }
    );
    let show_progress = uses_ai && !cli.quiet && !cli.no_progress && !cli.json;

    // The progress bar replaces INFO logs; --verbose brings them all back.
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    match &cli.command {
        Command::Sheet { input, layout, out } => {
            let config = build_config(&cli, None, None, None).await?;
            let upload = input::load(input, config.download_timeout_secs)
                .await
                .with_context(|| format!("Failed to read {input}"))?;
            let (output, handle) = extract_sheet_to_artifact(&upload, (*layout).into(), &config)
                .await
                .context("Spreadsheet extraction failed")?;
            report(&cli, &config, output, handle, out).await
        }
        Command::Images {
            inputs,
            prompt_file,
            out,
        } => {
            let config = build_config(&cli, progress_cb, prompt_file.as_deref(), None).await?;
            let uploads = input::load_all(inputs, config.download_timeout_secs).await?;
            let client = resolve_client(&config).context("No vision provider available")?;
            let (output, handle) = extract_images_to_artifact(&uploads, &client, &config)
                .await
                .context("Image extraction failed")?;
            report(&cli, &config, output, handle, out).await
        }
        Command::Pdf {
            input,
            password,
            prompt_file,
            out,
        } => {
            let config = build_config(
                &cli,
                progress_cb,
                prompt_file.as_deref(),
                password.clone(),
            )
            .await?;
            let upload = input::load(input, config.download_timeout_secs)
                .await
                .with_context(|| format!("Failed to read {input}"))?;
            let client = resolve_client(&config).context("No vision provider available")?;
            let (output, handle) = extract_pdf_to_artifact(&upload, &client, &config)
                .await
                .context("PDF extraction failed")?;
            report(&cli, &config, output, handle, out).await
        }
        Command::Phones { inputs, out } => {
            let config = build_config(&cli, progress_cb, None, None).await?;
            let uploads = input::load_all(inputs, config.download_timeout_secs).await?;
            let client = resolve_client(&config).context("No vision provider available")?;
            let (output, handle) = extract_phone_numbers_to_artifact(&uploads, &client, &config)
                .await
                .context("Phone-number extraction failed")?;
            report(&cli, &config, output, handle, out).await
        }
        Command::Download { handle, output } => {
            let config = build_config(&cli, None, None, None).await?;
            let store = ArtifactStore::from_config(&config).await?;
            let handle = ArtifactHandle::parse(handle);
            let written = redeem(&store, handle.as_ref(), output).await?;
            if !cli.quiet {
                eprintln!("{} {} bytes → {}", green("✔"), written, bold(&output.display().to_string()));
            }
            Ok(())
        }
        Command::Sweep => {
            let config = build_config(&cli, None, None, None).await?;
            let store = ArtifactStore::from_config(&config).await?;
            let removed = store.sweep().await.context("Sweep failed")?;
            if !cli.quiet {
                eprintln!(
                    "{} removed {} expired artifacts from {}",
                    green("✔"),
                    removed,
                    store.dir().display()
                );
            }
            Ok(())
        }
    }
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    prompt_file: Option<&Path>,
    password: Option<String>,
) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .max_tokens(cli.max_tokens)
        .call_delay_ms(cli.delay_ms)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .staging_dir(cli.staging_dir.clone())
        .artifact_ttl_secs(cli.ttl);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    if let Some(path) = prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {}", path.display()))?;
        builder = builder.prompt(prompt);
    }
    if let Some(pwd) = password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Print the handle (stdout) and a preview or JSON, then optionally redeem.
async fn report(
    cli: &Cli,
    config: &ExtractionConfig,
    output: ExtractionOutput,
    handle: ArtifactHandle,
    out: &OutputArgs,
) -> Result<()> {
    if cli.json {
        let doc = serde_json::json!({ "handle": &handle, "output": &output });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).context("Failed to serialise output")?
        );
    } else {
        println!("{handle}");
        if !cli.quiet {
            print_preview(&output.table, 10);
            eprintln!(
                "{}  {} rows  {}ms",
                green("✔"),
                output.stats.total_records,
                output.stats.total_duration_ms
            );
            if output.stats.total_units > 0 {
                eprintln!(
                    "   {} tokens in  /  {} tokens out",
                    dim(&output.stats.total_input_tokens.to_string()),
                    dim(&output.stats.total_output_tokens.to_string()),
                );
            }
        }
    }

    if let Some(ref path) = out.output {
        let store = ArtifactStore::from_config(config).await?;
        let written = redeem(&store, Some(&handle), path).await?;
        if !cli.quiet && !cli.json {
            eprintln!("   {} bytes → {}", written, bold(&path.display().to_string()));
        }
    }
    Ok(())
}

async fn redeem(store: &ArtifactStore, handle: Option<&ArtifactHandle>, path: &Path) -> Result<usize> {
    let bytes = match store.take(handle).await {
        Err(Table2XlsxError::NoArtifact) => {
            anyhow::bail!("No file available for download. Please process a file first.")
        }
        other => other.context("Download failed")?,
    };
    tokio::fs::write(path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(bytes.len())
}

/// Aligned text preview of the first `limit` rows on stderr.
fn print_preview(table: &Table, limit: usize) {
    let headers = table.headers();
    let rows: Vec<Vec<&str>> = table.rows().take(limit).collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .map(|r| r.get(i).map_or(0, |v| v.chars().count()))
                .chain([h.chars().count()])
                .max()
                .unwrap_or(0)
                .min(32)
        })
        .collect();

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| {
                let clipped: String = c.chars().take(*w).collect();
                format!("{clipped:<w$}")
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    eprintln!("{}", bold(&line(headers.iter().map(String::as_str).collect())));
    for row in rows {
        eprintln!("{}", line(row));
    }
    if table.len() > limit {
        eprintln!("{}", dim(&format!("… {} more rows", table.len() - limit)));
    }
}
