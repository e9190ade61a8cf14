//! CLI binary for edgequake-ocr.
//!
//! A thin shim over the library crate that maps CLI flags to `ScanConfig`
//! and `RecognitionOptions`, builds one `ScanRequest` and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ocr::pipeline::input::read_input;
use edgequake_ocr::{
    parse_regions, scan, BackendRegistry, OutputFormat, ProgressCallback, RawOptions,
    RecognitionOptions, RegionDescriptor, ScanConfig, ScanError, ScanOutput,
    ScanProgressCallback, ScanRequest, ScanResponse,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Separator printed between unit texts in plain output.
const UNIT_SEPARATOR: &str = "\n\x0c\n";

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar over units. Units complete out of order, so per-unit
/// start times are keyed by ordinal.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_scan_start` reports the unit count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Decoding input…");
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
             [{bar:42.green/238}] {pos:>3}/{len} units  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Recognising");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, ordinal: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&ordinal))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Tear down the bar. Safe to call when no scan ever started.
    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_scan_start(&self, total_units: usize) {
        self.activate_bar(total_units);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Recognising {total_units} unit(s)…"))
        ));
    }

    fn on_unit_start(&self, ordinal: usize, _total_units: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(ordinal, Instant::now());
        }
        self.bar.set_message(format!("unit {}", ordinal + 1));
    }

    fn on_unit_complete(&self, ordinal: usize, total_units: usize, text_len: usize) {
        let secs = self.elapsed_secs(ordinal);
        self.bar.println(format!(
            "  {} Unit {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            ordinal + 1,
            total_units,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, ordinal: usize, total_units: usize, error: &str) {
        let secs = self.elapsed_secs(ordinal);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Unit {:>3}/{:<3}  {}  {}",
            red("✗"),
            ordinal + 1,
            total_units,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_scan_complete(&self, total_units: usize, success_count: usize) {
        self.bar.finish_and_clear();
        if success_count == total_units {
            eprintln!(
                "{} {} unit(s) recognised",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} scan aborted after {}/{} unit(s)  ({} failed)",
                red("✘"),
                bold(&success_count.to_string()),
                total_units,
                red(&self.errors.load(Ordering::SeqCst).to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Whole image, default backend (tesseract, eng)
  ocrscan receipt.png

  # Every page of a PDF, German + English
  ocrscan --languages deu,eng contract.pdf

  # Two regions of an invoice, digits only, trimmed
  ocrscan invoice.jpg --whitelist 0123456789 --trim \
    --regions '[{"pointA":{"x":127,"y":249},"pointB":{"x":983,"y":309}},
                {"pointA":{"x":40,"y":20},"pointB":{"x":400,"y":80}}]'

  # Base64 payload (plain or data URL) from stdin
  base64 scan.png | ocrscan --base64 -

  # hOCR markup
  ocrscan --format hocr page.tiff > page.hocr

  # JSON envelope {"status":"OK","data":...}
  ocrscan --json https://example.com/scan.png

  # Vision LLM backend
  OPENAI_API_KEY=sk-... ocrscan --backend vision handwritten.jpg

OUTPUT:
  Plain text: one text per unit, units separated by a form-feed line.
  hOCR: raw markup, one document per unit.
  --json: {"status":"OK","data":"..."} for one unit, "data":[...] for several;
          {"status":"<CODE>","class":"...","message":"..."} on failure.

ENVIRONMENT VARIABLES:
  OCRSCAN_*               Every flag (e.g. OCRSCAN_LANGUAGES, OCRSCAN_BACKEND)
  PDFIUM_LIB_PATH         Path to libpdfium for PDF input
  OPENAI_API_KEY          Enables the vision backend via OpenAI
  EDGEQUAKE_LLM_PROVIDER  Vision backend provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Vision backend model ID
"#;

/// Extract text from images and PDFs with tesseract or a vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "ocrscan",
    version,
    about = "Extract text from images and PDFs with tesseract or a vision LLM",
    long_about = "Extract text from images (JPEG, PNG, GIF, TIFF) and PDFs, whole or by \
rectangular regions. Units are recognised concurrently and printed in input order.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image/PDF path, HTTP/HTTPS URL, or (with --base64) a file of base64 text; `-` reads stdin.
    #[arg(required_unless_present = "list_backends")]
    input: Option<String>,

    /// Treat the input as base64 text (plain or `data:` URL).
    #[arg(long, env = "OCRSCAN_BASE64")]
    base64: bool,

    /// Region list as JSON: [{"pointA":{"x":..,"y":..},"pointB":{..}}, ...].
    #[arg(long, env = "OCRSCAN_REGIONS", conflicts_with = "regions_file")]
    regions: Option<String>,

    /// Read the region list JSON from a file.
    #[arg(long, env = "OCRSCAN_REGIONS_FILE")]
    regions_file: Option<PathBuf>,

    /// Language codes, e.g. `eng` or `deu,eng`.
    #[arg(short, long, env = "OCRSCAN_LANGUAGES")]
    languages: Option<String>,

    /// Only these characters may appear in the output.
    #[arg(short, long, env = "OCRSCAN_WHITELIST")]
    whitelist: Option<String>,

    /// Output format: plain or hocr.
    #[arg(short, long, env = "OCRSCAN_FORMAT", default_value = "plain")]
    format: String,

    /// Strip leading/trailing whitespace from each text.
    #[arg(long, env = "OCRSCAN_TRIM")]
    trim: bool,

    /// OCR backend: tesseract, vision.
    #[arg(short, long, env = "OCRSCAN_BACKEND")]
    backend: Option<String>,

    /// Maximum concurrent OCR calls.
    #[arg(short, long, env = "OCRSCAN_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-call OCR timeout in seconds.
    #[arg(long, env = "OCRSCAN_OCR_TIMEOUT", default_value_t = 60)]
    ocr_timeout: u64,

    /// PDF rendering DPI (72–600).
    #[arg(long, env = "OCRSCAN_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "OCRSCAN_PASSWORD")]
    password: Option<String>,

    /// Tesseract executable.
    #[arg(long, env = "OCRSCAN_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// LLM provider for the vision backend.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model for the vision backend.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "OCRSCAN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the JSON envelope instead of text.
    #[arg(long, env = "OCRSCAN_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCRSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// List registered backends and their capabilities, then exit.
    #[arg(long)]
    list_backends: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCRSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCRSCAN_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would interleave with the progress bar, which already
    // reports everything the user needs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_backends;
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

    let progress = show_progress.then(CliProgressCallback::new_dynamic);
    let config = build_config(&cli, progress.clone().map(|cb| cb as ProgressCallback))?;
    let registry = BackendRegistry::from_config(&config);

    if cli.list_backends {
        for name in registry.names() {
            if let Some(backend) = registry.get(name) {
                let caps = backend.capabilities();
                println!(
                    "{:<12} hocr={:<5} native-whitelist={}",
                    name, caps.hocr, caps.whitelist
                );
            }
        }
        return Ok(());
    }

    let parsed = RecognitionOptions::from_raw(
        &RawOptions {
            languages: cli.languages.clone(),
            whitelist: cli.whitelist.clone(),
            format: Some(cli.format.clone()),
            trim: Some(cli.trim.to_string()),
            backend: cli.backend.clone(),
        },
        &config,
    );
    let options = match parsed {
        Ok(options) => options,
        Err(e) => return reject(&cli, e, "Invalid recognition options"),
    };
    let format = options.output_format;

    let regions = match read_region_json(&cli).await? {
        None => None,
        Some(json) => match parse_regions(&json) {
            Ok(regions) => Some(regions),
            Err(e) => return reject(&cli, e, "Invalid region list"),
        },
    };

    let request = build_request(&cli, &config, options, regions).await?;

    let start = Instant::now();
    let result = scan(request, &registry, &config).await;
    if let Some(cb) = &progress {
        cb.finish();
    }

    if cli.json {
        return print_envelope(&ScanResponse::from_result(result));
    }

    let output = result.context("Scan failed")?;
    write_output(&output, format)?;

    if !cli.quiet && !show_progress {
        eprintln!(
            "Recognised {} unit(s) in {}ms",
            output.len(),
            start.elapsed().as_millis()
        );
    }

    Ok(())
}

/// Map CLI args to `ScanConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScanConfig> {
    let mut builder = ScanConfig::builder()
        .concurrency(cli.concurrency)
        .ocr_timeout_secs(cli.ocr_timeout)
        .dpi(cli.dpi)
        .tesseract_command(cli.tesseract.clone())
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref pwd) = cli.password {
        builder = builder.pdf_password(pwd.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.vision_provider_name(provider.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.vision_model(model.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Read the input and regions and assemble the request variant.
async fn build_request(
    cli: &Cli,
    config: &ScanConfig,
    options: RecognitionOptions,
    regions: Option<Vec<RegionDescriptor>>,
) -> Result<ScanRequest> {
    let input = cli.input.as_deref().context("An input is required")?;

    let request = if cli.base64 {
        let payload = if input == "-" {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read base64 from stdin")?;
            buf
        } else {
            tokio::fs::read_to_string(input)
                .await
                .with_context(|| format!("Failed to read base64 from {input}"))?
        };
        match regions {
            Some(regions) => ScanRequest::CroppedBase64 {
                payload,
                regions,
                options,
            },
            None => ScanRequest::Base64 { payload, options },
        }
    } else {
        let bytes = if input == "-" {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read input from stdin")?;
            buf
        } else {
            read_input(input, config.download_timeout_secs)
                .await
                .context("Failed to read input")?
        };
        match regions {
            Some(regions) => ScanRequest::CroppedFile {
                bytes,
                regions,
                options,
            },
            None => ScanRequest::File { bytes, options },
        }
    };

    Ok(request)
}

/// Region JSON from `--regions` or `--regions-file`, unparsed.
async fn read_region_json(cli: &Cli) -> Result<Option<String>> {
    match (&cli.regions, &cli.regions_file) {
        (Some(json), _) => Ok(Some(json.clone())),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .map(Some)
            .with_context(|| format!("Failed to read regions from {:?}", path)),
        (None, None) => Ok(None),
    }
}

/// Report a request that failed validation: as the JSON envelope under
/// `--json`, otherwise as a plain error.
fn reject(cli: &Cli, err: ScanError, context: &'static str) -> Result<()> {
    if cli.json {
        print_envelope(&ScanResponse::from_result(Err(err)))
    } else {
        Err(anyhow::Error::new(err).context(context))
    }
}

fn envelope_json(response: &ScanResponse) -> Result<String> {
    serde_json::to_string_pretty(response).context("Failed to serialise response")
}

/// Print the envelope; a failed scan exits with status 1.
fn print_envelope(response: &ScanResponse) -> Result<()> {
    println!("{}", envelope_json(response)?);
    if !response.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}

fn write_output(output: &ScanOutput, format: OutputFormat) -> Result<()> {
    let separator = match format {
        OutputFormat::Plain => UNIT_SEPARATOR,
        OutputFormat::Hocr => "\n",
    };
    let text = output.texts().join(separator);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}
