//! CLI binary for edgequake-assignment.
//!
//! Runs the whole job lifecycle in one process (in-memory job store,
//! filesystem object storage, local queue) and writes the finished PDF.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_assignment::compose::{self, normalize_cover, page_count, Fragments};
use edgequake_assignment::jobs::{local_service, FsStorage, InMemoryJobStore, ObjectStorage};
use edgequake_assignment::pipeline::input::UploadPayload;
use edgequake_assignment::pipeline::postprocess::clean_generated_text;
use edgequake_assignment::{
    CoverDetails, FragmentKind, GenerationConfig, JobProgressCallback, JobStage, JobStatus,
    LlmTextGenerator, PageBreakPolicy, ProgressCallback, SubmitRequest,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that follows the job through its stages and logs each one with
/// the time spent in the previous stage.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Instant,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Submitting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            started: Instant::now(),
        })
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_job_accepted(&self, job_id: Uuid) {
        self.bar.println(format!("{} job {}", dim("◆"), dim(&job_id.to_string())));
        self.bar.set_prefix("Pending");
    }

    fn on_stage(&self, _job_id: Uuid, stage: JobStage) {
        self.bar.set_prefix("Working");
        self.bar.set_message(stage.to_string());
        self.bar.println(format!(
            "  {} {:<32} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64()))
        ));
    }

    fn on_job_done(&self, _job_id: Uuid, output_ref: &str, pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages  →  {}",
            green("✔"),
            bold(&pages.to_string()),
            dim(output_ref)
        );
    }

    fn on_job_failed(&self, _job_id: Uuid, error: &str) {
        self.bar.finish_and_clear();
        let msg = if error.len() > 120 {
            let cut = error.char_indices().nth(119).map(|(i, _)| i).unwrap_or(error.len());
            format!("{}\u{2026}", &error[..cut])
        } else {
            error.to_string()
        };
        eprintln!("{} {}", red("✘"), red(&msg));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Three pages with an auto cover and a table of contents
  assignment-gen brief.pdf --pages 3 --cover-details cover.json --outline -o essay.pdf

  # Custom cover PDF (must be exactly one page), references page
  assignment-gen brief.pdf --cover custom --cover-file cover.pdf --references

  # Typeset a hand-written markdown body, no LLM involved
  assignment-gen --from-text body.md --cover-details cover.json -o draft.pdf

  # Count the pages of a PDF
  assignment-gen --inspect-only essay.pdf

COVER DETAILS (JSON):
  {
    "university_name": "Northbridge University",
    "college_name": "College of Humanities",
    "assignment_title": "Narrative Voice in Modern Fiction",
    "instructor_name": "Dr. Hale",
    "submission_date": "2025-03-04",
    "section": "B",
    "submitter": { "type": "individual", "student_name": "Ana Ruiz", "student_id": "20231" },
    "logo_url": "https://example.edu/logo.png"
  }

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
"#;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CoverArg {
    Auto,
    Custom,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Clamp,
    Strict,
    BestEffort,
}

impl From<PolicyArg> for PageBreakPolicy {
    fn from(v: PolicyArg) -> Self {
        match v {
            PolicyArg::Clamp => PageBreakPolicy::Clamp,
            PolicyArg::Strict => PageBreakPolicy::Strict,
            PolicyArg::BestEffort => PageBreakPolicy::BestEffort,
        }
    }
}

/// Generate paginated academic assignments from a source PDF.
#[derive(Parser, Debug)]
#[command(
    name = "assignment-gen",
    version,
    about = "Generate paginated academic assignment PDFs with a vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source PDF path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "from_text")]
    input: Option<String>,

    /// Where to write the finished PDF.
    #[arg(short, long, env = "ASSIGN_OUTPUT", default_value = "assignment.pdf")]
    output: PathBuf,

    /// Number of body pages (1–10).
    #[arg(short, long, env = "ASSIGN_PAGES", default_value_t = 3,
          value_parser = clap::value_parser!(i64).range(1..=10))]
    pages: i64,

    /// Cover page source.
    #[arg(long, env = "ASSIGN_COVER", value_enum, default_value = "auto")]
    cover: CoverArg,

    /// JSON file with the auto cover details.
    #[arg(long, env = "ASSIGN_COVER_DETAILS")]
    cover_details: Option<PathBuf>,

    /// One-page PDF used as a custom cover.
    #[arg(long, env = "ASSIGN_COVER_FILE")]
    cover_file: Option<PathBuf>,

    /// Add a generated table of contents.
    #[arg(long, env = "ASSIGN_OUTLINE")]
    outline: bool,

    /// Add a generated references page.
    #[arg(long, env = "ASSIGN_REFERENCES")]
    references: bool,

    /// Header banner text of body pages.
    #[arg(long, env = "ASSIGN_TITLE")]
    title: Option<String>,

    /// LLM model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI for the source document (72–400).
    #[arg(long, env = "ASSIGN_DPI", default_value_t = 120,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "ASSIGN_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "ASSIGN_MAX_TOKENS", default_value_t = 16384)]
    max_tokens: usize,

    /// Retries per LLM call.
    #[arg(long, env = "ASSIGN_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// What to do when the body has the wrong number of page breaks.
    #[arg(long, env = "ASSIGN_PAGE_BREAK_POLICY", value_enum, default_value = "clamp")]
    page_break_policy: PolicyArg,

    /// Directory holding uploads and finished documents.
    #[arg(long, env = "ASSIGN_STORAGE_DIR", default_value = ".assignment-store")]
    storage_dir: PathBuf,

    /// Typeset this markdown file as the body instead of generating one.
    #[arg(long, conflicts_with_all = ["outline", "references"])]
    from_text: Option<PathBuf>,

    /// Print the page count of INPUT and exit.
    #[arg(long, requires = "input")]
    inspect_only: bool,

    /// Print the terminal job record as JSON on stdout.
    #[arg(long, env = "ASSIGN_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "ASSIGN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ASSIGN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ASSIGN_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "ASSIGN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "ASSIGN_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives the feedback that matters; library INFO logs would
    // tear it, so they are hidden unless --verbose.
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let input = cli.input.as_deref().context("INPUT is required")?;
        let bytes = load_payload(input)
            .await?
            .resolve(cli.download_timeout)
            .await
            .context("Failed to load input")?;
        let pages = page_count(&bytes).context("Failed to read PDF")?;
        if cli.json {
            println!("{}", serde_json::json!({ "file": input, "pages": pages }));
        } else {
            println!("File:   {input}");
            println!("Pages:  {pages}");
        }
        return Ok(());
    }

    let cover_details = match &cli.cover_details {
        Some(path) => Some(read_cover_details(path).await?),
        None => None,
    };

    // ── Typeset-only mode ────────────────────────────────────────────────
    if let Some(ref body_path) = cli.from_text {
        return typeset_only(&cli, body_path, cover_details).await;
    }

    // ── Full lifecycle ───────────────────────────────────────────────────
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn JobProgressCallback>)
    } else {
        None
    };
    let config = Arc::new(build_config(&cli, progress)?);

    let storage = Arc::new(FsStorage::new(cli.storage_dir.clone()));
    let (service, _queue) = local_service(
        config.clone(),
        Arc::new(InMemoryJobStore::new()),
        storage.clone(),
        Arc::new(LlmTextGenerator::new(config.clone())),
    );

    let input = cli.input.as_deref().context("INPUT is required")?;
    let cover_file = match &cli.cover_file {
        Some(path) => Some(load_payload(&path.to_string_lossy()).await?),
        None => None,
    };
    let request = SubmitRequest {
        owner_id: whoami(),
        document: Some(load_payload(input).await?),
        page_count: Some(cli.pages),
        cover_mode: Some(match cli.cover {
            CoverArg::Auto => "auto".to_string(),
            CoverArg::Custom => "custom".to_string(),
        }),
        cover_details,
        cover_file,
        include_outline: cli.outline,
        include_references: cli.references,
    };

    let receipt = service.submit(request).await.context("Submission rejected")?;

    let mut updates = service.watch(receipt.job_id, Duration::from_millis(250));
    let mut last = None;
    while let Some(update) = updates.next().await {
        last = Some(update.context("Failed to read job status")?);
    }
    let job = last.context("Job disappeared")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&job).context("Failed to serialise job")?
        );
    }

    match (job.status, job.output_ref.as_deref()) {
        (JobStatus::Done, Some(key)) => {
            let bytes = storage.get(key).await.context("Failed to read finished document")?;
            write_output(&cli.output, &bytes).await?;
            if !cli.quiet && !cli.json {
                eprintln!("{}  {}", green("✔"), bold(&cli.output.display().to_string()));
            }
            Ok(())
        }
        (status, _) => bail!(
            "job {} ended {}: {}",
            job.id,
            status,
            job.error.as_deref().unwrap_or("no details")
        ),
    }
}

/// Map CLI args to `GenerationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .dpi(cli.dpi)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .page_break_policy(cli.page_break_policy.into())
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref title) = cli.title {
        builder = builder.document_title(title);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Compose a pre-written body with its cover, without any LLM call.
async fn typeset_only(cli: &Cli, body_path: &Path, details: Option<CoverDetails>) -> Result<()> {
    let text = tokio::fs::read_to_string(body_path)
        .await
        .with_context(|| format!("Failed to read {}", body_path.display()))?;
    let text = clean_generated_text(&text);
    let config = build_config(cli, None)?;
    let layout = config.layout;

    let header = config
        .document_title
        .clone()
        .or_else(|| details.as_ref().map(|d| d.assignment_title.clone()));
    let body = compose::compose_fragment(FragmentKind::Body, &text, &layout, header.as_deref())
        .context("Failed to compose body")?;

    let cover = match (cli.cover, &cli.cover_file, details) {
        (CoverArg::Custom, Some(path), _) => {
            let raw = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Some(normalize_cover(&raw).context("Invalid custom cover")?)
        }
        (CoverArg::Custom, None, _) => bail!("--cover custom requires --cover-file"),
        (CoverArg::Auto, _, Some(details)) => Some(
            compose::compose_cover(&details, None, &layout).context("Failed to compose cover")?,
        ),
        (CoverArg::Auto, _, None) => None,
    };

    let fragments = Fragments {
        cover,
        outline: None,
        references: None,
        body,
    };
    let merged = compose::assemble(&fragments).context("Failed to assemble document")?;
    let pages = page_count(&merged)?;
    write_output(&cli.output, &merged).await?;
    if !cli.quiet {
        eprintln!(
            "{} {} pages  →  {}",
            green("✔"),
            bold(&pages.to_string()),
            bold(&cli.output.display().to_string())
        );
    }
    Ok(())
}

/// Local paths are read eagerly; URLs are left for the service to fetch.
async fn load_payload(input: &str) -> Result<UploadPayload> {
    if UploadPayload::is_url(input) {
        return Ok(UploadPayload::Remote {
            url: input.to_string(),
        });
    }
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {input}"))?;
    Ok(UploadPayload::Bytes(bytes))
}

async fn read_cover_details(path: &Path) -> Result<CoverDetails> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("Invalid cover details in {}", path.display()))
}

/// Atomic write: temp file, then rename.
async fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move output into {}", path.display()))?;
    Ok(())
}

fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "local".to_string())
}
