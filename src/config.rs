//! Configuration types for assignment generation.
//!
//! Everything the background stage needs to know is carried by one
//! [`GenerationConfig`], built through [`GenerationConfigBuilder`] and shared
//! by `Arc` between the service, the worker and the text generator. There is
//! no process-wide client: tests build a config with fakes, the CLI builds one
//! from flags.
//!
//! # Design choice: builder over constructor
//! Most callers only touch the model and the page-break policy. The builder
//! lets them set those and inherit documented defaults for the rest, and
//! `build()` is the single place where cross-field constraints are checked.

use crate::error::AssignmentError;
use crate::progress::JobProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Topic name of the generation lane.
pub const DEFAULT_TOPIC: &str = "assignment-generation";

/// Configuration for the generation pipeline.
///
/// # Example
/// ```rust
/// use edgequake_assignment::{GenerationConfig, PageBreakPolicy};
///
/// let config = GenerationConfig::builder()
///     .model("gpt-4.1-mini")
///     .page_break_policy(PageBreakPolicy::Strict)
///     .build()
///     .unwrap();
/// assert_eq!(config.queue.parallelism, 1);
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// DPI used to rasterise source pages for the vision model. Range: 72–400. Default: 120.
    ///
    /// Source documents are briefs and reading material, not dense scans, so a
    /// lower DPI than transcription needs is enough and keeps uploads small.
    pub dpi: u32,

    /// Maximum rendered image dimension in pixels. Default: 1600.
    pub max_rendered_pixels: u32,

    /// Upper bound on source pages sent to the model per call. Default: 20.
    ///
    /// Pages past the limit are ignored with a warning; a 200-page reader
    /// would otherwise blow the request size of every provider.
    pub max_source_pages: usize,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.7.
    ///
    /// This is authoring, not transcription; some variety reads better.
    pub temperature: f32,

    /// Maximum tokens per completion. Default: 16384.
    ///
    /// Ten pages of 600 words is roughly 8 000 tokens of output; the default
    /// leaves headroom for markdown markers and the references page.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient LLM failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 180.
    pub api_timeout_secs: u64,

    /// Timeout for fetching remote upload payloads in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// What to do when the generated body has the wrong number of page breaks.
    pub page_break_policy: PageBreakPolicy,

    /// Text of the body header banner. Default: None (rules only).
    pub document_title: Option<String>,

    /// Page geometry shared by every fragment.
    pub layout: PageLayout,

    /// Queue lane settings.
    pub queue: QueueSettings,

    /// Storage key prefix of finished documents. Default: "assignments".
    pub output_prefix: String,

    /// Optional lifecycle observer.
    pub progress_callback: Option<Arc<dyn JobProgressCallback>>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            dpi: 120,
            max_rendered_pixels: 1600,
            max_source_pages: 20,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.7,
            max_tokens: 16384,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 180,
            download_timeout_secs: 120,
            page_break_policy: PageBreakPolicy::default(),
            document_title: None,
            layout: PageLayout::default(),
            queue: QueueSettings::default(),
            output_prefix: "assignments".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("dpi", &self.dpi)
            .field("max_source_pages", &self.max_source_pages)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("page_break_policy", &self.page_break_policy)
            .field("document_title", &self.document_title)
            .field("layout", &self.layout)
            .field("queue", &self.queue)
            .field("output_prefix", &self.output_prefix)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn JobProgressCallback>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GenerationConfig`].
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_source_pages(mut self, n: usize) -> Self {
        self.config.max_source_pages = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn page_break_policy(mut self, policy: PageBreakPolicy) -> Self {
        self.config.page_break_policy = policy;
        self
    }

    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.config.document_title = (!title.trim().is_empty()).then_some(title);
        self
    }

    pub fn layout(mut self, layout: PageLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn queue_parallelism(mut self, n: usize) -> Self {
        self.config.queue.parallelism = n.max(1);
        self
    }

    pub fn queue_retries(mut self, n: u32) -> Self {
        self.config.queue.retries = n;
        self
    }

    pub fn output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.output_prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn JobProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, AssignmentError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(AssignmentError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.queue.parallelism == 0 {
            return Err(AssignmentError::InvalidConfig(
                "queue parallelism must be ≥ 1".into(),
            ));
        }
        if c.queue.topic.trim().is_empty() {
            return Err(AssignmentError::InvalidConfig("queue topic is empty".into()));
        }
        c.layout.validate()?;
        Ok(self.config)
    }
}

// ── Page geometry ────────────────────────────────────────────────────────

/// Page geometry in PDF points. Default: US Letter with 1-inch margins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub header_height: f32,
    pub footer_height: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::US_LETTER
    }
}

impl PageLayout {
    pub const US_LETTER: PageLayout = PageLayout {
        width: 612.0,
        height: 792.0,
        margin: 72.0,
        header_height: 30.0,
        footer_height: 30.0,
    };

    /// Free space above the overflow threshold.
    const BOTTOM_BUFFER: f32 = 20.0;
    /// Gap between the header band and the first line of a normal page.
    const TOP_GAP: f32 = 40.0;
    /// Gap between the top margin and the first line of a special page.
    const SPECIAL_TOP_GAP: f32 = 20.0;
    /// Width reserved right of the ToC number column.
    const NUMBER_COLUMN_INSET: f32 = 28.0;

    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    /// First baseline of a page with the header banner.
    pub fn normal_top(&self) -> f32 {
        self.height - self.margin - self.header_height - Self::TOP_GAP
    }

    /// First baseline of a special page.
    pub fn special_top(&self) -> f32 {
        self.height - self.margin - Self::SPECIAL_TOP_GAP
    }

    /// A line of `line_height` starting below this y goes to the next page.
    pub fn overflow_threshold(&self, line_height: f32) -> f32 {
        self.margin + self.footer_height + line_height + Self::BOTTOM_BUFFER
    }

    /// Left edge of ToC page numbers (512 on US Letter).
    pub fn number_column_x(&self) -> f32 {
        self.width - self.margin - Self::NUMBER_COLUMN_INSET
    }

    fn validate(&self) -> Result<(), AssignmentError> {
        if self.content_width() < 144.0 {
            return Err(AssignmentError::InvalidConfig(format!(
                "content width {:.0}pt is too narrow",
                self.content_width()
            )));
        }
        if self.normal_top() <= self.overflow_threshold(30.0) {
            return Err(AssignmentError::InvalidConfig(
                "page is too short for header, footer and one title line".into(),
            ));
        }
        Ok(())
    }
}

// ── Queue ────────────────────────────────────────────────────────────────

/// Settings of the background generation lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Named lane. Default: "assignment-generation".
    pub topic: String,
    /// Concurrent deliveries on the lane. Default: 1.
    pub parallelism: usize,
    /// Redeliveries after a transport failure. Default: 2.
    pub retries: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            parallelism: 1,
            retries: 2,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Handling of generated bodies whose page-break count differs from
/// `page_budget - 1`.
///
/// | Policy | Too few breaks | Too many breaks |
/// |--------|----------------|-----------------|
/// | `Clamp` | kept as is | trailing segments merged into the last page |
/// | `Strict` | job fails | job fails |
/// | `BestEffort` | kept as is | kept as is |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageBreakPolicy {
    #[default]
    Clamp,
    Strict,
    BestEffort,
}

impl std::str::FromStr for PageBreakPolicy {
    type Err = AssignmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "clamp" => Ok(PageBreakPolicy::Clamp),
            "strict" => Ok(PageBreakPolicy::Strict),
            "best_effort" | "besteffort" => Ok(PageBreakPolicy::BestEffort),
            other => Err(AssignmentError::InvalidConfig(format!(
                "unknown page-break policy '{other}'"
            ))),
        }
    }
}
