//! # edgequake-assignment
//!
//! Turn a source document into a generated, paginated academic assignment
//! PDF, and track each request through an asynchronous job lifecycle.
//!
//! ## Why this crate?
//!
//! Model output is markdown-ish text; a submission is a PDF with a cover,
//! an optional table of contents and references, and numbered pages. The
//! gap between the two is a small typesetting engine (inline styles, line
//! wrapping, pagination, dot-leader outlines, fragment merging) plus the
//! plumbing to run generation out of band and report its outcome.
//!
//! ## Pipeline Overview
//!
//! ```text
//! submit ─▶ validate ─▶ job(pending) ─▶ receipt
//!                          │
//!                          └─▶ upload ─▶ queue ─▶ worker
//!                                                   │
//!   ┌───────────────────────────────────────────────┘
//!   ├─ 1. Render    rasterise the source via pdfium (spawn_blocking)
//!   ├─ 2. Generate  body text from a vision LLM, with retry/backoff
//!   ├─ 3. Polish    deterministic cleanup + page-budget policy
//!   ├─ 4. Compose   inline → wrap → paginate → PDF (lopdf)
//!   ├─ 5. Extras    outline / references from the composed body
//!   └─ 6. Assemble  [cover, outline?, references?, body] → job(done)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_assignment::jobs::{local_service, InMemoryJobStore, InMemoryStorage, SubmitRequest};
//! use edgequake_assignment::pipeline::input::UploadPayload;
//! use edgequake_assignment::pipeline::llm::LlmTextGenerator;
//! use edgequake_assignment::GenerationConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(GenerationConfig::builder().model("gpt-4.1-mini").build()?);
//!     let (service, _queue) = local_service(
//!         config.clone(),
//!         Arc::new(InMemoryJobStore::new()),
//!         Arc::new(InMemoryStorage::new()),
//!         Arc::new(LlmTextGenerator::new(config)),
//!     );
//!
//!     let receipt = service
//!         .submit(SubmitRequest {
//!             owner_id: "user-1".into(),
//!             document: Some(UploadPayload::Bytes(std::fs::read("brief.pdf")?)),
//!             page_count: Some(3),
//!             cover_mode: Some("custom".into()),
//!             cover_file: Some(UploadPayload::Bytes(std::fs::read("cover.pdf")?)),
//!             include_outline: true,
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let job = edgequake_assignment::jobs::wait_for_terminal(
//!         service.context().store.clone(),
//!         receipt.job_id,
//!         Duration::from_millis(500),
//!     )
//!     .await?;
//!     println!("{} → {:?}", job.status, job.output_ref);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `assignment-gen` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Runtime requirements
//!
//! Rasterising source documents needs the pdfium shared library, found via
//! `PDFIUM_LIB_PATH` or the system library path. Composition alone
//! (`compose::*`) does not.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod compose;
pub mod config;
pub mod error;
pub mod jobs;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use compose::{
    assemble, compose_cover, compose_fragment, merge, page_count, CoverDetails, FragmentKind,
    Fragments, Submitter,
};
pub use config::{GenerationConfig, GenerationConfigBuilder, PageBreakPolicy, PageLayout, QueueSettings};
pub use error::{AssignmentError, DeliveryError, ErrorKind, ValidationError};
pub use jobs::{GenerationJob, JobService, JobStatus, SubmitReceipt, SubmitRequest};
pub use pipeline::llm::{GenerationTask, LlmTextGenerator, TextGenerator};
pub use progress::{JobProgressCallback, JobStage, NoopProgressCallback, ProgressCallback};
