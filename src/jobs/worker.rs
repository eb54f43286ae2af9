//! Consumer of the generation lane.
//!
//! One message becomes one finished document:
//!
//! ```text
//! document ──▶ generate body ──▶ clean + page budget ──▶ compose body PDF
//!                                                          │
//!                     ┌────────────── (concurrently) ──────┤
//!                     ▼                                    ▼
//!              outline fragment?                 references fragment?
//!                     │                                    │
//! cover ──────────────┴──────────▶ assemble ◀──────────────┘
//!                                     │
//!                                  store ──▶ job done
//! ```
//!
//! Application failures anywhere in that chain mark the job `failed` and
//! acknowledge the message. Only a failure to *record* the outcome asks the
//! queue for redelivery.

use super::model::{CoverInput, GenerationMessage, StatusUpdate};
use super::queue::MessageHandler;
use super::service::JobContext;
use super::storage::output_key;
use crate::compose::{assemble, compose_cover, compose_fragment, page_count, FragmentKind, Fragments};
use crate::error::{AssignmentError, DeliveryError};
use crate::pipeline::input::fetch_asset;
use crate::pipeline::llm::GenerationTask;
use crate::pipeline::postprocess::{clean_generated_text, enforce_page_budget};
use crate::progress::JobStage;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// Finished document of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedDocument {
    pub output_ref: String,
    pub pages: usize,
}

pub struct GenerationWorker {
    ctx: Arc<JobContext>,
}

impl GenerationWorker {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }

    /// Process one decoded message, recording the outcome on the job.
    ///
    /// The job stays `pending` while the chain runs; the only status write is
    /// the terminal one.
    pub async fn process(&self, message: GenerationMessage) -> Result<(), DeliveryError> {
        let ctx = &self.ctx;
        let job_id = message.job_id;

        let job = ctx
            .store
            .get(job_id)
            .await
            .map_err(|e| DeliveryError::Redeliver(e.to_string()))?;
        let Some(job) = job else {
            warn!("message for unknown job, acknowledging");
            return Ok(());
        };
        if job.status.is_terminal() {
            debug!(status = %job.status, "job already finished, acknowledging redelivery");
            return Ok(());
        }
        ctx.notify(|cb| cb.on_stage(job_id, JobStage::Dequeued));

        match self.run(&message).await {
            Ok(doc) => {
                let update = StatusUpdate::Done {
                    output_ref: doc.output_ref.clone(),
                };
                if !self.record(job_id, update).await? {
                    return Ok(());
                }
                info!(output_ref = %doc.output_ref, pages = doc.pages, "job done");
                ctx.notify(|cb| cb.on_job_done(job_id, &doc.output_ref, doc.pages));

                for key in message.transient_keys() {
                    if let Err(e) = ctx.storage.delete(key).await {
                        warn!("could not delete transient input {key}: {e}");
                    }
                }
            }
            Err(e) => {
                error!("job failed: {e}");
                let update = StatusUpdate::Failed { error: e.to_string() };
                if self.record(job_id, update).await? {
                    ctx.notify(|cb| cb.on_job_failed(job_id, &e.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Write the terminal status. `Ok(false)` when a concurrent delivery of
    /// the same message finished the job first.
    async fn record(&self, job_id: Uuid, update: StatusUpdate) -> Result<bool, DeliveryError> {
        match self.ctx.store.update_status(job_id, update).await {
            Ok(_) => Ok(true),
            Err(AssignmentError::InvalidTransition { from, .. }) => {
                debug!(status = %from, "job finished by another delivery, acknowledging");
                Ok(false)
            }
            Err(e) => Err(DeliveryError::Redeliver(e.to_string())),
        }
    }

    /// The generation chain. Never touches the job status.
    pub async fn run(&self, message: &GenerationMessage) -> Result<GeneratedDocument, AssignmentError> {
        let ctx = &self.ctx;
        let config = &ctx.config;
        let job_id = message.job_id;
        let budget = message.page_count;

        // ── Body ─────────────────────────────────────────────────────────
        ctx.notify(|cb| cb.on_stage(job_id, JobStage::GeneratingBody));
        let source = ctx.storage.get(&message.document_key).await?;
        let raw = ctx
            .generator
            .generate(&source, budget, GenerationTask::Body)
            .await?;
        let text = enforce_page_budget(&clean_generated_text(&raw), budget, config.page_break_policy)?;

        ctx.notify(|cb| cb.on_stage(job_id, JobStage::ComposingBody));
        let header = header_title(message, config.document_title.as_deref());
        let layout = config.layout;
        let body = blocking(move || {
            compose_fragment(FragmentKind::Body, &text, &layout, header.as_deref())
        })
        .await?;
        debug!(bytes = body.len(), "body fragment composed");

        // ── Outline / references ─────────────────────────────────────────
        if message.include_outline || message.include_references {
            ctx.notify(|cb| cb.on_stage(job_id, JobStage::GeneratingExtras));
        }
        let (outline, references) = futures::try_join!(
            self.extra(message.include_outline, &body, budget, FragmentKind::Outline),
            self.extra(message.include_references, &body, budget, FragmentKind::References),
        )?;

        // ── Cover ────────────────────────────────────────────────────────
        let cover = self.cover(&message.cover).await?;

        // ── Assemble ─────────────────────────────────────────────────────
        ctx.notify(|cb| cb.on_stage(job_id, JobStage::Assembling));
        let fragments = Fragments {
            cover: Some(cover),
            outline,
            references,
            body,
        };
        let (merged, pages) = blocking(move || {
            let merged = assemble(&fragments)?;
            let pages = page_count(&merged)?;
            Ok((merged, pages))
        })
        .await?;

        // ── Store ────────────────────────────────────────────────────────
        ctx.notify(|cb| cb.on_stage(job_id, JobStage::Storing));
        let output_ref = output_key(&config.output_prefix, job_id);
        ctx.storage.put(&output_ref, merged).await?;

        Ok(GeneratedDocument { output_ref, pages })
    }

    async fn extra(
        &self,
        enabled: bool,
        body: &[u8],
        budget: u8,
        kind: FragmentKind,
    ) -> Result<Option<Vec<u8>>, AssignmentError> {
        if !enabled {
            return Ok(None);
        }
        let raw = self.ctx.generator.generate(body, budget, task_of(kind)).await?;
        let text = clean_generated_text(&raw);
        let layout = self.ctx.config.layout;
        let pdf = blocking(move || compose_fragment(kind, &text, &layout, None)).await?;
        debug!(fragment = kind.as_str(), bytes = pdf.len(), "fragment composed");
        Ok(Some(pdf))
    }

    async fn cover(&self, cover: &CoverInput) -> Result<Vec<u8>, AssignmentError> {
        match cover {
            CoverInput::Custom { key } => self.ctx.storage.get(key).await,
            CoverInput::Auto { details } => {
                let logo = match &details.logo_url {
                    Some(url) => {
                        match fetch_asset(url, self.ctx.config.download_timeout_secs).await {
                            Ok(bytes) => Some(bytes),
                            Err(e) => {
                                warn!("cover logo unavailable, rendering without it: {e}");
                                None
                            }
                        }
                    }
                    None => None,
                };
                let details = details.clone();
                let layout = self.ctx.config.layout;
                blocking(move || compose_cover(&details, logo.as_deref(), &layout)).await
            }
        }
    }
}

fn task_of(kind: FragmentKind) -> GenerationTask {
    match kind {
        FragmentKind::Body => GenerationTask::Body,
        FragmentKind::Outline => GenerationTask::Outline,
        FragmentKind::References => GenerationTask::References,
    }
}

/// Body header banner: the configured title, else the cover's title.
fn header_title(message: &GenerationMessage, configured: Option<&str>) -> Option<String> {
    configured.map(str::to_string).or_else(|| match &message.cover {
        CoverInput::Auto { details } if !details.assignment_title.trim().is_empty() => {
            Some(details.assignment_title.clone())
        }
        _ => None,
    })
}

/// Run CPU-bound composition off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, AssignmentError>
where
    F: FnOnce() -> Result<T, AssignmentError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AssignmentError::InternalComposition(format!("composition task panicked: {e}")))?
}

#[async_trait]
impl MessageHandler for GenerationWorker {
    async fn handle(&self, payload: Vec<u8>) -> Result<(), DeliveryError> {
        let message: GenerationMessage =
            serde_json::from_slice(&payload).map_err(|e| DeliveryError::Decode(e.to_string()))?;
        let span = tracing::info_span!("job", job_id = %message.job_id);
        self.process(message).instrument(span).await
    }
}

/// Subscribe a worker for `ctx` on the configured topic of `queue`.
pub fn attach(queue: &super::queue::LocalQueue, ctx: Arc<JobContext>) -> Arc<GenerationWorker> {
    let worker = Arc::new(GenerationWorker::new(Arc::clone(&ctx)));
    queue.subscribe(ctx.config.queue.topic.clone(), worker.clone());
    worker
}
