//! Submission front door: validate, record, detach.
//!
//! [`JobService::submit`] does everything that can fail because of the
//! request itself before a job row exists (validation, decoding of inline
//! uploads, the custom-cover page check). Once the row is written the caller
//! gets a `pending` receipt immediately and the rest happens in a detached
//! task: fetch remote uploads, store the inputs, publish a
//! [`GenerationMessage`]. A failure or panic in that task is written to the
//! job as `failed`; it never reaches the caller.
//!
//! Remote uploads only have their URL checked on the request path. Their
//! download, and for a remote custom cover the page check, happen in the
//! detached task, so a bad remote input shows up as a `failed` job.

use super::model::{
    CoverInput, CoverSource, GenerationJob, GenerationMessage, JobStatus, StatusUpdate,
    SubmitRequest,
};
use super::queue::{JobQueue, PublishOptions};
use super::storage::{cover_key, document_key, ObjectStorage};
use super::store::JobStore;
use super::stream::{watch_job, JobStream};
use crate::compose::normalize_cover;
use crate::config::GenerationConfig;
use crate::error::AssignmentError;
use crate::pipeline::input::UploadPayload;
use crate::pipeline::llm::TextGenerator;
use crate::progress::{JobProgressCallback, JobStage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{error, info, Instrument};
use uuid::Uuid;

/// Collaborators shared by the service and the worker.
pub struct JobContext {
    pub config: Arc<GenerationConfig>,
    pub store: Arc<dyn JobStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub queue: Arc<dyn JobQueue>,
    pub generator: Arc<dyn TextGenerator>,
}

impl JobContext {
    pub(crate) fn notify(&self, event: impl FnOnce(&dyn JobProgressCallback)) {
        if let Some(cb) = &self.config.progress_callback {
            event(cb.as_ref());
        }
    }
}

/// Answer to an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// An input as handed to the detached stage.
enum Staged {
    /// Decoded and checked on the request path.
    Checked(Vec<u8>),
    /// Fetched (and checked) by the detached stage.
    Remote(UploadPayload),
}

impl Staged {
    /// Decode inline payloads now; leave remote ones for later.
    async fn accept(
        payload: UploadPayload,
        timeout_secs: u64,
        check: fn(Vec<u8>) -> Result<Vec<u8>, AssignmentError>,
    ) -> Result<Self, AssignmentError> {
        match payload {
            UploadPayload::Remote { url } if UploadPayload::is_url(&url) => {
                Ok(Staged::Remote(UploadPayload::Remote { url }))
            }
            UploadPayload::Remote { url } => {
                Err(AssignmentError::malformed(format!("unsupported URL '{url}'")))
            }
            inline => Ok(Staged::Checked(check(inline.resolve(timeout_secs).await?)?)),
        }
    }

    async fn into_bytes(
        self,
        timeout_secs: u64,
        check: fn(Vec<u8>) -> Result<Vec<u8>, AssignmentError>,
    ) -> Result<Vec<u8>, AssignmentError> {
        match self {
            Staged::Checked(bytes) => Ok(bytes),
            Staged::Remote(payload) => check(payload.resolve(timeout_secs).await?),
        }
    }
}

fn as_cover(bytes: Vec<u8>) -> Result<Vec<u8>, AssignmentError> {
    normalize_cover(&bytes)
}

/// Inputs accepted on the request path, stored by the detached stage.
struct ResolvedInputs {
    message: GenerationMessage,
    document: Staged,
    custom_cover: Option<Staged>,
}

pub struct JobService {
    ctx: Arc<JobContext>,
    detached: TaskTracker,
}

impl JobService {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self {
            ctx,
            detached: TaskTracker::new(),
        }
    }

    pub fn context(&self) -> &Arc<JobContext> {
        &self.ctx
    }

    /// Validate and record a request, then detach the upload-and-publish
    /// stage.
    ///
    /// Returns `Validation` / `MalformedInput` errors synchronously; no job
    /// exists after such a rejection.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitReceipt, AssignmentError> {
        let request = request.validate()?;
        let timeout = self.ctx.config.download_timeout_secs;

        let document = Staged::accept(request.document, timeout, Ok).await?;
        let custom_cover = match &request.cover {
            CoverSource::Custom(payload) => {
                Some(Staged::accept(payload.clone(), timeout, as_cover).await?)
            }
            CoverSource::Auto(_) => None,
        };

        let job = GenerationJob::new(request.owner_id.clone(), request.cover.mode());
        let job_id = job.id;
        self.ctx.store.insert(job).await?;
        info!(job_id = %job_id, pages = request.page_count, cover = %request.cover.mode(), "job accepted");
        self.ctx.notify(|cb| cb.on_job_accepted(job_id));

        let cover = match request.cover {
            CoverSource::Auto(details) => CoverInput::Auto { details },
            CoverSource::Custom(_) => CoverInput::Custom {
                key: cover_key(job_id),
            },
        };
        let inputs = ResolvedInputs {
            message: GenerationMessage {
                job_id,
                document_key: document_key(job_id),
                page_count: request.page_count,
                cover,
                include_outline: request.include_outline,
                include_references: request.include_references,
            },
            document,
            custom_cover,
        };

        let ctx = Arc::clone(&self.ctx);
        let span = tracing::info_span!("detached", job_id = %job_id);
        self.detached
            .spawn(async move { run_detached(ctx, inputs).await }.instrument(span));

        Ok(SubmitReceipt {
            job_id,
            status: JobStatus::Pending,
        })
    }

    /// Current record of a job.
    pub async fn status(&self, job_id: Uuid) -> Result<GenerationJob, AssignmentError> {
        self.ctx
            .store
            .get(job_id)
            .await?
            .ok_or(AssignmentError::JobNotFound(job_id))
    }

    /// Poll a job until it reaches a terminal status.
    pub fn watch(&self, job_id: Uuid, every: Duration) -> JobStream {
        watch_job(Arc::clone(&self.ctx.store), job_id, every)
    }

    /// Wait for every detached stage started so far.
    pub async fn wait_detached(&self) {
        self.detached.close();
        self.detached.wait().await;
        self.detached.reopen();
    }
}

/// Top level of the detached stage: every error, and a panic, ends here as
/// `failed`.
async fn run_detached(ctx: Arc<JobContext>, inputs: ResolvedInputs) {
    let job_id = inputs.message.job_id;
    let inner = {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move { upload_and_publish(&ctx, inputs).await }.in_current_span())
    };
    let outcome = match inner.await {
        Ok(result) => result,
        Err(e) => Err(AssignmentError::Internal(format!("detached stage aborted: {e}"))),
    };
    if let Err(e) = outcome {
        error!("detached stage failed: {e}");
        match ctx
            .store
            .update_status(job_id, StatusUpdate::Failed { error: e.to_string() })
            .await
        {
            Ok(_) => ctx.notify(|cb| cb.on_job_failed(job_id, &e.to_string())),
            Err(store_err) => error!("could not record failure: {store_err}"),
        }
    }
}

async fn upload_and_publish(
    ctx: &JobContext,
    inputs: ResolvedInputs,
) -> Result<(), AssignmentError> {
    let ResolvedInputs {
        message,
        document,
        custom_cover,
    } = inputs;
    ctx.notify(|cb| cb.on_stage(message.job_id, JobStage::Uploading));
    let timeout = ctx.config.download_timeout_secs;

    let document = document.into_bytes(timeout, Ok).await?;
    ctx.storage.put(&message.document_key, document).await?;
    if let (CoverInput::Custom { key }, Some(cover)) = (&message.cover, custom_cover) {
        let bytes = cover.into_bytes(timeout, as_cover).await?;
        ctx.storage.put(key, bytes).await?;
    }

    let payload = serde_json::to_vec(&message)
        .map_err(|e| AssignmentError::Internal(format!("message encoding: {e}")))?;
    let settings = &ctx.config.queue;
    ctx.queue
        .publish(&settings.topic, payload, PublishOptions::from(settings))
        .await?;
    info!("generation message published on '{}'", settings.topic);
    Ok(())
}
