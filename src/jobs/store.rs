//! Job persistence.
//!
//! The relational schema of a real deployment is out of scope; the service
//! only needs insert, a guarded status write and a read. [`InMemoryJobStore`]
//! is the reference implementation and enforces the transition rules of
//! [`super::model::JobStatus::can_transition_to`]: one terminal write per
//! job, never backwards.

use super::model::{GenerationJob, StatusUpdate};
use crate::error::AssignmentError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job. Fails if the id already exists.
    async fn insert(&self, job: GenerationJob) -> Result<(), AssignmentError>;

    /// Apply a status write, returning the updated job.
    async fn update_status(
        &self,
        id: Uuid,
        update: StatusUpdate,
    ) -> Result<GenerationJob, AssignmentError>;

    async fn get(&self, id: Uuid) -> Result<Option<GenerationJob>, AssignmentError>;
}

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, GenerationJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: GenerationJob) -> Result<(), AssignmentError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(AssignmentError::Store(format!("job {} already exists", job.id)));
        }
        debug!(job_id = %job.id, "job inserted");
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        update: StatusUpdate,
    ) -> Result<GenerationJob, AssignmentError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(AssignmentError::JobNotFound(id))?;

        let next = update.status();
        if !job.status.can_transition_to(next) {
            return Err(AssignmentError::InvalidTransition {
                job_id: id,
                from: job.status,
                to: next,
            });
        }

        match update {
            StatusUpdate::Done { output_ref } => job.output_ref = Some(output_ref),
            StatusUpdate::Failed { error } => job.error = Some(error),
        }
        debug!(job_id = %id, from = %job.status, to = %next, "job status updated");
        job.status = next;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<GenerationJob>, AssignmentError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }
}
