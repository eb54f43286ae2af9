//! Status watching: poll a job until it finishes.
//!
//! A web host would push these over SSE; the CLI drives its spinner from
//! them. Each distinct status is yielded once, in the order observed, and
//! the stream ends right after a terminal status. Polling is cheap against
//! the store and keeps the worker free of any subscriber bookkeeping.

use super::model::{GenerationJob, JobStatus};
use super::store::JobStore;
use crate::error::AssignmentError;
use futures::future;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;
use uuid::Uuid;

/// A boxed stream of job snapshots.
pub type JobStream = Pin<Box<dyn Stream<Item = Result<GenerationJob, AssignmentError>> + Send>>;

#[derive(Debug, Default)]
struct Watch {
    last: Option<JobStatus>,
    finished: bool,
}

impl Watch {
    /// `None` ends the stream, `Some(None)` skips a poll.
    fn step(
        &mut self,
        job_id: Uuid,
        polled: Result<Option<GenerationJob>, AssignmentError>,
    ) -> Option<Option<Result<GenerationJob, AssignmentError>>> {
        if self.finished {
            return None;
        }
        match polled {
            Err(e) => {
                self.finished = true;
                Some(Some(Err(e)))
            }
            Ok(None) => {
                self.finished = true;
                Some(Some(Err(AssignmentError::JobNotFound(job_id))))
            }
            Ok(Some(job)) if self.last == Some(job.status) => Some(None),
            Ok(Some(job)) => {
                self.last = Some(job.status);
                self.finished = job.status.is_terminal();
                Some(Some(Ok(job)))
            }
        }
    }
}

/// Stream the status changes of `job_id`, polling every `every`.
pub fn watch_job(store: Arc<dyn JobStore>, job_id: Uuid, every: Duration) -> JobStream {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let s = IntervalStream::new(interval)
        .then(move |_| {
            let store = Arc::clone(&store);
            async move { store.get(job_id).await }
        })
        .scan(Watch::default(), move |watch, polled| {
            future::ready(watch.step(job_id, polled))
        })
        .filter_map(future::ready);

    Box::pin(s)
}

/// Follow `job_id` to its terminal record.
pub async fn wait_for_terminal(
    store: Arc<dyn JobStore>,
    job_id: Uuid,
    every: Duration,
) -> Result<GenerationJob, AssignmentError> {
    let mut stream = watch_job(store, job_id, every);
    let mut last = None;
    while let Some(item) = stream.next().await {
        last = Some(item?);
    }
    last.ok_or(AssignmentError::JobNotFound(job_id))
}
