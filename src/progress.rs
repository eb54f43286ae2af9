//! Progress-callback trait for job lifecycle events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to observe
//! jobs as they move through the background stage. The CLI uses it to drive a
//! spinner; a web host could forward events to a websocket.
//!
//! Events are advisory. The job store stays the source of truth for status;
//! a callback that misses an event loses nothing.
//!
//! # Example
//!
//! ```rust
//! use edgequake_assignment::{JobProgressCallback, JobStage};
//! use std::sync::{Arc, Mutex};
//! use uuid::Uuid;
//!
//! #[derive(Default)]
//! struct StageLog(Mutex<Vec<JobStage>>);
//!
//! impl JobProgressCallback for StageLog {
//!     fn on_stage(&self, _job_id: Uuid, stage: JobStage) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let log: Arc<dyn JobProgressCallback> = Arc::new(StageLog::default());
//! ```

use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Steps of the background stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    /// Transient inputs are being written to storage.
    Uploading,
    /// The worker picked the message up.
    Dequeued,
    /// The body text is being generated.
    GeneratingBody,
    /// Body text is being laid out.
    ComposingBody,
    /// Outline and/or references are being generated.
    GeneratingExtras,
    /// Fragments are being merged.
    Assembling,
    /// The final document is being stored.
    Storing,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStage::Uploading => "uploading inputs",
            JobStage::Dequeued => "dequeued",
            JobStage::GeneratingBody => "generating body",
            JobStage::ComposingBody => "composing body",
            JobStage::GeneratingExtras => "generating outline/references",
            JobStage::Assembling => "assembling",
            JobStage::Storing => "storing result",
        };
        f.write_str(s)
    }
}

/// Observer of job lifecycle events.
///
/// All methods default to no-ops. With queue parallelism above 1, events of
/// different jobs may arrive concurrently.
pub trait JobProgressCallback: Send + Sync {
    /// A request passed validation and its job row exists.
    fn on_job_accepted(&self, job_id: Uuid) {
        let _ = job_id;
    }

    /// The job entered `stage`.
    fn on_stage(&self, job_id: Uuid, stage: JobStage) {
        let _ = (job_id, stage);
    }

    /// The job reached `Done`; `output_ref` is the storage key of the PDF.
    fn on_job_done(&self, job_id: Uuid, output_ref: &str, pages: usize) {
        let _ = (job_id, output_ref, pages);
    }

    /// The job reached `Failed`.
    fn on_job_failed(&self, job_id: Uuid, error: &str) {
        let _ = (job_id, error);
    }
}

/// Default callback.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

pub type ProgressCallback = Arc<dyn JobProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Tracking {
        stages: Mutex<Vec<JobStage>>,
        done: AtomicUsize,
        failed: AtomicUsize,
    }

    impl JobProgressCallback for Tracking {
        fn on_stage(&self, _job_id: Uuid, stage: JobStage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_job_done(&self, _job_id: Uuid, _output_ref: &str, _pages: usize) {
            self.done.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_failed(&self, _job_id: Uuid, _error: &str) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        let id = Uuid::new_v4();
        cb.on_job_accepted(id);
        cb.on_stage(id, JobStage::Assembling);
        cb.on_job_done(id, "assignments/x.pdf", 4);
        cb.on_job_failed(id, "boom");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = Tracking::default();
        let id = Uuid::new_v4();
        t.on_stage(id, JobStage::Dequeued);
        t.on_stage(id, JobStage::GeneratingBody);
        t.on_job_done(id, "k", 1);
        assert_eq!(
            *t.stages.lock().unwrap(),
            vec![JobStage::Dequeued, JobStage::GeneratingBody]
        );
        assert_eq!(t.done.load(Ordering::SeqCst), 1);
        assert_eq!(t.failed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stage_display() {
        assert_eq!(JobStage::GeneratingExtras.to_string(), "generating outline/references");
    }
}
