//! Asynchronous generation job lifecycle.
//!
//! ```text
//! submit ─▶ validate ─▶ insert(pending) ─▶ receipt        (request path)
//!                           │
//!                           └─▶ upload inputs ─▶ publish   (detached)
//!                                                  │
//!                 GenerationWorker ◀── LocalQueue ─┘
//!                     │  (job stays pending while it runs)
//!                     └─▶ done(output_ref) | failed
//! ```
//!
//! Collaborators sit behind traits ([`store::JobStore`],
//! [`storage::ObjectStorage`], [`queue::JobQueue`],
//! [`crate::pipeline::llm::TextGenerator`]) and travel together in a
//! [`service::JobContext`].

pub mod model;
pub mod queue;
pub mod service;
pub mod storage;
pub mod store;
pub mod stream;
pub mod worker;

pub use model::{CoverMode, GenerationJob, GenerationMessage, JobStatus, SubmitRequest};
pub use queue::{JobQueue, LocalQueue, MessageHandler, PublishOptions};
pub use service::{JobContext, JobService, SubmitReceipt};
pub use storage::{FsStorage, InMemoryStorage, ObjectStorage};
pub use store::{InMemoryJobStore, JobStore};
pub use stream::{wait_for_terminal, watch_job, JobStream};
pub use worker::GenerationWorker;

use crate::config::GenerationConfig;
use crate::pipeline::llm::TextGenerator;
use std::sync::Arc;

/// Wire a service and its worker around an in-process queue.
pub fn local_service(
    config: Arc<GenerationConfig>,
    store: Arc<dyn JobStore>,
    storage: Arc<dyn ObjectStorage>,
    generator: Arc<dyn TextGenerator>,
) -> (JobService, Arc<LocalQueue>) {
    let queue = Arc::new(LocalQueue::new());
    let ctx = Arc::new(JobContext {
        config,
        store,
        storage,
        queue: queue.clone(),
        generator,
    });
    worker::attach(&queue, Arc::clone(&ctx));
    (JobService::new(ctx), queue)
}
