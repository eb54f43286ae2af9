//! Message queue seam and the in-process lane runner.
//!
//! A [`JobQueue`] accepts opaque payloads on a named topic. [`LocalQueue`] is
//! the in-process implementation: each topic is a lane with a
//! [`MessageHandler`] and a `Semaphore` bounding concurrent deliveries.
//!
//! ## Redelivery
//!
//! Only transport failures are redelivered: the handler returning a
//! [`DeliveryError`] or panicking. A handler that ran to completion has
//! acknowledged the message, whatever the job outcome was. After
//! `retries` redeliveries the message is dropped with an error log.

use crate::error::{AssignmentError, DeliveryError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

/// Delivery settings of a publish call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
    /// Concurrent deliveries on the topic's lane.
    pub parallelism: usize,
    /// Redeliveries after a transport failure.
    pub retries: u32,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            parallelism: 1,
            retries: 2,
        }
    }
}

impl From<&crate::config::QueueSettings> for PublishOptions {
    fn from(q: &crate::config::QueueSettings) -> Self {
        Self {
            parallelism: q.parallelism.max(1),
            retries: q.retries,
        }
    }
}

/// Consumer side of a topic.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one payload. `Ok` acknowledges it.
    async fn handle(&self, payload: Vec<u8>) -> Result<(), DeliveryError>;
}

/// Producer side of the queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Hand `payload` to the queue. Returns once the message is accepted,
    /// not once it is processed.
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        options: PublishOptions,
    ) -> Result<(), AssignmentError>;
}

struct Lane {
    handler: Arc<dyn MessageHandler>,
    permits: Option<Arc<Semaphore>>,
}

/// In-process queue running deliveries as tracked Tokio tasks.
pub struct LocalQueue {
    lanes: Mutex<HashMap<String, Lane>>,
    tracker: TaskTracker,
}

impl Default for LocalQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalQueue {
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(HashMap::new()),
            tracker: TaskTracker::new(),
        }
    }

    /// Register the handler of `topic`, replacing any previous one.
    pub fn subscribe(&self, topic: impl Into<String>, handler: Arc<dyn MessageHandler>) {
        let topic = topic.into();
        debug!(topic = %topic, "handler subscribed");
        let mut lanes = self.lanes.lock().unwrap_or_else(|p| p.into_inner());
        lanes.insert(
            topic,
            Lane {
                handler,
                permits: None,
            },
        );
    }

    /// Wait until every accepted message has been delivered or dropped.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Messages accepted but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    fn lane(
        &self,
        topic: &str,
        options: PublishOptions,
    ) -> Result<(Arc<dyn MessageHandler>, Arc<Semaphore>), AssignmentError> {
        let mut lanes = self.lanes.lock().unwrap_or_else(|p| p.into_inner());
        let lane = lanes
            .get_mut(topic)
            .ok_or_else(|| AssignmentError::Queue(format!("no handler subscribed to '{topic}'")))?;
        let permits = lane
            .permits
            .get_or_insert_with(|| Arc::new(Semaphore::new(options.parallelism.max(1))))
            .clone();
        Ok((Arc::clone(&lane.handler), permits))
    }
}

#[async_trait]
impl JobQueue for LocalQueue {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        options: PublishOptions,
    ) -> Result<(), AssignmentError> {
        let (handler, permits) = self.lane(topic, options)?;
        let topic = topic.to_string();
        debug!(topic = %topic, bytes = payload.len(), "message accepted");
        self.tracker
            .spawn(deliver(topic, handler, permits, payload, options.retries));
        Ok(())
    }
}

async fn deliver(
    topic: String,
    handler: Arc<dyn MessageHandler>,
    permits: Arc<Semaphore>,
    payload: Vec<u8>,
    retries: u32,
) {
    let _permit = match permits.acquire_owned().await {
        Ok(p) => p,
        Err(_) => {
            error!(topic = %topic, "lane closed, message dropped");
            return;
        }
    };

    for attempt in 0..=retries {
        let h = Arc::clone(&handler);
        let body = payload.clone();
        let outcome = match tokio::spawn(async move { h.handle(body).await }).await {
            Ok(result) => result,
            Err(join_err) => Err(DeliveryError::HandlerAborted(join_err.to_string())),
        };

        match outcome {
            Ok(()) => return,
            Err(e) if attempt < retries => {
                warn!(topic = %topic, attempt = attempt + 1, "delivery failed, redelivering: {e}");
            }
            Err(e) => {
                error!(
                    topic = %topic,
                    attempts = attempt + 1,
                    "delivery failed, message dropped: {e}"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        fail_first: usize,
        panic_first: bool,
    }

    #[async_trait]
    impl MessageHandler for Counting {
        async fn handle(&self, _payload: Vec<u8>) -> Result<(), DeliveryError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_first && n == 0 {
                panic!("handler blew up");
            }
            if n < self.fail_first {
                return Err(DeliveryError::Redeliver("not yet".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivers_once_on_success() {
        let q = LocalQueue::new();
        let h = Arc::new(Counting::default());
        q.subscribe("t", h.clone());
        q.publish("t", b"m".to_vec(), PublishOptions::default()).await.unwrap();
        q.drain().await;
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
        assert_eq!(q.in_flight(), 0);
    }

    #[tokio::test]
    async fn transport_failures_are_redelivered_up_to_retries() {
        let q = LocalQueue::new();
        let h = Arc::new(Counting {
            fail_first: 10,
            ..Default::default()
        });
        q.subscribe("t", h.clone());
        q.publish("t", vec![], PublishOptions { parallelism: 1, retries: 2 })
            .await
            .unwrap();
        q.drain().await;
        assert_eq!(h.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn panic_counts_as_transport_failure() {
        let q = LocalQueue::new();
        let h = Arc::new(Counting {
            panic_first: true,
            ..Default::default()
        });
        q.subscribe("t", h.clone());
        q.publish("t", vec![], PublishOptions::default()).await.unwrap();
        q.drain().await;
        assert_eq!(h.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_topic_is_rejected() {
        let q = LocalQueue::new();
        let err = q
            .publish("nope", vec![], PublishOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AssignmentError::Queue(_)));
    }

    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler for Gauge {
        async fn handle(&self, _payload: Vec<u8>) -> Result<(), DeliveryError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn parallelism_bounds_concurrent_deliveries() {
        let q = LocalQueue::new();
        let g = Arc::new(Gauge {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        q.subscribe("t", g.clone());
        for _ in 0..6 {
            q.publish("t", vec![], PublishOptions { parallelism: 2, retries: 0 })
                .await
                .unwrap();
        }
        q.drain().await;
        assert!(g.peak.load(Ordering::SeqCst) <= 2);
        assert!(g.peak.load(Ordering::SeqCst) >= 1);
    }
}
