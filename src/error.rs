//! Error types for the edgequake-assignment library.
//!
//! Two error types reflect the two places failures surface:
//!
//! * [`AssignmentError`]: everything the library returns as `Err`. Errors on
//!   the synchronous submission path ([`AssignmentError::Validation`],
//!   [`AssignmentError::MalformedInput`]) reach the caller directly; errors in
//!   the background stage never do. They are logged and turned into a
//!   `Failed` job status by the worker.
//!
//! * [`DeliveryError`]: a transport-level failure between the queue and its
//!   handler. Only these are retried by the queue; application failures
//!   inside the handler are not.
//!
//! Callers that need to branch on the category (e.g. an HTTP layer mapping to
//! 400 vs 500) use [`AssignmentError::kind`] and
//! [`AssignmentError::public_message`] instead of matching every variant.

use crate::jobs::model::JobStatus;
use thiserror::Error;
use uuid::Uuid;

/// All errors returned by the edgequake-assignment library.
#[derive(Debug, Error)]
pub enum AssignmentError {
    // ── Request errors (synchronous, no job created) ──────────────────────
    /// A required field is missing or out of range.
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// A supplied document does not satisfy a structural constraint.
    #[error("Malformed input: {reason}")]
    MalformedInput { reason: String },

    // ── Background-stage errors (job marked Failed) ───────────────────────
    /// The AI or storage collaborator failed while generating the document.
    #[error("Upstream failure during {stage}: {message}")]
    UpstreamGeneration { stage: String, message: String },

    /// Unexpected failure inside the composition engine or the assembler.
    #[error("Composition failed: {0}")]
    InternalComposition(String),

    // ── Collaborator plumbing ─────────────────────────────────────────────
    /// The queue refused or could not accept a message.
    #[error("Queue error: {0}")]
    Queue(String),

    /// The job store could not be read or written.
    #[error("Job store error: {0}")]
    Store(String),

    /// A status write would move a job backwards or out of a terminal state.
    #[error("Job {job_id}: invalid status transition {from} → {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    /// The requested job does not exist.
    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A missing or out-of-range request field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no assignment document was supplied")]
    MissingDocument,

    #[error("the number of pages was not specified")]
    MissingPageCount,

    #[error("number of pages must be at least 1 and at most 10, got {0}")]
    PageCountOutOfRange(i64),

    #[error("invalid cover page type '{0}' (expected 'auto' or 'custom')")]
    InvalidCoverMode(String),

    #[error("cover page type 'custom' requires a cover PDF")]
    MissingCoverFile,

    #[error("cover page type 'auto' requires cover details")]
    MissingCoverDetails,
}

/// Coarse error category, stable across variant additions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    MalformedInput,
    Upstream,
    Composition,
    Internal,
}

impl AssignmentError {
    /// Shorthand for an upstream failure in a named stage.
    pub fn upstream(stage: impl Into<String>, message: impl std::fmt::Display) -> Self {
        AssignmentError::UpstreamGeneration {
            stage: stage.into(),
            message: message.to_string(),
        }
    }

    /// Shorthand for a malformed-input rejection.
    pub fn malformed(reason: impl Into<String>) -> Self {
        AssignmentError::MalformedInput {
            reason: reason.into(),
        }
    }

    /// Classify the error for callers that only care about the category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssignmentError::Validation(_) => ErrorKind::Validation,
            AssignmentError::MalformedInput { .. } => ErrorKind::MalformedInput,
            AssignmentError::UpstreamGeneration { .. } | AssignmentError::Queue(_) => {
                ErrorKind::Upstream
            }
            AssignmentError::InternalComposition(_) => ErrorKind::Composition,
            AssignmentError::Store(_)
            | AssignmentError::InvalidTransition { .. }
            | AssignmentError::JobNotFound(_)
            | AssignmentError::InvalidConfig(_)
            | AssignmentError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// A message safe to show to the submitting client.
    ///
    /// Request errors are returned verbatim; everything else collapses to a
    /// generic sentence so collaborator details (bucket names, provider
    /// responses) stay in the logs.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::MalformedInput => self.to_string(),
            ErrorKind::Upstream => "The document could not be generated right now".to_string(),
            ErrorKind::Composition | ErrorKind::Internal => "Internal server error".to_string(),
        }
    }
}

/// A transport-level failure between the queue and its handler.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// The payload could not be decoded into a message.
    #[error("undecodable payload: {0}")]
    Decode(String),

    /// The handler task panicked or was aborted.
    #[error("handler aborted: {0}")]
    HandlerAborted(String),

    /// The handler asked for redelivery (e.g. it could not persist the outcome).
    #[error("redelivery requested: {0}")]
    Redeliver(String),
}
