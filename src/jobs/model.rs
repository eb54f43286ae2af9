//! Job records, submission requests and queue messages.

use crate::compose::CoverDetails;
use crate::error::{AssignmentError, ValidationError};
use crate::pipeline::input::UploadPayload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Smallest and largest accepted page budget.
pub const PAGE_COUNT_RANGE: std::ops::RangeInclusive<i64> = 1..=10;

/// Lifecycle status of a generation job.
///
/// `Pending → {Done, Failed}`. Work in progress is not persisted; a job
/// stays `Pending` until its single terminal write. Terminal statuses accept
/// no transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Whether a status write from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!((self, next), (Pending, Done) | (Pending, Failed))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// How the cover page is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverMode {
    /// Rendered from [`CoverDetails`].
    Auto,
    /// Supplied by the client as a one-page PDF.
    Custom,
}

impl FromStr for CoverMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(CoverMode::Auto),
            "custom" => Ok(CoverMode::Custom),
            other => Err(ValidationError::InvalidCoverMode(other.to_string())),
        }
    }
}

impl fmt::Display for CoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverMode::Auto => write!(f, "auto"),
            CoverMode::Custom => write!(f, "custom"),
        }
    }
}

/// One persisted generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub owner_id: String,
    pub cover_mode: CoverMode,
    pub status: JobStatus,
    /// Storage key of the finished PDF, set together with `Done`.
    pub output_ref: Option<String>,
    /// Failure reason, set together with `Failed`. Never shown to clients
    /// verbatim.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    pub fn new(owner_id: impl Into<String>, cover_mode: CoverMode) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            cover_mode,
            status: JobStatus::Pending,
            output_ref: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn processing_duration_ms(&self) -> Option<i64> {
        self.status
            .is_terminal()
            .then(|| (self.updated_at - self.created_at).num_milliseconds())
    }
}

/// A status write applied by [`super::store::JobStore::update_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Done { output_ref: String },
    Failed { error: String },
}

impl StatusUpdate {
    pub fn status(&self) -> JobStatus {
        match self {
            StatusUpdate::Done { .. } => JobStatus::Done,
            StatusUpdate::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// A submission as received from the client, before validation.
///
/// Field shapes mirror a web form: everything is optional and loosely typed
/// so that [`SubmitRequest::validate`] can report which field is wrong.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub owner_id: String,
    pub document: Option<UploadPayload>,
    pub page_count: Option<i64>,
    pub cover_mode: Option<String>,
    #[serde(default)]
    pub cover_details: Option<CoverDetails>,
    #[serde(default)]
    pub cover_file: Option<UploadPayload>,
    #[serde(default)]
    pub include_outline: bool,
    #[serde(default)]
    pub include_references: bool,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub owner_id: String,
    pub document: UploadPayload,
    pub page_count: u8,
    pub cover: CoverSource,
    pub include_outline: bool,
    pub include_references: bool,
}

/// The cover source of a validated request.
#[derive(Debug, Clone)]
pub enum CoverSource {
    Auto(CoverDetails),
    Custom(UploadPayload),
}

impl CoverSource {
    pub fn mode(&self) -> CoverMode {
        match self {
            CoverSource::Auto(_) => CoverMode::Auto,
            CoverSource::Custom(_) => CoverMode::Custom,
        }
    }
}

impl SubmitRequest {
    /// Check presence and ranges, in the order the form reports them:
    /// document, page count, cover mode, then the cover input itself.
    pub fn validate(self) -> Result<ValidatedRequest, AssignmentError> {
        let document = self.document.ok_or(ValidationError::MissingDocument)?;
        let pages = self.page_count.ok_or(ValidationError::MissingPageCount)?;
        if !PAGE_COUNT_RANGE.contains(&pages) {
            return Err(ValidationError::PageCountOutOfRange(pages).into());
        }
        let mode: CoverMode = self
            .cover_mode
            .as_deref()
            .unwrap_or_default()
            .trim()
            .parse()?;
        let cover = match mode {
            CoverMode::Auto => CoverSource::Auto(
                self.cover_details.ok_or(ValidationError::MissingCoverDetails)?,
            ),
            CoverMode::Custom => {
                CoverSource::Custom(self.cover_file.ok_or(ValidationError::MissingCoverFile)?)
            }
        };

        Ok(ValidatedRequest {
            owner_id: self.owner_id,
            document,
            page_count: pages as u8,
            cover,
            include_outline: self.include_outline,
            include_references: self.include_references,
        })
    }
}

/// Payload published on the generation lane.
///
/// Carries storage keys only; the inputs themselves were uploaded by the
/// detached stage before publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMessage {
    pub job_id: Uuid,
    pub document_key: String,
    pub page_count: u8,
    pub cover: CoverInput,
    pub include_outline: bool,
    pub include_references: bool,
}

/// Cover input as it travels in a [`GenerationMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum CoverInput {
    Auto { details: CoverDetails },
    Custom { key: String },
}

impl GenerationMessage {
    /// Storage keys written for this job before publishing.
    pub fn transient_keys(&self) -> Vec<&str> {
        let mut keys = vec![self.document_key.as_str()];
        if let CoverInput::Custom { key } = &self.cover {
            keys.push(key.as_str());
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Submitter;
    use chrono::NaiveDate;

    fn details() -> CoverDetails {
        CoverDetails {
            university_name: "U".into(),
            college_name: String::new(),
            assignment_title: "T".into(),
            instructor_name: "I".into(),
            submission_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            section: String::new(),
            submitter: Submitter::Individual {
                student_name: "S".into(),
                student_id: "1".into(),
            },
            logo_url: None,
        }
    }

    fn request() -> SubmitRequest {
        SubmitRequest {
            owner_id: "user-1".into(),
            document: Some(UploadPayload::Bytes(b"%PDF-1.7".to_vec())),
            page_count: Some(3),
            cover_mode: Some("auto".into()),
            cover_details: Some(details()),
            ..Default::default()
        }
    }

    #[test]
    fn transitions_are_monotonic() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Done));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Pending));
        for terminal in [Done, Failed] {
            for next in [Pending, Done, Failed] {
                assert!(!terminal.can_transition_to(next), "{terminal} → {next}");
            }
        }
    }

    #[test]
    fn status_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Done).unwrap(), "\"done\"");
        assert_eq!(JobStatus::Pending.to_string(), "pending");
        assert!(serde_json::from_str::<JobStatus>("\"processing\"").is_err());
    }

    #[test]
    fn valid_request_passes() {
        let v = request().validate().unwrap();
        assert_eq!(v.page_count, 3);
        assert_eq!(v.cover.mode(), CoverMode::Auto);
    }

    #[test]
    fn missing_document_is_reported_first() {
        let r = SubmitRequest {
            document: None,
            page_count: None,
            ..request()
        };
        let err = r.validate().unwrap_err();
        assert!(matches!(
            err,
            AssignmentError::Validation(ValidationError::MissingDocument)
        ));
    }

    #[test]
    fn page_count_bounds() {
        for bad in [0, 11, -3] {
            let r = SubmitRequest {
                page_count: Some(bad),
                ..request()
            };
            assert!(matches!(
                r.validate().unwrap_err(),
                AssignmentError::Validation(ValidationError::PageCountOutOfRange(n)) if n == bad
            ));
        }
        for good in [1, 10] {
            let r = SubmitRequest {
                page_count: Some(good),
                ..request()
            };
            assert!(r.validate().is_ok());
        }
        let r = SubmitRequest {
            page_count: None,
            ..request()
        };
        assert!(matches!(
            r.validate().unwrap_err(),
            AssignmentError::Validation(ValidationError::MissingPageCount)
        ));
    }

    #[test]
    fn cover_mode_checks() {
        let r = SubmitRequest {
            cover_mode: Some("fancy".into()),
            ..request()
        };
        assert!(matches!(
            r.validate().unwrap_err(),
            AssignmentError::Validation(ValidationError::InvalidCoverMode(_))
        ));

        let r = SubmitRequest {
            cover_mode: None,
            ..request()
        };
        assert!(matches!(
            r.validate().unwrap_err(),
            AssignmentError::Validation(ValidationError::InvalidCoverMode(_))
        ));

        let r = SubmitRequest {
            cover_mode: Some("custom".into()),
            cover_file: None,
            ..request()
        };
        assert!(matches!(
            r.validate().unwrap_err(),
            AssignmentError::Validation(ValidationError::MissingCoverFile)
        ));
    }

    #[test]
    fn message_round_trips_through_json() {
        let msg = GenerationMessage {
            job_id: Uuid::new_v4(),
            document_key: "uploads/a/document.pdf".into(),
            page_count: 2,
            cover: CoverInput::Custom {
                key: "uploads/a/cover.pdf".into(),
            },
            include_outline: true,
            include_references: false,
        };
        let json = serde_json::to_vec(&msg).unwrap();
        let back: GenerationMessage = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.transient_keys().len(), 2);
    }
}
