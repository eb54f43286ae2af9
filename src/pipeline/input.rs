//! Input resolution: normalise an uploaded document to raw PDF bytes.
//!
//! Uploads reach the service in three shapes (a multipart body, a base64
//! field of a JSON form, a link to an object the client already stored).
//! [`UploadPayload::resolve`] turns every shape into bytes once, at the
//! boundary, so nothing downstream branches on how a file arrived.
//!
//! The PDF magic bytes (`%PDF`) are checked before returning so a wrong file
//! fails the submission synchronously instead of failing the job later.

use crate::error::{AssignmentError, ValidationError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// A document as supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum UploadPayload {
    /// Raw bytes, e.g. a multipart file part.
    Bytes(Vec<u8>),
    /// Base64 text, with or without a `data:application/pdf;base64,` prefix.
    Base64(String),
    /// An `http(s)` URL to download.
    Remote { url: String },
}

impl UploadPayload {
    /// Check if the input string looks like a URL.
    pub fn is_url(input: &str) -> bool {
        input.starts_with("http://") || input.starts_with("https://")
    }

    /// Resolve the payload to PDF bytes.
    pub async fn resolve(&self, timeout_secs: u64) -> Result<Vec<u8>, AssignmentError> {
        let bytes = match self {
            UploadPayload::Bytes(b) => b.clone(),
            UploadPayload::Base64(text) => decode_base64(text)?,
            UploadPayload::Remote { url } => download_url(url, timeout_secs).await?,
        };
        if bytes.is_empty() {
            return Err(ValidationError::MissingDocument.into());
        }
        ensure_pdf(&bytes)?;
        Ok(bytes)
    }
}

/// Reject buffers that do not start with `%PDF`.
pub fn ensure_pdf(bytes: &[u8]) -> Result<(), AssignmentError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(AssignmentError::malformed(format!(
            "not a PDF (magic bytes: {:?})",
            magic
        )));
    }
    Ok(())
}

fn decode_base64(text: &str) -> Result<Vec<u8>, AssignmentError> {
    let body = match text.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => text,
    };
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| AssignmentError::malformed(format!("undecodable base64 document: {}", e)))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, AssignmentError> {
    if !UploadPayload::is_url(url) {
        return Err(AssignmentError::malformed(format!("unsupported URL '{}'", url)));
    }
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AssignmentError::Internal(format!("HTTP client: {}", e)))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AssignmentError::malformed(format!("download of {} timed out after {}s", url, timeout_secs))
        } else {
            AssignmentError::malformed(format!("download of {} failed: {}", url, e))
        }
    })?;

    if !response.status().is_success() {
        return Err(AssignmentError::malformed(format!(
            "download of {} failed: HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AssignmentError::malformed(format!("download of {} failed: {}", url, e)))?;

    debug!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// Fetch a small binary asset (a cover logo). Failures are the caller's to
/// ignore.
pub async fn fetch_asset(url: &str, timeout_secs: u64) -> Result<Vec<u8>, AssignmentError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AssignmentError::Internal(format!("HTTP client: {}", e)))?;
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| AssignmentError::upstream("logo", e))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| AssignmentError::upstream("logo", e))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY: &[u8] = b"%PDF-1.7\n%%EOF";

    #[test]
    fn test_is_url() {
        assert!(UploadPayload::is_url("https://example.com/doc.pdf"));
        assert!(UploadPayload::is_url("http://example.com/doc.pdf"));
        assert!(!UploadPayload::is_url("/tmp/doc.pdf"));
        assert!(!UploadPayload::is_url(""));
    }

    #[tokio::test]
    async fn bytes_pass_through() {
        let out = UploadPayload::Bytes(TINY.to_vec()).resolve(5).await.unwrap();
        assert_eq!(out, TINY);
    }

    #[tokio::test]
    async fn base64_with_data_uri_prefix() {
        let encoded = format!("data:application/pdf;base64,{}", STANDARD.encode(TINY));
        let out = UploadPayload::Base64(encoded).resolve(5).await.unwrap();
        assert_eq!(out, TINY);
    }

    #[tokio::test]
    async fn base64_tolerates_line_wrapping() {
        let encoded = STANDARD.encode(TINY);
        let (a, b) = encoded.split_at(6);
        let out = UploadPayload::Base64(format!("{a}\n{b}\n")).resolve(5).await.unwrap();
        assert_eq!(out, TINY);
    }

    #[tokio::test]
    async fn bad_base64_is_malformed() {
        let err = UploadPayload::Base64("***".into()).resolve(5).await.unwrap_err();
        assert!(matches!(err, AssignmentError::MalformedInput { .. }));
    }

    #[tokio::test]
    async fn non_pdf_is_malformed() {
        let err = UploadPayload::Bytes(b"PK\x03\x04zip".to_vec()).resolve(5).await.unwrap_err();
        assert!(matches!(err, AssignmentError::MalformedInput { .. }));
    }

    #[tokio::test]
    async fn empty_bytes_is_missing_document() {
        let err = UploadPayload::Bytes(Vec::new()).resolve(5).await.unwrap_err();
        assert!(matches!(
            err,
            AssignmentError::Validation(ValidationError::MissingDocument)
        ));
    }

    #[tokio::test]
    async fn non_http_remote_is_rejected_without_network() {
        let err = UploadPayload::Remote { url: "ftp://x/doc.pdf".into() }
            .resolve(5)
            .await
            .unwrap_err();
        assert!(matches!(err, AssignmentError::MalformedInput { .. }));
    }
}
