//! Batch collection: one entity type, many identifiers, per-identifier
//! failures reported inline.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetcher::SocialFetcher;
use crate::platform::EntityType;
use crate::record::{CanonicalRecord, ErrorRecord};
use crate::rotation::CredentialRotator;

pub const INVALID_TYPE_KIND: &str = "InvalidType";
const INVALID_TYPE_DETAILS: &str = "Invalid info type provided.";
const PARTIAL_WARNING: &str = "Some identifiers failed to fetch data. Please check the 'Status' and 'Error Details' for individual records.";
const FAILURE_MESSAGE: &str = "No data could be fetched for any of the provided identifiers, or all failed. Please check inputs and API keys.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub identifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultRow {
    Record(CanonicalRecord),
    Error(ErrorRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every identifier produced data.
    Success,
    PartialSuccess,
    /// No identifier produced data.
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResponse {
    pub status: BatchStatus,
    pub results: Vec<ResultRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResponse {
    pub fn records(&self) -> impl Iterator<Item = &CanonicalRecord> {
        self.results.iter().filter_map(|row| match row {
            ResultRow::Record(r) => Some(r),
            ResultRow::Error(_) => None,
        })
    }

    pub fn errors(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.results.iter().filter_map(|row| match row {
            ResultRow::Error(e) => Some(e),
            ResultRow::Record(_) => None,
        })
    }
}

/// Platform label for a type tag, including tags that name no known entity.
fn platform_label(kind: &str) -> String {
    if let Ok(entity) = kind.parse::<EntityType>() {
        return entity.platform().to_string();
    }
    let first = kind.split('_').next().unwrap_or_default();
    let mut chars = first.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Fetch every identifier in order, sharing one rotator across the batch.
pub async fn collect<R>(
    fetcher: &SocialFetcher,
    rotator: &mut R,
    request: &BatchRequest,
) -> Result<BatchResponse, BatchError>
where
    R: CredentialRotator + ?Sized,
{
    if request.kind.trim().is_empty() || request.identifiers.is_empty() {
        return Err(BatchError::InvalidRequest(
            "Missing 'type' or 'identifiers' in request. Please provide at least one identifier."
                .to_string(),
        ));
    }

    let platform = platform_label(&request.kind);
    let entity = request.kind.parse::<EntityType>().ok();
    tracing::info!(kind = %request.kind, identifiers = request.identifiers.len(), "batch.start");

    let mut results = Vec::new();
    let (mut succeeded, mut failed) = (0usize, 0usize);

    for identifier in &request.identifiers {
        let Some(entity) = entity else {
            failed += 1;
            results.push(ResultRow::Error(ErrorRecord::new(
                identifier.as_str(),
                platform.as_str(),
                INVALID_TYPE_KIND,
                INVALID_TYPE_DETAILS,
            )));
            continue;
        };
        match fetcher.fetch(&mut *rotator, entity, identifier).await {
            Ok(output) => {
                succeeded += 1;
                results.extend(output.into_records().into_iter().map(ResultRow::Record));
            }
            Err(err) => {
                failed += 1;
                tracing::warn!(%entity, %identifier, kind = err.kind(), error = %err, "batch.identifier_failed");
                results.push(ResultRow::Error(ErrorRecord::from_error(identifier, &platform, &err)));
            }
        }
    }

    let status = match (succeeded, failed) {
        (_, 0) => BatchStatus::Success,
        (0, _) => BatchStatus::Failure,
        _ => BatchStatus::PartialSuccess,
    };
    tracing::info!(kind = %request.kind, succeeded, failed, status = ?status, "batch.done");

    Ok(BatchResponse {
        status,
        results,
        warning: (status == BatchStatus::PartialSuccess).then(|| PARTIAL_WARNING.to_string()),
        error: (status == BatchStatus::Failure).then(|| FAILURE_MESSAGE.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::KeyRotator;
    use std::time::Duration;

    fn fetcher() -> SocialFetcher {
        SocialFetcher::new(Duration::from_secs(1), Duration::from_secs(1)).unwrap()
    }

    fn rotator() -> KeyRotator {
        KeyRotator::new(vec!["k".into()]).unwrap()
    }

    #[test]
    fn request_uses_type_key() {
        let req: BatchRequest =
            serde_json::from_str(r#"{"type": "instagram_profile", "identifiers": ["nasa"]}"#).unwrap();
        assert_eq!(req.kind, "instagram_profile");
        assert_eq!(req.identifiers, vec!["nasa"]);
    }

    #[test]
    fn platform_labels() {
        assert_eq!(platform_label("youtube_profile"), "Youtube");
        assert_eq!(platform_label("myspace_profile"), "Myspace");
        assert_eq!(platform_label("TWITTER"), "Twitter");
        assert_eq!(platform_label(""), "");
    }

    #[tokio::test]
    async fn empty_requests_are_rejected() {
        let req = BatchRequest {
            kind: "instagram_profile".into(),
            identifiers: vec![],
        };
        let err = collect(&fetcher(), &mut rotator(), &req).await.unwrap_err();
        assert!(matches!(err, BatchError::InvalidRequest(_)));

        let req = BatchRequest {
            kind: " ".into(),
            identifiers: vec!["nasa".into()],
        };
        assert!(collect(&fetcher(), &mut rotator(), &req).await.is_err());
    }

    #[tokio::test]
    async fn unknown_type_fails_every_identifier() {
        let req = BatchRequest {
            kind: "myspace_profile".into(),
            identifiers: vec!["tom".into(), "anna".into()],
        };
        let resp = collect(&fetcher(), &mut rotator(), &req).await.unwrap();
        assert_eq!(resp.status, BatchStatus::Failure);
        assert!(resp.error.is_some());
        let errors: Vec<_> = resp.errors().collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind, INVALID_TYPE_KIND);
        assert_eq!(errors[0].platform, "Myspace");
        assert_eq!(errors[1].identifier, "anna");
    }

    #[tokio::test]
    async fn unparsable_identifiers_fail_without_network() {
        let req = BatchRequest {
            kind: "youtube_post".into(),
            identifiers: vec!["not a video".into()],
        };
        let resp = collect(&fetcher(), &mut rotator(), &req).await.unwrap();
        assert_eq!(resp.status, BatchStatus::Failure);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["results"][0]["Error Kind"], "UnrecognizedIdentifier");
        assert_eq!(json["results"][0]["Platform"], "Youtube");
        assert!(json.get("warning").is_none());
    }
}
