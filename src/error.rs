use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::Modality;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Analysis failed: {0}")]
    Analysis(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => {
                tracing::error!("Request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<ExtractionError> for AppError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::InvalidFeature { .. } => AppError::InvalidInput(err.to_string()),
            other => AppError::Analysis(other.to_string()),
        }
    }
}

/// Failures while turning a URL, page or client payload into feature records.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("page fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("page body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("feature `{key}` in {modality} features has an invalid value")]
    InvalidFeature { modality: Modality, key: String },
}

/// Failures while scoring a single modality or combining the scores.
#[derive(Error, Debug, PartialEq)]
pub enum ScoringError {
    #[error("{modality} model references unknown feature `{feature}`")]
    UnknownFeature { modality: Modality, feature: String },

    #[error("{modality} model produced a non-finite score")]
    NonFinite { modality: Modality },

    #[error("ensemble produced a non-finite score")]
    Ensemble,
}

/// Failures while loading a persisted model artifact.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model artifact {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

pub fn validation_error(msg: &str) -> AppError {
    AppError::InvalidInput(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_invalid_input_maps_to_bad_request() {
        let response = validation_error("URL cannot be empty").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], 400);
        assert_eq!(value["error"], "Invalid input: URL cannot be empty");
    }

    #[tokio::test]
    async fn test_internal_errors_keep_textual_reason() {
        let response = AppError::Analysis("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Analysis failed: boom");
    }

    #[test]
    fn test_invalid_feature_becomes_invalid_input() {
        let err = ExtractionError::InvalidFeature {
            modality: Modality::Html,
            key: "iframe_count".to_string(),
        };
        assert!(matches!(AppError::from(err), AppError::InvalidInput(_)));
    }
}
