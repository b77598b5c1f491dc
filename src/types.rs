use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::features::RawFeatureSet;

/// One of the three feature domains scored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Url,
    Text,
    Html,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Url => "url",
            Modality::Text => "text",
            Modality::Html => "html",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Safe,
    Suspicious,
    Dangerous,
}

impl RiskTier {
    pub const DANGEROUS_THRESHOLD: f64 = 0.7;
    pub const SUSPICIOUS_THRESHOLD: f64 = 0.3;

    /// Both thresholds are exclusive: a score of exactly 0.7 is suspicious.
    pub fn from_score(score: f64) -> Self {
        if score > Self::DANGEROUS_THRESHOLD {
            RiskTier::Dangerous
        } else if score > Self::SUSPICIOUS_THRESHOLD {
            RiskTier::Suspicious
        } else {
            RiskTier::Safe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Safe => "safe",
            RiskTier::Suspicious => "suspicious",
            RiskTier::Dangerous => "dangerous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationFactor {
    pub factor: String,
    pub impact: Impact,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub url: String,
    #[serde(default)]
    pub features: Option<RawFeatureSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub url: String,
    pub score: f64,
    pub risk: RiskTier,
    pub explanation: Vec<ExplanationFactor>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub url: String,
    pub user_classification: String,
    pub system_classification: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub models_loaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(rename = "type")]
    pub model_type: String,
    pub loaded: bool,
    pub features: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsInfo {
    pub url_model: ModelInfo,
    pub text_model: ModelInfo,
    pub html_model: ModelInfo,
    /// URL, text, HTML order.
    pub ensemble_weights: [f64; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsInfoResponse {
    pub models: ModelsInfo,
    pub last_updated: Option<DateTime<Utc>>,
}
