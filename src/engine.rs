use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{validation_error, AppError},
    explainer::generate_explanation,
    extractors,
    features::{FeatureSet, HtmlFeatures, TextFeatures, UrlFeatures},
    fetcher::PageFetcher,
    model_manager::ModelManager,
    storage::FeedbackStore,
    types::*,
};

/// Request-time service: feature extraction, scoring, explanation and
/// feedback intake. Everything it holds is read-only after construction.
pub struct PhishingEngine {
    models: ModelManager,
    fetcher: PageFetcher,
    feedback: FeedbackStore,
}

impl PhishingEngine {
    pub fn new(config: &Config, models: ModelManager) -> Result<Self, AppError> {
        let fetcher = PageFetcher::new(&config.fetch)?;
        let feedback = FeedbackStore::new(config.feedback_dir.clone());

        info!(
            "Phishing engine ready (models_loaded: {}, feedback dir: {})",
            models.models_loaded(),
            feedback.dir().display()
        );

        Ok(Self {
            models,
            fetcher,
            feedback,
        })
    }

    pub fn models(&self) -> &ModelManager {
        &self.models
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResponse, AppError> {
        let start_time = Instant::now();

        if request.url.trim().is_empty() {
            return Err(validation_error("URL cannot be empty"));
        }

        let features = match request.features.as_ref().filter(|raw| !raw.is_empty()) {
            Some(raw) => FeatureSet::try_from(raw)?,
            None => self.extract_features(&request.url).await,
        };

        let prediction = self.models.predict(&features);
        if prediction.degraded {
            warn!("Score for {} used neutral fallbacks", request.url);
        }

        let risk = RiskTier::from_score(prediction.score);
        let explanation = generate_explanation(&features, prediction.score);

        let latency_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("analyze_duration_ms").record(latency_ms);
        metrics::counter!("analyze_verdicts_total", "risk" => risk.as_str()).increment(1);

        info!(
            "Analyzed {}: score {:.3} ({}) in {:.1}ms",
            request.url,
            prediction.score,
            risk.as_str(),
            latency_ms
        );

        Ok(AnalysisResponse {
            url: request.url,
            score: prediction.score,
            risk,
            explanation,
            timestamp: Utc::now(),
        })
    }

    /// Live extraction. Each stage degrades on its own: an unparseable URL
    /// yields an error-marked URL record, and a failed fetch leaves the HTML
    /// and text records empty. Markup is parsed on a blocking thread.
    pub async fn extract_features(&self, url: &str) -> FeatureSet {
        let url_features = extractors::extract_url_features(url).unwrap_or_else(|e| {
            warn!("URL feature extraction failed for {}: {}", url, e);
            UrlFeatures::failed()
        });

        let (html, text) = match self.fetcher.fetch(url).await {
            Ok(markup) => {
                match tokio::task::spawn_blocking(move || extractors::extract_page_features(&markup)).await {
                    Ok((html, text)) => {
                        let html = html.unwrap_or_else(|e| {
                            warn!("HTML feature extraction failed for {}: {}", url, e);
                            HtmlFeatures::failed()
                        });
                        (html, text)
                    }
                    Err(e) => {
                        warn!("Page parsing task failed for {}: {}", url, e);
                        (HtmlFeatures::failed(), TextFeatures::default())
                    }
                }
            }
            Err(e) => {
                warn!("Error fetching page content for {}: {}", url, e);
                (HtmlFeatures::default(), TextFeatures::default())
            }
        };

        debug!("Extracted features for {}: {:?} {:?} {:?}", url, url_features, html, text);

        FeatureSet {
            url: url_features,
            html,
            text,
        }
    }

    /// Accepts feedback immediately and persists it in the background.
    /// Persistence failures are logged only.
    pub fn submit_feedback(&self, request: FeedbackRequest) {
        metrics::counter!("feedback_submissions_total").increment(1);

        let store = self.feedback.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save(&request).await {
                warn!("Error processing feedback for {}: {}", request.url, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{features::RawFeatureSet, fetcher::test_site};
    use serde_json::json;

    fn engine_in(dir: &std::path::Path) -> PhishingEngine {
        let mut config = Config::default();
        config.models.model_dir = dir.join("models");
        config.feedback_dir = dir.join("feedback");

        let mut models = ModelManager::new(config.models.clone());
        models.load_models().unwrap();
        PhishingEngine::new(&config, models).unwrap()
    }

    fn request(url: &str, features: serde_json::Value) -> AnalysisRequest {
        AnalysisRequest {
            url: url.to_string(),
            features: Some(serde_json::from_value::<RawFeatureSet>(features).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_ip_login_url_is_suspicious() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());

        let url = "http://192.168.1.1/login-verify";
        let url_features = extractors::extract_url_features(url).unwrap();
        assert!(url_features.has_ip_address);
        assert!(url_features.has_suspicious_keywords);

        let response = engine
            .analyze(request(
                url,
                json!({ "url_features": { "has_ip_address": 1, "has_suspicious_keywords": 1 } }),
            ))
            .await
            .unwrap();

        assert!((response.score - 0.55).abs() < 1e-9);
        assert_eq!(response.risk, RiskTier::Suspicious);
        let factors: Vec<&str> = response.explanation.iter().map(|f| f.factor.as_str()).collect();
        assert_eq!(factors, vec!["IP Address URL", "Suspicious Keywords"]);
    }

    #[tokio::test]
    async fn test_dangerous_verdict() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());

        let response = engine
            .analyze(request(
                "http://paypal-verify.tk/login",
                json!({
                    "url_features": { "has_suspicious_tld": 1, "has_suspicious_keywords": 1 },
                    "text_features": { "has_suspicious_phrases": 1, "urgency_keyword_count": 4 },
                    "html_features": { "has_login_form": 1, "has_favicon": 0 }
                }),
            ))
            .await
            .unwrap();

        // 0.5 * 0.8 + 0.3 * 0.8 + 0.2 * 0.8
        assert!((response.score - 0.8).abs() < 1e-9);
        assert_eq!(response.risk, RiskTier::Dangerous);
        assert_eq!(response.explanation.len(), 4);
    }

    #[tokio::test]
    async fn test_unreachable_url_degrades_to_safe() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());

        let response = engine
            .analyze(AnalysisRequest {
                url: "not a url".to_string(),
                features: None,
            })
            .await
            .unwrap();

        assert!((response.score - 0.2).abs() < 1e-9);
        assert_eq!(response.risk, RiskTier::Safe);
        assert_eq!(response.explanation[0].factor, "Legitimate Domain");
    }

    #[tokio::test]
    async fn test_extraction_marks_url_failure() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());

        let features = engine.extract_features("http://[::1").await;
        assert!(features.url.error);
        assert_eq!(features.html, HtmlFeatures::default());
        assert_eq!(features.text, TextFeatures::default());
    }

    #[tokio::test]
    async fn test_schemeless_url_scored_lexically() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());

        let response = engine
            .analyze(AnalysisRequest {
                url: "192.168.1.1/login-verify".to_string(),
                features: None,
            })
            .await
            .unwrap();

        // 0.5 * 0.7 + 0.3 * 0.2 + 0.2 * 0.2
        assert!((response.score - 0.45).abs() < 1e-9);
        assert_eq!(response.risk, RiskTier::Suspicious);
        assert_eq!(response.explanation[0].factor, "Suspicious Keywords");
    }

    #[tokio::test]
    async fn test_live_page_feeds_html_and_text_records() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        let addr = test_site::spawn().await;

        let features = engine.extract_features(&format!("http://{addr}/login")).await;
        assert!(!features.url.error);
        assert!(features.url.has_suspicious_keywords);
        assert!(features.html.has_login_form);
        assert!(features.html.has_password_field);
        assert_eq!(features.html.form_count, 1);
        assert!(features.text.has_suspicious_phrases);
        assert!(features.text.urgency_keyword_count >= 2);
    }

    #[tokio::test]
    async fn test_error_status_leaves_page_records_empty() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());
        let addr = test_site::spawn().await;

        let features = engine.extract_features(&format!("http://{addr}/missing")).await;
        assert!(!features.url.error);
        assert_eq!(features.html, HtmlFeatures::default());
        assert_eq!(features.text, TextFeatures::default());
    }

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());

        let err = engine
            .analyze(AnalysisRequest {
                url: "  ".to_string(),
                features: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_invalid_feature_payload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());

        let err = engine
            .analyze(request("http://example.com", json!({ "text_features": { "urgency_keyword_count": [1] } })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_feedback_persisted_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_in(dir.path());

        engine.submit_feedback(FeedbackRequest {
            url: "http://example.com".to_string(),
            user_classification: "safe".to_string(),
            system_classification: "suspicious".to_string(),
            reason: None,
            timestamp: Utc::now(),
        });

        let feedback_dir = dir.path().join("feedback");
        let mut written = 0;
        for _ in 0..50 {
            written = std::fs::read_dir(&feedback_dir).map(|d| d.count()).unwrap_or(0);
            if written > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(written, 1);
    }
}
