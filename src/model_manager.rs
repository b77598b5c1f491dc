use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{info, warn};

use crate::{
    config::ModelConfig,
    error::{ModelError, ScoringError},
    features::{FeatureRecord, FeatureSet},
    models::{LinearModel, ModalityModel},
    scoring::{self, EnsembleWeights, ModalityScores, NEUTRAL_SCORE},
    types::{Modality, ModelInfo, ModelsInfo},
};

/// Outcome of scoring one feature set.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub score: f64,
    pub modality_scores: ModalityScores,
    /// A modality or the ensemble fell back to the neutral score.
    pub degraded: bool,
}

/// Owns the three modality models. Built once at startup and shared
/// read-only between requests.
pub struct ModelManager {
    config: ModelConfig,
    url_model: ModalityModel,
    text_model: ModalityModel,
    html_model: ModalityModel,
    weights: EnsembleWeights,
    models_loaded: bool,
    last_updated: Option<DateTime<Utc>>,
}

impl ModelManager {
    /// Starts with placeholders for every modality; call
    /// [`ModelManager::load_models`] to pick up persisted artifacts.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            url_model: ModalityModel::placeholder_for(Modality::Url),
            text_model: ModalityModel::placeholder_for(Modality::Text),
            html_model: ModalityModel::placeholder_for(Modality::Html),
            weights: EnsembleWeights::FIXED,
            models_loaded: false,
            last_updated: None,
        }
    }

    /// Loads each configured artifact. A missing file keeps the placeholder;
    /// an unreadable or malformed one also keeps the placeholder and is
    /// reported once all three modalities were attempted.
    pub fn load_models(&mut self) -> Result<(), ModelError> {
        let mut first_failure = None;

        for modality in [Modality::Url, Modality::Text, Modality::Html] {
            let path = self.config.artifact_path(modality);
            let model = match load_artifact(modality, &path) {
                Ok(model) => model,
                Err(e) => {
                    warn!("Failed to load {} model, using placeholder: {}", modality, e);
                    first_failure.get_or_insert(e);
                    ModalityModel::placeholder_for(modality)
                }
            };
            *self.model_mut(modality) = model;
        }

        match first_failure {
            Some(e) => {
                self.models_loaded = false;
                Err(e)
            }
            None => {
                self.models_loaded = true;
                self.last_updated = Some(Utc::now());
                info!(
                    "Models loaded (url: {}, text: {}, html: {})",
                    self.url_model.type_name(),
                    self.text_model.type_name(),
                    self.html_model.type_name()
                );
                Ok(())
            }
        }
    }

    pub fn models_loaded(&self) -> bool {
        self.models_loaded
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Scores every modality and combines them. Scoring faults recover to
    /// [`NEUTRAL_SCORE`] per modality, and for the whole ensemble if the
    /// combination itself fails.
    pub fn predict(&self, features: &FeatureSet) -> Prediction {
        let mut degraded = false;
        let mut recover = |result: Result<f64, ScoringError>| match result {
            Ok(score) => score,
            Err(e) => {
                warn!("Scoring failed, using neutral score: {}", e);
                metrics::counter!("scoring_degraded_total").increment(1);
                degraded = true;
                NEUTRAL_SCORE
            }
        };

        let modality_scores = ModalityScores {
            url: recover(score_with(&self.url_model, &features.url, scoring::url_rule_score)),
            text: recover(score_with(&self.text_model, &features.text, scoring::text_rule_score)),
            html: recover(score_with(&self.html_model, &features.html, scoring::html_rule_score)),
        };
        let score = recover(self.weights.combine(&modality_scores));

        Prediction {
            score,
            modality_scores,
            degraded,
        }
    }

    pub fn model_info(&self) -> ModelsInfo {
        ModelsInfo {
            url_model: describe(&self.url_model),
            text_model: describe(&self.text_model),
            html_model: describe(&self.html_model),
            ensemble_weights: self.weights.as_array(),
        }
    }

    fn model_mut(&mut self, modality: Modality) -> &mut ModalityModel {
        match modality {
            Modality::Url => &mut self.url_model,
            Modality::Text => &mut self.text_model,
            Modality::Html => &mut self.html_model,
        }
    }
}

fn load_artifact(modality: Modality, path: &Path) -> Result<ModalityModel, ModelError> {
    if !path.exists() {
        info!("No {} model at {}, using placeholder", modality, path.display());
        return Ok(ModalityModel::placeholder_for(modality));
    }
    let artifact = LinearModel::load_from_file(path)?;
    info!("Loaded {} model from {}", modality, path.display());
    Ok(ModalityModel::Trained(artifact))
}

fn score_with<F: FeatureRecord>(
    model: &ModalityModel,
    features: &F,
    rules: fn(&F) -> f64,
) -> Result<f64, ScoringError> {
    match model {
        ModalityModel::Trained(artifact) => artifact.model.predict_proba(features),
        ModalityModel::Placeholder(_) => Ok(rules(features)),
    }
}

fn describe(model: &ModalityModel) -> ModelInfo {
    let (version, sha256) = match model {
        ModalityModel::Trained(artifact) => (artifact.model.version.clone(), Some(artifact.sha256.clone())),
        ModalityModel::Placeholder(_) => (None, None),
    };
    ModelInfo {
        model_type: model.type_name().to_string(),
        // True only for an artifact read from disk; placeholders are always
        // present but never count as loaded.
        loaded: model.is_trained(),
        features: model.feature_count(),
        version,
        sha256,
    }
}
