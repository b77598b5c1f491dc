use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

use crate::{
    error::{ModelError, ScoringError},
    features::FeatureRecord,
    types::Modality,
};

const PLACEHOLDER_SEED: u64 = 42;

/// Persisted linear classifier: `sigmoid(intercept + Σ wᵢ·xᵢ)` over
/// `feature_order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub weights: Vec<f64>,
    pub feature_order: Vec<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// A model read from disk, with the digest of the bytes it came from.
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub model: LinearModel,
    pub sha256: String,
}

impl LinearModel {
    pub fn load_from_file(path: &Path) -> Result<LoadedArtifact, ModelError> {
        let bytes = std::fs::read(path).map_err(|source| ModelError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let model: LinearModel = serde_json::from_slice(&bytes).map_err(|source| ModelError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        model.validate().map_err(|reason| ModelError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;

        let sha256 = hex::encode(Sha256::digest(&bytes));
        debug!(
            "Loaded linear model from {}: {} features, version {:?}",
            path.display(),
            model.feature_order.len(),
            model.version
        );
        Ok(LoadedArtifact { model, sha256 })
    }

    /// Untrained stand-in with small weights from a fixed seed, so every
    /// process builds the same placeholder.
    pub fn placeholder<F: FeatureRecord>() -> Self {
        let mut rng = StdRng::seed_from_u64(PLACEHOLDER_SEED);
        let feature_order: Vec<String> = F::NAMES.iter().map(|s| s.to_string()).collect();
        let weights = feature_order.iter().map(|_| rng.gen_range(-0.01..0.01)).collect();
        Self {
            intercept: 0.0,
            weights,
            feature_order,
            version: None,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.weights.len() != self.feature_order.len() {
            return Err(format!(
                "{} weights for {} features",
                self.weights.len(),
                self.feature_order.len()
            ));
        }
        if !self.intercept.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err("non-finite coefficient".to_string());
        }
        Ok(())
    }

    pub fn predict_proba<F: FeatureRecord>(&self, features: &F) -> Result<f64, ScoringError> {
        let mut z = self.intercept;
        for (name, weight) in self.feature_order.iter().zip(&self.weights) {
            let value = features.feature(name).ok_or_else(|| ScoringError::UnknownFeature {
                modality: F::MODALITY,
                feature: name.clone(),
            })?;
            z += weight * value;
        }

        let p = sigmoid(z);
        if p.is_finite() {
            Ok(p)
        } else {
            Err(ScoringError::NonFinite { modality: F::MODALITY })
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// What a modality is scored with.
#[derive(Debug, Clone)]
pub enum ModalityModel {
    Trained(LoadedArtifact),
    Placeholder(LinearModel),
}

impl ModalityModel {
    pub fn placeholder_for(modality: Modality) -> Self {
        use crate::features::{HtmlFeatures, TextFeatures, UrlFeatures};

        let model = match modality {
            Modality::Url => LinearModel::placeholder::<UrlFeatures>(),
            Modality::Text => LinearModel::placeholder::<TextFeatures>(),
            Modality::Html => LinearModel::placeholder::<HtmlFeatures>(),
        };
        ModalityModel::Placeholder(model)
    }

    pub fn is_trained(&self) -> bool {
        matches!(self, ModalityModel::Trained(_))
    }

    pub fn feature_count(&self) -> usize {
        match self {
            ModalityModel::Trained(artifact) => artifact.model.feature_order.len(),
            ModalityModel::Placeholder(model) => model.feature_order.len(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ModalityModel::Trained(_) => "LinearModel",
            ModalityModel::Placeholder(_) => "PlaceholderModel",
        }
    }
}
