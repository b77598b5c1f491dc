use serde::Serialize;

use crate::{
    error::ScoringError,
    features::{HtmlFeatures, TextFeatures, UrlFeatures},
};

/// Score substituted for a modality, or the whole ensemble, that failed.
pub const NEUTRAL_SCORE: f64 = 0.5;

const BASELINE_SCORE: f64 = 0.2;

// Rule tables applied when a modality has no trained model. First match wins.

pub fn url_rule_score(f: &UrlFeatures) -> f64 {
    if f.has_suspicious_tld {
        0.8
    } else if f.has_ip_address {
        0.9
    } else if f.has_suspicious_keywords {
        0.7
    } else {
        BASELINE_SCORE
    }
}

pub fn text_rule_score(f: &TextFeatures) -> f64 {
    if f.has_suspicious_phrases {
        0.8
    } else if f.urgency_keyword_count > 2 {
        0.7
    } else {
        BASELINE_SCORE
    }
}

pub fn html_rule_score(f: &HtmlFeatures) -> f64 {
    if f.has_login_form {
        if f.has_favicon {
            0.6
        } else {
            0.8
        }
    } else if f.hidden_element_count > 5 {
        0.7
    } else {
        BASELINE_SCORE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModalityScores {
    pub url: f64,
    pub text: f64,
    pub html: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleWeights {
    pub url: f64,
    pub text: f64,
    pub html: f64,
}

impl EnsembleWeights {
    pub const FIXED: EnsembleWeights = EnsembleWeights {
        url: 0.5,
        text: 0.3,
        html: 0.2,
    };

    pub fn as_array(&self) -> [f64; 3] {
        [self.url, self.text, self.html]
    }

    /// Convex combination of the modality scores.
    pub fn combine(&self, scores: &ModalityScores) -> Result<f64, ScoringError> {
        let combined = self.url * scores.url + self.text * scores.text + self.html * scores.html;
        if combined.is_finite() {
            Ok(combined.clamp(0.0, 1.0))
        } else {
            Err(ScoringError::Ensemble)
        }
    }
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self::FIXED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let sum: f64 = EnsembleWeights::FIXED.as_array().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_url_rule_precedence() {
        let all = UrlFeatures {
            has_suspicious_tld: true,
            has_ip_address: true,
            has_suspicious_keywords: true,
            ..Default::default()
        };
        assert_eq!(url_rule_score(&all), 0.8);

        let ip_and_keyword = UrlFeatures {
            has_ip_address: true,
            has_suspicious_keywords: true,
            ..Default::default()
        };
        assert_eq!(url_rule_score(&ip_and_keyword), 0.9);

        let keyword = UrlFeatures { has_suspicious_keywords: true, ..Default::default() };
        assert_eq!(url_rule_score(&keyword), 0.7);
        assert_eq!(url_rule_score(&UrlFeatures::default()), 0.2);
        assert_eq!(url_rule_score(&UrlFeatures::failed()), 0.2);
    }

    #[test]
    fn test_text_rules() {
        let phrases = TextFeatures { has_suspicious_phrases: true, urgency_keyword_count: 5, ..Default::default() };
        assert_eq!(text_rule_score(&phrases), 0.8);

        let urgent = TextFeatures { urgency_keyword_count: 3, ..Default::default() };
        assert_eq!(text_rule_score(&urgent), 0.7);

        let mild = TextFeatures { urgency_keyword_count: 2, ..Default::default() };
        assert_eq!(text_rule_score(&mild), 0.2);
    }

    #[test]
    fn test_html_rules() {
        let bare_login = HtmlFeatures { has_login_form: true, ..Default::default() };
        assert_eq!(html_rule_score(&bare_login), 0.8);

        let branded_login = HtmlFeatures { has_login_form: true, has_favicon: true, ..Default::default() };
        assert_eq!(html_rule_score(&branded_login), 0.6);

        let hidden = HtmlFeatures { hidden_element_count: 6, ..Default::default() };
        assert_eq!(html_rule_score(&hidden), 0.7);

        let few_hidden = HtmlFeatures { hidden_element_count: 5, ..Default::default() };
        assert_eq!(html_rule_score(&few_hidden), 0.2);
    }

    #[test]
    fn test_combination_stays_in_unit_interval() {
        let weights = EnsembleWeights::FIXED;
        let grid = [0.0, 0.2, 0.5, 0.7, 0.9, 1.0];
        for &url in &grid {
            for &text in &grid {
                for &html in &grid {
                    let score = weights.combine(&ModalityScores { url, text, html }).unwrap();
                    assert!((0.0..=1.0).contains(&score));
                }
            }
        }
    }

    #[test]
    fn test_non_finite_combination_fails() {
        let scores = ModalityScores { url: f64::NAN, text: 0.2, html: 0.2 };
        assert_eq!(EnsembleWeights::FIXED.combine(&scores), Err(ScoringError::Ensemble));
    }
}
