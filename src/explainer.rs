use crate::{
    features::FeatureSet,
    types::{ExplanationFactor, Impact, RiskTier},
};

pub const MAX_FACTORS: usize = 4;

fn factor(name: &str, impact: Impact, description: &str) -> ExplanationFactor {
    ExplanationFactor {
        factor: name.to_string(),
        impact,
        description: description.to_string(),
    }
}

/// Human-readable reasons behind a score, in rule declaration order.
///
/// Only the first [`MAX_FACTORS`] matches are kept, so a later rule can be
/// dropped even when its impact is higher than an earlier one.
pub fn generate_explanation(features: &FeatureSet, score: f64) -> Vec<ExplanationFactor> {
    let risk = RiskTier::from_score(score);
    let (url, html, text) = (&features.url, &features.html, &features.text);
    let mut factors = Vec::new();

    if url.has_suspicious_tld {
        factors.push(factor(
            "Suspicious Domain",
            Impact::High,
            "The website uses a suspicious top-level domain often associated with free domains used in phishing.",
        ));
    }

    if url.has_ip_address {
        factors.push(factor(
            "IP Address URL",
            Impact::High,
            "The URL contains an IP address instead of a domain name, which is rarely used for legitimate websites.",
        ));
    }

    if url.has_suspicious_keywords {
        factors.push(factor(
            "Suspicious Keywords",
            Impact::Medium,
            "The URL contains words often used in phishing attempts, like 'login', 'verify', or 'secure'.",
        ));
    }

    if html.has_login_form {
        let impact = if risk == RiskTier::Safe { Impact::Low } else { Impact::Medium };
        factors.push(factor(
            "Login Form Detected",
            impact,
            "The page contains a login form asking for credentials.",
        ));
    }

    if html.iframe_count > 2 {
        factors.push(factor(
            "Multiple iFrames",
            Impact::Medium,
            "The page uses multiple embedded frames, which can be used to load content from other sources.",
        ));
    }

    if html.hidden_element_count > 5 {
        factors.push(factor(
            "Hidden Elements",
            Impact::High,
            "The page contains multiple hidden elements, which may be attempting to hide malicious content.",
        ));
    }

    if text.urgency_keyword_count > 2 {
        factors.push(factor(
            "Urgent Language",
            Impact::Medium,
            "The page uses urgent language to pressure users into taking immediate action.",
        ));
    }

    if text.has_suspicious_phrases {
        factors.push(factor(
            "Suspicious Phrases",
            Impact::High,
            "The page contains phrases commonly used in phishing attempts, like 'verify your account' or 'security alert'.",
        ));
    }

    if risk == RiskTier::Safe {
        if !url.has_suspicious_tld && !url.has_ip_address {
            factors.push(factor(
                "Legitimate Domain",
                Impact::Low,
                "The website uses a standard domain name without suspicious characteristics.",
            ));
        }

        if url.has_https {
            factors.push(factor(
                "Secure Connection",
                Impact::Low,
                "The site uses HTTPS, which provides a secure connection.",
            ));
        }
    }

    factors.truncate(MAX_FACTORS);
    factors
}
