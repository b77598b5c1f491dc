use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::{error::ExtractionError, types::Modality};

/// Structured view over one modality's features. Trained models address
/// fields by name through [`FeatureRecord::feature`].
pub trait FeatureRecord: Sized {
    const MODALITY: Modality;
    const NAMES: &'static [&'static str];

    fn feature(&self, name: &str) -> Option<f64>;

    fn from_raw(raw: &RawFeatures) -> Result<Self, ExtractionError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlFeatures {
    pub error: bool,
    pub domain_length: u32,
    pub path_length: u32,
    pub subdomain_count: u32,
    pub has_https: bool,
    pub path_depth: u32,
    pub has_suspicious_tld: bool,
    pub has_ip_address: bool,
    pub has_at_symbol: bool,
    pub has_double_slash_redirect: bool,
    pub special_char_count: u32,
    pub digit_count: u32,
    pub has_suspicious_keywords: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlFeatures {
    pub error: bool,
    pub form_count: u32,
    pub password_input_count: u32,
    pub external_link_count: u32,
    pub iframe_count: u32,
    pub script_count: u32,
    pub hidden_element_count: u32,
    pub image_count: u32,
    pub has_favicon: bool,
    pub has_password_field: bool,
    pub has_login_form: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextFeatures {
    pub error: bool,
    pub security_keyword_count: u32,
    pub urgency_keyword_count: u32,
    pub financial_keyword_count: u32,
    pub total_word_count: u32,
    pub avg_word_length: f64,
    pub special_char_ratio: f64,
    pub uppercase_ratio: f64,
    pub has_suspicious_phrases: bool,
}

impl UrlFeatures {
    pub fn failed() -> Self {
        Self { error: true, ..Default::default() }
    }
}

impl HtmlFeatures {
    pub fn failed() -> Self {
        Self { error: true, ..Default::default() }
    }
}

/// Immutable once produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    pub url: UrlFeatures,
    pub html: HtmlFeatures,
    pub text: TextFeatures,
}

/// Loose key/number mapping accepted from clients. Absent keys read as zero,
/// unknown keys are ignored, booleans count as 0/1. Flags must be 0 or 1 and
/// counts must be non-negative whole numbers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RawFeatures(HashMap<String, Value>);

impl RawFeatures {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn number(&self, modality: Modality, key: &str) -> Result<f64, ExtractionError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(0.0),
            Some(Value::Bool(b)) => Ok(flag_value(*b)),
            Some(Value::Number(n)) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid_feature(modality, key)),
            Some(_) => Err(invalid_feature(modality, key)),
        }
    }

    fn flag(&self, modality: Modality, key: &str) -> Result<bool, ExtractionError> {
        match self.number(modality, key)? {
            v if v == 0.0 => Ok(false),
            v if v == 1.0 => Ok(true),
            _ => Err(invalid_feature(modality, key)),
        }
    }

    fn count(&self, modality: Modality, key: &str) -> Result<u32, ExtractionError> {
        let v = self.number(modality, key)?;
        if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 {
            Ok(v as u32)
        } else {
            Err(invalid_feature(modality, key))
        }
    }
}

fn invalid_feature(modality: Modality, key: &str) -> ExtractionError {
    ExtractionError::InvalidFeature {
        modality,
        key: key.to_string(),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFeatureSet {
    #[serde(default, alias = "url")]
    pub url_features: RawFeatures,
    #[serde(default, alias = "text")]
    pub text_features: RawFeatures,
    #[serde(default, alias = "html")]
    pub html_features: RawFeatures,
}

impl RawFeatureSet {
    pub fn is_empty(&self) -> bool {
        self.url_features.is_empty() && self.text_features.is_empty() && self.html_features.is_empty()
    }
}

impl TryFrom<&RawFeatureSet> for FeatureSet {
    type Error = ExtractionError;

    fn try_from(raw: &RawFeatureSet) -> Result<Self, Self::Error> {
        Ok(FeatureSet {
            url: UrlFeatures::from_raw(&raw.url_features)?,
            html: HtmlFeatures::from_raw(&raw.html_features)?,
            text: TextFeatures::from_raw(&raw.text_features)?,
        })
    }
}

fn flag_value(v: bool) -> f64 {
    if v {
        1.0
    } else {
        0.0
    }
}

impl FeatureRecord for UrlFeatures {
    const MODALITY: Modality = Modality::Url;
    const NAMES: &'static [&'static str] = &[
        "domain_length",
        "path_length",
        "subdomain_count",
        "has_https",
        "path_depth",
        "has_suspicious_tld",
        "has_ip_address",
        "has_at_symbol",
        "has_double_slash_redirect",
        "special_char_count",
        "digit_count",
        "has_suspicious_keywords",
    ];

    fn feature(&self, name: &str) -> Option<f64> {
        let v = match name {
            "error" => flag_value(self.error),
            "domain_length" => self.domain_length as f64,
            "path_length" => self.path_length as f64,
            "subdomain_count" => self.subdomain_count as f64,
            "has_https" => flag_value(self.has_https),
            "path_depth" => self.path_depth as f64,
            "has_suspicious_tld" => flag_value(self.has_suspicious_tld),
            "has_ip_address" => flag_value(self.has_ip_address),
            "has_at_symbol" => flag_value(self.has_at_symbol),
            "has_double_slash_redirect" => flag_value(self.has_double_slash_redirect),
            "special_char_count" => self.special_char_count as f64,
            "digit_count" => self.digit_count as f64,
            "has_suspicious_keywords" => flag_value(self.has_suspicious_keywords),
            _ => return None,
        };
        Some(v)
    }

    fn from_raw(raw: &RawFeatures) -> Result<Self, ExtractionError> {
        let m = Self::MODALITY;
        Ok(Self {
            error: raw.flag(m, "error")?,
            domain_length: raw.count(m, "domain_length")?,
            path_length: raw.count(m, "path_length")?,
            subdomain_count: raw.count(m, "subdomain_count")?,
            has_https: raw.flag(m, "has_https")?,
            path_depth: raw.count(m, "path_depth")?,
            has_suspicious_tld: raw.flag(m, "has_suspicious_tld")?,
            has_ip_address: raw.flag(m, "has_ip_address")?,
            has_at_symbol: raw.flag(m, "has_at_symbol")?,
            has_double_slash_redirect: raw.flag(m, "has_double_slash_redirect")?,
            special_char_count: raw.count(m, "special_char_count")?,
            digit_count: raw.count(m, "digit_count")?,
            has_suspicious_keywords: raw.flag(m, "has_suspicious_keywords")?,
        })
    }
}

impl FeatureRecord for HtmlFeatures {
    const MODALITY: Modality = Modality::Html;
    const NAMES: &'static [&'static str] = &[
        "form_count",
        "password_input_count",
        "external_link_count",
        "iframe_count",
        "script_count",
        "hidden_element_count",
        "image_count",
        "has_favicon",
        "has_password_field",
        "has_login_form",
    ];

    fn feature(&self, name: &str) -> Option<f64> {
        let v = match name {
            "error" => flag_value(self.error),
            "form_count" => self.form_count as f64,
            "password_input_count" => self.password_input_count as f64,
            "external_link_count" => self.external_link_count as f64,
            "iframe_count" => self.iframe_count as f64,
            "script_count" => self.script_count as f64,
            "hidden_element_count" => self.hidden_element_count as f64,
            "image_count" => self.image_count as f64,
            "has_favicon" => flag_value(self.has_favicon),
            "has_password_field" => flag_value(self.has_password_field),
            "has_login_form" => flag_value(self.has_login_form),
            _ => return None,
        };
        Some(v)
    }

    fn from_raw(raw: &RawFeatures) -> Result<Self, ExtractionError> {
        let m = Self::MODALITY;
        Ok(Self {
            error: raw.flag(m, "error")?,
            form_count: raw.count(m, "form_count")?,
            password_input_count: raw.count(m, "password_input_count")?,
            external_link_count: raw.count(m, "external_link_count")?,
            iframe_count: raw.count(m, "iframe_count")?,
            script_count: raw.count(m, "script_count")?,
            hidden_element_count: raw.count(m, "hidden_element_count")?,
            image_count: raw.count(m, "image_count")?,
            has_favicon: raw.flag(m, "has_favicon")?,
            has_password_field: raw.flag(m, "has_password_field")?,
            has_login_form: raw.flag(m, "has_login_form")?,
        })
    }
}

impl FeatureRecord for TextFeatures {
    const MODALITY: Modality = Modality::Text;
    const NAMES: &'static [&'static str] = &[
        "security_keyword_count",
        "urgency_keyword_count",
        "financial_keyword_count",
        "total_word_count",
        "avg_word_length",
        "special_char_ratio",
        "uppercase_ratio",
        "has_suspicious_phrases",
    ];

    fn feature(&self, name: &str) -> Option<f64> {
        let v = match name {
            "error" => flag_value(self.error),
            "security_keyword_count" => self.security_keyword_count as f64,
            "urgency_keyword_count" => self.urgency_keyword_count as f64,
            "financial_keyword_count" => self.financial_keyword_count as f64,
            "total_word_count" => self.total_word_count as f64,
            "avg_word_length" => self.avg_word_length,
            "special_char_ratio" => self.special_char_ratio,
            "uppercase_ratio" => self.uppercase_ratio,
            "has_suspicious_phrases" => flag_value(self.has_suspicious_phrases),
            _ => return None,
        };
        Some(v)
    }

    fn from_raw(raw: &RawFeatures) -> Result<Self, ExtractionError> {
        let m = Self::MODALITY;
        Ok(Self {
            error: raw.flag(m, "error")?,
            security_keyword_count: raw.count(m, "security_keyword_count")?,
            urgency_keyword_count: raw.count(m, "urgency_keyword_count")?,
            financial_keyword_count: raw.count(m, "financial_keyword_count")?,
            total_word_count: raw.count(m, "total_word_count")?,
            avg_word_length: raw.number(m, "avg_word_length")?,
            special_char_ratio: raw.number(m, "special_char_ratio")?,
            uppercase_ratio: raw.number(m, "uppercase_ratio")?,
            has_suspicious_phrases: raw.flag(m, "has_suspicious_phrases")?,
        })
    }
}
